/*
    optidisc

    Copyright 2025 the optidisc project contributors

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------

    src/session.rs

    Session: an ordered run of tracks bracketed by synthetic lead-in and
    lead-out, with session-level MCN and CD-TEXT languages.

*/

//! The `session` module defines [`Session`].

use std::cell::OnceCell;

use crate::cdtext::{CdTextDecoder, CdTextEncoder};
use crate::language::{Language, PackType};
use crate::track::Track;
use crate::util::{mcn_is_valid, python_index, subchannel_q_decode_mcn};
use crate::{DiscImageError, SessionType, TRACK_LEADIN, TRACK_LEADOUT};

/// A session of the disc layout.
///
/// Content tracks are held in order; the synthetic lead-in (track number 0)
/// and lead-out (track number 0xAA) bracket them and are reachable through
/// [`Session::track_by_number`]. Layout fields (number, first track, start
/// sector) are stamped by the owning disc's layout pass.
pub struct Session {
    pub(crate) number: i32,
    pub(crate) start_sector: i32,
    pub(crate) first_track: i32,

    session_type: SessionType,
    mcn: Option<String>,
    mcn_scan: OnceCell<Option<String>>,

    tracks: Vec<Track>,
    lead_in: Track,
    lead_out: Track,
    languages: Vec<Language>,
}

impl Session {
    pub fn new(session_type: SessionType) -> Session {
        let mut lead_in = Track::default();
        lead_in.number = TRACK_LEADIN as i32;
        lead_in.last_in_session = false;
        let mut lead_out = Track::default();
        lead_out.number = TRACK_LEADOUT as i32;
        lead_out.last_in_session = false;

        Session {
            number: 1,
            start_sector: 0,
            first_track: 1,
            session_type,
            mcn: None,
            mcn_scan: OnceCell::new(),
            tracks: Vec::new(),
            lead_in,
            lead_out,
            languages: Vec::new(),
        }
    }

    /// Session number within the disc layout.
    pub fn number(&self) -> i32 {
        self.number
    }

    /// Absolute address of the session's first sector.
    pub fn start_sector(&self) -> i32 {
        self.start_sector
    }

    /// Number assigned to the session's first content track.
    pub fn first_track(&self) -> i32 {
        self.first_track
    }

    /// Session length in sectors: the sum of the content track lengths.
    pub fn length(&self) -> i32 {
        self.tracks.iter().map(|t| t.length()).sum()
    }

    /// True if the absolute address lies within this session.
    pub fn layout_contains_address(&self, address: i32) -> bool {
        address >= self.start_sector && address < self.start_sector + self.length()
    }

    pub fn session_type(&self) -> SessionType {
        self.session_type
    }

    pub fn set_session_type(&mut self, session_type: SessionType) {
        self.session_type = session_type;
    }

    // --- MCN -------------------------------------------------------------

    /// True if the MCN is dictated by user-supplied subchannel data and
    /// cannot be assigned.
    pub fn mcn_fixed(&self) -> bool {
        self.find_track_with_subchannel().is_some()
    }

    /// Set the MCN. Silently ignored while the MCN is fixed by subchannel
    /// data; invalid strings are rejected.
    pub fn set_mcn(&mut self, mcn: &str) -> Result<(), DiscImageError> {
        if !mcn_is_valid(mcn) {
            return Err(DiscImageError::SessionError(format!("invalid MCN '{}'", mcn)));
        }
        if self.mcn_fixed() {
            log::debug!("set_mcn(): MCN is fixed by subchannel data, ignoring assignment");
            return Ok(());
        }
        self.mcn = Some(mcn.to_string());
        Ok(())
    }

    /// The effective MCN: the assigned value, or, when fixed, the value
    /// scanned from the Q subchannel of the first subchannel-bearing track.
    pub fn mcn(&self) -> Option<String> {
        if self.mcn_fixed() {
            self.mcn_scan.get_or_init(|| self.scan_for_mcn()).clone()
        }
        else {
            self.mcn.clone()
        }
    }

    // According to INF8090, the MCN, if present, must be encoded in at least
    // one sector per 100 consecutive sectors. Read the first hundred sectors'
    // subchannel from the first subchannel-bearing fragment and extract it.
    fn scan_for_mcn(&self) -> Option<String> {
        let track = self.find_track_with_subchannel()?;
        let fragment = track.find_fragment_with_subchannel()?;
        let start_address = fragment.address();

        for address in start_address..start_address + 100 {
            let sector = match track.get_sector(address, false) {
                Ok(sector) => sector,
                Err(_) => break,
            };

            let q = sector.subchannel_q();
            if q[0] & 0x0F == 0x02 {
                if let Some(mcn) = subchannel_q_decode_mcn(&q[1..8]) {
                    log::debug!("scan_for_mcn(): found MCN: <{}>", mcn);
                    return Some(mcn);
                }
            }
        }
        None
    }

    fn find_track_with_subchannel(&self) -> Option<&Track> {
        self.tracks.iter().find(|t| t.find_fragment_with_subchannel().is_some())
    }

    // --- Tracks ----------------------------------------------------------

    pub fn num_tracks(&self) -> usize {
        self.tracks.len()
    }

    /// Iterate over the content tracks (lead-in and lead-out excluded).
    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter()
    }

    /// The synthetic lead-in track.
    pub fn lead_in(&self) -> &Track {
        &self.lead_in
    }

    /// The synthetic lead-out track.
    pub fn lead_out(&self) -> &Track {
        &self.lead_out
    }

    /// Append a content track.
    pub fn add_track(&mut self, track: Track) {
        self.tracks.push(track);
        self.commit_layout();
    }

    /// Insert a content track at `position` (Python-style; clamped).
    pub fn add_track_at(&mut self, position: i32, track: Track) {
        let len = self.tracks.len();
        let resolved = if position < 0 {
            (len as i64 + position as i64).max(0) as usize
        }
        else {
            (position as usize).min(len)
        };
        self.tracks.insert(resolved, track);
        self.commit_layout();
    }

    pub fn remove_track_by_index(&mut self, index: i32) -> Result<Track, DiscImageError> {
        let resolved = python_index(self.tracks.len(), index)
            .ok_or_else(|| DiscImageError::TrackError(format!("track with index {} not found", index)))?;
        let track = self.tracks.remove(resolved);
        self.commit_layout();
        Ok(track)
    }

    pub fn remove_track_by_number(&mut self, number: i32) -> Result<Track, DiscImageError> {
        let position = self
            .tracks
            .iter()
            .position(|t| t.number() == number)
            .ok_or_else(|| DiscImageError::TrackError(format!("track with number {} not found", number)))?;
        let track = self.tracks.remove(position);
        self.commit_layout();
        Ok(track)
    }

    /// Content track lookup by index; negative indices count from the end.
    pub fn track_by_index(&self, index: i32) -> Result<&Track, DiscImageError> {
        python_index(self.tracks.len(), index)
            .map(|i| &self.tracks[i])
            .ok_or_else(|| DiscImageError::TrackError(format!("track with index {} not found", index)))
    }

    pub fn track_by_index_mut(&mut self, index: i32) -> Result<&mut Track, DiscImageError> {
        let resolved = python_index(self.tracks.len(), index)
            .ok_or_else(|| DiscImageError::TrackError(format!("track with index {} not found", index)))?;
        Ok(&mut self.tracks[resolved])
    }

    /// Track lookup by number; 0 yields the lead-in, 0xAA the lead-out.
    pub fn track_by_number(&self, number: i32) -> Result<&Track, DiscImageError> {
        if number == TRACK_LEADIN as i32 {
            return Ok(&self.lead_in);
        }
        if number == TRACK_LEADOUT as i32 {
            return Ok(&self.lead_out);
        }
        self.tracks
            .iter()
            .find(|t| t.number() == number)
            .ok_or_else(|| DiscImageError::TrackError(format!("track with number {} not found", number)))
    }

    pub fn track_by_number_mut(&mut self, number: i32) -> Result<&mut Track, DiscImageError> {
        if number == TRACK_LEADIN as i32 {
            return Ok(&mut self.lead_in);
        }
        if number == TRACK_LEADOUT as i32 {
            return Ok(&mut self.lead_out);
        }
        self.tracks
            .iter_mut()
            .find(|t| t.number() == number)
            .ok_or_else(|| DiscImageError::TrackError(format!("track with number {} not found", number)))
    }

    /// Content track containing the absolute `address`.
    pub fn track_by_address(&self, address: i32) -> Result<&Track, DiscImageError> {
        self.tracks
            .iter()
            .find(|t| t.layout_contains_address(address))
            .ok_or_else(|| DiscImageError::TrackError(format!("no track contains address {}", address)))
    }

    pub fn track_by_address_mut(&mut self, address: i32) -> Result<&mut Track, DiscImageError> {
        self.tracks
            .iter_mut()
            .find(|t| t.layout_contains_address(address))
            .ok_or_else(|| DiscImageError::TrackError(format!("no track contains address {}", address)))
    }

    // --- Languages -------------------------------------------------------

    pub fn num_languages(&self) -> usize {
        self.languages.len()
    }

    pub fn languages(&self) -> impl Iterator<Item = &Language> {
        self.languages.iter()
    }

    /// Add a language block. Language codes are unique within a session.
    pub fn add_language(&mut self, language: Language) -> Result<(), DiscImageError> {
        if self.languages.iter().any(|l| l.code() == language.code()) {
            return Err(DiscImageError::SessionError(format!(
                "language with code {} already exists",
                language.code()
            )));
        }
        let position = self.languages.partition_point(|l| l.code() <= language.code());
        self.languages.insert(position, language);
        Ok(())
    }

    pub fn language_by_code(&self, code: u16) -> Result<&Language, DiscImageError> {
        self.languages
            .iter()
            .find(|l| l.code() == code)
            .ok_or_else(|| DiscImageError::SessionError(format!("language with code {} not found", code)))
    }

    pub fn language_by_index(&self, index: i32) -> Result<&Language, DiscImageError> {
        python_index(self.languages.len(), index)
            .map(|i| &self.languages[i])
            .ok_or_else(|| DiscImageError::SessionError(format!("language with index {} not found", index)))
    }

    pub fn remove_language_by_code(&mut self, code: u16) -> Result<(), DiscImageError> {
        let position = self
            .languages
            .iter()
            .position(|l| l.code() == code)
            .ok_or_else(|| DiscImageError::SessionError(format!("language with code {} not found", code)))?;
        self.languages.remove(position);
        Ok(())
    }

    // --- CD-TEXT ---------------------------------------------------------

    /// Decode an encoded CD-TEXT blob and distribute its entries: track-0
    /// entries land in session languages, the rest in the languages of the
    /// matching tracks.
    pub fn set_cdtext_data(&mut self, data: &[u8]) -> Result<(), DiscImageError> {
        let decoder = CdTextDecoder::decode(data)
            .map_err(|e| DiscImageError::SessionError(format!("failed to decode CD-TEXT data: {}", e)))?;

        for block in 0..crate::cdtext::MAX_BLOCKS {
            let (langcode, _charset, _copyright) = match decoder.block_info(block) {
                Ok(info) => info,
                Err(_) => continue,
            };

            for entry in decoder.block_entries(block) {
                if entry.track == 0 {
                    if self.language_by_code(langcode).is_err() {
                        self.add_language(Language::new(langcode))?;
                    }
                    let language = self
                        .languages
                        .iter_mut()
                        .find(|l| l.code() == langcode)
                        .expect("language was just ensured");
                    language.set_pack_data(entry.pack_type, &entry.data);
                }
                else {
                    let track = self.track_by_number_mut(entry.track as i32).map_err(|e| {
                        DiscImageError::SessionError(format!("failed to decode CD-TEXT data: {}", e))
                    })?;
                    if track.language_by_code(langcode).is_err() {
                        track.add_language(Language::new(langcode))?;
                    }
                    track
                        .language_by_code_mut(langcode)?
                        .set_pack_data(entry.pack_type, &entry.data);
                }
            }
        }

        Ok(())
    }

    /// Gather session and track languages into the CD-TEXT encoder and return
    /// the encoded buffer.
    pub fn get_cdtext_data(&self) -> Result<Vec<u8>, DiscImageError> {
        let mut encoder = CdTextEncoder::new();

        for (block, language) in self.languages.iter().enumerate() {
            encoder.set_block_info(block, language.code(), 0, 0)?;

            for (pack_type, data) in language.pack_iter() {
                if pack_type == PackType::SizeInfo {
                    continue;
                }
                encoder.add_data(language.code(), pack_type, 0, data);
            }

            for track in &self.tracks {
                if let Ok(track_language) = track.language_by_code(language.code()) {
                    for (pack_type, data) in track_language.pack_iter() {
                        if pack_type == PackType::SizeInfo {
                            continue;
                        }
                        encoder.add_data(language.code(), pack_type, track.number() as u8, data);
                    }
                }
            }
        }

        Ok(encoder.encode())
    }

    // --- Layout ----------------------------------------------------------

    // Top-down pass: renumber and re-anchor the tracks, refresh the lead-in
    // and lead-out brackets, and invalidate the lazy MCN scan.
    pub(crate) fn commit_layout(&mut self) {
        let mut address = self.start_sector;
        let track_count = self.tracks.len();
        for (i, track) in self.tracks.iter_mut().enumerate() {
            track.number = self.first_track + i as i32;
            track.session_number = self.number;
            track.start_sector = address;
            track.last_in_session = i + 1 == track_count;
            track.commit_layout();
            address += track.length();
        }

        self.lead_in.number = TRACK_LEADIN as i32;
        self.lead_in.session_number = self.number;
        self.lead_in.start_sector = self.start_sector - self.lead_in.length();
        self.lead_in.commit_layout();

        self.lead_out.number = TRACK_LEADOUT as i32;
        self.lead_out.session_number = self.number;
        self.lead_out.start_sector = address;
        self.lead_out.commit_layout();

        self.mcn_scan = OnceCell::new();
    }

    /// Re-anchor the session at `start_sector` and lay its tracks out again.
    pub fn set_start_sector(&mut self, start_sector: i32) {
        self.start_sector = start_sector;
        self.commit_layout();
    }

    /// Renumber the session's tracks starting from `first_track`.
    pub fn set_first_track(&mut self, first_track: i32) {
        self.first_track = first_track;
        self.commit_layout();
    }
}

impl Default for Session {
    fn default() -> Self {
        Session::new(SessionType::CdRom)
    }
}
