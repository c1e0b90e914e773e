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

    src/disc.rs

    Disc: the root of the layout hierarchy. Owns the sessions, the
    disc-structure dictionary (with canonical synthesis for DVD/BD media)
    and the optional DPM measurement table.

*/

//! The `disc` module defines [`Disc`], the object parsers produce and the
//! sector engine operates on.

use std::path::{Path, PathBuf};

use binrw::{binrw, BinWrite};

use crate::io::Cursor;
use crate::sector::Sector;
use crate::session::Session;
use crate::track::Track;
use crate::util::python_index;
use crate::{DiscHashMap, DiscImageError, MediumType};

/// DVD/BD disc structure: physical format information.
pub const STRUCTURE_PHYSICAL_INFO: u8 = 0x00;
/// DVD/BD disc structure: copyright information.
pub const STRUCTURE_COPYRIGHT_INFO: u8 = 0x01;
/// DVD/BD disc structure: manufacturing information.
pub const STRUCTURE_MANUFACTURING_INFO: u8 = 0x04;

// Physical sector number where the DVD data area begins.
const DVD_DATA_START: u32 = 0x30000;

/// The canonical 2048-byte physical format information template: a 120 mm
/// single-layer ROM disc. The three sector-number fields are 24-bit
/// big-endian, each preceded by a zero byte.
#[binrw]
#[brw(big)]
struct PhysicalFormatInfo {
    /// Book type (high nibble) and part version.
    book: u8,
    /// Disc size (high nibble) and maximum rate.
    size_rate: u8,
    /// Number of layers, track path and layer type.
    layers: u8,
    /// Linear (high nibble) and track density.
    density: u8,
    data_start: u32,
    data_end: u32,
    layer0_end: u32,
    bca: u8,
    #[br(count = 2031)]
    media_specific: Vec<u8>,
}

impl PhysicalFormatInfo {
    fn for_disc_length(length: i32) -> PhysicalFormatInfo {
        PhysicalFormatInfo {
            book: 0x05,      // DVD-ROM, part version 5
            size_rate: 0x0F, // 120 mm disc, rate not specified
            layers: 0x01,    // one layer, parallel track path, embossed data
            density: 0x00,   // 0.267 um/bit, 0.74 um/track
            data_start: DVD_DATA_START,
            data_end: DVD_DATA_START.wrapping_add(length as u32) & 0x00FF_FFFF,
            layer0_end: 0,
            bca: 0,
            media_specific: vec![0u8; 2031],
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::with_capacity(2048));
        self.write_be(&mut cursor).expect("in-memory write cannot fail");
        cursor.into_inner()
    }
}

/// Disc Physical Measurement data: sector angles sampled at a fixed
/// resolution, used for copy-protection fingerprinting.
pub struct DpmTable {
    start: i32,
    resolution: i32,
    entries: Vec<u32>,
}

impl DpmTable {
    pub fn new(start: i32, resolution: i32, entries: Vec<u32>) -> DpmTable {
        DpmTable {
            start,
            resolution,
            entries,
        }
    }

    pub fn start(&self) -> i32 {
        self.start
    }

    pub fn resolution(&self) -> i32 {
        self.resolution
    }

    pub fn entries(&self) -> &[u32] {
        &self.entries
    }
}

/// The root of the disc model: an ordered list of sessions plus disc-wide
/// metadata.
pub struct Disc {
    medium_type: MediumType,
    filenames: Vec<PathBuf>,

    first_session: i32,
    first_track: i32,
    start_sector: i32,

    sessions: Vec<Session>,
    structures: DiscHashMap<(u8, u8), Vec<u8>>,
    dpm: Option<DpmTable>,
}

impl Disc {
    pub fn new() -> Disc {
        Disc {
            medium_type: MediumType::Cd,
            filenames: Vec::new(),
            first_session: 1,
            first_track: 1,
            start_sector: 0,
            sessions: Vec::new(),
            structures: DiscHashMap::default(),
            dpm: None,
        }
    }

    pub fn medium_type(&self) -> MediumType {
        self.medium_type
    }

    pub fn set_medium_type(&mut self, medium_type: MediumType) {
        self.medium_type = medium_type;
    }

    // --- Filenames -------------------------------------------------------

    /// Record the image's backing filenames, as reported by the parser.
    pub fn set_filenames(&mut self, filenames: Vec<PathBuf>) {
        self.filenames = filenames;
    }

    /// Convenience for single-file images.
    pub fn set_filename(&mut self, filename: &Path) {
        self.filenames = vec![filename.to_path_buf()];
    }

    pub fn filenames(&self) -> &[PathBuf] {
        &self.filenames
    }

    /// The first backing filename, if any.
    pub fn filename(&self) -> Option<&Path> {
        self.filenames.first().map(|p| p.as_path())
    }

    // --- Layout ----------------------------------------------------------

    /// Number assigned to the first session.
    pub fn first_session(&self) -> i32 {
        self.first_session
    }

    /// Renumber the layout's sessions starting from `first_session`.
    pub fn set_first_session(&mut self, first_session: i32) {
        self.first_session = first_session;
        self.commit_layout();
    }

    /// Number assigned to the first track of the first session.
    pub fn first_track(&self) -> i32 {
        self.first_track
    }

    /// Renumber the layout's tracks starting from `first_track`.
    pub fn set_first_track(&mut self, first_track: i32) {
        self.first_track = first_track;
        self.commit_layout();
    }

    /// Address of the disc's first sector; typically -150 for CD media and 0
    /// otherwise.
    pub fn start_sector(&self) -> i32 {
        self.start_sector
    }

    /// Re-anchor the layout at `start_sector`.
    pub fn set_start_sector(&mut self, start_sector: i32) {
        self.start_sector = start_sector;
        self.commit_layout();
    }

    /// Disc length in sectors: the sum of the session lengths.
    pub fn length(&self) -> i32 {
        self.sessions.iter().map(|s| s.length()).sum()
    }

    /// True if the absolute address lies within the disc layout.
    pub fn layout_contains_address(&self, address: i32) -> bool {
        address >= self.start_sector && address < self.start_sector + self.length()
    }

    // --- MCN -------------------------------------------------------------

    /// The disc's Media Catalogue Number, kept on the first session.
    pub fn mcn(&self) -> Option<String> {
        self.sessions.first().and_then(|s| s.mcn())
    }

    pub fn set_mcn(&mut self, mcn: &str) -> Result<(), DiscImageError> {
        let session = self
            .sessions
            .first_mut()
            .ok_or_else(|| DiscImageError::DiscError("disc has no sessions".to_string()))?;
        session.set_mcn(mcn)
    }

    // --- Sessions --------------------------------------------------------

    pub fn num_sessions(&self) -> usize {
        self.sessions.len()
    }

    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.sessions.iter()
    }

    /// Append a session to the layout.
    pub fn add_session(&mut self, session: Session) {
        self.sessions.push(session);
        self.commit_layout();
    }

    /// Insert a session at `position` (Python-style; clamped).
    pub fn add_session_at(&mut self, position: i32, session: Session) {
        let len = self.sessions.len();
        let resolved = if position < 0 {
            (len as i64 + position as i64).max(0) as usize
        }
        else {
            (position as usize).min(len)
        };
        self.sessions.insert(resolved, session);
        self.commit_layout();
    }

    /// Add a session that is to carry session number `number`. Fails if a
    /// session with that number already exists; the session is inserted at
    /// the position its number implies.
    pub fn add_session_by_number(&mut self, number: i32, session: Session) -> Result<(), DiscImageError> {
        if self.session_by_number(number).is_ok() {
            return Err(DiscImageError::SessionError(format!(
                "session with number {} already exists",
                number
            )));
        }

        let position = self.sessions.iter().position(|s| s.number() > number).unwrap_or(self.sessions.len());
        self.sessions.insert(position, session);
        self.commit_layout();
        Ok(())
    }

    pub fn remove_session_by_index(&mut self, index: i32) -> Result<Session, DiscImageError> {
        let resolved = python_index(self.sessions.len(), index)
            .ok_or_else(|| DiscImageError::SessionError(format!("session with index {} not found", index)))?;
        let session = self.sessions.remove(resolved);
        self.commit_layout();
        Ok(session)
    }

    pub fn remove_session_by_number(&mut self, number: i32) -> Result<Session, DiscImageError> {
        let position = self
            .sessions
            .iter()
            .position(|s| s.number() == number)
            .ok_or_else(|| DiscImageError::SessionError(format!("session with number {} not found", number)))?;
        let session = self.sessions.remove(position);
        self.commit_layout();
        Ok(session)
    }

    /// Session lookup by index; negative indices count from the end.
    pub fn session_by_index(&self, index: i32) -> Result<&Session, DiscImageError> {
        python_index(self.sessions.len(), index)
            .map(|i| &self.sessions[i])
            .ok_or_else(|| DiscImageError::SessionError(format!("session with index {} not found", index)))
    }

    pub fn session_by_index_mut(&mut self, index: i32) -> Result<&mut Session, DiscImageError> {
        let resolved = python_index(self.sessions.len(), index)
            .ok_or_else(|| DiscImageError::SessionError(format!("session with index {} not found", index)))?;
        Ok(&mut self.sessions[resolved])
    }

    pub fn session_by_number(&self, number: i32) -> Result<&Session, DiscImageError> {
        self.sessions
            .iter()
            .find(|s| s.number() == number)
            .ok_or_else(|| DiscImageError::SessionError(format!("session with number {} not found", number)))
    }

    pub fn session_by_number_mut(&mut self, number: i32) -> Result<&mut Session, DiscImageError> {
        self.sessions
            .iter_mut()
            .find(|s| s.number() == number)
            .ok_or_else(|| DiscImageError::SessionError(format!("session with number {} not found", number)))
    }

    /// Session whose layout contains the absolute `address`.
    pub fn session_by_address(&self, address: i32) -> Result<&Session, DiscImageError> {
        self.sessions
            .iter()
            .find(|s| s.layout_contains_address(address))
            .ok_or_else(|| DiscImageError::SessionError(format!("no session contains address {}", address)))
    }

    /// The session preceding the session numbered `number` in the layout.
    pub fn session_before(&self, number: i32) -> Result<&Session, DiscImageError> {
        let position = self
            .sessions
            .iter()
            .position(|s| s.number() == number)
            .ok_or_else(|| DiscImageError::SessionError(format!("session with number {} not found", number)))?;
        if position == 0 {
            return Err(DiscImageError::SessionError(format!(
                "session {} has no predecessor",
                number
            )));
        }
        Ok(&self.sessions[position - 1])
    }

    /// The session following the session numbered `number` in the layout.
    pub fn session_after(&self, number: i32) -> Result<&Session, DiscImageError> {
        let position = self
            .sessions
            .iter()
            .position(|s| s.number() == number)
            .ok_or_else(|| DiscImageError::SessionError(format!("session with number {} not found", number)))?;
        self.sessions.get(position + 1).ok_or_else(|| {
            DiscImageError::SessionError(format!("session {} has no successor", number))
        })
    }

    // --- Tracks ----------------------------------------------------------

    /// Total number of content tracks across all sessions.
    pub fn num_tracks(&self) -> usize {
        self.sessions.iter().map(|s| s.num_tracks()).sum()
    }

    /// Track lookup by disc-wide index; negative indices count from the end.
    pub fn track_by_index(&self, index: i32) -> Result<&Track, DiscImageError> {
        let total = self.num_tracks();
        let resolved = python_index(total, index)
            .ok_or_else(|| DiscImageError::TrackError(format!("track with index {} not found", index)))?;

        let mut remaining = resolved;
        for session in &self.sessions {
            if remaining < session.num_tracks() {
                return session.track_by_index(remaining as i32);
            }
            remaining -= session.num_tracks();
        }
        Err(DiscImageError::TrackError(format!("track with index {} not found", index)))
    }

    pub fn track_by_number(&self, number: i32) -> Result<&Track, DiscImageError> {
        self.sessions
            .iter()
            .find_map(|s| s.tracks().find(|t| t.number() == number))
            .ok_or_else(|| DiscImageError::TrackError(format!("track with number {} not found", number)))
    }

    /// Track containing the absolute `address`, located through its session.
    pub fn track_by_address(&self, address: i32) -> Result<&Track, DiscImageError> {
        self.session_by_address(address)?.track_by_address(address)
    }

    // --- Sector access ---------------------------------------------------

    /// Retrieve the sector at absolute `address`, delegating through session
    /// and track.
    pub fn get_sector(&self, address: i32) -> Result<Sector, DiscImageError> {
        self.track_by_address(address)?.get_sector(address, true)
    }

    /// Write a sector at the absolute address it carries, and re-run the
    /// layout pass in case the write appended to the last track.
    pub fn put_sector(&mut self, sector: &Sector) -> Result<(), DiscImageError> {
        let address = sector.address();
        let session = self
            .sessions
            .iter_mut()
            .find(|s| s.layout_contains_address(address))
            .ok_or_else(|| DiscImageError::SessionError(format!("no session contains address {}", address)))?;
        session.track_by_address_mut(address)?.put_sector(sector)?;
        self.commit_layout();
        Ok(())
    }

    // --- Disc structures -------------------------------------------------

    /// Store an opaque disc structure for `(layer, structure_type)`.
    pub fn set_disc_structure(
        &mut self,
        layer: u8,
        structure_type: u8,
        data: Vec<u8>,
    ) -> Result<(), DiscImageError> {
        if self.medium_type == MediumType::Cd {
            return Err(DiscImageError::DiscError(
                "disc structures are not available on CD media".to_string(),
            ));
        }
        self.structures.insert((layer, structure_type), data);
        Ok(())
    }

    /// Retrieve the disc structure for `(layer, structure_type)`. If the
    /// structure was never stored, canonical defaults are synthesized where
    /// possible; synthesis is read-only and does not populate the dictionary.
    pub fn get_disc_structure(&self, layer: u8, structure_type: u8) -> Result<Vec<u8>, DiscImageError> {
        if self.medium_type == MediumType::Cd {
            return Err(DiscImageError::DiscError(
                "disc structures are not available on CD media".to_string(),
            ));
        }

        if let Some(data) = self.structures.get(&(layer, structure_type)) {
            return Ok(data.clone());
        }

        log::debug!(
            "get_disc_structure(): synthesizing structure (layer: {}, type: 0x{:02X})",
            layer,
            structure_type
        );
        match structure_type {
            STRUCTURE_PHYSICAL_INFO => Ok(PhysicalFormatInfo::for_disc_length(self.length()).to_bytes()),
            STRUCTURE_COPYRIGHT_INFO => Ok(vec![0u8; 4]),
            STRUCTURE_MANUFACTURING_INFO => Ok(vec![0u8; 2048]),
            _ => Err(DiscImageError::DiscError(format!(
                "disc structure 0x{:02X} not available",
                structure_type
            ))),
        }
    }

    // --- DPM -------------------------------------------------------------

    /// Attach a DPM table.
    pub fn set_dpm_data(&mut self, start: i32, resolution: i32, entries: &[u32]) {
        if entries.is_empty() {
            self.dpm = None;
        }
        else {
            self.dpm = Some(DpmTable::new(start, resolution, entries.to_vec()));
        }
    }

    pub fn dpm_data(&self) -> Option<&DpmTable> {
        self.dpm.as_ref()
    }

    /// Sector angle (in rotations) and density (in degrees per sector) at
    /// `address`, linearly interpolated from the DPM table.
    pub fn dpm_data_for_sector(&self, address: i32) -> Result<(f64, f64), DiscImageError> {
        let dpm = self
            .dpm
            .as_ref()
            .ok_or_else(|| DiscImageError::DiscError("no DPM data set".to_string()))?;

        let rel_address = address - dpm.start;
        let num_entries = dpm.entries.len() as i32;

        // Sectors may lie past the last entry, up to one more resolution
        // interval, because the resolution is not a factor of the disc
        // length.
        if rel_address < 0 || rel_address >= (num_entries + 1) * dpm.resolution {
            return Err(DiscImageError::DiscError(format!(
                "address {} out of DPM data range",
                address
            )));
        }

        let idx_bottom = (rel_address / dpm.resolution) as usize;
        let entries = &dpm.entries;

        // The table has no entry for address 0; entry 0 belongs to
        // 1*resolution, so the bottom index is shifted by one.
        let mut density = if idx_bottom == 0 {
            entries[0] as f64
        }
        else if idx_bottom == entries.len() {
            (entries[idx_bottom - 1] - entries[idx_bottom - 2]) as f64
        }
        else {
            (entries[idx_bottom] - entries[idx_bottom - 1]) as f64
        };
        density /= 256.0; // hex degrees to rotations
        density /= dpm.resolution as f64; // rotations per sector

        let mut angle = (rel_address - idx_bottom as i32 * dpm.resolution) as f64 * density;
        if idx_bottom > 0 {
            angle += entries[idx_bottom - 1] as f64 / 256.0;
        }

        Ok((angle, density * 360.0))
    }

    // --- Layout pass -----------------------------------------------------

    // Top-down pass: renumber and re-anchor sessions, each of which lays out
    // its own tracks in turn.
    pub(crate) fn commit_layout(&mut self) {
        let mut address = self.start_sector;
        let mut number = self.first_session;
        let mut first_track = self.first_track;

        for session in self.sessions.iter_mut() {
            session.number = number;
            session.first_track = first_track;
            session.start_sector = address;
            session.commit_layout();

            number += 1;
            first_track += session.num_tracks() as i32;
            address += session.length();
        }
    }
}

impl Default for Disc {
    fn default() -> Self {
        Disc::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::Fragment;
    use crate::{SectorType, SessionType};

    fn session_of_lengths(lengths: &[i32]) -> Session {
        let mut session = Session::new(SessionType::CdRom);
        for &length in lengths {
            let mut track = Track::new(SectorType::Mode1);
            track.add_fragment(Fragment::new_null(length));
            session.add_track(track);
        }
        session
    }

    fn two_session_disc() -> Disc {
        let mut disc = Disc::new();
        disc.set_start_sector(-150);
        disc.add_session(session_of_lengths(&[600, 400]));
        disc.add_session(session_of_lengths(&[500]));
        disc
    }

    #[test]
    fn session_layout_is_contiguous() {
        let disc = two_session_disc();
        assert_eq!(disc.length(), 1500);

        let layout: Vec<(i32, i32, i32)> = disc
            .sessions()
            .map(|s| (s.number(), s.start_sector(), s.first_track()))
            .collect();
        assert_eq!(layout, vec![(1, -150, 1), (2, 850, 3)]);

        // Track numbering continues across sessions.
        assert_eq!(disc.track_by_number(3).unwrap().start_sector(), 850);
        assert!(disc.track_by_number(4).is_err());
    }

    #[test]
    fn python_style_session_indexing() {
        let disc = two_session_disc();
        assert_eq!(disc.session_by_index(-1).unwrap().number(), 2);
        assert_eq!(disc.session_by_index(-2).unwrap().number(), 1);
        assert!(disc.session_by_index(2).is_err());
        assert!(disc.session_by_index(-3).is_err());
    }

    #[test]
    fn session_lookup_by_address() {
        let disc = two_session_disc();
        assert!(disc.layout_contains_address(-150));
        assert!(disc.layout_contains_address(1349));
        assert!(!disc.layout_contains_address(1350));

        assert_eq!(disc.session_by_address(500).unwrap().number(), 1);
        assert_eq!(disc.session_by_address(900).unwrap().number(), 2);
        assert!(disc.session_by_address(2000).is_err());
    }

    #[test]
    fn session_before_and_after() {
        let disc = two_session_disc();
        assert_eq!(disc.session_before(2).unwrap().number(), 1);
        assert_eq!(disc.session_after(1).unwrap().number(), 2);
        assert!(disc.session_before(1).is_err());
        assert!(disc.session_after(2).is_err());
    }

    #[test]
    fn add_session_by_number_rejects_duplicates() {
        let mut disc = two_session_disc();
        assert!(disc.add_session_by_number(2, Session::default()).is_err());
    }

    #[test]
    fn structures_rejected_on_cd() {
        let mut disc = Disc::new();
        assert!(disc.get_disc_structure(0, STRUCTURE_PHYSICAL_INFO).is_err());
        assert!(disc.set_disc_structure(0, STRUCTURE_PHYSICAL_INFO, vec![0; 4]).is_err());
    }

    #[test]
    fn physical_info_synthesis() {
        let mut disc = Disc::new();
        disc.set_medium_type(MediumType::Dvd);
        disc.add_session(session_of_lengths(&[500_000]));

        let structure = disc.get_disc_structure(0, STRUCTURE_PHYSICAL_INFO).unwrap();
        assert_eq!(structure.len(), 2048);
        assert_eq!(structure[0], 0x05);
        assert_eq!(structure[1], 0x0F);
        assert_eq!(structure[2], 0x01);
        // data_start: zero byte + 24-bit 0x030000.
        assert_eq!(&structure[4..8], &[0x00, 0x03, 0x00, 0x00]);
        // data_end: zero byte + 24-bit big-endian data_start + length.
        let expected_end = 0x30000u32 + 500_000;
        assert_eq!(structure[8], 0x00);
        assert_eq!(&structure[9..12], &expected_end.to_be_bytes()[1..4]);

        // Synthesis does not populate the dictionary; stored structures win.
        disc.set_disc_structure(0, STRUCTURE_COPYRIGHT_INFO, vec![1, 2, 3, 4]).unwrap();
        assert_eq!(disc.get_disc_structure(0, STRUCTURE_COPYRIGHT_INFO).unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(disc.get_disc_structure(0, STRUCTURE_MANUFACTURING_INFO).unwrap(), vec![0u8; 2048]);
        assert!(disc.get_disc_structure(0, 0x30).is_err());
    }

    #[test]
    fn dpm_interpolation() {
        let mut disc = Disc::new();
        // Entries at resolution 100: angles in hex degrees (1/256 rotation).
        disc.set_dpm_data(0, 100, &[256, 512, 1024]);

        // First interval: density = 256/256/100 rotations per sector.
        let (angle, density) = disc.dpm_data_for_sector(0).unwrap();
        assert_eq!(angle, 0.0);
        assert!((density - 360.0 * (1.0 / 100.0)).abs() < 1e-9);

        let (angle, _) = disc.dpm_data_for_sector(50).unwrap();
        assert!((angle - 0.5).abs() < 1e-9);

        // Second interval: base angle is entry 0.
        let (angle, _) = disc.dpm_data_for_sector(100).unwrap();
        assert!((angle - 1.0).abs() < 1e-9);

        // Past the last entry, the previous interval's density applies.
        assert!(disc.dpm_data_for_sector(399).is_ok());
        assert!(disc.dpm_data_for_sector(400).is_err());
        assert!(disc.dpm_data_for_sector(-1).is_err());
    }
}
