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

    src/track.rs

    Track: an ordered run of fragments plus index points, languages, flags
    and the per-track sector access engine.

*/

//! The `track` module defines [`Track`] and its sector access operations,
//! [`Track::get_sector`] and [`Track::put_sector`].

use std::cell::OnceCell;

use bitflags::bitflags;

use crate::fragment::Fragment;
use crate::index::Index;
use crate::language::Language;
use crate::sector::Sector;
use crate::util::{
    crc16_1021, lba_to_msf, python_index, subchannel_q_decode_isrc, subchannel_store_channel, to_bcd,
};
use crate::{DiscImageError, SectorType, SUBCHANNEL_LEN, TRACK_LEADOUT};

bitflags! {
    /// Track control flags, mirrored in the CTL field of the Q subchannel.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    #[rustfmt::skip]
    pub struct TrackFlags: u32 {
        const FOUR_CHANNEL   = 0b0000_0001; // four-channel audio
        const COPY_PERMITTED = 0b0000_0010; // digital copy permitted
        const PREEMPHASIS    = 0b0000_0100; // audio recorded with pre-emphasis
    }
}

/// A track of the disc layout.
///
/// A track's sectors are covered by a contiguous run of [`Fragment`]s; the
/// region `[0, track_start)` is the pregap (index 00) and
/// `[track_start, length)` is the content (index 01 and up). Layout fields
/// (number, start sector, session membership) are stamped by the owning
/// session's layout pass.
pub struct Track {
    pub(crate) number: i32,
    pub(crate) start_sector: i32,
    pub(crate) session_number: i32,
    pub(crate) last_in_session: bool,

    track_start: i32,
    flags: TrackFlags,
    sector_type: SectorType,
    isrc: Option<String>,
    isrc_scan: OnceCell<Option<String>>,

    fragments: Vec<Fragment>,
    indices: Vec<Index>,
    languages: Vec<Language>,
}

impl Track {
    pub fn new(sector_type: SectorType) -> Track {
        Track {
            number: 0,
            start_sector: 0,
            session_number: 0,
            last_in_session: true,
            track_start: 0,
            flags: TrackFlags::empty(),
            sector_type,
            isrc: None,
            isrc_scan: OnceCell::new(),
            fragments: Vec::new(),
            indices: Vec::new(),
            languages: Vec::new(),
        }
    }

    /// Track number within the disc layout (0 for lead-in, 0xAA for
    /// lead-out).
    pub fn number(&self) -> i32 {
        self.number
    }

    /// Absolute address of the track's first sector.
    pub fn start_sector(&self) -> i32 {
        self.start_sector
    }

    /// Number of the owning session, or 0 for a track outside any layout.
    pub fn session_number(&self) -> i32 {
        self.session_number
    }

    /// Track length in sectors: the sum of the fragment lengths.
    pub fn length(&self) -> i32 {
        self.fragments.iter().map(|f| f.length()).sum()
    }

    /// True if the absolute address lies within this track.
    pub fn layout_contains_address(&self, address: i32) -> bool {
        address >= self.start_sector && address < self.start_sector + self.length()
    }

    pub fn flags(&self) -> TrackFlags {
        self.flags
    }

    pub fn set_flags(&mut self, flags: TrackFlags) {
        self.flags = flags;
    }

    /// The CTL field of the Q subchannel: flags plus the data bit.
    pub fn ctl(&self) -> u8 {
        let mut ctl = 0;
        if self.flags.contains(TrackFlags::FOUR_CHANNEL) {
            ctl |= 0x8;
        }
        if self.flags.contains(TrackFlags::COPY_PERMITTED) {
            ctl |= 0x2;
        }
        if self.flags.contains(TrackFlags::PREEMPHASIS) {
            ctl |= 0x1;
        }
        if self.sector_type != SectorType::Audio {
            ctl |= 0x4;
        }
        ctl
    }

    pub fn set_ctl(&mut self, ctl: u8) {
        let mut flags = TrackFlags::empty();
        if ctl & 0x8 != 0 {
            flags |= TrackFlags::FOUR_CHANNEL;
        }
        if ctl & 0x2 != 0 {
            flags |= TrackFlags::COPY_PERMITTED;
        }
        if ctl & 0x1 != 0 {
            flags |= TrackFlags::PREEMPHASIS;
        }
        self.flags = flags;
    }

    /// The ADR field of the Q subchannel; always 1 (position information).
    pub fn adr(&self) -> u8 {
        0x01
    }

    pub fn sector_type(&self) -> SectorType {
        self.sector_type
    }

    pub fn set_sector_type(&mut self, sector_type: SectorType) {
        self.sector_type = sector_type;
    }

    /// Track-relative address where the pregap ends and index 01 begins.
    pub fn track_start(&self) -> i32 {
        self.track_start
    }

    pub fn set_track_start(&mut self, track_start: i32) {
        self.track_start = track_start;
        // Indices that ended up before the new track start are meaningless.
        self.rearrange_indices();
    }

    // --- ISRC ------------------------------------------------------------

    /// True if the ISRC is dictated by user-supplied subchannel data and
    /// cannot be assigned.
    pub fn isrc_fixed(&self) -> bool {
        self.find_fragment_with_subchannel().is_some()
    }

    /// Set the ISRC. Silently ignored while the ISRC is fixed by subchannel
    /// data; invalid strings are rejected.
    pub fn set_isrc(&mut self, isrc: &str) -> Result<(), DiscImageError> {
        if !crate::util::isrc_is_valid(isrc) {
            return Err(DiscImageError::TrackError(format!("invalid ISRC '{}'", isrc)));
        }
        if self.isrc_fixed() {
            log::debug!("set_isrc(): ISRC is fixed by subchannel data, ignoring assignment");
            return Ok(());
        }
        self.isrc = Some(isrc.to_string());
        Ok(())
    }

    /// The effective ISRC: the assigned value, or, when fixed, the value
    /// scanned from the Q subchannel of the first subchannel-bearing
    /// fragment.
    pub fn isrc(&self) -> Option<String> {
        if self.isrc_fixed() {
            self.isrc_scan.get_or_init(|| self.scan_for_isrc()).clone()
        }
        else {
            self.isrc.clone()
        }
    }

    // According to INF8090, the ISRC, if present, must be encoded in at least
    // one sector per 100 consecutive sectors. Read the first hundred sectors'
    // subchannel from the first subchannel-bearing fragment and extract it.
    fn scan_for_isrc(&self) -> Option<String> {
        let fragment = self.find_fragment_with_subchannel()?;
        let start_address = fragment.address();

        for address in start_address..start_address + 100 {
            let sector = match self.get_sector(address, false) {
                Ok(sector) => sector,
                Err(_) => break,
            };

            let q = sector.subchannel_q();
            if q[0] & 0x0F == 0x03 {
                if let Some(isrc) = subchannel_q_decode_isrc(&q[1..9]) {
                    log::debug!("scan_for_isrc(): found ISRC: <{}>", isrc);
                    return Some(isrc);
                }
            }
        }
        None
    }

    // --- Fragments -------------------------------------------------------

    pub fn num_fragments(&self) -> usize {
        self.fragments.len()
    }

    pub fn fragments(&self) -> impl Iterator<Item = &Fragment> {
        self.fragments.iter()
    }

    /// Append a fragment to the track.
    pub fn add_fragment(&mut self, fragment: Fragment) {
        self.fragments.push(fragment);
        self.commit_layout();
    }

    /// Insert a fragment at `position` (clamped to the list length).
    pub fn insert_fragment(&mut self, position: usize, fragment: Fragment) {
        let position = position.min(self.fragments.len());
        self.fragments.insert(position, fragment);
        self.commit_layout();
    }

    pub fn remove_fragment(&mut self, index: i32) -> Result<Fragment, DiscImageError> {
        let resolved = python_index(self.fragments.len(), index)
            .ok_or_else(|| DiscImageError::TrackError(format!("fragment with index {} not found", index)))?;
        let fragment = self.fragments.remove(resolved);
        self.commit_layout();
        Ok(fragment)
    }

    /// Fragment lookup by index; negative indices count from the end.
    pub fn fragment_by_index(&self, index: i32) -> Result<&Fragment, DiscImageError> {
        python_index(self.fragments.len(), index)
            .map(|i| &self.fragments[i])
            .ok_or_else(|| DiscImageError::TrackError(format!("fragment with index {} not found", index)))
    }

    pub fn fragment_by_index_mut(&mut self, index: i32) -> Result<&mut Fragment, DiscImageError> {
        let resolved = python_index(self.fragments.len(), index)
            .ok_or_else(|| DiscImageError::TrackError(format!("fragment with index {} not found", index)))?;
        Ok(&mut self.fragments[resolved])
    }

    /// Fragment covering the track-relative `address`.
    pub fn fragment_by_address(&self, address: i32) -> Result<&Fragment, DiscImageError> {
        self.fragments
            .iter()
            .find(|f| f.contains_address(address))
            .ok_or_else(|| DiscImageError::TrackError(format!("no fragment contains address {}", address)))
    }

    /// The first fragment carrying user-supplied subchannel data, if any.
    pub fn find_fragment_with_subchannel(&self) -> Option<&Fragment> {
        self.fragments.iter().find(|f| f.has_subchannel())
    }

    // --- Indices ---------------------------------------------------------

    pub fn num_indices(&self) -> usize {
        self.indices.len()
    }

    pub fn indices(&self) -> impl Iterator<Item = &Index> {
        self.indices.iter()
    }

    /// Add an index at track-relative `address`. The index number is
    /// determined by the address's position in the sorted index list.
    pub fn add_index(&mut self, address: i32) -> Result<(), DiscImageError> {
        log::debug!("add_index(): address: 0x{:X}", address);

        // An index cannot land before index 01.
        if address < self.track_start {
            return Err(DiscImageError::TrackError(format!(
                "invalid index start address ({}); before track start",
                address
            )));
        }

        let position = self.indices.partition_point(|i| i.address() <= address);
        self.indices.insert(position, Index::new(address));
        self.rearrange_indices();
        Ok(())
    }

    pub fn index_by_number(&self, number: i32) -> Result<&Index, DiscImageError> {
        self.indices
            .iter()
            .find(|i| i.number() == number)
            .ok_or_else(|| DiscImageError::TrackError(format!("index with number {} not found", number)))
    }

    pub fn remove_index_by_number(&mut self, number: i32) -> Result<(), DiscImageError> {
        let position = self
            .indices
            .iter()
            .position(|i| i.number() == number)
            .ok_or_else(|| DiscImageError::TrackError(format!("index with number {} not found", number)))?;
        self.indices.remove(position);
        self.rearrange_indices();
        Ok(())
    }

    // Index numbers start at 2 (00 and 01 are implied by track_start); any
    // index lying at or before the track start is dropped, which happens when
    // the track start moves after indices were added.
    fn rearrange_indices(&mut self) {
        let track_start = self.track_start;
        self.indices.retain(|index| {
            if index.address() <= track_start {
                log::debug!("rearrange_indices(): removing index before track start");
                false
            }
            else {
                true
            }
        });
        for (position, index) in self.indices.iter_mut().enumerate() {
            index.number = 2 + position as i32;
        }
    }

    // --- Languages -------------------------------------------------------

    pub fn num_languages(&self) -> usize {
        self.languages.len()
    }

    pub fn languages(&self) -> impl Iterator<Item = &Language> {
        self.languages.iter()
    }

    /// Add a language block. Language codes are unique within a track.
    pub fn add_language(&mut self, language: Language) -> Result<(), DiscImageError> {
        if self.languages.iter().any(|l| l.code() == language.code()) {
            return Err(DiscImageError::TrackError(format!(
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
            .ok_or_else(|| DiscImageError::TrackError(format!("language with code {} not found", code)))
    }

    pub fn language_by_code_mut(&mut self, code: u16) -> Result<&mut Language, DiscImageError> {
        self.languages
            .iter_mut()
            .find(|l| l.code() == code)
            .ok_or_else(|| DiscImageError::TrackError(format!("language with code {} not found", code)))
    }

    pub fn language_by_index(&self, index: i32) -> Result<&Language, DiscImageError> {
        python_index(self.languages.len(), index)
            .map(|i| &self.languages[i])
            .ok_or_else(|| DiscImageError::TrackError(format!("language with index {} not found", index)))
    }

    pub fn remove_language_by_code(&mut self, code: u16) -> Result<(), DiscImageError> {
        let position = self
            .languages
            .iter()
            .position(|l| l.code() == code)
            .ok_or_else(|| DiscImageError::TrackError(format!("language with code {} not found", code)))?;
        self.languages.remove(position);
        Ok(())
    }

    // --- Sector access ---------------------------------------------------

    /// Retrieve the sector at `address`; `absolute` selects between
    /// disc-absolute and track-relative addressing.
    pub fn get_sector(&self, address: i32, absolute: bool) -> Result<Sector, DiscImageError> {
        let (absolute_address, relative_address) = if absolute {
            (address, address - self.start_sector)
        }
        else {
            (address + self.start_sector, address)
        };

        log::trace!(
            "get_sector(): address 0x{:X}; absolute: {}",
            absolute_address,
            absolute
        );

        if relative_address < 0 || relative_address >= self.length() {
            return Err(DiscImageError::TrackError(format!(
                "sector address {} out of range",
                address
            )));
        }

        let fragment = self
            .fragment_by_address(relative_address)
            .map_err(|e| DiscImageError::TrackError(format!("failed to get fragment to feed sector: {}", e)))?;
        let fragment_start = fragment.address();

        let main = fragment
            .read_main_data(relative_address - fragment_start)
            .map_err(|e| DiscImageError::TrackError(format!("failed to read main channel data: {}", e)))?;
        let subchannel = fragment
            .read_subchannel_data(relative_address - fragment_start)
            .map_err(|e| DiscImageError::TrackError(format!("failed to read subchannel data: {}", e)))?;

        // The fragment's read path guarantees PW96 interleaved subchannel.
        let mut sector = Sector::feed(absolute_address, self.sector_type, &main, &subchannel)
            .map_err(|e| DiscImageError::TrackError(format!("failed to feed data: {}", e)))?;

        if !sector.has_subchannel() {
            self.generate_subchannel(&mut sector, relative_address);
        }

        Ok(sector)
    }

    /// Write `sector` to the track at the address carried by the sector.
    ///
    /// The address must fall within the track, or be exactly one past its
    /// length; the latter appends, which requires the track to be last in its
    /// session, and extends the last fragment by one sector.
    pub fn put_sector(&mut self, sector: &Sector) -> Result<(), DiscImageError> {
        let relative_address = sector.address() - self.start_sector;

        // Only a greater-than check: an address equal to the track length
        // means the sector is appended.
        if relative_address < 0 || relative_address > self.length() {
            return Err(DiscImageError::TrackError(format!(
                "sector address {} out of range",
                sector.address()
            )));
        }

        let appending = relative_address == self.length();
        if appending && !self.last_in_session {
            return Err(DiscImageError::TrackError(
                "cannot append sector to track that is not last in the layout".to_string(),
            ));
        }

        let fragment = if appending {
            let fragment = self
                .fragment_by_index_mut(-1)
                .map_err(|e| DiscImageError::TrackError(format!("failed to get last fragment to append sector: {}", e)))?;
            fragment.set_length(fragment.length() + 1);
            fragment
        }
        else {
            let position = self
                .fragments
                .iter()
                .position(|f| f.contains_address(relative_address))
                .ok_or_else(|| {
                    DiscImageError::TrackError(format!("no fragment contains address {}", relative_address))
                })?;
            &mut self.fragments[position]
        };

        let fragment_start = fragment.address();
        let main_size = fragment.main_data_size();
        let subchannel_size = fragment.subchannel_data_size();

        let main = sector
            .extract_main(main_size)
            .map_err(|e| DiscImageError::TrackError(format!("failed to extract data from sector: {}", e)))?;
        fragment
            .write_main_data(relative_address - fragment_start, main)
            .map_err(|e| DiscImageError::TrackError(format!("failed to write main channel data: {}", e)))?;

        if subchannel_size > 0 {
            fragment
                .write_subchannel_data(relative_address - fragment_start, sector.subchannel_pw())
                .map_err(|e| DiscImageError::TrackError(format!("failed to write subchannel data: {}", e)))?;
        }

        Ok(())
    }

    // Generate P and Q position data for sectors whose fragment supplies no
    // subchannel. MCN and ISRC are never synthesized.
    fn generate_subchannel(&self, sector: &mut Sector, relative_address: i32) {
        let mut pw = [0u8; SUBCHANNEL_LEN];

        // P is all ones throughout the pregap.
        if relative_address < self.track_start {
            subchannel_store_channel(&mut pw, 0, &[0xFF; 12]);
        }

        let index = if relative_address < self.track_start {
            0
        }
        else {
            1 + self.indices.iter().filter(|i| i.address() <= relative_address).count() as i32
        };

        // In the pregap the relative time counts down to 00:00:00 at index 01.
        let (rm, rs, rf) = lba_to_msf((relative_address - self.track_start).abs());
        let (am, asec, af) = lba_to_msf(sector.address() + 150);

        let mut q = [0u8; 12];
        q[0] = (self.ctl() << 4) | self.adr();
        q[1] = if self.number == TRACK_LEADOUT as i32 {
            TRACK_LEADOUT
        }
        else {
            to_bcd(self.number.clamp(0, 99) as u8)
        };
        q[2] = to_bcd(index.clamp(0, 99) as u8);
        q[3] = to_bcd(rm);
        q[4] = to_bcd(rs);
        q[5] = to_bcd(rf);
        q[6] = 0;
        q[7] = to_bcd(am);
        q[8] = to_bcd(asec);
        q[9] = to_bcd(af);
        let crc = crc16_1021(&q[0..10]);
        q[10] = (crc >> 8) as u8;
        q[11] = (crc & 0xFF) as u8;

        subchannel_store_channel(&mut pw, 1, &q);
        sector.set_subchannel_pw(&pw);
    }

    // --- Layout ----------------------------------------------------------

    // Top-down pass within the track: re-anchor fragment addresses. Also the
    // point where the lazy ISRC scan is invalidated, since the fragment list
    // just changed.
    pub(crate) fn commit_layout(&mut self) {
        let mut address = 0;
        for fragment in self.fragments.iter_mut() {
            fragment.set_address(address);
            address += fragment.length();
        }
        self.isrc_scan = OnceCell::new();
    }
}

impl Default for Track {
    fn default() -> Self {
        Track::new(SectorType::Audio)
    }
}
