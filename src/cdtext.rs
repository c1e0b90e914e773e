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

    src/cdtext.rs

    CD-TEXT pack encoder/decoder. CD-TEXT is stored as up to 8 language
    blocks of 18-byte packs; strings flow across pack boundaries and each
    block carries three trailing size-info packs.

*/

//! The `cdtext` module serializes and deserializes the CD-TEXT subchannel
//! metadata format.
//!
//! A pack is 18 bytes: a 4-byte header `{type, track, sequence, block/carry}`,
//! 12 data bytes, and a CRC-16 over the first 16 bytes (polynomial 0x1021,
//! initial value 0, complemented, stored big-endian). Strings are packed
//! back-to-back into the data area of consecutive packs of the same type; the
//! low nibble of the block byte carries how many characters of the running
//! string live in previous packs, clamped at 15.
//!
//! The encoder cannot know a block's size info until all packs are laid out,
//! so it reserves three `0x8F` packs per block up front and rewrites them in
//! place before computing CRCs.

use binrw::{binrw, BinRead, BinWrite};

use crate::io::Cursor;
use crate::language::PackType;
use crate::DiscImageError;

/// Size of an encoded CD-TEXT pack, in bytes.
pub const PACK_LEN: usize = 18;

/// Maximum number of language blocks in a CD-TEXT payload.
pub const MAX_BLOCKS: usize = 8;

// CRC-16 lookup table used for pack checksums.
const CDTEXT_CRC_LUT: [u16; 256] = [
    0x0000, 0x1021, 0x2042, 0x3063, 0x4084, 0x50A5, 0x60C6, 0x70E7, 0x8108,
    0x9129, 0xA14A, 0xB16B, 0xC18C, 0xD1AD, 0xE1CE, 0xF1EF, 0x1231, 0x0210,
    0x3273, 0x2252, 0x52B5, 0x4294, 0x72F7, 0x62D6, 0x9339, 0x8318, 0xB37B,
    0xA35A, 0xD3BD, 0xC39C, 0xF3FF, 0xE3DE, 0x2462, 0x3443, 0x0420, 0x1401,
    0x64E6, 0x74C7, 0x44A4, 0x5485, 0xA56A, 0xB54B, 0x8528, 0x9509, 0xE5EE,
    0xF5CF, 0xC5AC, 0xD58D, 0x3653, 0x2672, 0x1611, 0x0630, 0x76D7, 0x66F6,
    0x5695, 0x46B4, 0xB75B, 0xA77A, 0x9719, 0x8738, 0xF7DF, 0xE7FE, 0xD79D,
    0xC7BC, 0x48C4, 0x58E5, 0x6886, 0x78A7, 0x0840, 0x1861, 0x2802, 0x3823,
    0xC9CC, 0xD9ED, 0xE98E, 0xF9AF, 0x8948, 0x9969, 0xA90A, 0xB92B, 0x5AF5,
    0x4AD4, 0x7AB7, 0x6A96, 0x1A71, 0x0A50, 0x3A33, 0x2A12, 0xDBFD, 0xCBDC,
    0xFBBF, 0xEB9E, 0x9B79, 0x8B58, 0xBB3B, 0xAB1A, 0x6CA6, 0x7C87, 0x4CE4,
    0x5CC5, 0x2C22, 0x3C03, 0x0C60, 0x1C41, 0xEDAE, 0xFD8F, 0xCDEC, 0xDDCD,
    0xAD2A, 0xBD0B, 0x8D68, 0x9D49, 0x7E97, 0x6EB6, 0x5ED5, 0x4EF4, 0x3E13,
    0x2E32, 0x1E51, 0x0E70, 0xFF9F, 0xEFBE, 0xDFDD, 0xCFFC, 0xBF1B, 0xAF3A,
    0x9F59, 0x8F78, 0x9188, 0x81A9, 0xB1CA, 0xA1EB, 0xD10C, 0xC12D, 0xF14E,
    0xE16F, 0x1080, 0x00A1, 0x30C2, 0x20E3, 0x5004, 0x4025, 0x7046, 0x6067,
    0x83B9, 0x9398, 0xA3FB, 0xB3DA, 0xC33D, 0xD31C, 0xE37F, 0xF35E, 0x02B1,
    0x1290, 0x22F3, 0x32D2, 0x4235, 0x5214, 0x6277, 0x7256, 0xB5EA, 0xA5CB,
    0x95A8, 0x8589, 0xF56E, 0xE54F, 0xD52C, 0xC50D, 0x34E2, 0x24C3, 0x14A0,
    0x0481, 0x7466, 0x6447, 0x5424, 0x4405, 0xA7DB, 0xB7FA, 0x8799, 0x97B8,
    0xE75F, 0xF77E, 0xC71D, 0xD73C, 0x26D3, 0x36F2, 0x0691, 0x16B0, 0x6657,
    0x7676, 0x4615, 0x5634, 0xD94C, 0xC96D, 0xF90E, 0xE92F, 0x99C8, 0x89E9,
    0xB98A, 0xA9AB, 0x5844, 0x4865, 0x7806, 0x6827, 0x18C0, 0x08E1, 0x3882,
    0x28A3, 0xCB7D, 0xDB5C, 0xEB3F, 0xFB1E, 0x8BF9, 0x9BD8, 0xABBB, 0xBB9A,
    0x4A75, 0x5A54, 0x6A37, 0x7A16, 0x0AF1, 0x1AD0, 0x2AB3, 0x3A92, 0xFD2E,
    0xED0F, 0xDD6C, 0xCD4D, 0xBDAA, 0xAD8B, 0x9DE8, 0x8DC9, 0x7C26, 0x6C07,
    0x5C64, 0x4C45, 0x3CA2, 0x2C83, 0x1CE0, 0x0CC1, 0xEF1F, 0xFF3E, 0xCF5D,
    0xDF7C, 0xAF9B, 0xBFBA, 0x8FD9, 0x9FF8, 0x6E17, 0x7E36, 0x4E55, 0x5E74,
    0x2E93, 0x3EB2, 0x0ED1, 0x1EF0,
];

/// One 18-byte CD-TEXT pack on the wire.
#[binrw]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CdTextPack {
    pub pack_type: u8,
    pub track_number: u8,
    pub seq_number: u8,
    /// High nibble: block number. Low nibble: carry length (or, for size-info
    /// packs, unused).
    pub block_number: u8,
    pub data: [u8; 12],
    pub crc: [u8; 2],
}

impl CdTextPack {
    fn stamp_crc(&mut self) {
        let mut head = [0u8; 16];
        head[0] = self.pack_type;
        head[1] = self.track_number;
        head[2] = self.seq_number;
        head[3] = self.block_number;
        head[4..16].copy_from_slice(&self.data);

        let mut crc: u16 = 0;
        for byte in head {
            crc = CDTEXT_CRC_LUT[((crc >> 8) ^ byte as u16) as usize] ^ (crc << 8);
        }
        crc = !crc;

        self.crc[0] = (crc >> 8) as u8;
        self.crc[1] = (crc & 0xFF) as u8;
    }
}

/// Per-block size information, spread over three reserved packs.
#[binrw]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct CdTextSizeInfo {
    charset: u8,
    first_track: u8,
    last_track: u8,
    copyright: u8,
    pack_count: [u8; 16],
    last_seqnum: [u8; 8],
    language_codes: [u8; 8],
}

const SIZE_INFO_LEN: usize = 36;
const SIZE_INFO_PACKS: usize = SIZE_INFO_LEN / 12;

impl CdTextSizeInfo {
    fn to_bytes(&self) -> [u8; SIZE_INFO_LEN] {
        let mut cursor = Cursor::new(Vec::with_capacity(SIZE_INFO_LEN));
        self.write_be(&mut cursor).expect("in-memory write cannot fail");
        cursor.into_inner().try_into().expect("size info is 36 bytes")
    }

    fn from_bytes(bytes: &[u8; SIZE_INFO_LEN]) -> CdTextSizeInfo {
        CdTextSizeInfo::read_be(&mut Cursor::new(bytes)).expect("size info is 36 bytes")
    }
}

/// A decoded (or to-be-encoded) CD-TEXT datum: one string of one pack type,
/// for one track, in one language block.
///
/// Payloads are NUL-terminated byte strings; the terminator is part of the
/// payload and is what delimits strings packed back-to-back on the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CdTextEntry {
    pub block: usize,
    pub langcode: u16,
    pub pack_type: PackType,
    pub track: u8,
    pub data: Vec<u8>,
}

#[derive(Clone, Default)]
struct BlockState {
    langcode: u16,
    charset: u8,
    copyright: u8,
    first_track: u8,
    last_track: u8,
    entries: Vec<(PackType, u8, Vec<u8>)>,
    size_info_index: Option<usize>,
    seq_count: usize,
    pack_count: [usize; 16],
}

/// CD-TEXT encoder.
///
/// Usage mirrors the wire layout: declare each block with
/// [`set_block_info`](Self::set_block_info), add `(pack type, track, bytes)`
/// entries with [`add_data`](Self::add_data), then call
/// [`encode`](Self::encode) once.
pub struct CdTextEncoder {
    packs: Vec<CdTextPack>,
    cur_pack: usize,
    cur_fill: usize,
    blocks: [BlockState; 8],
    length: usize,
}

impl CdTextEncoder {
    pub fn new() -> CdTextEncoder {
        CdTextEncoder {
            packs: Vec::new(),
            cur_pack: 0,
            cur_fill: 0,
            blocks: Default::default(),
            length: 0,
        }
    }

    /// Declare block `block` (0-7) with its language code, character set and
    /// copyright flag. Blocks without a language code are skipped by
    /// [`encode`](Self::encode).
    pub fn set_block_info(
        &mut self,
        block: usize,
        langcode: u16,
        charset: u8,
        copyright: u8,
    ) -> Result<(), DiscImageError> {
        if block >= MAX_BLOCKS {
            log::debug!("set_block_info(): invalid block ({})", block);
            return Err(DiscImageError::LanguageError(format!("invalid block number #{}", block)));
        }

        log::debug!(
            "set_block_info(): initialized block {}; langcode: {}; charset: {}; copyright: {}",
            block,
            langcode,
            charset,
            copyright
        );
        self.blocks[block].langcode = langcode;
        self.blocks[block].charset = charset;
        self.blocks[block].copyright = copyright;
        Ok(())
    }

    /// Add one datum to the block with language code `langcode`. `track` 0
    /// denotes disc/session-global data. The data is not encoded yet, merely
    /// stored sorted by (pack type, track).
    pub fn add_data(&mut self, langcode: u16, pack_type: PackType, track: u8, data: &[u8]) {
        let block = self.lang2block(langcode);
        let state = &mut self.blocks[block];

        let key = (pack_type.code(), track);
        let position = state
            .entries
            .partition_point(|(t, trk, _)| (t.code(), *trk) <= key);
        state.entries.insert(position, (pack_type, track, data.to_vec()));

        // First track with a language block; not fully reliable, but the
        // standard requires all subsequent tracks to carry the block too.
        if state.first_track == 0 {
            state.first_track = track;
        }
        state.last_track = track;
    }

    /// Lay out all packs, rewrite the reserved size-info packs, stamp CRCs and
    /// return the encoded buffer.
    pub fn encode(mut self) -> Vec<u8> {
        log::debug!("encode(): encoding CD-TEXT...");

        // Encode all blocks with a language code set.
        for block in 0..MAX_BLOCKS {
            if self.blocks[block].langcode == 0 {
                log::debug!("encode(): block {} not valid", block);
                continue;
            }

            let entries = std::mem::take(&mut self.blocks[block].entries);
            for (pack_type, track, data) in &entries {
                self.pack_data(block, *pack_type, *track, data, true);
            }
            self.blocks[block].entries = entries;

            // Reserve space for the size info.
            let dummy = [0u8; SIZE_INFO_LEN];
            self.pack_data(block, PackType::SizeInfo, 0, &dummy, true);
        }

        // Now that all packs are laid out, the size info can be generated and
        // written into the reserved packs.
        for block in 0..MAX_BLOCKS {
            if let Some(size_info_index) = self.blocks[block].size_info_index {
                let size_info = self.generate_size_info(block).to_bytes();
                self.cur_pack = size_info_index;
                self.cur_fill = 0;
                self.pack_data(block, PackType::SizeInfo, 0, &size_info, false);
            }
        }

        // Generate CRC for all packs.
        let mut buffer = Vec::with_capacity(self.length * PACK_LEN);
        let mut cursor = Cursor::new(&mut buffer);
        for pack in self.packs.iter_mut().take(self.length) {
            pack.stamp_crc();
            pack.write_be(&mut cursor).expect("in-memory write cannot fail");
        }

        log::debug!("encode(): done encoding CD-TEXT; length: 0x{:X}", buffer.len());
        buffer
    }

    fn lang2block(&self, langcode: u16) -> usize {
        self.blocks
            .iter()
            .position(|block| block.langcode == langcode)
            .unwrap_or(0)
    }

    fn ensure_pack(&mut self, index: usize) {
        while self.packs.len() <= index {
            self.packs.push(CdTextPack::default());
        }
    }

    fn initialize_pack(&mut self, block: usize, pack_type: PackType, track: u8, carry_len: usize) {
        self.ensure_pack(self.cur_pack);
        if self.packs[self.cur_pack].pack_type != 0 {
            return;
        }

        let seq_number = self.blocks[block].seq_count as u8;
        let pack = &mut self.packs[self.cur_pack];
        pack.pack_type = pack_type.code();
        pack.seq_number = seq_number;
        pack.block_number |= (block as u8) << 4;
        if pack_type != PackType::SizeInfo {
            pack.track_number = track;
            pack.block_number |= carry_len.min(15) as u8;
        }
        else {
            // Special handling for 0x8F packs: the track field carries the
            // running size-info pack count, and the first one is remembered so
            // it can be rewritten later.
            pack.track_number = self.blocks[block].pack_count[PackType::SizeInfo.slot()] as u8;
            if self.blocks[block].size_info_index.is_none() {
                self.blocks[block].size_info_index = Some(self.cur_pack);
            }
        }

        self.blocks[block].seq_count += 1;
        self.blocks[block].pack_count[pack_type.slot()] += 1;
        self.length += 1;
    }

    fn pack_data(&mut self, block: usize, pack_type: PackType, track: u8, data: &[u8], accounting: bool) {
        // If the current pack is initialized with a different type, open a new
        // pack; a language change always implies a type change too (0x8F to
        // 0x8X), so this covers both.
        self.ensure_pack(self.cur_pack);
        if self.packs[self.cur_pack].pack_type != 0 && self.packs[self.cur_pack].pack_type != pack_type.code() {
            self.cur_pack += 1;
            self.cur_fill = 0;
        }

        let mut remaining = data;
        let mut carry_len = 0;
        while !remaining.is_empty() {
            if self.cur_fill == 12 {
                self.cur_pack += 1;
                self.cur_fill = 0;
            }

            if accounting {
                self.initialize_pack(block, pack_type, track, carry_len);
            }
            else {
                self.ensure_pack(self.cur_pack);
            }

            let copy_len = (12 - self.cur_fill).min(remaining.len());
            self.packs[self.cur_pack].data[self.cur_fill..self.cur_fill + copy_len]
                .copy_from_slice(&remaining[..copy_len]);

            self.cur_fill += copy_len;
            remaining = &remaining[copy_len..];
            carry_len += copy_len;
        }
    }

    fn generate_size_info(&self, block: usize) -> CdTextSizeInfo {
        let mut size_info = CdTextSizeInfo {
            charset: self.blocks[block].charset,
            first_track: self.blocks[block].first_track,
            last_track: self.blocks[block].last_track,
            copyright: self.blocks[block].copyright,
            ..Default::default()
        };

        for (i, count) in self.blocks[block].pack_count.iter().enumerate() {
            size_info.pack_count[i] = *count as u8;
        }

        // Last sequence numbers and language codes cover every block in use.
        for i in 0..MAX_BLOCKS {
            if self.blocks[i].seq_count > 0 {
                size_info.last_seqnum[i] = (self.blocks[i].seq_count - 1) as u8;
                size_info.language_codes[i] = self.blocks[i].langcode as u8;
            }
        }

        size_info
    }
}

impl Default for CdTextEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Default)]
struct DecodedBlock {
    langcode: u16,
    charset: u8,
    copyright: u8,
    first_track: u8,
    last_track: u8,
    seq_count: usize,
    pack_count: [u8; 16],
    size_info_index: Option<usize>,
}

/// CD-TEXT decoder.
pub struct CdTextDecoder {
    blocks: [DecodedBlock; 8],
    entries: Vec<CdTextEntry>,
}

impl CdTextDecoder {
    /// Decode `buffer` into per-block info and a sorted entry list. The buffer
    /// length must be a multiple of the 18-byte pack size.
    pub fn decode(buffer: &[u8]) -> Result<CdTextDecoder, DiscImageError> {
        if buffer.is_empty() || buffer.len() % PACK_LEN != 0 {
            return Err(DiscImageError::LanguageError(format!(
                "CD-TEXT buffer length {} is not a multiple of pack size",
                buffer.len()
            )));
        }

        let mut cursor = Cursor::new(buffer);
        let mut packs = Vec::with_capacity(buffer.len() / PACK_LEN);
        for _ in 0..buffer.len() / PACK_LEN {
            packs.push(CdTextPack::read_be(&mut cursor)?);
        }

        let mut decoder = CdTextDecoder {
            blocks: Default::default(),
            entries: Vec::new(),
        };

        decoder.read_size_infos(&packs);
        for block in 0..MAX_BLOCKS {
            decoder.decode_block(&packs, block)?;
        }

        Ok(decoder)
    }

    /// Block information for `block`: (language code, character set,
    /// copyright flag). Fails for blocks without a language code.
    pub fn block_info(&self, block: usize) -> Result<(u16, u8, u8), DiscImageError> {
        if block >= MAX_BLOCKS {
            return Err(DiscImageError::LanguageError(format!(
                "block number {} exceeds number of blocks {}",
                block, MAX_BLOCKS
            )));
        }
        let state = &self.blocks[block];
        if state.langcode == 0 {
            return Err(DiscImageError::LanguageError(format!(
                "requested block {} has no language code set",
                block
            )));
        }
        Ok((state.langcode, state.charset, state.copyright))
    }

    /// All decoded entries, sorted by (block, pack type, track).
    pub fn entries(&self) -> &[CdTextEntry] {
        &self.entries
    }

    /// Decoded entries belonging to `block`.
    pub fn block_entries(&self, block: usize) -> impl Iterator<Item = &CdTextEntry> {
        self.entries.iter().filter(move |entry| entry.block == block)
    }

    fn read_size_infos(&mut self, packs: &[CdTextPack]) {
        let mut i = 0;
        while i < packs.len() {
            if packs[i].pack_type != PackType::SizeInfo.code() {
                i += 1;
                continue;
            }

            let block = ((packs[i].block_number & 0xF0) >> 4) as usize;

            // Gather the 36 size-info bytes from three consecutive packs.
            let mut bytes = [0u8; SIZE_INFO_LEN];
            for (j, chunk) in bytes.chunks_mut(12).enumerate() {
                if let Some(pack) = packs.get(i + j) {
                    chunk.copy_from_slice(&pack.data);
                }
            }
            let size_info = CdTextSizeInfo::from_bytes(&bytes);

            let state = &mut self.blocks[block];
            state.size_info_index = Some(i);
            state.langcode = size_info.language_codes[block] as u16;
            state.charset = size_info.charset;
            state.copyright = size_info.copyright;
            state.first_track = size_info.first_track;
            state.last_track = size_info.last_track;
            state.seq_count = size_info.last_seqnum[block] as usize + 1;
            state.pack_count = size_info.pack_count;

            i += SIZE_INFO_PACKS;
        }
    }

    fn decode_block(&mut self, packs: &[CdTextPack], block: usize) -> Result<(), DiscImageError> {
        // Skip empty blocks.
        if self.blocks[block].seq_count == 0 {
            return Ok(());
        }
        let size_info_index = match self.blocks[block].size_info_index {
            Some(index) => index,
            None => return Ok(()),
        };

        let langcode = self.blocks[block].langcode;
        let data_packs = self.blocks[block]
            .seq_count
            .checked_sub(SIZE_INFO_PACKS)
            .ok_or_else(|| DiscImageError::LanguageError(format!("block {} sequence count too small", block)))?;
        let start = size_info_index.checked_sub(data_packs).ok_or_else(|| {
            DiscImageError::LanguageError(format!("block {} pack count inconsistent with size info", block))
        })?;

        // Accumulate strings into a 0xFF-prefilled buffer and emit an entry
        // whenever a terminating zero lands behind actual content.
        let mut tmp = [0xFFu8; 255];
        let mut tmp_len = 0usize;
        let mut cur_track: u8 = 0;
        let mut cur_pack = start;
        let mut cur_fill = 0usize;

        while cur_pack < size_info_index {
            if cur_pack > start && packs[cur_pack].pack_type != packs[cur_pack - 1].pack_type {
                tmp = [0xFFu8; 255];
                tmp_len = 0;
            }

            let slot = &packs[cur_pack].data[cur_fill..];
            let copy_len = match slot.iter().position(|&b| b == 0) {
                Some(nul) => nul + 1,
                None => slot.len(),
            };
            if tmp_len + copy_len > tmp.len() {
                return Err(DiscImageError::LanguageError(format!(
                    "unterminated CD-TEXT string in block {}",
                    block
                )));
            }
            tmp[tmp_len..tmp_len + copy_len].copy_from_slice(&slot[..copy_len]);
            tmp_len += copy_len;
            cur_fill += copy_len;

            if tmp[tmp_len - 1] == 0 && tmp[0] != 0 {
                let pack_type = PackType::from_code(packs[cur_pack].pack_type).ok_or_else(|| {
                    DiscImageError::LanguageError(format!(
                        "invalid pack type 0x{:02X}",
                        packs[cur_pack].pack_type
                    ))
                })?;

                self.insert_entry(CdTextEntry {
                    block,
                    langcode,
                    pack_type,
                    track: cur_track,
                    data: tmp[..tmp_len].to_vec(),
                });

                tmp = [0xFFu8; 255];
                tmp_len = 0;

                // Account for strings too short to reach the next pack, whose
                // track numbers are stored nowhere.
                cur_track = cur_track.wrapping_add(1);
            }

            if cur_fill == 12 {
                cur_fill = 0;
                cur_pack += 1;
                if cur_pack < packs.len() && cur_pack < size_info_index {
                    cur_track = packs[cur_pack].track_number;
                }
            }
        }

        Ok(())
    }

    fn insert_entry(&mut self, entry: CdTextEntry) {
        let key = (entry.block, entry.pack_type.code(), entry.track);
        let position = self
            .entries
            .partition_point(|e| (e.block, e.pack_type.code(), e.track) <= key);
        self.entries.insert(position, entry);
    }
}
