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

    src/language.rs

    A CD-TEXT language block: a 12-bit language code and a sparse set of
    pack-type payloads.

*/

use strum::FromRepr;

use crate::DiscImageError;

/// CD-TEXT pack types.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, strum::Display, strum::EnumIter, FromRepr)]
#[repr(u8)]
pub enum PackType {
    /// Album name and track titles
    Title = 0x80,
    /// Singer/player/conductor/orchestra
    Performer = 0x81,
    Songwriter = 0x82,
    Composer = 0x83,
    Arranger = 0x84,
    /// Message from content provider or artist
    Message = 0x85,
    DiscId = 0x86,
    Genre = 0x87,
    /// TOC information
    Toc = 0x88,
    Toc2 = 0x89,
    Reserved8A = 0x8A,
    Reserved8B = 0x8B,
    Reserved8C = 0x8C,
    /// For internal use by content provider
    ClosedInfo = 0x8D,
    /// UPC/EAN code of the album and ISRCs for the tracks
    UpcIsrc = 0x8E,
    /// Size information of the block
    SizeInfo = 0x8F,
}

impl PackType {
    pub fn from_code(code: u8) -> Option<PackType> {
        PackType::from_repr(code)
    }

    pub fn code(&self) -> u8 {
        *self as u8
    }

    pub(crate) fn slot(&self) -> usize {
        (*self as u8 - 0x80) as usize
    }
}

/// A CD-TEXT language block attached to a session or a track.
///
/// A language is an independent container; it is never shared between a
/// session and a track, and language codes are unique within any one owner.
#[derive(Clone, Debug, Default)]
pub struct Language {
    code: u16,
    packs: [Option<Vec<u8>>; 16],
}

impl Language {
    pub fn new(code: u16) -> Language {
        Language {
            code,
            packs: Default::default(),
        }
    }

    /// The 12-bit language code (e.g. 0x09 for English).
    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn set_code(&mut self, code: u16) {
        self.code = code;
    }

    /// Store the payload for `pack_type`, replacing any previous payload.
    pub fn set_pack_data(&mut self, pack_type: PackType, data: &[u8]) {
        self.packs[pack_type.slot()] = Some(data.to_vec());
    }

    /// Retrieve the payload for `pack_type`.
    pub fn pack_data(&self, pack_type: PackType) -> Result<&[u8], DiscImageError> {
        self.packs[pack_type.slot()]
            .as_deref()
            .ok_or_else(|| DiscImageError::LanguageError(format!("pack type {} not set", pack_type)))
    }

    pub fn has_pack_data(&self, pack_type: PackType) -> bool {
        self.packs[pack_type.slot()].is_some()
    }

    pub fn clear_pack_data(&mut self, pack_type: PackType) {
        self.packs[pack_type.slot()] = None;
    }

    /// Iterate over the pack types that have payloads, in pack-type order.
    pub fn pack_iter(&self) -> impl Iterator<Item = (PackType, &[u8])> {
        self.packs.iter().enumerate().filter_map(|(slot, data)| {
            data.as_deref()
                .map(|data| (PackType::from_repr(0x80 + slot as u8).unwrap(), data))
        })
    }
}
