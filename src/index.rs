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

    src/index.rs

    Per-track index points past the track start.

*/

/// An index point within a track.
///
/// Indices 0 (pregap) and 1 (track start) are implied by the track's
/// `track_start`; explicit [`Index`] objects number from 2 and are renumbered
/// whenever the track's index list changes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Index {
    pub(crate) number: i32,
    pub(crate) address: i32,
}

impl Index {
    pub(crate) fn new(address: i32) -> Index {
        Index { number: 0, address }
    }

    /// Index number (≥ 2 once the owning track has renumbered its list).
    pub fn number(&self) -> i32 {
        self.number
    }

    /// Track-relative address of this index point.
    pub fn address(&self) -> i32 {
        self.address
    }
}
