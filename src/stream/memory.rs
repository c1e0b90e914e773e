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

    src/stream/memory.rs

    MemoryStream: an in-memory stream over a byte vector, used for
    synthesized data and for parsers that inflate their input up front.

*/

use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::stream::Stream;
use crate::{DiscImageError, SeekWhence};

/// A growable in-memory stream. Writable by default.
pub struct MemoryStream {
    cursor: Cursor<Vec<u8>>,
    writable: bool,
}

impl MemoryStream {
    pub fn new() -> MemoryStream {
        MemoryStream {
            cursor: Cursor::new(Vec::new()),
            writable: true,
        }
    }

    pub fn from_vec(data: Vec<u8>) -> MemoryStream {
        MemoryStream {
            cursor: Cursor::new(data),
            writable: true,
        }
    }

    /// Wrap existing data as a read-only stream.
    pub fn read_only(data: Vec<u8>) -> MemoryStream {
        MemoryStream {
            cursor: Cursor::new(data),
            writable: false,
        }
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.cursor.into_inner()
    }

    pub fn data(&self) -> &[u8] {
        self.cursor.get_ref()
    }
}

impl Default for MemoryStream {
    fn default() -> Self {
        Self::new()
    }
}

impl Stream for MemoryStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, DiscImageError> {
        Ok(self.cursor.read(buf)?)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, DiscImageError> {
        if !self.writable {
            return Err(DiscImageError::StreamError("memory stream is not writable".to_string()));
        }
        Ok(self.cursor.write(buf)?)
    }

    fn seek(&mut self, offset: i64, whence: SeekWhence) -> Result<u64, DiscImageError> {
        let base = match whence {
            SeekWhence::Set => 0,
            SeekWhence::Cur => self.cursor.position() as i64,
            SeekWhence::End => self.cursor.get_ref().len() as i64,
        };
        let target = base + offset;
        if target < 0 {
            return Err(DiscImageError::StreamError(format!(
                "seek to negative position {} rejected",
                target
            )));
        }
        Ok(self.cursor.seek(SeekFrom::Start(target as u64))?)
    }

    fn tell(&self) -> u64 {
        self.cursor.position()
    }

    fn filename(&self) -> Option<PathBuf> {
        None
    }

    fn is_writable(&self) -> bool {
        self.writable
    }

    fn move_file(&mut self, _new_path: &Path) -> Result<(), DiscImageError> {
        Err(DiscImageError::StreamError(
            "memory stream has no backing file to move".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_back() {
        let mut stream = MemoryStream::new();
        assert_eq!(stream.write(b"hello").unwrap(), 5);
        stream.seek(0, SeekWhence::Set).unwrap();
        let mut buf = [0u8; 5];
        stream.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn negative_seek_rejected() {
        let mut stream = MemoryStream::from_vec(vec![0; 16]);
        assert!(stream.seek(-1, SeekWhence::Set).is_err());
        assert_eq!(stream.seek(-16, SeekWhence::End).unwrap(), 0);
    }

    #[test]
    fn read_only_rejects_writes() {
        let mut stream = MemoryStream::read_only(vec![1, 2, 3]);
        assert!(!stream.is_writable());
        assert!(stream.write(b"x").is_err());
    }
}
