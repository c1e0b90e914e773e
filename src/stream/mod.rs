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

    src/stream/mod.rs

    The Stream trait and the stream chain: random-access byte streams over
    files or memory, optionally stacked under decoding filters.

*/

//! The `stream` module provides the layered byte-stream abstraction the rest
//! of the crate reads image data through.
//!
//! The bottom of every chain is a [`file::FileStream`] (or a
//! [`memory::MemoryStream`] for synthesized data); zero or more filter streams
//! (e.g. [`gzip::GzipFilter`] decompression) can be stacked on top. Filename
//! queries and file moves always delegate to the bottom of the chain.

pub mod file;
pub mod filter;
#[cfg(feature = "gzip")]
pub mod gzip;
pub mod memory;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::io::Read;

use crate::{DiscImageError, SeekWhence};

/// A random-access byte stream.
///
/// All operations surface failures as [`DiscImageError::StreamError`] (or a
/// more specific kind set by the implementation). Reads past end-of-stream
/// return 0 bytes without error; seeking before the beginning is a hard error.
/// Truncation is not supported.
pub trait Stream: Send {
    /// Read up to `buf.len()` bytes at the current position. Returns the
    /// number of bytes read; 0 signals end-of-stream.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, DiscImageError>;

    /// Write `buf` at the current position. Returns the number of bytes
    /// written.
    fn write(&mut self, buf: &[u8]) -> Result<usize, DiscImageError>;

    /// Reposition the stream. Returns the new position.
    fn seek(&mut self, offset: i64, whence: SeekWhence) -> Result<u64, DiscImageError>;

    /// Current position, in bytes from the beginning of the stream.
    fn tell(&self) -> u64;

    /// Name of the backing file, delegated to the bottom of a filter chain.
    fn filename(&self) -> Option<PathBuf>;

    /// True if this stream, and every stream below it, accepts writes.
    fn is_writable(&self) -> bool;

    /// Move the backing file to a new location. Only the file stream at the
    /// bottom of a chain can perform the move; filters delegate.
    fn move_file(&mut self, new_path: &Path) -> Result<(), DiscImageError>;

    /// Total stream length in bytes. The default probes with a seek pair and
    /// restores the position.
    fn length(&mut self) -> Result<u64, DiscImageError> {
        let saved = self.tell();
        let length = self.seek(0, SeekWhence::End)?;
        self.seek(saved as i64, SeekWhence::Set)?;
        Ok(length)
    }

    /// Read exactly `buf.len()` bytes or fail with a stream error. Fragments
    /// use this for whole-sector reads, where a short read means a truncated
    /// data file.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), DiscImageError> {
        let mut filled = 0;
        while filled < buf.len() {
            let read = self.read(&mut buf[filled..])?;
            if read == 0 {
                return Err(DiscImageError::StreamError(format!(
                    "unexpected end of stream; wanted {} bytes, got {}",
                    buf.len(),
                    filled
                )));
            }
            filled += read;
        }
        Ok(())
    }
}

/// A stream shared between several owners, e.g. multiple fragments reading
/// the same data file at distinct offsets.
///
/// Access is serialized through the mutex; concurrent readers of one stream
/// are not supported (every read is a seek + read pair).
pub type SharedStream = Arc<Mutex<dyn Stream>>;

/// Wrap a stream for shared ownership.
pub fn shared(stream: impl Stream + 'static) -> SharedStream {
    Arc::new(Mutex::new(stream))
}

pub(crate) fn lock(stream: &SharedStream) -> Result<MutexGuard<'_, dyn Stream + 'static>, DiscImageError> {
    stream
        .lock()
        .map_err(|_| DiscImageError::LibraryError("stream lock poisoned".to_string()))
}

/// Text encodings recognized by byte-order-mark sniffing.
#[derive(Copy, Clone, Debug, PartialEq, Eq, strum::Display)]
pub enum TextEncoding {
    Utf8,
    Utf16Be,
    Utf16Le,
    Utf32Be,
    Utf32Le,
}

// Longest signatures first: the UTF-32 LE BOM starts with the UTF-16 LE BOM.
const BOM_TABLE: [(&[u8], TextEncoding); 5] = [
    (&[0x00, 0x00, 0xFE, 0xFF], TextEncoding::Utf32Be),
    (&[0xFF, 0xFE, 0x00, 0x00], TextEncoding::Utf32Le),
    (&[0xEF, 0xBB, 0xBF], TextEncoding::Utf8),
    (&[0xFE, 0xFF], TextEncoding::Utf16Be),
    (&[0xFF, 0xFE], TextEncoding::Utf16Le),
];

/// Inspect the start of `stream` for a byte-order mark. On a match, the
/// stream is left positioned just past the BOM and the matching encoding is
/// returned; otherwise the stream is rewound to the start.
pub fn detect_encoding(stream: &mut dyn Stream) -> Result<Option<TextEncoding>, DiscImageError> {
    let mut head = [0u8; 4];
    stream.seek(0, SeekWhence::Set)?;
    let got = stream.read(&mut head)?;

    for (signature, encoding) in BOM_TABLE {
        if got >= signature.len() && head[..signature.len()] == *signature {
            stream.seek(signature.len() as i64, SeekWhence::Set)?;
            log::debug!("detect_encoding(): found {} byte-order mark", encoding);
            return Ok(Some(encoding));
        }
    }

    stream.seek(0, SeekWhence::Set)?;
    Ok(None)
}

/// Sequential, read-only adapter that turns a [`SharedStream`] into a
/// [`std::io::Read`], for use with generic line readers.
///
/// The adapter tracks its own position, so other users of the shared stream
/// do not disturb it between reads.
pub struct StreamReader {
    stream: SharedStream,
    position: u64,
}

impl StreamReader {
    pub fn new(stream: SharedStream) -> StreamReader {
        StreamReader { stream, position: 0 }
    }

    pub fn with_position(stream: SharedStream, position: u64) -> StreamReader {
        StreamReader { stream, position }
    }
}

impl Read for StreamReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut guard = self
            .stream
            .lock()
            .map_err(|_| std::io::Error::other("stream lock poisoned"))?;
        guard
            .seek(self.position as i64, SeekWhence::Set)
            .map_err(std::io::Error::other)?;
        let read = guard.read(buf).map_err(std::io::Error::other)?;
        self.position += read as u64;
        Ok(read)
    }
}
