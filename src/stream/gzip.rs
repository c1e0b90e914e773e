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

    src/stream/gzip.rs

    Gzip decoding filter. Some image sets store their backing data files
    gzip-compressed; this filter presents the decoded bytes with random
    access by inflating the stream once and serving reads from the cache.

*/

use std::io::Read;

use flate2::read::GzDecoder;

use crate::stream::filter::StreamFilter;
use crate::stream::{SharedStream, Stream, StreamReader};
use crate::{DiscImageError, SeekWhence};

// Only support deflate-based gzips
const GZIP_SIGNATURE: &[u8; 3] = b"\x1F\x8B\x08";
const MAX_FILE_SIZE: u64 = 100_000_000;

/// Gzip decompression filter for the stream chain.
pub struct GzipFilter {
    cache: Vec<u8>,
}

impl GzipFilter {
    pub fn new() -> GzipFilter {
        GzipFilter { cache: Vec::new() }
    }
}

impl Default for GzipFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// Return true if the stream starts with a gzip signature.
pub fn detect(stream: &mut dyn Stream) -> bool {
    let mut buf = [0u8; 3];
    if stream.seek(0, SeekWhence::Set).is_err() {
        return false;
    }
    match stream.read(&mut buf) {
        Ok(3) => buf == *GZIP_SIGNATURE,
        _ => false,
    }
}

impl StreamFilter for GzipFilter {
    fn id(&self) -> &'static str {
        "gzip"
    }

    fn open(&mut self, underlying: &mut dyn Stream) -> Result<u64, DiscImageError> {
        if !detect(underlying) {
            return Err(DiscImageError::CannotHandle);
        }

        underlying.seek(0, SeekWhence::Set)?;

        // Gzip offers no random access; inflate the whole stream once and
        // serve reads from the cache.
        struct Sequential<'a>(&'a mut dyn Stream);
        impl Read for Sequential<'_> {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                self.0.read(buf).map_err(std::io::Error::other)
            }
        }

        let mut decoder = GzDecoder::new(Sequential(underlying));
        self.cache.clear();
        decoder
            .read_to_end(&mut self.cache)
            .map_err(|e| DiscImageError::StreamError(format!("gzip inflate failed: {}", e)))?;

        if self.cache.len() as u64 > MAX_FILE_SIZE {
            return Err(DiscImageError::StreamError("decompressed file too large".to_string()));
        }

        log::debug!("GzipFilter::open(): inflated {} bytes", self.cache.len());
        Ok(self.cache.len() as u64)
    }

    fn partial_read(
        &mut self,
        _underlying: &mut dyn Stream,
        position: u64,
        buf: &mut [u8],
    ) -> Result<usize, DiscImageError> {
        let position = position as usize;
        if position >= self.cache.len() {
            return Ok(0);
        }
        let count = buf.len().min(self.cache.len() - position);
        buf[..count].copy_from_slice(&self.cache[position..position + count]);
        Ok(count)
    }
}

/// Returns the original filename recorded in the gzip header, if present.
#[allow(dead_code)]
pub fn embedded_filename(stream: SharedStream) -> Result<Option<String>, DiscImageError> {
    let mut decoder = GzDecoder::new(StreamReader::new(stream));

    // The header is parsed lazily; pull one byte through the decoder first.
    let mut probe = [0u8; 1];
    let _ = decoder
        .read(&mut probe)
        .map_err(|e| DiscImageError::StreamError(format!("gzip header read failed: {}", e)))?;

    if let Some(header) = decoder.header() {
        if let Some(filename_bytes) = header.filename() {
            return String::from_utf8(filename_bytes.to_vec())
                .map(Some)
                .map_err(|_| DiscImageError::StreamError("failed to parse gzip filename".to_string()));
        }
    }
    Ok(None)
}
