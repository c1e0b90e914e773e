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

    src/stream/filter.rs

    The FilterStream framework: stacks a decoding filter on top of an
    underlying stream and manages position tracking for "simplified"
    filter implementations.

*/

//! Filter streams come in two realization styles. A *full* filter implements
//! [`Stream`] directly on its own type, managing position itself, and uses the
//! `delegate_*` helpers for the chain plumbing. A *simplified* filter
//! implements [`StreamFilter`]: it declares the total decoded length once and
//! provides a `partial_read` at a framework-tracked position, while
//! [`FilterStream`] supplies the looping `read`, clamped `seek` and `tell`.

use std::path::{Path, PathBuf};

use crate::stream::{lock, SharedStream, Stream};
use crate::{DiscImageError, SeekWhence};

/// A decoding filter using the simplified realization style.
pub trait StreamFilter: Send {
    /// Short identifier used in log output.
    fn id(&self) -> &'static str;

    /// Probe and prepare the underlying stream. Returns the total decoded
    /// stream length. Filters that do not recognize the underlying data
    /// return [`DiscImageError::CannotHandle`].
    fn open(&mut self, underlying: &mut dyn Stream) -> Result<u64, DiscImageError>;

    /// Read up to `buf.len()` decoded bytes at `position`. The framework
    /// guarantees `position < stream_length` and loops until the request is
    /// satisfied or end-of-stream is reached.
    fn partial_read(
        &mut self,
        underlying: &mut dyn Stream,
        position: u64,
        buf: &mut [u8],
    ) -> Result<usize, DiscImageError>;

    /// Whether this filter supports writing through to the underlying stream.
    fn writable(&self) -> bool {
        false
    }

    /// Write up to `buf.len()` bytes at `position`.
    fn partial_write(
        &mut self,
        _underlying: &mut dyn Stream,
        _position: u64,
        _buf: &[u8],
    ) -> Result<usize, DiscImageError> {
        Err(DiscImageError::StreamError(format!(
            "{} filter does not implement writing",
            self.id()
        )))
    }
}

/// A stream that decodes an underlying stream through a [`StreamFilter`].
pub struct FilterStream<F: StreamFilter> {
    filter: F,
    underlying: SharedStream,
    position: u64,
    stream_length: u64,
}

impl<F: StreamFilter> FilterStream<F> {
    /// Stack `filter` on top of `underlying`. Fails with
    /// [`DiscImageError::CannotHandle`] if the filter does not recognize the
    /// underlying data.
    pub fn open(mut filter: F, underlying: SharedStream) -> Result<FilterStream<F>, DiscImageError> {
        let stream_length = filter.open(&mut *lock(&underlying)?)?;
        log::debug!(
            "FilterStream::open(): '{}' filter opened; decoded length {} bytes",
            filter.id(),
            stream_length
        );
        Ok(FilterStream {
            filter,
            underlying,
            position: 0,
            stream_length,
        })
    }

    pub fn underlying(&self) -> &SharedStream {
        &self.underlying
    }

    pub fn stream_length(&self) -> u64 {
        self.stream_length
    }
}

impl<F: StreamFilter> Stream for FilterStream<F> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, DiscImageError> {
        let mut total_read = 0;

        // Read until the request is satisfied or the decoded stream ends.
        while total_read < buf.len() {
            if self.position >= self.stream_length {
                log::trace!("FilterStream::read(): end of stream reached");
                break;
            }

            let read = self.filter.partial_read(
                &mut *lock(&self.underlying)?,
                self.position,
                &mut buf[total_read..],
            )?;
            if read == 0 {
                break;
            }

            total_read += read;
            self.position += read as u64;
        }

        Ok(total_read)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, DiscImageError> {
        if !self.is_writable() {
            return Err(DiscImageError::StreamError("filter stream is not writable".to_string()));
        }

        let mut total_written = 0;
        while total_written < buf.len() {
            let written = self.filter.partial_write(
                &mut *lock(&self.underlying)?,
                self.position,
                &buf[total_written..],
            )?;
            if written == 0 {
                break;
            }
            total_written += written;
            self.position += written as u64;
            if self.position > self.stream_length {
                self.stream_length = self.position;
            }
        }

        Ok(total_written)
    }

    fn seek(&mut self, offset: i64, whence: SeekWhence) -> Result<u64, DiscImageError> {
        let base = match whence {
            SeekWhence::Set => 0,
            SeekWhence::Cur => self.position as i64,
            SeekWhence::End => self.stream_length as i64,
        };
        let target = base + offset;
        if target < 0 {
            return Err(DiscImageError::StreamError(format!(
                "seek to negative position {} rejected",
                target
            )));
        }

        // Positions past the end clamp to the end of the decoded stream.
        self.position = (target as u64).min(self.stream_length);
        Ok(self.position)
    }

    fn tell(&self) -> u64 {
        self.position
    }

    fn filename(&self) -> Option<PathBuf> {
        delegate_filename(&self.underlying)
    }

    fn is_writable(&self) -> bool {
        self.filter.writable() && delegate_is_writable(&self.underlying)
    }

    fn move_file(&mut self, new_path: &Path) -> Result<(), DiscImageError> {
        delegate_move_file(&self.underlying, new_path)
    }

    fn length(&mut self) -> Result<u64, DiscImageError> {
        Ok(self.stream_length)
    }
}

/// Filename query for a filter chain: the bottom file stream answers.
pub fn delegate_filename(underlying: &SharedStream) -> Option<PathBuf> {
    lock(underlying).ok().and_then(|guard| guard.filename())
}

/// Writability of the chain below a filter.
pub fn delegate_is_writable(underlying: &SharedStream) -> bool {
    lock(underlying).map(|guard| guard.is_writable()).unwrap_or(false)
}

/// File move for a filter chain: only the bottom file stream can move.
pub fn delegate_move_file(underlying: &SharedStream, new_path: &Path) -> Result<(), DiscImageError> {
    lock(underlying)?.move_file(new_path)
}
