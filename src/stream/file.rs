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

    src/stream/file.rs

    FileStream: the seekable OS-file stream at the bottom of every chain.

*/

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::stream::Stream;
use crate::{DiscImageError, SeekWhence};

/// A random-access stream over an OS file.
///
/// `filename()` reports the originally opened path (updated by `move_file`).
pub struct FileStream {
    file: File,
    path: PathBuf,
    writable: bool,
    position: u64,
}

impl FileStream {
    /// Open an existing file read-only.
    pub fn open(path: &Path) -> Result<FileStream, DiscImageError> {
        let file = File::open(path)
            .map_err(|e| DiscImageError::DataFileError(format!("failed to open '{}': {}", path.display(), e)))?;
        Ok(FileStream {
            file,
            path: path.to_path_buf(),
            writable: false,
            position: 0,
        })
    }

    /// Open an existing file for reading and writing.
    pub fn open_rw(path: &Path) -> Result<FileStream, DiscImageError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| DiscImageError::DataFileError(format!("failed to open '{}': {}", path.display(), e)))?;
        Ok(FileStream {
            file,
            path: path.to_path_buf(),
            writable: true,
            position: 0,
        })
    }

    /// Create (or truncate) a file and open it for reading and writing.
    pub fn create(path: &Path) -> Result<FileStream, DiscImageError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| DiscImageError::DataFileError(format!("failed to create '{}': {}", path.display(), e)))?;
        Ok(FileStream {
            file,
            path: path.to_path_buf(),
            writable: true,
            position: 0,
        })
    }
}

impl Stream for FileStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, DiscImageError> {
        let read = self.file.read(buf)?;
        self.position += read as u64;
        Ok(read)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, DiscImageError> {
        if !self.writable {
            return Err(DiscImageError::StreamError(format!(
                "stream on '{}' is not writable",
                self.path.display()
            )));
        }
        let written = self.file.write(buf)?;
        self.position += written as u64;
        Ok(written)
    }

    fn seek(&mut self, offset: i64, whence: SeekWhence) -> Result<u64, DiscImageError> {
        let base = match whence {
            SeekWhence::Set => 0,
            SeekWhence::Cur => self.position as i64,
            SeekWhence::End => {
                let end = self.file.seek(SeekFrom::End(0))?;
                // Leave the OS position where the logical position says it is.
                self.file.seek(SeekFrom::Start(self.position))?;
                end as i64
            }
        };

        let target = base + offset;
        if target < 0 {
            return Err(DiscImageError::StreamError(format!(
                "seek to negative position {} rejected",
                target
            )));
        }

        self.position = self.file.seek(SeekFrom::Start(target as u64))?;
        Ok(self.position)
    }

    fn tell(&self) -> u64 {
        self.position
    }

    fn filename(&self) -> Option<PathBuf> {
        Some(self.path.clone())
    }

    fn is_writable(&self) -> bool {
        self.writable
    }

    fn move_file(&mut self, new_path: &Path) -> Result<(), DiscImageError> {
        std::fs::rename(&self.path, new_path)
            .map_err(|e| DiscImageError::StreamError(format!("failed to move file: {}", e)))?;

        // Re-open the handle at the new location and restore the position, so
        // the move is transparent to readers above us.
        let mut options = OpenOptions::new();
        options.read(true);
        if self.writable {
            options.write(true);
        }
        self.file = options
            .open(new_path)
            .map_err(|e| DiscImageError::StreamError(format!("failed to reopen moved file: {}", e)))?;
        self.file.seek(SeekFrom::Start(self.position))?;
        self.path = new_path.to_path_buf();

        log::debug!("move_file(): stream now backed by '{}'", new_path.display());
        Ok(())
    }
}
