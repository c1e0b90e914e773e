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
*/

//! # optidisc
//!
//! optidisc is a Rust library for reading, writing, and manipulating optical disc
//! images of the kind produced by CD, DVD and BD imaging software.
//!
//! It is primarily designed for emulator authors and imaging tools that want to
//! support disc images in a variety of container formats through a single,
//! uniform view of the disc surface: a [`Disc`] is a list of [`Session`]s, a
//! session is a list of [`Track`]s, a track is a list of [`Fragment`]s backed by
//! byte [`stream`]s, and any sector on the layout can be retrieved as a
//! [`Sector`] object that knows how to slice and synthesize its own structure.
//!
//! Container format parsers are external to this crate; they implement the
//! [`ImageParser`] trait and are tried in turn by a [`ParserRegistry`]. Image
//! writers implement the [`ImageWriter`] trait and can be driven by the
//! [`writer::convert_image`] conversion loop.

pub mod cdtext;
pub mod disc;
pub mod ecc;
pub mod fragment;
pub mod index;
mod io;
pub mod language;
pub mod parser;
pub mod sector;
pub mod session;
pub mod stream;
pub mod track;
pub mod util;
pub mod writer;

use std::fmt::{self, Display, Formatter};
use std::hash::RandomState;

use thiserror::Error;

/// Length of a raw main-channel sector, in bytes.
pub const SECTOR_LEN: usize = 2352;
/// Length of a raw PW subchannel block, in bytes.
pub const SUBCHANNEL_LEN: usize = 96;

/// Number of the synthetic lead-in track of a session.
pub const TRACK_LEADIN: u8 = 0x00;
/// Number of the synthetic lead-out track of a session.
pub const TRACK_LEADOUT: u8 = 0xAA;

#[allow(unused)]
pub(crate) type DiscHashMap<K, V, S = RandomState> = std::collections::HashMap<K, V, S>;

/// Status notifications emitted by long-running load/convert operations.
pub enum ProgressStatus {
    /// Completion percentage, 0-100.
    Progress(u32),
    Complete,
    Error,
}

/// Callback invoked by the conversion driver to report progress.
pub type ProgressCallback = Box<dyn Fn(ProgressStatus) + Send + 'static>;

#[derive(Debug, Error)]
pub enum DiscImageError {
    #[error("Library error: {0}")]
    LibraryError(String),
    #[error("Parser error: {0}")]
    ParserError(String),
    #[error("Fragment error: {0}")]
    FragmentError(String),
    #[error("Disc error: {0}")]
    DiscError(String),
    #[error("Language error: {0}")]
    LanguageError(String),
    #[error("Sector error: {0}")]
    SectorError(String),
    #[error("Session error: {0}")]
    SessionError(String),
    #[error("Track error: {0}")]
    TrackError(String),
    #[error("Stream error: {0}")]
    StreamError(String),
    #[error("Image file error: {0}")]
    ImageFileError(String),
    #[error("Data file error: {0}")]
    DataFileError(String),
    #[error("Image format cannot be handled by this parser")]
    CannotHandle,
    #[error("Image is encrypted and requires a password")]
    EncryptedImage,
    #[error("Operation was cancelled")]
    Cancelled,
}

// I/O failures surface through the stream layer until a boundary wraps them
// into a domain-specific kind.
impl From<std::io::Error> for DiscImageError {
    fn from(err: std::io::Error) -> Self {
        DiscImageError::StreamError(err.to_string())
    }
}

impl From<binrw::Error> for DiscImageError {
    fn from(err: binrw::Error) -> Self {
        DiscImageError::StreamError(err.to_string())
    }
}

/// The physical medium a disc image describes.
///
/// Medium type gates several behaviors: the Red Book pregap helper applies only
/// to CD media, while the disc-structure dictionary is only available on DVD
/// and BD media.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, strum::Display)]
pub enum MediumType {
    #[default]
    Cd,
    Dvd,
    HdDvd,
    Bd,
}

/// Session types, per the colored-book standards.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, strum::Display)]
pub enum SessionType {
    CdDa,
    #[default]
    CdRom,
    CdI,
    CdRomXa,
}

/// The effective data layout of a sector.
///
/// `Mode2Mixed` tracks carry both Form 1 and Form 2 sectors; the concrete form
/// of each sector is resolved from its subheader when the sector is read.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, strum::Display)]
pub enum SectorType {
    #[default]
    Audio,
    Mode1,
    Mode2Formless,
    Mode2Form1,
    Mode2Form2,
    Mode2Mixed,
}

impl SectorType {
    /// Size of the user data area for this sector type, in bytes.
    pub fn user_data_len(&self) -> usize {
        match self {
            SectorType::Audio => 2352,
            SectorType::Mode1 => 2048,
            SectorType::Mode2Formless => 2336,
            SectorType::Mode2Form1 => 2048,
            SectorType::Mode2Form2 => 2324,
            SectorType::Mode2Mixed => 2336,
        }
    }

    /// Offset of the user data area within a raw sector. `Mode2Mixed` reports
    /// the whole Mode 2 area; the per-sector form is resolved before any
    /// slicing happens.
    pub fn user_data_offset(&self) -> usize {
        match self {
            SectorType::Audio => 0,
            SectorType::Mode1 | SectorType::Mode2Formless | SectorType::Mode2Mixed => 16,
            SectorType::Mode2Form1 | SectorType::Mode2Form2 => 24,
        }
    }

    /// Whether sectors of this type carry the 12-byte sync pattern and header.
    pub fn has_header(&self) -> bool {
        !matches!(self, SectorType::Audio)
    }
}

/// Whence values for [`stream::Stream::seek`], with the on-the-wire encoding
/// `set=0`, `cur=1`, `end=2`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SeekWhence {
    Set = 0,
    Cur = 1,
    End = 2,
}

impl Display for SeekWhence {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            SeekWhence::Set => write!(f, "SET"),
            SeekWhence::Cur => write!(f, "CUR"),
            SeekWhence::End => write!(f, "END"),
        }
    }
}

pub use crate::cdtext::{CdTextDecoder, CdTextEncoder, CdTextEntry};
pub use crate::disc::Disc;
pub use crate::fragment::{Fragment, FragmentData, MainDataFormat, SubchannelDataFormat};
pub use crate::index::Index;
pub use crate::language::{Language, PackType};
pub use crate::parser::{ImageParser, ParserInfo, ParserRegistry};
pub use crate::sector::Sector;
pub use crate::session::Session;
pub use crate::stream::{file::FileStream, memory::MemoryStream, SharedStream, Stream};
pub use crate::track::{Track, TrackFlags};
pub use crate::writer::{CancelToken, ImageWriter, ParameterValue, WriterParameter};

/// Crate version string, as reported to descriptor files written by image
/// writers.
pub const LIBRARY_VERSION: &str = env!("CARGO_PKG_VERSION");
