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

    src/parser.rs

    The ImageParser trait and the registry that drives format probing, plus
    helpers shared by parser implementations (medium guessing, Red Book
    pregap, text descriptor reading).

*/

//! The `parser` module defines the contract between the core and external
//! container-format parsers.
//!
//! Parsers are registered with an explicitly-constructed [`ParserRegistry`]
//! (no process-global state) and are tried in registration order: a parser
//! that does not recognize the input returns
//! [`DiscImageError::CannotHandle`], and the registry moves on to the next
//! one.

use std::path::PathBuf;

use crate::disc::Disc;
use crate::io::BufReader;
use crate::fragment::Fragment;
use crate::stream::file::FileStream;
use crate::stream::{detect_encoding, lock, shared, SharedStream, StreamReader, TextEncoding};
use crate::{DiscImageError, MediumType};

/// Static information about a parser implementation.
pub struct ParserInfo {
    pub id: &'static str,
    pub name: &'static str,
    /// Advertised file extensions, for file dialogs; detection itself is
    /// content-based.
    pub extensions: &'static [&'static str],
}

/// A container-format parser: consumes streams over the image's files and
/// produces a [`Disc`].
pub trait ImageParser {
    fn info(&self) -> &ParserInfo;

    /// Cheap content probe: return true if the stream looks like a format
    /// this parser can load.
    fn detect(&self, stream: &SharedStream) -> bool;

    /// Load an image. `streams[0]` is opened on the first filename given to
    /// the loader; parsers open further streams themselves if the format
    /// spans multiple files. Returns [`DiscImageError::CannotHandle`] if the
    /// image is not of this parser's format.
    fn load_image(&mut self, streams: &[SharedStream]) -> Result<Disc, DiscImageError>;
}

/// An ordered collection of parsers, tried in turn against an image file.
#[derive(Default)]
pub struct ParserRegistry {
    parsers: Vec<Box<dyn ImageParser>>,
}

impl ParserRegistry {
    pub fn new() -> ParserRegistry {
        ParserRegistry { parsers: Vec::new() }
    }

    pub fn register(&mut self, parser: Box<dyn ImageParser>) {
        log::debug!("register(): registered parser '{}'", parser.info().id);
        self.parsers.push(parser);
    }

    pub fn num_parsers(&self) -> usize {
        self.parsers.len()
    }

    /// Advertised file extensions across all registered parsers.
    pub fn supported_extensions(&self) -> Vec<&'static str> {
        self.parsers.iter().flat_map(|p| p.info().extensions.iter().copied()).collect()
    }

    /// Open `filenames[0]` and try each registered parser in order. A parser
    /// answering [`DiscImageError::CannotHandle`] passes the turn to the next
    /// one; any other error aborts the load. If every parser declines, the
    /// last error is surfaced.
    pub fn load_image(&mut self, filenames: &[PathBuf]) -> Result<Disc, DiscImageError> {
        let first = filenames
            .first()
            .ok_or_else(|| DiscImageError::ImageFileError("no image filename given".to_string()))?;

        let stream = FileStream::open(first)
            .map_err(|e| DiscImageError::ImageFileError(format!("failed to open image file: {}", e)))?;
        let streams = vec![shared(stream)];

        let mut last_error = DiscImageError::CannotHandle;
        for parser in self.parsers.iter_mut() {
            log::debug!("load_image(): trying parser '{}'", parser.info().id);
            match parser.load_image(&streams) {
                Ok(mut disc) => {
                    if disc.filenames().is_empty() {
                        disc.set_filenames(filenames.to_vec());
                    }
                    return Ok(disc);
                }
                Err(DiscImageError::CannotHandle) => {
                    last_error = DiscImageError::CannotHandle;
                    continue;
                }
                Err(error) => return Err(error),
            }
        }

        log::warn!("load_image(): no parser can handle '{}'", first.display());
        Err(last_error)
    }
}

/// Guess the medium type from the disc layout length.
///
/// Meant for simple parsers whose image files carry no medium information;
/// the guess is not stored on the disc.
pub fn guess_medium_type(disc: &Disc) -> MediumType {
    let length = disc.length();

    if length <= 90 * 60 * 75 {
        log::debug!("guess_medium_type(): disc layout size implies CD-ROM image");
        MediumType::Cd
    }
    else if length <= 2_295_104 {
        log::debug!("guess_medium_type(): disc layout size implies single-layer DVD-ROM image");
        MediumType::Dvd
    }
    else if length <= 4_173_824 {
        log::debug!("guess_medium_type(): disc layout size implies dual-layer DVD-ROM image");
        MediumType::Dvd
    }
    else if length <= 12_219_392 {
        log::debug!("guess_medium_type(): disc layout size implies single-layer BD-ROM image");
        MediumType::Bd
    }
    else if length <= 24_438_784 {
        log::debug!("guess_medium_type(): disc layout size implies dual-layer BD-ROM image");
        MediumType::Bd
    }
    else {
        log::warn!(
            "guess_medium_type(): disc layout size ({}) exceeds all known media types - assuming BD-ROM",
            length
        );
        MediumType::Bd
    }
}

/// Add the Red Book pregaps a simple parser could not recover from its image
/// file: anchor the layout at -150 and prepend a 150-sector zero-fill pregap
/// to the first track of every session. Pregaps stack if a track already has
/// one. Does nothing on non-CD media.
pub fn add_redbook_pregap(disc: &mut Disc) {
    if disc.medium_type() != MediumType::Cd {
        log::debug!("add_redbook_pregap(): Red Book pregap exists only on CD-ROMs");
        return;
    }

    log::debug!("add_redbook_pregap(): adding Red Book pregaps to the disc...");
    disc.set_start_sector(-150);

    let num_sessions = disc.num_sessions();
    for i in 0..num_sessions {
        let track = match disc
            .session_by_index_mut(i as i32)
            .and_then(|s| s.track_by_index_mut(0))
        {
            Ok(track) => track,
            Err(_) => {
                log::debug!("add_redbook_pregap(): failed to get first track of session {}", i);
                return;
            }
        };

        track.insert_fragment(0, Fragment::new_null(150));
        let track_start = track.track_start();
        track.set_track_start(track_start + 150);
        log::debug!("add_redbook_pregap(): added 150 pregap to first track in session {}", i);
    }

    disc.commit_layout();
}

/// Construct a buffered text reader over `stream` for parsing descriptor
/// files line by line.
///
/// The stream's head is inspected for a byte-order mark; when one is present
/// the reader starts past it and the matching encoding is reported.
/// Otherwise `default_encoding` (e.g. from parser parameters) is reported
/// and bytes are consumed as-is.
pub fn create_text_reader(
    stream: SharedStream,
    default_encoding: Option<TextEncoding>,
) -> Result<(BufReader<StreamReader>, Option<TextEncoding>), DiscImageError> {
    let (encoding, position) = {
        let mut guard = lock(&stream)?;
        let encoding = detect_encoding(&mut *guard)?;
        (encoding, guard.tell())
    };

    let reader = BufReader::new(StreamReader::with_position(stream, position));
    Ok((reader, encoding.or(default_encoding)))
}
