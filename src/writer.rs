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

    src/writer.rs

    The ImageWriter trait, its declared parameter sheet, and the
    sector-by-sector image conversion driver.

*/

//! The `writer` module defines the contract image writers implement and the
//! [`convert_image`] reference driver that copies an existing [`Disc`] into a
//! writer's container sector by sector.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::disc::Disc;
use crate::fragment::Fragment;
use crate::session::Session;
use crate::track::Track;
use crate::{DiscHashMap, DiscImageError, ProgressCallback, ProgressStatus};

/// Static information about a writer implementation.
pub struct WriterInfo {
    pub id: &'static str,
    pub name: &'static str,
}

/// A user-suppliable writer parameter value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParameterValue {
    Boolean(bool),
    Integer(i32),
    Text(String),
}

impl ParameterValue {
    fn kind(&self) -> &'static str {
        match self {
            ParameterValue::Boolean(_) => "boolean",
            ParameterValue::Integer(_) => "integer",
            ParameterValue::Text(_) => "string",
        }
    }
}

/// One entry of a writer's parameter sheet.
///
/// Enum parameters are string parameters with a pre-defined set of valid
/// values.
pub struct WriterParameter {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub default: ParameterValue,
    pub enum_values: Option<Vec<String>>,
}

impl WriterParameter {
    pub fn boolean(id: &'static str, name: &'static str, description: &'static str, default: bool) -> WriterParameter {
        WriterParameter {
            id,
            name,
            description,
            default: ParameterValue::Boolean(default),
            enum_values: None,
        }
    }

    pub fn integer(id: &'static str, name: &'static str, description: &'static str, default: i32) -> WriterParameter {
        WriterParameter {
            id,
            name,
            description,
            default: ParameterValue::Integer(default),
            enum_values: None,
        }
    }

    pub fn string(id: &'static str, name: &'static str, description: &'static str, default: &str) -> WriterParameter {
        WriterParameter {
            id,
            name,
            description,
            default: ParameterValue::Text(default.to_string()),
            enum_values: None,
        }
    }

    pub fn enumeration(
        id: &'static str,
        name: &'static str,
        description: &'static str,
        default: &str,
        values: &[&str],
    ) -> WriterParameter {
        WriterParameter {
            id,
            name,
            description,
            default: ParameterValue::Text(default.to_string()),
            enum_values: Some(values.iter().map(|v| v.to_string()).collect()),
        }
    }
}

/// User-supplied parameter values, keyed by parameter id.
pub type ParameterMap = DiscHashMap<String, ParameterValue>;

/// Validate user parameters against a writer's sheet: type mismatches and
/// out-of-enum values are rejected, unknown parameters are silently ignored.
pub fn validate_parameters(sheet: &[WriterParameter], parameters: &ParameterMap) -> Result<(), DiscImageError> {
    for (id, value) in parameters {
        let declared = match sheet.iter().find(|p| p.id == id.as_str()) {
            Some(declared) => declared,
            None => {
                log::debug!("validate_parameters(): ignoring unknown parameter '{}'", id);
                continue;
            }
        };

        if std::mem::discriminant(value) != std::mem::discriminant(&declared.default) {
            return Err(DiscImageError::LibraryError(format!(
                "parameter '{}' expects a {} value, got a {} value",
                id,
                declared.default.kind(),
                value.kind()
            )));
        }

        if let (Some(enum_values), ParameterValue::Text(text)) = (&declared.enum_values, value) {
            if !enum_values.iter().any(|v| v == text) {
                return Err(DiscImageError::LibraryError(format!(
                    "'{}' is not a valid value for parameter '{}'",
                    text, id
                )));
            }
        }
    }
    Ok(())
}

/// Look up a parameter's effective value: the user-supplied one, or the
/// sheet's default.
pub fn resolve_parameter<'a>(
    sheet: &'a [WriterParameter],
    parameters: &'a ParameterMap,
    id: &str,
) -> Option<&'a ParameterValue> {
    parameters
        .get(id)
        .or_else(|| sheet.iter().find(|p| p.id == id).map(|p| &p.default))
}

/// The role a newly-created fragment plays in the written image, which lets
/// the writer choose per-role backing files and sector sizes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, strum::Display)]
pub enum FragmentRole {
    Pregap,
    Data,
    SubchannelData,
}

/// A cooperative cancellation token, polled once per copied sector by the
/// conversion driver.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// An image writer: emits a disc layout into a concrete container format.
pub trait ImageWriter {
    fn info(&self) -> &WriterInfo;

    /// The writer's declared parameter sheet, in display order.
    fn parameter_sheet(&self) -> &[WriterParameter];

    /// Initialize writer state for a new image. `parameters` has been
    /// validated against the sheet.
    fn open_image(&mut self, disc: &mut Disc, parameters: &ParameterMap) -> Result<(), DiscImageError>;

    /// Create a fragment suitable for the writer's container, for the given
    /// track and role.
    fn create_fragment(&mut self, track: &Track, role: FragmentRole) -> Result<Fragment, DiscImageError>;

    /// Emit the descriptor/side-car files for the finished image.
    fn finalize_image(&mut self, disc: &mut Disc) -> Result<(), DiscImageError>;
}

/// Copy `original` into a new image written by `writer`, sector by sector.
///
/// Progress is reported through `progress` as `(step percentage, callback)`;
/// the callback receives the completed percentage every `step` percent of the
/// total sector count. The `cancel` token is polled once per sector;
/// cancellation aborts with [`DiscImageError::Cancelled`] after all
/// intermediate state has been released.
pub fn convert_image<W: ImageWriter + ?Sized>(
    writer: &mut W,
    filename: &Path,
    original: &Disc,
    parameters: &ParameterMap,
    cancel: &CancelToken,
    progress: Option<(u32, ProgressCallback)>,
) -> Result<Disc, DiscImageError> {
    let num_all_sectors = original.length();
    let layout_start = original.start_sector();
    let (progress_step, progress_callback) = match &progress {
        Some((step, callback)) => (*step, Some(callback)),
        None => (0, None),
    };
    let progress_step_size = num_all_sectors as i64 * progress_step as i64 / 100;
    let mut conversion_progress: i64 = 0;

    log::debug!(
        "convert_image(): filename '{}'; {} sectors to copy",
        filename.display(),
        num_all_sectors
    );

    validate_parameters(writer.parameter_sheet(), parameters)?;

    // Create the target disc and copy the disc-level properties.
    let mut new_disc = Disc::new();
    new_disc.set_filename(filename);
    new_disc.set_medium_type(original.medium_type());
    new_disc.set_first_session(original.first_session());
    new_disc.set_first_track(original.first_track());
    new_disc.set_start_sector(original.start_sector());

    if let Some(dpm) = original.dpm_data() {
        new_disc.set_dpm_data(dpm.start(), dpm.resolution(), dpm.entries());
    }

    log::debug!("convert_image(): initializing writer...");
    writer.open_image(&mut new_disc, parameters)?;

    for (i, original_session) in original.sessions().enumerate() {
        log::debug!("convert_image(): processing session {}...", i);

        let mut new_session = Session::new(original_session.session_type());
        if let Some(mcn) = original_session.mcn() {
            new_session.set_mcn(&mcn)?;
        }
        for language in original_session.languages() {
            new_session.add_language(language.clone())?;
        }
        new_disc.add_session(new_session);

        for (j, original_track) in original_session.tracks().enumerate() {
            log::debug!("convert_image(): processing track {}...", j);

            let mut new_track = Track::new(original_track.sector_type());
            new_track.set_flags(original_track.flags());
            if let Some(isrc) = original_track.isrc() {
                new_track.set_isrc(&isrc)?;
            }

            let track_start = original_track.track_start();
            new_track.set_track_start(track_start);

            for language in original_track.languages() {
                new_track.add_language(language.clone())?;
            }

            // Mirror the fragment layout, with fragments supplied by the
            // writer: fragments lying entirely before the track start carry
            // pregap, everything else data.
            for original_fragment in original_track.fragments() {
                let role = if original_fragment.address() + original_fragment.length() <= track_start {
                    FragmentRole::Pregap
                }
                else {
                    FragmentRole::Data
                };
                log::debug!(
                    "convert_image(): fragment at {} (length {}) gets role {}",
                    original_fragment.address(),
                    original_fragment.length(),
                    role
                );

                let mut new_fragment = writer.create_fragment(&new_track, role)?;
                new_fragment.set_length(original_fragment.length());
                new_track.add_fragment(new_fragment);
            }

            for index in original_track.indices() {
                new_track.add_index(index.address())?;
            }

            new_disc.session_by_index_mut(i as i32)?.add_track(new_track);

            // Copy the sectors, one by one.
            let num_sectors = original_track.length();
            log::debug!("convert_image(): copying sectors ({})", num_sectors);
            for sector_address in 0..num_sectors {
                let sector = original_track.get_sector(sector_address, false)?;

                if progress_step_size > 0 {
                    let sector_count = (sector.address() - layout_start) as i64;
                    if sector_count >= conversion_progress * progress_step_size {
                        if let Some(callback) = progress_callback {
                            callback(ProgressStatus::Progress(
                                (conversion_progress * progress_step as i64) as u32,
                            ));
                        }
                        conversion_progress += 1;
                    }
                }

                new_disc
                    .session_by_index_mut(i as i32)?
                    .track_by_index_mut(j as i32)?
                    .put_sector(&sector)?;

                if cancel.is_cancelled() {
                    log::debug!("convert_image(): conversion cancelled at sector {}", sector_address);
                    return Err(DiscImageError::Cancelled);
                }
            }
        }
    }

    writer.finalize_image(&mut new_disc)?;

    if let Some(callback) = progress_callback {
        callback(ProgressStatus::Complete);
    }

    Ok(new_disc)
}
