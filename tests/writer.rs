mod common;

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use common::*;
use optidisc::fragment::{BinaryFragmentData, Fragment, MainDataFormat};
use optidisc::stream::shared;
use optidisc::writer::{
    convert_image, CancelToken, FragmentRole, ImageWriter, ParameterMap, WriterInfo, WriterParameter,
};
use optidisc::{DiscImageError, MemoryStream, ProgressStatus, SectorType, Track};

/// A minimal writer that materializes every fragment in memory: zero-fill
/// for pregaps, 2048-byte binary fragments for data.
struct MemoryWriter {
    info: WriterInfo,
    sheet: Vec<WriterParameter>,
    fragments_created: u32,
    finalized: bool,
}

impl MemoryWriter {
    fn new() -> MemoryWriter {
        MemoryWriter {
            info: WriterInfo {
                id: "memory",
                name: "In-memory writer",
            },
            sheet: vec![WriterParameter::boolean(
                "dummy_flag",
                "Dummy flag",
                "Exists to exercise parameter validation",
                false,
            )],
            fragments_created: 0,
            finalized: false,
        }
    }
}

impl ImageWriter for MemoryWriter {
    fn info(&self) -> &WriterInfo {
        &self.info
    }

    fn parameter_sheet(&self) -> &[WriterParameter] {
        &self.sheet
    }

    fn open_image(&mut self, _disc: &mut optidisc::Disc, _parameters: &ParameterMap) -> Result<(), DiscImageError> {
        Ok(())
    }

    fn create_fragment(&mut self, _track: &Track, role: FragmentRole) -> Result<Fragment, DiscImageError> {
        self.fragments_created += 1;
        match role {
            FragmentRole::Pregap => Ok(Fragment::new_null(0)),
            _ => Ok(Fragment::new_binary(
                0,
                BinaryFragmentData::new(shared(MemoryStream::new()), 0, 2048, MainDataFormat::DATA),
            )),
        }
    }

    fn finalize_image(&mut self, _disc: &mut optidisc::Disc) -> Result<(), DiscImageError> {
        self.finalized = true;
        Ok(())
    }
}

#[test]
fn convert_mirrors_layout_and_data() {
    init();

    // Source: one session, pregap + 20 data sectors with patterned payloads.
    let mut source_track = Track::new(SectorType::Mode1);
    source_track.add_fragment(Fragment::new_null(150));
    let mut payload = Vec::new();
    for sector in 0..20u8 {
        payload.extend(vec![sector, 20]);
        payload.extend(vec![sector; 2046]);
    }
    source_track.add_fragment(Fragment::new_binary(
        20,
        BinaryFragmentData::new(shared(MemoryStream::from_vec(payload)), 0, 2048, MainDataFormat::DATA),
    ));
    source_track.set_track_start(150);

    let mut source = disc_with_tracks(vec![source_track]);
    source.set_start_sector(-150);

    let mut writer = MemoryWriter::new();
    let converted = convert_image(
        &mut writer,
        Path::new("converted.img"),
        &source,
        &ParameterMap::default(),
        &CancelToken::new(),
        None,
    )
    .unwrap();

    assert!(writer.finalized);
    assert_eq!(writer.fragments_created, 2);

    assert_eq!(converted.start_sector(), source.start_sector());
    assert_eq!(converted.length(), source.length());
    assert_eq!(converted.filename(), Some(Path::new("converted.img")));

    let source_session = source.session_by_index(0).unwrap();
    let converted_session = converted.session_by_index(0).unwrap();
    assert_eq!(converted_session.num_tracks(), source_session.num_tracks());

    let converted_track = converted_session.track_by_index(0).unwrap();
    assert_eq!(converted_track.track_start(), 150);
    assert_eq!(converted_track.length(), 170);

    // Content sectors round-tripped through put_sector/get_sector.
    for address in 150..170 {
        let expected = source.get_sector(address - 150).unwrap();
        let actual = converted.get_sector(address - 150).unwrap();
        assert_eq!(actual.user_data(), expected.user_data());
    }
}

#[test]
fn convert_reports_progress_and_honors_cancellation() {
    init();

    // Source: one track of 10000 sectors.
    let source = {
        let mut disc = disc_with_tracks(vec![memory_track(SectorType::Mode1, 10_000, 2048)]);
        disc.set_start_sector(0);
        disc
    };

    // Cancel as soon as the progress callback reports 42% (sector 4200 with a
    // 1% step).
    let token = CancelToken::new();
    let trigger = token.clone();
    let last_percentage = Arc::new(AtomicU32::new(0));
    let seen = last_percentage.clone();
    let callback: optidisc::ProgressCallback = Box::new(move |status| {
        if let ProgressStatus::Progress(percentage) = status {
            seen.store(percentage, Ordering::SeqCst);
            if percentage == 42 {
                trigger.cancel();
            }
        }
    });

    let mut writer = MemoryWriter::new();
    let result = convert_image(
        &mut writer,
        Path::new("cancelled.img"),
        &source,
        &ParameterMap::default(),
        &token,
        Some((1, callback)),
    );

    assert!(matches!(result, Err(DiscImageError::Cancelled)));
    assert_eq!(last_percentage.load(Ordering::SeqCst), 42);
    // The writer never got to finalize; the target disc was dropped.
    assert!(!writer.finalized);
}

#[test]
fn convert_validates_parameters_before_writing() {
    init();

    let source = disc_with_tracks(vec![memory_track(SectorType::Mode1, 10, 2048)]);

    let mut parameters = ParameterMap::default();
    parameters.insert(
        "dummy_flag".to_string(),
        optidisc::writer::ParameterValue::Integer(3),
    );

    let mut writer = MemoryWriter::new();
    let result = convert_image(
        &mut writer,
        Path::new("invalid.img"),
        &source,
        &parameters,
        &CancelToken::new(),
        None,
    );
    assert!(matches!(result, Err(DiscImageError::LibraryError(_))));
    assert_eq!(writer.fragments_created, 0);
}
