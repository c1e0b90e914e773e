#![allow(dead_code)]

use optidisc::fragment::{BinaryFragmentData, Fragment, MainDataFormat, SubchannelDataFormat};
use optidisc::stream::{shared, SharedStream};
use optidisc::{Disc, MemoryStream, SectorType, Session, Track};

pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A zero-filled shared memory stream of `len` bytes.
pub fn zero_stream(len: usize) -> SharedStream {
    shared(MemoryStream::from_vec(vec![0u8; len]))
}

/// A track of `length` sectors backed by zero fill.
pub fn null_track(sector_type: SectorType, length: i32) -> Track {
    let mut track = Track::new(sector_type);
    track.add_fragment(Fragment::new_null(length));
    track
}

/// A track backed by a single binary fragment over a zero-filled memory
/// stream storing `sector_size` bytes per sector.
pub fn memory_track(sector_type: SectorType, length: i32, sector_size: usize) -> Track {
    let stream = zero_stream(length as usize * sector_size);
    let mut track = Track::new(sector_type);
    track.add_fragment(Fragment::new_binary(
        length,
        BinaryFragmentData::new(stream, 0, sector_size, MainDataFormat::DATA),
    ));
    track
}

/// A track whose single fragment carries an external PW96 subchannel stream.
pub fn subchannel_track(
    sector_type: SectorType,
    length: i32,
    sector_size: usize,
    subchannel: SharedStream,
) -> Track {
    let stream = zero_stream(length as usize * sector_size);
    let mut track = Track::new(sector_type);
    track.add_fragment(Fragment::new_binary(
        length,
        BinaryFragmentData::new(stream, 0, sector_size, MainDataFormat::DATA).with_external_subchannel(
            subchannel,
            0,
            96,
            SubchannelDataFormat::PW96_INTERLEAVED,
        ),
    ));
    track
}

/// A single-session disc over the given tracks.
pub fn disc_with_tracks(tracks: Vec<Track>) -> Disc {
    let mut session = Session::default();
    for track in tracks {
        session.add_track(track);
    }
    let mut disc = Disc::new();
    disc.add_session(session);
    disc
}
