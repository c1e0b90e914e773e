mod common;

use common::init;
use optidisc::stream::filter::{FilterStream, StreamFilter};
use optidisc::stream::{shared, Stream};
use optidisc::{DiscImageError, MemoryStream, SeekWhence};

#[test]
fn seek_and_tell_contract() {
    init();

    let mut stream = MemoryStream::from_vec((0..64u8).collect());

    assert_eq!(stream.seek(0, SeekWhence::Set).unwrap(), 0);
    assert_eq!(stream.tell(), 0);

    assert_eq!(stream.seek(10, SeekWhence::Set).unwrap(), 10);
    assert_eq!(stream.seek(5, SeekWhence::Cur).unwrap(), 15);
    assert_eq!(stream.seek(-4, SeekWhence::End).unwrap(), 60);

    assert!(matches!(
        stream.seek(-1, SeekWhence::Set),
        Err(DiscImageError::StreamError(_))
    ));
}

#[test]
fn read_past_end_is_eof_not_error() {
    init();

    let mut stream = MemoryStream::from_vec(vec![1, 2, 3]);
    stream.seek(0, SeekWhence::End).unwrap();

    let mut buf = [0u8; 8];
    assert_eq!(stream.read(&mut buf).unwrap(), 0);
}

/// An XOR "decryption" filter with a 1:1 size mapping, exercising the
/// simplified filter interface over a whole chain.
struct XorFilter(u8);

impl StreamFilter for XorFilter {
    fn id(&self) -> &'static str {
        "xor"
    }

    fn open(&mut self, underlying: &mut dyn Stream) -> Result<u64, DiscImageError> {
        underlying.length()
    }

    fn partial_read(
        &mut self,
        underlying: &mut dyn Stream,
        position: u64,
        buf: &mut [u8],
    ) -> Result<usize, DiscImageError> {
        underlying.seek(position as i64, SeekWhence::Set)?;
        let read = underlying.read(buf)?;
        for byte in &mut buf[..read] {
            *byte ^= self.0;
        }
        Ok(read)
    }
}

#[test]
fn filter_chain_delegates_to_bottom() {
    init();

    let payload: Vec<u8> = (0..200u8).collect();
    let bottom = shared(MemoryStream::from_vec(payload.iter().map(|b| b ^ 0x5A).collect()));

    // Stack two filters; the outer one undoes the inner one.
    let inner = FilterStream::open(XorFilter(0x5A), bottom).unwrap();
    let mut outer = FilterStream::open(XorFilter(0x00), shared(inner)).unwrap();

    outer.seek(100, SeekWhence::Set).unwrap();
    let mut buf = [0u8; 10];
    outer.read_exact(&mut buf).unwrap();
    assert_eq!(&buf[..], &payload[100..110]);

    // Filename delegates through the chain to the bottom; a memory stream
    // has none.
    assert_eq!(outer.filename(), None);
    // The chain is not writable because the filters are not.
    assert!(!outer.is_writable());
}

#[test]
fn filter_seek_clamps_to_length() {
    init();

    let bottom = shared(MemoryStream::from_vec(vec![0u8; 50]));
    let mut filter = FilterStream::open(XorFilter(0xFF), bottom).unwrap();

    assert_eq!(filter.seek(1000, SeekWhence::Set).unwrap(), 50);
    assert_eq!(filter.tell(), 50);
    let mut buf = [0u8; 4];
    assert_eq!(filter.read(&mut buf).unwrap(), 0);
}

#[cfg(feature = "gzip")]
mod gzip {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use optidisc::fragment::{BinaryFragmentData, Fragment, MainDataFormat};
    use optidisc::stream::gzip::GzipFilter;
    use optidisc::SectorType;
    use std::io::Write;

    #[test]
    fn fragments_can_read_through_a_gzip_filter() {
        init();

        // A 4-sector data file, gzip-compressed.
        let mut raw = Vec::new();
        for sector in 0..4u8 {
            raw.extend(vec![sector + 1; 2048]);
        }
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw).unwrap();
        let compressed = encoder.finish().unwrap();

        let bottom = shared(MemoryStream::from_vec(compressed));
        let decoded = shared(FilterStream::open(GzipFilter::new(), bottom).unwrap());

        let mut track = optidisc::Track::new(SectorType::Mode1);
        track.add_fragment(Fragment::new_binary(
            4,
            BinaryFragmentData::new(decoded, 0, 2048, MainDataFormat::DATA),
        ));

        let sector = track.get_sector(2, false).unwrap();
        assert!(sector.user_data().iter().all(|&b| b == 3));
    }
}
