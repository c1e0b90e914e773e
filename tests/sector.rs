mod common;

use common::*;
use optidisc::fragment::{BinaryFragmentData, Fragment, MainDataFormat, SubchannelDataFormat};
use optidisc::sector::{Sector, SubchannelKind, SYNC_PATTERN};
use optidisc::stream::shared;
use optidisc::util::crc16_1021;
use optidisc::{MemoryStream, SectorType, SECTOR_LEN, SUBCHANNEL_LEN};

#[test]
fn mode1_sector_structure_from_cooked_image() {
    init();

    // 2048-byte sectors with a recognizable payload.
    let mut data = vec![0u8; 5 * 2048];
    for (i, byte) in data.iter_mut().enumerate() {
        *byte = (i / 2048) as u8 + 1;
    }
    let mut track = optidisc::Track::new(SectorType::Mode1);
    track.add_fragment(Fragment::new_binary(
        5,
        BinaryFragmentData::new(shared(MemoryStream::from_vec(data)), 0, 2048, MainDataFormat::DATA),
    ));

    let sector = track.get_sector(2, false).unwrap();
    assert_eq!(sector.sync().unwrap(), &SYNC_PATTERN[..]);
    // Address 2 is MSF 00:02:02 in BCD, mode 1.
    assert_eq!(sector.header().unwrap(), &[0x00, 0x02, 0x02, 0x01]);
    assert!(sector.user_data().iter().all(|&b| b == 3));

    // Synthesized EDC matches a fresh computation.
    let edc = optidisc::ecc::edc_compute(0, &sector.main_data()[0..2064]);
    assert_eq!(&sector.main_data()[2064..2068], &edc.to_le_bytes());
    assert_eq!(sector.edc_ecc().unwrap().len(), SECTOR_LEN - 2064);
}

#[test]
fn put_then_get_roundtrips() {
    init();

    let mut track = memory_track(SectorType::Mode1, 10, 2048);

    // Craft a sector with a distinctive payload at address 4.
    let payload = vec![0xC3u8; 2048];
    let sector = Sector::feed(4, SectorType::Mode1, &payload, &[]).unwrap();
    track.put_sector(&sector).unwrap();

    let read_back = track.get_sector(4, false).unwrap();
    assert_eq!(read_back.address(), 4);
    assert_eq!(read_back.user_data(), &payload[..]);
    assert_eq!(read_back.main_data(), sector.main_data());
}

#[test]
fn append_extends_track_by_exactly_n() {
    init();

    let mut track = memory_track(SectorType::Mode1, 0, 2048);
    assert_eq!(track.length(), 0);

    let n = 25;
    for address in 0..n {
        let sector = Sector::feed(address, SectorType::Mode1, &vec![address as u8; 2048], &[]).unwrap();
        track.put_sector(&sector).unwrap();
    }
    assert_eq!(track.length(), n);

    // The appended data reads back.
    let sector = track.get_sector(n - 1, false).unwrap();
    assert!(sector.user_data().iter().all(|&b| b == (n - 1) as u8));

    // Appending past the end by more than one sector is rejected.
    let gap = Sector::feed(n + 1, SectorType::Mode1, &vec![0u8; 2048], &[]).unwrap();
    assert!(track.put_sector(&gap).is_err());
}

#[test]
fn generated_subchannel_carries_valid_q_crc() {
    init();

    let mut track = null_track(SectorType::Mode1, 100);
    track.set_track_start(10);

    for address in [0, 9, 10, 50, 99] {
        let sector = track.get_sector(address, false).unwrap();
        let q = sector.subchannel_q();
        let crc = crc16_1021(&q[0..10]);
        assert_eq!(u16::from_be_bytes([q[10], q[11]]), crc);
    }

    // Pregap sectors raise the P channel, content sectors lower it.
    let pregap = track.get_sector(3, false).unwrap();
    assert_eq!(pregap.subchannel(SubchannelKind::P), [0xFF; 12]);
    let content = track.get_sector(20, false).unwrap();
    assert_eq!(content.subchannel(SubchannelKind::P), [0x00; 12]);
}

#[test]
fn stored_subchannel_survives_write_and_read() {
    init();

    let main_stream = zero_stream(4 * 2352);
    let sub_stream = zero_stream(4 * 96);

    let mut track = optidisc::Track::new(SectorType::Audio);
    track.add_fragment(Fragment::new_binary(
        4,
        BinaryFragmentData::new(main_stream, 0, 2352, MainDataFormat::AUDIO).with_external_subchannel(
            sub_stream,
            0,
            96,
            SubchannelDataFormat::PW96_INTERLEAVED,
        ),
    ));

    // Round-trip a sector with handcrafted subchannel data.
    let mut pw = [0u8; SUBCHANNEL_LEN];
    for (i, byte) in pw.iter_mut().enumerate() {
        *byte = (i as u8).wrapping_mul(5);
    }
    let sector = Sector::feed(1, SectorType::Audio, &[0x11u8; SECTOR_LEN], &pw).unwrap();
    track.put_sector(&sector).unwrap();

    let read_back = track.get_sector(1, false).unwrap();
    assert!(read_back.has_subchannel());
    assert_eq!(read_back.subchannel_pw(), &pw);
    assert_eq!(read_back.main_data(), sector.main_data());
}

#[test]
fn mode2_mixed_tracks_resolve_per_sector() {
    init();

    // Two raw sectors: one Form 1, one Form 2 (submode bit 5).
    let mut data = vec![0u8; 2 * SECTOR_LEN];
    data[SECTOR_LEN + 18] = 0x20;
    data[SECTOR_LEN + 22] = 0x20;
    // Mark both as non-empty so synthesis leaves them alone.
    data[24] = 1;
    data[SECTOR_LEN + 24] = 1;

    let mut track = optidisc::Track::new(SectorType::Mode2Mixed);
    track.add_fragment(Fragment::new_binary(
        2,
        BinaryFragmentData::new(shared(MemoryStream::from_vec(data)), 0, SECTOR_LEN, MainDataFormat::DATA),
    ));

    assert_eq!(track.get_sector(0, false).unwrap().sector_type(), SectorType::Mode2Form1);
    assert_eq!(track.get_sector(1, false).unwrap().sector_type(), SectorType::Mode2Form2);
}
