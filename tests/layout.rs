mod common;

use common::*;
use optidisc::fragment::Fragment;
use optidisc::parser::add_redbook_pregap;
use optidisc::sector::SYNC_PATTERN;
use optidisc::util::{subchannel_q_encode_mcn, subchannel_store_channel};
use optidisc::{Disc, MediumType, SectorType, Session, SUBCHANNEL_LEN};

#[test]
fn session_and_disc_lengths_are_sums() {
    init();

    let mut disc = Disc::new();
    disc.set_start_sector(-150);

    let mut first = Session::default();
    first.add_track(null_track(SectorType::Mode1, 600));
    first.add_track(null_track(SectorType::Audio, 400));
    disc.add_session(first);

    let mut second = Session::default();
    second.add_track(null_track(SectorType::Mode1, 500));
    disc.add_session(second);

    // Sessions tile the disc.
    let mut expected_start = disc.start_sector();
    for session in disc.sessions() {
        assert_eq!(session.start_sector(), expected_start);
        expected_start += session.length();
    }
    assert_eq!(disc.length(), 1500);
    assert_eq!(expected_start, disc.start_sector() + disc.length());

    // Tracks tile each session.
    for session in disc.sessions() {
        let mut expected = session.start_sector();
        for track in session.tracks() {
            assert_eq!(track.start_sector(), expected);
            expected += track.length();
        }
    }
}

#[test]
fn renumbering_cascades_top_down() {
    init();

    let mut disc = Disc::new();
    disc.add_session(Session::default());
    disc.add_session(Session::default());
    disc.session_by_index_mut(0).unwrap().add_track(null_track(SectorType::Mode1, 10));
    disc.session_by_index_mut(0).unwrap().add_track(null_track(SectorType::Mode1, 10));
    disc.session_by_index_mut(1).unwrap().add_track(null_track(SectorType::Mode1, 10));

    disc.set_first_session(3);
    disc.set_first_track(7);

    let numbers: Vec<i32> = disc.sessions().map(|s| s.number()).collect();
    assert_eq!(numbers, vec![3, 4]);

    let track_numbers: Vec<i32> = disc
        .sessions()
        .flat_map(|s| s.tracks().map(|t| t.number()))
        .collect();
    assert_eq!(track_numbers, vec![7, 8, 9]);

    // Start-sector changes re-anchor every descendant.
    disc.set_start_sector(-150);
    assert_eq!(disc.session_by_index(0).unwrap().start_sector(), -150);
    assert_eq!(disc.track_by_number(9).unwrap().start_sector(), -130);
}

#[test]
fn trivial_cd_image_with_redbook_pregap() {
    init();

    // One MODE1 data track of 10 sectors stored as 2048-byte user data.
    let mut disc = disc_with_tracks(vec![memory_track(SectorType::Mode1, 10, 2048)]);
    disc.set_medium_type(MediumType::Cd);

    add_redbook_pregap(&mut disc);

    assert_eq!(disc.start_sector(), -150);
    assert_eq!(disc.length(), 160);

    let session = disc.session_by_index(0).unwrap();
    let track = session.track_by_index(0).unwrap();
    assert_eq!(track.start_sector(), -150);
    assert_eq!(track.track_start(), 150);
    assert_eq!(track.length(), 160);

    // LBA 0 is the first content sector (index 01 begins at relative 150).
    let sector = disc.get_sector(0).unwrap();
    assert_eq!(sector.address(), 0);
    assert_eq!(sector.sector_type(), SectorType::Mode1);
    assert_eq!(sector.sync().unwrap(), &SYNC_PATTERN[..]);
    assert!(sector.user_data().iter().all(|&b| b == 0));

    // The pregap reads as index 00 with zero user data.
    let pregap = disc.get_sector(-150).unwrap();
    assert_eq!(pregap.address(), -150);
    assert_eq!(pregap.subchannel_q()[2], 0x00);
}

#[test]
fn every_layout_address_resolves_to_its_sector() {
    init();

    let mut disc = disc_with_tracks(vec![
        null_track(SectorType::Mode1, 20),
        null_track(SectorType::Audio, 30),
    ]);
    disc.set_start_sector(-150);

    for address in disc.start_sector()..disc.start_sector() + disc.length() {
        let sector = disc.get_sector(address).unwrap();
        assert_eq!(sector.address(), address);
    }
    assert!(disc.get_sector(disc.start_sector() - 1).is_err());
    assert!(disc.get_sector(disc.start_sector() + disc.length()).is_err());
}

#[test]
fn language_codes_unique_per_container() {
    init();

    use optidisc::Language;

    let mut session = Session::default();
    session.add_track(null_track(SectorType::Audio, 10));

    session.add_language(Language::new(0x09)).unwrap();
    session.add_language(Language::new(0x0A)).unwrap();
    assert!(session.add_language(Language::new(0x09)).is_err());

    // A track is an independent container: the same code is fine there.
    let track = session.track_by_index_mut(0).unwrap();
    track.add_language(Language::new(0x09)).unwrap();
    assert!(track.add_language(Language::new(0x09)).is_err());
}

#[test]
fn mcn_scan_on_subchannel_bearing_fragments() {
    init();

    let mcn = "0123456789012";

    // 100 sectors of external PW96 subchannel; sector 37 carries a Q-mode-2
    // MCN pack.
    let mut subchannel_data = vec![0u8; 100 * SUBCHANNEL_LEN];
    let mut pw = [0u8; SUBCHANNEL_LEN];
    let mut q = [0u8; 12];
    q[0] = 0x02; // ADR 2: MCN
    q[1..8].copy_from_slice(&subchannel_q_encode_mcn(mcn));
    subchannel_store_channel(&mut pw, 1, &q);
    subchannel_data[37 * SUBCHANNEL_LEN..38 * SUBCHANNEL_LEN].copy_from_slice(&pw);

    let subchannel = optidisc::stream::shared(optidisc::MemoryStream::from_vec(subchannel_data));
    let track = subchannel_track(SectorType::Mode1, 100, 2352, subchannel);

    let mut session = Session::default();
    session.add_track(track);

    assert!(session.mcn_fixed());
    assert_eq!(session.mcn().as_deref(), Some(mcn));

    // Assignments are silently ignored while the MCN is fixed.
    session.set_mcn("9876543210987").unwrap();
    assert_eq!(session.mcn().as_deref(), Some(mcn));
}

#[test]
fn fragment_layout_invariants() {
    init();

    let mut track = null_track(SectorType::Mode1, 10);
    track.add_fragment(Fragment::new_null(5));
    track.add_fragment(Fragment::new_null(7));

    let mut expected = 0;
    for fragment in track.fragments() {
        assert_eq!(fragment.address(), expected);
        expected += fragment.length();
    }
    assert_eq!(track.length(), expected);
}
