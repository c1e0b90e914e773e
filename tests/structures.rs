mod common;

use common::*;
use optidisc::disc::{STRUCTURE_COPYRIGHT_INFO, STRUCTURE_MANUFACTURING_INFO, STRUCTURE_PHYSICAL_INFO};
use optidisc::parser::guess_medium_type;
use optidisc::{DiscImageError, MediumType, SectorType};

#[test]
fn dvd_physical_format_synthesis() {
    init();

    let mut disc = disc_with_tracks(vec![null_track(SectorType::Mode1, 500_000)]);
    disc.set_medium_type(MediumType::Dvd);

    let structure = disc.get_disc_structure(0, STRUCTURE_PHYSICAL_INFO).unwrap();
    assert_eq!(structure.len(), 2048);

    // Book type 0 (DVD-ROM) part version 5; 120 mm disc, unspecified rate;
    // single layer, parallel track path, embossed layer.
    assert_eq!(structure[0], 0x05);
    assert_eq!(structure[1], 0x0F);
    assert_eq!(structure[2], 0x01);
    assert_eq!(structure[3], 0x00);

    // 24-bit big-endian sector numbers, each preceded by a zero byte.
    assert_eq!(&structure[4..8], &[0x00, 0x03, 0x00, 0x00]);
    let data_end = 0x30000u32 + 500_000;
    assert_eq!(structure[8], 0x00);
    assert_eq!(&structure[9..12], &data_end.to_be_bytes()[1..]);

    // Layer 0 end sector and BCA flag are clear.
    assert_eq!(&structure[12..16], &[0, 0, 0, 0]);
    assert_eq!(structure[16], 0x00);
}

#[test]
fn default_structures_and_storage() {
    init();

    let mut disc = disc_with_tracks(vec![null_track(SectorType::Mode1, 1000)]);
    disc.set_medium_type(MediumType::Bd);

    assert_eq!(disc.get_disc_structure(0, STRUCTURE_COPYRIGHT_INFO).unwrap(), vec![0u8; 4]);
    assert_eq!(
        disc.get_disc_structure(0, STRUCTURE_MANUFACTURING_INFO).unwrap(),
        vec![0u8; 2048]
    );
    assert!(matches!(
        disc.get_disc_structure(0, 0x21),
        Err(DiscImageError::DiscError(_))
    ));

    // Stored structures take precedence over synthesis, per (layer, type).
    disc.set_disc_structure(1, STRUCTURE_COPYRIGHT_INFO, vec![0xAA; 4]).unwrap();
    assert_eq!(disc.get_disc_structure(1, STRUCTURE_COPYRIGHT_INFO).unwrap(), vec![0xAA; 4]);
    assert_eq!(disc.get_disc_structure(0, STRUCTURE_COPYRIGHT_INFO).unwrap(), vec![0u8; 4]);
}

#[test]
fn structures_unavailable_on_cd_media() {
    init();

    let disc = disc_with_tracks(vec![null_track(SectorType::Mode1, 1000)]);
    assert_eq!(disc.medium_type(), MediumType::Cd);
    assert!(matches!(
        disc.get_disc_structure(0, STRUCTURE_PHYSICAL_INFO),
        Err(DiscImageError::DiscError(_))
    ));
}

#[test]
fn medium_guessing_by_layout_length() {
    init();

    let disc_of = |length: i32| disc_with_tracks(vec![null_track(SectorType::Mode1, length)]);

    assert_eq!(guess_medium_type(&disc_of(333_000)), MediumType::Cd);
    assert_eq!(guess_medium_type(&disc_of(90 * 60 * 75)), MediumType::Cd);
    assert_eq!(guess_medium_type(&disc_of(2_000_000)), MediumType::Dvd);
    assert_eq!(guess_medium_type(&disc_of(4_000_000)), MediumType::Dvd);
    assert_eq!(guess_medium_type(&disc_of(12_000_000)), MediumType::Bd);
    assert_eq!(guess_medium_type(&disc_of(24_000_000)), MediumType::Bd);
    assert_eq!(guess_medium_type(&disc_of(30_000_000)), MediumType::Bd);
}

#[test]
fn dpm_angle_and_density_interpolation() {
    init();

    let mut disc = disc_with_tracks(vec![null_track(SectorType::Mode1, 1000)]);

    assert!(disc.dpm_data_for_sector(0).is_err());

    // 500 sectors of DPM data at resolution 50; a constant angular step of
    // half a rotation (128 hex degrees) per entry.
    let entries: Vec<u32> = (1..=10).map(|i| i * 128).collect();
    disc.set_dpm_data(0, 50, &entries);

    let table = disc.dpm_data().unwrap();
    assert_eq!(table.start(), 0);
    assert_eq!(table.resolution(), 50);
    assert_eq!(table.entries().len(), 10);

    // Constant density: half a rotation per 50 sectors, i.e. 3.6 deg/sector.
    for address in [0, 25, 49, 50, 137, 499] {
        let (_, density) = disc.dpm_data_for_sector(address).unwrap();
        assert!((density - 3.6).abs() < 1e-9, "density at {} was {}", address, density);
    }

    // The angle accumulates linearly.
    let (angle, _) = disc.dpm_data_for_sector(25).unwrap();
    assert!((angle - 0.25).abs() < 1e-9);
    let (angle, _) = disc.dpm_data_for_sector(100).unwrap();
    assert!((angle - 1.0).abs() < 1e-9);

    // Addresses may run one resolution interval past the last entry.
    assert!(disc.dpm_data_for_sector(549).is_ok());
    assert!(disc.dpm_data_for_sector(550).is_err());
    assert!(disc.dpm_data_for_sector(-1).is_err());
}
