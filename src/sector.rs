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

    src/sector.rs

    Sector assembly: a transient value pairing a raw 2352-byte main buffer
    with a 96-byte interleaved PW subchannel, able to synthesize missing
    structure (sync, header, subheader, EDC/ECC) from its type and address.

*/

use crate::ecc::{ecc_generate, edc_compute, edc_store};
use crate::util::{lba_to_msf, subchannel_extract_channel, to_bcd};
use crate::{DiscImageError, SectorType, SECTOR_LEN, SUBCHANNEL_LEN};

/// The CD-ROM sector sync pattern.
pub const SYNC_PATTERN: [u8; 12] = [0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00];

// Submode bit 5 distinguishes Form 2 sectors in a Mode 2 subheader.
const SUBMODE_FORM2: u8 = 0x20;

/// The eight subchannels of a sector.
#[derive(Copy, Clone, Debug, PartialEq, Eq, strum::Display, strum::EnumIter)]
pub enum SubchannelKind {
    P,
    Q,
    R,
    S,
    T,
    U,
    V,
    W,
}

impl SubchannelKind {
    fn index(&self) -> usize {
        *self as usize
    }
}

/// A single sector's worth of main-channel and subchannel data.
///
/// The effective sector type is settled at construction: a concrete track
/// type is used as-is, while `Mode2Mixed` is downgraded to Form 1 or Form 2 by
/// inspecting the subheader. Missing structure is generated synthetically from
/// the type and address when the fed buffer carries none (zero-fill
/// fragments, or cooked images that store user data only).
pub struct Sector {
    address: i32,
    sector_type: SectorType,
    main: Box<[u8; SECTOR_LEN]>,
    subchannel: Box<[u8; SUBCHANNEL_LEN]>,
    has_subchannel: bool,
}

impl Sector {
    /// Assemble a sector from fragment data.
    ///
    /// `main` may be empty (zero fill), the full 2352-byte raw sector, the
    /// user-data area for the resolved type, or the 2336-byte Mode 2 area at
    /// offset 16. `subchannel`, when present, must be the 96-byte interleaved
    /// PW form.
    pub fn feed(
        address: i32,
        declared_type: SectorType,
        main: &[u8],
        subchannel: &[u8],
    ) -> Result<Sector, DiscImageError> {
        let sector_type = resolve_type(declared_type, main);

        let mut sector = Sector {
            address,
            sector_type,
            main: Box::new([0u8; SECTOR_LEN]),
            subchannel: Box::new([0u8; SUBCHANNEL_LEN]),
            has_subchannel: false,
        };

        match main.len() {
            0 => {
                if sector_type.has_header() {
                    sector.generate_structure();
                }
            }
            SECTOR_LEN => {
                sector.main.copy_from_slice(main);
                // A zero-filled raw buffer for a structured type still needs
                // its sync, header and protection fields generated.
                if sector_type.has_header() && main.iter().all(|&b| b == 0) {
                    sector.generate_structure();
                }
            }
            2336 if matches!(
                sector_type,
                SectorType::Mode2Formless | SectorType::Mode2Form1 | SectorType::Mode2Form2
            ) =>
            {
                sector.main[16..SECTOR_LEN].copy_from_slice(main);
                sector.generate_sync_and_header();
            }
            len if len == sector_type.user_data_len() => {
                let offset = sector_type.user_data_offset();
                sector.main[offset..offset + len].copy_from_slice(main);
                if sector_type.has_header() {
                    sector.generate_structure();
                }
            }
            len => {
                return Err(DiscImageError::SectorError(format!(
                    "cannot assemble {} sector from {} bytes of main data",
                    sector_type, len
                )));
            }
        }

        match subchannel.len() {
            0 => {}
            SUBCHANNEL_LEN => {
                sector.subchannel.copy_from_slice(subchannel);
                sector.has_subchannel = true;
            }
            len => {
                return Err(DiscImageError::SectorError(format!(
                    "subchannel data must be {} interleaved PW bytes, got {}",
                    SUBCHANNEL_LEN, len
                )));
            }
        }

        Ok(sector)
    }

    /// Absolute disc address of this sector.
    pub fn address(&self) -> i32 {
        self.address
    }

    /// The effective (resolved) sector type.
    pub fn sector_type(&self) -> SectorType {
        self.sector_type
    }

    /// The full 2352-byte raw main-channel buffer.
    pub fn main_data(&self) -> &[u8; SECTOR_LEN] {
        &self.main
    }

    /// The 12-byte sync pattern. Audio sectors have none.
    pub fn sync(&self) -> Result<&[u8], DiscImageError> {
        if !self.sector_type.has_header() {
            return Err(DiscImageError::SectorError(format!(
                "{} sectors have no sync pattern",
                self.sector_type
            )));
        }
        Ok(&self.main[0..12])
    }

    /// The 4-byte header (BCD MSF address + mode). Audio sectors have none.
    pub fn header(&self) -> Result<&[u8], DiscImageError> {
        if !self.sector_type.has_header() {
            return Err(DiscImageError::SectorError(format!(
                "{} sectors have no header",
                self.sector_type
            )));
        }
        Ok(&self.main[12..16])
    }

    /// The 8-byte Mode 2 subheader (two copies of file/channel/submode/coding).
    pub fn subheader(&self) -> Result<&[u8], DiscImageError> {
        match self.sector_type {
            SectorType::Mode2Form1 | SectorType::Mode2Form2 => Ok(&self.main[16..24]),
            _ => Err(DiscImageError::SectorError(format!(
                "{} sectors have no subheader",
                self.sector_type
            ))),
        }
    }

    /// The user data slice appropriate to the sector type.
    pub fn user_data(&self) -> &[u8] {
        let offset = self.sector_type.user_data_offset();
        &self.main[offset..offset + self.sector_type.user_data_len()]
    }

    /// The EDC/ECC area of the sector, where the type has one.
    pub fn edc_ecc(&self) -> Result<&[u8], DiscImageError> {
        match self.sector_type {
            SectorType::Mode1 => Ok(&self.main[2064..SECTOR_LEN]),
            SectorType::Mode2Form1 => Ok(&self.main[2072..SECTOR_LEN]),
            SectorType::Mode2Form2 => Ok(&self.main[2348..SECTOR_LEN]),
            _ => Err(DiscImageError::SectorError(format!(
                "{} sectors carry no EDC/ECC",
                self.sector_type
            ))),
        }
    }

    /// True if this sector carries user-supplied subchannel data (as opposed
    /// to a zeroed or generated buffer).
    pub fn has_subchannel(&self) -> bool {
        self.has_subchannel
    }

    /// The 96-byte interleaved PW subchannel buffer.
    pub fn subchannel_pw(&self) -> &[u8; SUBCHANNEL_LEN] {
        &self.subchannel
    }

    /// Replace the subchannel buffer. Used by the sector engine to install
    /// generated position data when the backing fragment supplies none.
    pub fn set_subchannel_pw(&mut self, interleaved: &[u8; SUBCHANNEL_LEN]) {
        self.subchannel.copy_from_slice(interleaved);
        self.has_subchannel = true;
    }

    /// Extract one deinterleaved 12-byte subchannel.
    pub fn subchannel(&self, kind: SubchannelKind) -> [u8; 12] {
        subchannel_extract_channel(&self.subchannel, kind.index())
    }

    /// The Q subchannel, deinterleaved.
    pub fn subchannel_q(&self) -> [u8; 12] {
        self.subchannel(SubchannelKind::Q)
    }

    /// The subchannel in PQ16 form: only the Q channel is materialized,
    /// padded to 16 bytes.
    pub fn subchannel_pq16(&self) -> [u8; 16] {
        let mut out = [0u8; 16];
        out[..12].copy_from_slice(&self.subchannel_q());
        out
    }

    /// Extract main-channel bytes matching a fragment's declared sector size,
    /// for writing. Supported sizes: 2048 (user data of Mode 1 / Form 1),
    /// 2324 (Form 2 user data), 2336 (Mode 2 area), 2352 (full raw).
    pub fn extract_main(&self, size: usize) -> Result<&[u8], DiscImageError> {
        match (size, self.sector_type) {
            (SECTOR_LEN, _) => Ok(&self.main[..]),
            (2048, SectorType::Mode1) => Ok(&self.main[16..2064]),
            (2048, SectorType::Mode2Form1) => Ok(&self.main[24..2072]),
            (2324, SectorType::Mode2Form2) => Ok(&self.main[24..2348]),
            (2336, SectorType::Mode2Formless | SectorType::Mode2Form1 | SectorType::Mode2Form2) => {
                Ok(&self.main[16..SECTOR_LEN])
            }
            (size, sector_type) => Err(DiscImageError::SectorError(format!(
                "cannot extract {} bytes from {} sector",
                size, sector_type
            ))),
        }
    }

    // Synthesize sync pattern and header from the sector's address and type.
    fn generate_sync_and_header(&mut self) {
        self.main[0..12].copy_from_slice(&SYNC_PATTERN);

        let (m, s, f) = lba_to_msf(self.address + 150);
        self.main[12] = to_bcd(m);
        self.main[13] = to_bcd(s);
        self.main[14] = to_bcd(f);
        self.main[15] = match self.sector_type {
            SectorType::Mode1 => 0x01,
            _ => 0x02,
        };
    }

    // Synthesize the full sector structure: sync, header, subheader and
    // protection fields.
    fn generate_structure(&mut self) {
        self.generate_sync_and_header();

        match self.sector_type {
            SectorType::Mode1 => {
                let edc = edc_compute(0, &self.main[0..2064]);
                edc_store(&mut self.main, 2064, edc);
                self.main[2068..2076].fill(0);
                ecc_generate(&mut self.main, false);
            }
            SectorType::Mode2Form1 => {
                let edc = edc_compute(0, &self.main[16..2072]);
                edc_store(&mut self.main, 2072, edc);
                // The XA form excludes the header from ECC protection.
                ecc_generate(&mut self.main, true);
            }
            SectorType::Mode2Form2 => {
                for copy in [16, 20] {
                    self.main[copy + 2] = SUBMODE_FORM2;
                }
                let edc = edc_compute(0, &self.main[16..2348]);
                edc_store(&mut self.main, 2348, edc);
            }
            _ => {}
        }
    }
}

// Resolve the effective sector type: concrete track types are used as-is,
// Mode2Mixed is settled by the subheader's form bit.
fn resolve_type(declared: SectorType, main: &[u8]) -> SectorType {
    if declared != SectorType::Mode2Mixed {
        return declared;
    }

    let submode = match main.len() {
        SECTOR_LEN => main[18],
        2336 => main[2],
        // Cooked feeds carry no subheader; the user-data size is decisive.
        2324 => return SectorType::Mode2Form2,
        _ => 0,
    };

    if submode & SUBMODE_FORM2 != 0 {
        SectorType::Mode2Form2
    }
    else {
        SectorType::Mode2Form1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_sector_is_passthrough() {
        let samples: Vec<u8> = (0..SECTOR_LEN).map(|i| (i % 241) as u8).collect();
        let sector = Sector::feed(100, SectorType::Audio, &samples, &[]).unwrap();

        assert_eq!(sector.user_data(), &samples[..]);
        assert!(sector.sync().is_err());
        assert!(sector.header().is_err());
        assert!(sector.edc_ecc().is_err());
    }

    #[test]
    fn mode1_synthesis_from_user_data() {
        let user_data = vec![0u8; 2048];
        let sector = Sector::feed(0, SectorType::Mode1, &user_data, &[]).unwrap();

        assert_eq!(sector.sync().unwrap(), &SYNC_PATTERN[..]);
        // LBA 0 is MSF 00:02:00.
        assert_eq!(sector.header().unwrap(), &[0x00, 0x02, 0x00, 0x01]);
        assert_eq!(sector.user_data(), &user_data[..]);

        // Zero user data at a known address has a deterministic EDC.
        let edc = edc_compute(0, &sector.main_data()[0..2064]);
        assert_eq!(&sector.main_data()[2064..2068], &edc.to_le_bytes());
    }

    #[test]
    fn mode1_zero_filled_raw_buffer_is_synthesized() {
        let raw = vec![0u8; SECTOR_LEN];
        let sector = Sector::feed(150, SectorType::Mode1, &raw, &[]).unwrap();
        assert_eq!(sector.sync().unwrap(), &SYNC_PATTERN[..]);
        assert_eq!(sector.header().unwrap(), &[0x00, 0x04, 0x00, 0x01]);
    }

    #[test]
    fn raw_nonzero_buffer_is_left_alone() {
        let mut raw = vec![0u8; SECTOR_LEN];
        raw[0..12].copy_from_slice(&SYNC_PATTERN);
        raw[12..16].copy_from_slice(&[0x00, 0x02, 0x00, 0x01]);
        raw[16] = 0xAB;
        let sector = Sector::feed(0, SectorType::Mode1, &raw, &[]).unwrap();
        // EDC area untouched even though it doesn't match the data.
        assert_eq!(&sector.main_data()[2064..2068], &[0, 0, 0, 0]);
        assert_eq!(sector.user_data()[0], 0xAB);
    }

    #[test]
    fn mode2_mixed_downgrades_by_subheader() {
        let mut raw = vec![0u8; SECTOR_LEN];
        raw[18] = SUBMODE_FORM2;
        raw[22] = SUBMODE_FORM2;
        raw[100] = 1;
        let sector = Sector::feed(0, SectorType::Mode2Mixed, &raw, &[]).unwrap();
        assert_eq!(sector.sector_type(), SectorType::Mode2Form2);
        assert_eq!(sector.user_data().len(), 2324);

        let mut raw = vec![0u8; SECTOR_LEN];
        raw[100] = 1;
        let sector = Sector::feed(0, SectorType::Mode2Mixed, &raw, &[]).unwrap();
        assert_eq!(sector.sector_type(), SectorType::Mode2Form1);
        assert_eq!(sector.user_data().len(), 2048);
    }

    #[test]
    fn form2_synthesis_sets_submode_and_edc_only() {
        let user_data = vec![0x55u8; 2324];
        let sector = Sector::feed(0, SectorType::Mode2Form2, &user_data, &[]).unwrap();

        let subheader = sector.subheader().unwrap();
        assert_eq!(subheader[2], SUBMODE_FORM2);
        assert_eq!(subheader[6], SUBMODE_FORM2);
        assert_eq!(sector.edc_ecc().unwrap().len(), 4);
    }

    #[test]
    fn extraction_sizes() {
        let sector = Sector::feed(0, SectorType::Mode1, &vec![7u8; 2048], &[]).unwrap();
        assert_eq!(sector.extract_main(2048).unwrap().len(), 2048);
        assert_eq!(sector.extract_main(SECTOR_LEN).unwrap().len(), SECTOR_LEN);
        assert!(sector.extract_main(2324).is_err());
        assert!(sector.extract_main(512).is_err());
    }

    #[test]
    fn subchannel_accessors() {
        let mut pw = [0u8; SUBCHANNEL_LEN];
        let q = [0x41u8, 0x01, 0x01, 0, 0, 0, 0, 0, 2, 0, 0x12, 0x34];
        crate::util::subchannel_store_channel(&mut pw, 1, &q);

        let sector = Sector::feed(0, SectorType::Mode1, &[], &pw).unwrap();
        assert!(sector.has_subchannel());
        assert_eq!(sector.subchannel_q(), q);
        assert_eq!(sector.subchannel(SubchannelKind::P), [0u8; 12]);

        let pq16 = sector.subchannel_pq16();
        assert_eq!(&pq16[..12], &q);
        assert_eq!(&pq16[12..], &[0, 0, 0, 0]);
    }
}
