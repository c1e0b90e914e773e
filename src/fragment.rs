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

    src/fragment.rs

    Fragments map a contiguous run of track sectors onto backing byte
    streams (or onto zero-fill, for gaps and synthetic regions).

*/

//! The `fragment` module defines [`Fragment`], the leaf of the disc layout
//! hierarchy.
//!
//! A fragment covers `length` sectors starting at a track-relative `address`
//! and is one of two variants: `Null` (zero-fill, used for pregaps, lead-ins,
//! lead-outs and unknown regions) or `Binary` (raw bytes pulled from a main
//! stream, optionally paired with subchannel data from the same or a separate
//! stream). Subchannel data is always handed out in the canonical 96-byte
//! interleaved PW form, whatever the stored format.

use bitflags::bitflags;

use crate::stream::{lock, SharedStream};
use crate::util::{subchannel_deinterleave, subchannel_extract_channel, subchannel_interleave, subchannel_store_channel};
use crate::{DiscImageError, SeekWhence, SECTOR_LEN, SUBCHANNEL_LEN};

bitflags! {
    /// Data layout of a binary fragment's main stream.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    #[rustfmt::skip]
    pub struct MainDataFormat: u32 {
        const DATA       = 0b0000_0001; // cooked or raw data sectors
        const AUDIO      = 0b0000_0010; // audio samples, stored in wire order
        const AUDIO_SWAP = 0b0000_0100; // audio samples that need byte-swapping
    }
}

bitflags! {
    /// Data layout of a binary fragment's subchannel.
    ///
    /// Exactly one of `INTERNAL`/`EXTERNAL` and one of the wire forms applies.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    #[rustfmt::skip]
    pub struct SubchannelDataFormat: u32 {
        const INTERNAL         = 0b0000_0001; // appended to each main sector
        const EXTERNAL         = 0b0000_0010; // separate stream
        const PW96_INTERLEAVED = 0b0001_0000;
        const PW96_LINEAR      = 0b0010_0000;
        const RW96             = 0b0100_0000;
        const PQ16             = 0b1000_0000;
    }
}

impl SubchannelDataFormat {
    /// Stored size of one sector's subchannel data in this format.
    pub fn sector_size(&self) -> usize {
        if self.contains(SubchannelDataFormat::PQ16) {
            16
        }
        else {
            96
        }
    }
}

/// The binary variant's stream wiring.
pub struct BinaryFragmentData {
    main_stream: SharedStream,
    main_offset: u64,
    main_sector_size: usize,
    main_format: MainDataFormat,

    subchannel_stream: Option<SharedStream>,
    subchannel_offset: u64,
    subchannel_sector_size: usize,
    subchannel_format: SubchannelDataFormat,
}

impl BinaryFragmentData {
    pub fn new(
        main_stream: SharedStream,
        main_offset: u64,
        main_sector_size: usize,
        main_format: MainDataFormat,
    ) -> BinaryFragmentData {
        BinaryFragmentData {
            main_stream,
            main_offset,
            main_sector_size,
            main_format,
            subchannel_stream: None,
            subchannel_offset: 0,
            subchannel_sector_size: 0,
            subchannel_format: SubchannelDataFormat::empty(),
        }
    }

    /// Attach an external subchannel stream.
    pub fn with_external_subchannel(
        mut self,
        stream: SharedStream,
        offset: u64,
        sector_size: usize,
        format: SubchannelDataFormat,
    ) -> BinaryFragmentData {
        self.subchannel_stream = Some(stream);
        self.subchannel_offset = offset;
        self.subchannel_sector_size = sector_size;
        self.subchannel_format = format | SubchannelDataFormat::EXTERNAL;
        self
    }

    /// Declare subchannel data interleaved into the main stream, trailing
    /// each main sector.
    pub fn with_internal_subchannel(mut self, sector_size: usize, format: SubchannelDataFormat) -> BinaryFragmentData {
        self.subchannel_stream = None;
        self.subchannel_sector_size = sector_size;
        self.subchannel_format = format | SubchannelDataFormat::INTERNAL;
        self
    }

    fn has_subchannel(&self) -> bool {
        !self.subchannel_format.is_empty()
    }

    /// Per-sector stride in the main stream; internal subchannel data rides
    /// behind every main sector.
    fn main_stride(&self) -> u64 {
        let mut stride = self.main_sector_size as u64;
        if self.subchannel_format.contains(SubchannelDataFormat::INTERNAL) {
            stride += self.subchannel_sector_size as u64;
        }
        stride
    }

    fn main_position(&self, address: i32) -> u64 {
        self.main_offset + address as u64 * self.main_stride()
    }

    fn subchannel_position(&self, address: i32) -> u64 {
        if self.subchannel_format.contains(SubchannelDataFormat::INTERNAL) {
            self.main_position(address) + self.main_sector_size as u64
        }
        else {
            self.subchannel_offset + address as u64 * self.subchannel_sector_size as u64
        }
    }
}

/// The payload variant of a fragment.
pub enum FragmentData {
    /// Zero-fill; writes are accepted no-ops.
    Null,
    Binary(BinaryFragmentData),
}

/// A contiguous run of sectors within a track, backed by a data source.
pub struct Fragment {
    pub(crate) address: i32,
    pub(crate) length: i32,
    data: FragmentData,
}

impl Fragment {
    /// Create a zero-fill fragment of `length` sectors.
    pub fn new_null(length: i32) -> Fragment {
        Fragment {
            address: 0,
            length,
            data: FragmentData::Null,
        }
    }

    /// Create a stream-backed fragment of `length` sectors.
    pub fn new_binary(length: i32, data: BinaryFragmentData) -> Fragment {
        Fragment {
            address: 0,
            length,
            data: FragmentData::Binary(data),
        }
    }

    /// Track-relative address of the first sector covered by this fragment.
    pub fn address(&self) -> i32 {
        self.address
    }

    pub fn set_address(&mut self, address: i32) {
        self.address = address;
    }

    /// Length of the fragment, in sectors.
    pub fn length(&self) -> i32 {
        self.length
    }

    /// Change the fragment's length. The owning track picks the change up on
    /// its next layout pass (lengths are summed on demand).
    pub fn set_length(&mut self, length: i32) {
        self.length = length;
    }

    pub fn data(&self) -> &FragmentData {
        &self.data
    }

    /// True if the track-relative `address` falls within this fragment.
    pub fn contains_address(&self, address: i32) -> bool {
        address >= self.address && address < self.address + self.length
    }

    /// Size of one main-channel sector as stored, in bytes. Zero-fill
    /// fragments report the canonical raw size.
    pub fn main_data_size(&self) -> usize {
        match &self.data {
            FragmentData::Null => SECTOR_LEN,
            FragmentData::Binary(binary) => binary.main_sector_size,
        }
    }

    /// Size of one subchannel sector as stored, in bytes; 0 if the fragment
    /// carries no subchannel data.
    pub fn subchannel_data_size(&self) -> usize {
        match &self.data {
            FragmentData::Null => 0,
            FragmentData::Binary(binary) => {
                if binary.has_subchannel() {
                    binary.subchannel_sector_size
                }
                else {
                    0
                }
            }
        }
    }

    /// True if this fragment carries user-supplied subchannel data.
    pub fn has_subchannel(&self) -> bool {
        match &self.data {
            FragmentData::Null => false,
            FragmentData::Binary(binary) => binary.has_subchannel(),
        }
    }

    fn check_address(&self, address: i32) -> Result<(), DiscImageError> {
        if address < 0 || address >= self.length {
            return Err(DiscImageError::FragmentError(format!(
                "fragment-relative address {} out of range (length {})",
                address, self.length
            )));
        }
        Ok(())
    }

    /// Read the main-channel bytes of the sector at fragment-relative
    /// `address`.
    pub fn read_main_data(&self, address: i32) -> Result<Vec<u8>, DiscImageError> {
        self.check_address(address)?;

        match &self.data {
            FragmentData::Null => Ok(vec![0u8; SECTOR_LEN]),
            FragmentData::Binary(binary) => {
                let mut buffer = vec![0u8; binary.main_sector_size];
                {
                    let mut stream = lock(&binary.main_stream)?;
                    stream.seek(binary.main_position(address) as i64, SeekWhence::Set)?;
                    stream.read_exact(&mut buffer)?;
                }

                if binary.main_format.contains(MainDataFormat::AUDIO_SWAP) {
                    swap_audio_bytes(&mut buffer);
                }
                Ok(buffer)
            }
        }
    }

    /// Write main-channel bytes for the sector at fragment-relative
    /// `address`. `buffer` must match the stored sector size. Writes to
    /// zero-fill fragments are accepted no-ops.
    pub fn write_main_data(&mut self, address: i32, buffer: &[u8]) -> Result<(), DiscImageError> {
        self.check_address(address)?;

        match &self.data {
            FragmentData::Null => Ok(()),
            FragmentData::Binary(binary) => {
                if buffer.len() != binary.main_sector_size {
                    return Err(DiscImageError::FragmentError(format!(
                        "main data size mismatch: got {} bytes, fragment stores {}",
                        buffer.len(),
                        binary.main_sector_size
                    )));
                }

                let mut stream = lock(&binary.main_stream)?;
                stream.seek(binary.main_position(address) as i64, SeekWhence::Set)?;
                if binary.main_format.contains(MainDataFormat::AUDIO_SWAP) {
                    let mut swapped = buffer.to_vec();
                    swap_audio_bytes(&mut swapped);
                    stream.write(&swapped)?;
                }
                else {
                    stream.write(buffer)?;
                }
                Ok(())
            }
        }
    }

    /// Read the subchannel of the sector at fragment-relative `address`,
    /// normalized to 96-byte interleaved PW form. Returns an empty vector if
    /// the fragment carries no subchannel data.
    pub fn read_subchannel_data(&self, address: i32) -> Result<Vec<u8>, DiscImageError> {
        self.check_address(address)?;

        let binary = match &self.data {
            FragmentData::Null => return Ok(Vec::new()),
            FragmentData::Binary(binary) => {
                if !binary.has_subchannel() {
                    return Ok(Vec::new());
                }
                binary
            }
        };

        let expected = binary.subchannel_format.sector_size();
        if binary.subchannel_sector_size != expected {
            return Err(DiscImageError::FragmentError(format!(
                "subchannel sector size {} incompatible with format {:?}",
                binary.subchannel_sector_size, binary.subchannel_format
            )));
        }

        let mut stored = vec![0u8; binary.subchannel_sector_size];
        {
            let stream = match (&binary.subchannel_stream, binary.subchannel_format.contains(SubchannelDataFormat::INTERNAL)) {
                (_, true) => &binary.main_stream,
                (Some(stream), false) => stream,
                (None, false) => {
                    return Err(DiscImageError::FragmentError(
                        "external subchannel declared without a stream".to_string(),
                    ))
                }
            };
            let mut stream = lock(stream)?;
            stream.seek(binary.subchannel_position(address) as i64, SeekWhence::Set)?;
            stream.read_exact(&mut stored)?;
        }

        Ok(to_interleaved_pw(&stored, binary.subchannel_format).to_vec())
    }

    /// Write subchannel data for the sector at fragment-relative `address`.
    /// `interleaved` is the canonical 96-byte PW form; it is converted to the
    /// fragment's stored format. A no-op for fragments without subchannel.
    pub fn write_subchannel_data(&mut self, address: i32, interleaved: &[u8]) -> Result<(), DiscImageError> {
        self.check_address(address)?;

        let binary = match &self.data {
            FragmentData::Null => return Ok(()),
            FragmentData::Binary(binary) => {
                if !binary.has_subchannel() {
                    return Ok(());
                }
                binary
            }
        };

        if interleaved.len() != SUBCHANNEL_LEN {
            return Err(DiscImageError::FragmentError(format!(
                "subchannel data must be {} interleaved PW bytes, got {}",
                SUBCHANNEL_LEN,
                interleaved.len()
            )));
        }

        let expected = binary.subchannel_format.sector_size();
        if binary.subchannel_sector_size != expected {
            return Err(DiscImageError::FragmentError(format!(
                "subchannel sector size {} incompatible with format {:?}",
                binary.subchannel_sector_size, binary.subchannel_format
            )));
        }

        let mut pw = [0u8; SUBCHANNEL_LEN];
        pw.copy_from_slice(interleaved);
        let stored = from_interleaved_pw(&pw, binary.subchannel_format);

        let stream = match (&binary.subchannel_stream, binary.subchannel_format.contains(SubchannelDataFormat::INTERNAL)) {
            (_, true) => &binary.main_stream,
            (Some(stream), false) => stream,
            (None, false) => {
                return Err(DiscImageError::FragmentError(
                    "external subchannel declared without a stream".to_string(),
                ))
            }
        };
        let mut stream = lock(stream)?;
        stream.seek(binary.subchannel_position(address) as i64, SeekWhence::Set)?;
        stream.write(&stored)?;
        Ok(())
    }
}

/// Byte-swap 16-bit audio samples in place.
fn swap_audio_bytes(buffer: &mut [u8]) {
    for pair in buffer.chunks_exact_mut(2) {
        pair.swap(0, 1);
    }
}

/// Convert stored subchannel bytes to 96-byte interleaved PW form.
fn to_interleaved_pw(stored: &[u8], format: SubchannelDataFormat) -> [u8; SUBCHANNEL_LEN] {
    if format.contains(SubchannelDataFormat::PW96_INTERLEAVED) {
        let mut out = [0u8; SUBCHANNEL_LEN];
        out.copy_from_slice(&stored[..SUBCHANNEL_LEN]);
        out
    }
    else if format.contains(SubchannelDataFormat::PW96_LINEAR) {
        let mut linear = [0u8; SUBCHANNEL_LEN];
        linear.copy_from_slice(&stored[..SUBCHANNEL_LEN]);
        subchannel_interleave(&linear)
    }
    else if format.contains(SubchannelDataFormat::RW96) {
        // Six bits of user data per byte, mapping onto channels R..W.
        let mut out = [0u8; SUBCHANNEL_LEN];
        for (dst, src) in out.iter_mut().zip(stored.iter()) {
            *dst = src & 0x3F;
        }
        out
    }
    else {
        // PQ16: only the Q channel is stored.
        let mut q = [0u8; 12];
        q.copy_from_slice(&stored[..12]);
        let mut out = [0u8; SUBCHANNEL_LEN];
        subchannel_store_channel(&mut out, 1, &q);
        out
    }
}

/// Convert 96-byte interleaved PW form into the stored subchannel format.
fn from_interleaved_pw(interleaved: &[u8; SUBCHANNEL_LEN], format: SubchannelDataFormat) -> Vec<u8> {
    if format.contains(SubchannelDataFormat::PW96_INTERLEAVED) {
        interleaved.to_vec()
    }
    else if format.contains(SubchannelDataFormat::PW96_LINEAR) {
        subchannel_deinterleave(interleaved).to_vec()
    }
    else if format.contains(SubchannelDataFormat::RW96) {
        interleaved.iter().map(|byte| byte & 0x3F).collect()
    }
    else {
        let mut stored = vec![0u8; 16];
        stored[..12].copy_from_slice(&subchannel_extract_channel(interleaved, 1));
        stored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::memory::MemoryStream;
    use crate::stream::shared;

    fn patterned(len: usize, seed: u8) -> Vec<u8> {
        (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
    }

    #[test]
    fn null_fragment_reads_zeroes_and_eats_writes() {
        let mut fragment = Fragment::new_null(10);
        assert!(fragment.contains_address(0));
        assert!(fragment.contains_address(9));
        assert!(!fragment.contains_address(10));

        let main = fragment.read_main_data(3).unwrap();
        assert_eq!(main.len(), SECTOR_LEN);
        assert!(main.iter().all(|&b| b == 0));
        assert!(fragment.read_subchannel_data(3).unwrap().is_empty());

        fragment.write_main_data(3, &[0xFF; SECTOR_LEN]).unwrap();
        let main = fragment.read_main_data(3).unwrap();
        assert!(main.iter().all(|&b| b == 0));

        assert!(fragment.read_main_data(10).is_err());
    }

    #[test]
    fn binary_fragment_reads_at_offsets() {
        let mut data = vec![0u8; 100 + 3 * 2048];
        for (i, byte) in data.iter_mut().enumerate().skip(100) {
            *byte = (i % 251) as u8;
        }
        let stream = shared(MemoryStream::from_vec(data.clone()));

        let fragment = Fragment::new_binary(
            3,
            BinaryFragmentData::new(stream, 100, 2048, MainDataFormat::DATA),
        );
        assert_eq!(fragment.main_data_size(), 2048);

        let sector = fragment.read_main_data(1).unwrap();
        assert_eq!(&sector[..], &data[100 + 2048..100 + 2 * 2048]);
    }

    #[test]
    fn audio_swap_is_involutive() {
        let samples = patterned(2352, 7);
        let stream = shared(MemoryStream::from_vec(samples.clone()));

        let mut fragment = Fragment::new_binary(
            1,
            BinaryFragmentData::new(stream, 0, 2352, MainDataFormat::AUDIO | MainDataFormat::AUDIO_SWAP),
        );

        let read = fragment.read_main_data(0).unwrap();
        assert_eq!(read[0], samples[1]);
        assert_eq!(read[1], samples[0]);

        // Writing back what was read restores the original stored bytes.
        fragment.write_main_data(0, &read).unwrap();
        let read_again = fragment.read_main_data(0).unwrap();
        assert_eq!(read_again, read);
    }

    #[test]
    fn internal_subchannel_trails_main_sector() {
        // Two 2448-byte sectors: 2352 main + 96 interleaved PW.
        let mut data = Vec::new();
        for sector in 0..2u8 {
            data.extend(vec![sector; 2352]);
            data.extend(vec![0x80 | sector; 96]);
        }
        let stream = shared(MemoryStream::from_vec(data));

        let fragment = Fragment::new_binary(
            2,
            BinaryFragmentData::new(stream, 0, 2352, MainDataFormat::DATA)
                .with_internal_subchannel(96, SubchannelDataFormat::PW96_INTERLEAVED),
        );
        assert!(fragment.has_subchannel());
        assert_eq!(fragment.subchannel_data_size(), 96);

        let main = fragment.read_main_data(1).unwrap();
        assert!(main.iter().all(|&b| b == 1));
        let sub = fragment.read_subchannel_data(1).unwrap();
        assert_eq!(sub.len(), SUBCHANNEL_LEN);
        assert!(sub.iter().all(|&b| b == 0x81));
    }

    #[test]
    fn pq16_subchannel_materializes_q_channel() {
        let mut q = [0u8; 12];
        q[0] = 0x41;
        q[9] = 0x37;
        let mut stored = vec![0u8; 16];
        stored[..12].copy_from_slice(&q);
        let stream = shared(MemoryStream::from_vec(stored));

        let fragment = Fragment::new_binary(
            1,
            BinaryFragmentData::new(shared(MemoryStream::from_vec(vec![0; 2352])), 0, 2352, MainDataFormat::DATA)
                .with_external_subchannel(stream, 0, 16, SubchannelDataFormat::PQ16),
        );

        let sub = fragment.read_subchannel_data(0).unwrap();
        let mut interleaved = [0u8; SUBCHANNEL_LEN];
        interleaved.copy_from_slice(&sub);
        assert_eq!(subchannel_extract_channel(&interleaved, 1), q);
        // P and R..W channels are zero.
        assert_eq!(subchannel_extract_channel(&interleaved, 0), [0u8; 12]);
        assert_eq!(subchannel_extract_channel(&interleaved, 7), [0u8; 12]);
    }

    #[test]
    fn subchannel_write_roundtrip_linear() {
        let main_stream = shared(MemoryStream::from_vec(vec![0; 2352]));
        let sub_stream = shared(MemoryStream::from_vec(vec![0; 96]));

        let mut fragment = Fragment::new_binary(
            1,
            BinaryFragmentData::new(main_stream, 0, 2352, MainDataFormat::DATA).with_external_subchannel(
                sub_stream,
                0,
                96,
                SubchannelDataFormat::PW96_LINEAR,
            ),
        );

        let mut pw = [0u8; SUBCHANNEL_LEN];
        let q = [0x21u8, 0x01, 0x01, 0, 0, 0, 0, 0, 2, 0, 0xAB, 0xCD];
        subchannel_store_channel(&mut pw, 1, &q);

        fragment.write_subchannel_data(0, &pw).unwrap();
        let read = fragment.read_subchannel_data(0).unwrap();
        assert_eq!(&read[..], &pw[..]);
    }
}
