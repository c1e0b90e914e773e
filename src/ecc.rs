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

    src/ecc.rs

    CD-ROM error detection (EDC) and Reed-Solomon P/Q parity generation,
    used when synthesizing Mode 1 and Mode 2 sector structure.

*/

//! EDC/ECC generation for CD-ROM sectors, per ECMA-130.
//!
//! The EDC is a 32-bit CRC with the reflected polynomial `0xD8018001`, stored
//! little-endian. The ECC is a Reed-Solomon product code over GF(2^8) with the
//! field polynomial `x^8 + x^4 + x^3 + x^2 + 1`: 172 bytes of P parity over
//! 43-byte columns and 104 bytes of Q parity over diagonals.

use crate::SECTOR_LEN;

/// Lookup table for the EDC CRC.
const EDC_LUT: [u32; 256] = generate_edc_table();

/// GF(2^8) "multiply by alpha" table.
const ECC_F_LUT: [u8; 256] = generate_ecc_tables().0;
/// GF(2^8) division-by-(alpha + 1) table, indexed by `x ^ alpha*x`.
const ECC_B_LUT: [u8; 256] = generate_ecc_tables().1;

const fn generate_edc_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut edc = i as u32;
        let mut j = 0;
        while j < 8 {
            if edc & 1 != 0 {
                edc = (edc >> 1) ^ 0xD801_8001;
            }
            else {
                edc >>= 1;
            }
            j += 1;
        }
        table[i] = edc;
        i += 1;
    }
    table
}

const fn generate_ecc_tables() -> ([u8; 256], [u8; 256]) {
    let mut f_lut = [0u8; 256];
    let mut b_lut = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let mut j = (i << 1) as u32;
        if j >= 0x100 {
            j ^= 0x11D;
        }
        f_lut[i] = j as u8;
        b_lut[i ^ j as usize] = i as u8;
        i += 1;
    }
    (f_lut, b_lut)
}

/// Compute the EDC over `data`, continuing from `edc` (pass 0 to start).
pub fn edc_compute(mut edc: u32, data: &[u8]) -> u32 {
    for &byte in data {
        edc = (edc >> 8) ^ EDC_LUT[((edc ^ byte as u32) & 0xFF) as usize];
    }
    edc
}

/// Compute one ECC block (P or Q parity) over the 2064 header+data+parity
/// bytes starting at sector offset 12 and store the parity into `dest`.
///
/// The geometry parameters follow the ECMA-130 product-code layout: P parity
/// runs 86 codewords of 24 bytes with a column stride, Q parity runs 52
/// codewords of 43 bytes along diagonals.
fn ecc_compute_block(
    src: &[u8],
    major_count: usize,
    minor_count: usize,
    major_mult: usize,
    minor_inc: usize,
    dest: &mut [u8],
) {
    let size = major_count * minor_count;
    for major in 0..major_count {
        let mut index = (major >> 1) * major_mult + (major & 1);
        let mut ecc_a: u8 = 0;
        let mut ecc_b: u8 = 0;

        for _ in 0..minor_count {
            let temp = src[index];
            index += minor_inc;
            if index >= size {
                index -= size;
            }
            ecc_a ^= temp;
            ecc_b ^= temp;
            ecc_a = ECC_F_LUT[ecc_a as usize];
        }

        ecc_a = ECC_B_LUT[(ECC_F_LUT[ecc_a as usize] ^ ecc_b) as usize];
        dest[major] = ecc_a;
        dest[major + major_count] = ecc_a ^ ecc_b;
    }
}

/// Generate the P and Q parity fields of a raw 2352-byte sector in place.
///
/// With `zero_address` set, the four header bytes are treated as zero for the
/// computation (the Mode 2 Form 1 convention, where the header is excluded
/// from protection), then restored.
pub fn ecc_generate(sector: &mut [u8; SECTOR_LEN], zero_address: bool) {
    let mut saved_header = [0u8; 4];
    if zero_address {
        saved_header.copy_from_slice(&sector[12..16]);
        sector[12..16].fill(0);
    }

    // P parity: 86 codewords over columns.
    let (data, parity) = sector.split_at_mut(0x81C);
    ecc_compute_block(&data[12..], 86, 24, 2, 86, parity);

    // Q parity: 52 codewords over diagonals. The Q span includes the P parity
    // just computed.
    let (data, parity) = sector.split_at_mut(0x8C8);
    ecc_compute_block(&data[12..], 52, 43, 86, 88, parity);

    if zero_address {
        sector[12..16].copy_from_slice(&saved_header);
    }
}

/// Store a 32-bit EDC value little-endian at `offset` within the sector.
pub fn edc_store(sector: &mut [u8; SECTOR_LEN], offset: usize, edc: u32) {
    sector[offset..offset + 4].copy_from_slice(&edc.to_le_bytes());
}
