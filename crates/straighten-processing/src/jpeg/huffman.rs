//! Huffman coding for JPEG.

use straighten_core::{ProcessingError, ProcessingResult};

use super::bitio::BitReader;

/// Table contents as carried by a DHT segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanSpec {
    /// Number of codes of each length 1..=16.
    pub bits: [u8; 16],
    /// Symbols in order of increasing code length.
    pub values: Vec<u8>,
}

impl HuffmanSpec {
    pub fn new(bits: [u8; 16], values: Vec<u8>) -> ProcessingResult<Self> {
        let total: usize = bits.iter().map(|&n| usize::from(n)).sum();
        if total != values.len() || total > 256 {
            return Err(ProcessingError::codec(format!(
                "Huffman table declares {} codes but carries {} values",
                total,
                values.len()
            )));
        }

        // Kraft inequality: codes of each length must fit the code space.
        let mut code: u32 = 0;
        for (i, &count) in bits.iter().enumerate() {
            code += u32::from(count);
            if code > 1 << (i + 1) {
                return Err(ProcessingError::codec("Huffman table is oversubscribed"));
            }
            code <<= 1;
        }

        Ok(Self { bits, values })
    }

    /// Standard DC luminance table (ITU T.81 Annex K.3).
    pub fn dc_luminance() -> Self {
        Self {
            bits: [0, 1, 5, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0],
            values: (0..12).collect(),
        }
    }

    /// Standard DC chrominance table.
    pub fn dc_chrominance() -> Self {
        Self {
            bits: [0, 3, 1, 1, 1, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0],
            values: (0..12).collect(),
        }
    }

    /// Standard AC luminance table.
    pub fn ac_luminance() -> Self {
        Self {
            bits: [0, 2, 1, 3, 3, 2, 4, 3, 5, 5, 4, 4, 0, 0, 1, 0x7D],
            values: vec![
                0x01, 0x02, 0x03, 0x00, 0x04, 0x11, 0x05, 0x12, 0x21, 0x31, 0x41, 0x06, 0x13,
                0x51, 0x61, 0x07, 0x22, 0x71, 0x14, 0x32, 0x81, 0x91, 0xA1, 0x08, 0x23, 0x42,
                0xB1, 0xC1, 0x15, 0x52, 0xD1, 0xF0, 0x24, 0x33, 0x62, 0x72, 0x82, 0x09, 0x0A,
                0x16, 0x17, 0x18, 0x19, 0x1A, 0x25, 0x26, 0x27, 0x28, 0x29, 0x2A, 0x34, 0x35,
                0x36, 0x37, 0x38, 0x39, 0x3A, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48, 0x49, 0x4A,
                0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59, 0x5A, 0x63, 0x64, 0x65, 0x66, 0x67,
                0x68, 0x69, 0x6A, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79, 0x7A, 0x83, 0x84,
                0x85, 0x86, 0x87, 0x88, 0x89, 0x8A, 0x92, 0x93, 0x94, 0x95, 0x96, 0x97, 0x98,
                0x99, 0x9A, 0xA2, 0xA3, 0xA4, 0xA5, 0xA6, 0xA7, 0xA8, 0xA9, 0xAA, 0xB2, 0xB3,
                0xB4, 0xB5, 0xB6, 0xB7, 0xB8, 0xB9, 0xBA, 0xC2, 0xC3, 0xC4, 0xC5, 0xC6, 0xC7,
                0xC8, 0xC9, 0xCA, 0xD2, 0xD3, 0xD4, 0xD5, 0xD6, 0xD7, 0xD8, 0xD9, 0xDA, 0xE1,
                0xE2, 0xE3, 0xE4, 0xE5, 0xE6, 0xE7, 0xE8, 0xE9, 0xEA, 0xF1, 0xF2, 0xF3, 0xF4,
                0xF5, 0xF6, 0xF7, 0xF8, 0xF9, 0xFA,
            ],
        }
    }

    /// Standard AC chrominance table.
    pub fn ac_chrominance() -> Self {
        Self {
            bits: [0, 2, 1, 2, 4, 4, 3, 4, 7, 5, 4, 4, 0, 1, 2, 0x77],
            values: vec![
                0x00, 0x01, 0x02, 0x03, 0x11, 0x04, 0x05, 0x21, 0x31, 0x06, 0x12, 0x41, 0x51,
                0x07, 0x61, 0x71, 0x13, 0x22, 0x32, 0x81, 0x08, 0x14, 0x42, 0x91, 0xA1, 0xB1,
                0xC1, 0x09, 0x23, 0x33, 0x52, 0xF0, 0x15, 0x62, 0x72, 0xD1, 0x0A, 0x16, 0x24,
                0x34, 0xE1, 0x25, 0xF1, 0x17, 0x18, 0x19, 0x1A, 0x26, 0x27, 0x28, 0x29, 0x2A,
                0x35, 0x36, 0x37, 0x38, 0x39, 0x3A, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48, 0x49,
                0x4A, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59, 0x5A, 0x63, 0x64, 0x65, 0x66,
                0x67, 0x68, 0x69, 0x6A, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79, 0x7A, 0x82,
                0x83, 0x84, 0x85, 0x86, 0x87, 0x88, 0x89, 0x8A, 0x92, 0x93, 0x94, 0x95, 0x96,
                0x97, 0x98, 0x99, 0x9A, 0xA2, 0xA3, 0xA4, 0xA5, 0xA6, 0xA7, 0xA8, 0xA9, 0xAA,
                0xB2, 0xB3, 0xB4, 0xB5, 0xB6, 0xB7, 0xB8, 0xB9, 0xBA, 0xC2, 0xC3, 0xC4, 0xC5,
                0xC6, 0xC7, 0xC8, 0xC9, 0xCA, 0xD2, 0xD3, 0xD4, 0xD5, 0xD6, 0xD7, 0xD8, 0xD9,
                0xDA, 0xE2, 0xE3, 0xE4, 0xE5, 0xE6, 0xE7, 0xE8, 0xE9, 0xEA, 0xF2, 0xF3, 0xF4,
                0xF5, 0xF6, 0xF7, 0xF8, 0xF9, 0xFA,
            ],
        }
    }
}

/// Canonical-code decoding table.
#[derive(Debug, Clone)]
pub struct HuffmanDecoder {
    values: Vec<u8>,
    /// Largest code of each length, -1 when there is none.
    maxcode: [i32; 17],
    mincode: [i32; 17],
    valptr: [usize; 17],
}

impl HuffmanDecoder {
    pub fn new(spec: &HuffmanSpec) -> Self {
        let mut maxcode = [-1i32; 17];
        let mut mincode = [0i32; 17];
        let mut valptr = [0usize; 17];

        let mut code: i32 = 0;
        let mut k = 0usize;
        for len in 1..=16 {
            let count = i32::from(spec.bits[len - 1]);
            if count > 0 {
                valptr[len] = k;
                mincode[len] = code;
                code += count;
                k += count as usize;
                maxcode[len] = code - 1;
            }
            code <<= 1;
        }

        Self {
            values: spec.values.clone(),
            maxcode,
            mincode,
            valptr,
        }
    }

    /// Decode one symbol.
    pub fn decode(&self, reader: &mut BitReader<'_>) -> ProcessingResult<u8> {
        let mut code = reader.read_bit() as i32;
        for len in 1..=16 {
            if code <= self.maxcode[len] {
                let index = self.valptr[len] + (code - self.mincode[len]) as usize;
                return self
                    .values
                    .get(index)
                    .copied()
                    .ok_or_else(|| ProcessingError::codec("Huffman value out of range"));
            }
            if len < 16 {
                code = (code << 1) | reader.read_bit() as i32;
            }
        }
        Err(ProcessingError::codec("Corrupt Huffman data"))
    }
}

/// Code/length pairs indexed by symbol.
#[derive(Debug, Clone)]
pub struct HuffmanEncoder {
    codes: [(u16, u8); 256],
}

impl HuffmanEncoder {
    pub fn new(spec: &HuffmanSpec) -> Self {
        let mut codes = [(0u16, 0u8); 256];
        let mut code: u32 = 0;
        let mut values = spec.values.iter();

        for (i, &count) in spec.bits.iter().enumerate() {
            for _ in 0..count {
                if let Some(&symbol) = values.next() {
                    codes[usize::from(symbol)] = (code as u16, i as u8 + 1);
                }
                code += 1;
            }
            code <<= 1;
        }

        Self { codes }
    }

    /// Code and length for `symbol`, or `None` if the table has no code for it.
    pub fn code(&self, symbol: u8) -> Option<(u16, u8)> {
        let (code, len) = self.codes[usize::from(symbol)];
        (len > 0).then_some((code, len))
    }
}

/// Magnitude category and the extra bits that encode `value`.
pub fn category_encode(value: i32) -> (u8, u16) {
    let magnitude = value.unsigned_abs();
    let category = (32 - magnitude.leading_zeros()) as u8;
    let bits = if value < 0 {
        (value - 1) as u32 & ((1u32 << category) - 1)
    } else {
        magnitude
    };
    (category, bits as u16)
}

/// Inverse of [`category_encode`] (the EXTEND procedure of T.81 F.2.2.1).
pub fn category_decode(category: u8, bits: u32) -> i32 {
    if category == 0 {
        return 0;
    }
    let threshold = 1u32 << (category - 1);
    if bits >= threshold {
        bits as i32
    } else {
        bits as i32 - (1i32 << category) + 1
    }
}
