//! JPEG marker codes and the zigzag scan order.

pub const MARKER_PREFIX: u8 = 0xFF;

pub const SOF0: u8 = 0xC0;
pub const SOF1: u8 = 0xC1;
pub const SOF2: u8 = 0xC2;
pub const DHT: u8 = 0xC4;
pub const JPG: u8 = 0xC8;
pub const DAC: u8 = 0xCC;
pub const RST0: u8 = 0xD0;
pub const RST7: u8 = 0xD7;
pub const SOI: u8 = 0xD8;
pub const EOI: u8 = 0xD9;
pub const SOS: u8 = 0xDA;
pub const DQT: u8 = 0xDB;
pub const DNL: u8 = 0xDC;
pub const DRI: u8 = 0xDD;
pub const APP0: u8 = 0xE0;
pub const APP1: u8 = 0xE1;
pub const APP2: u8 = 0xE2;
pub const APP15: u8 = 0xEF;
pub const COM: u8 = 0xFE;
pub const TEM: u8 = 0x01;

pub fn is_restart(marker: u8) -> bool {
    (RST0..=RST7).contains(&marker)
}

pub fn is_app(marker: u8) -> bool {
    (APP0..=APP15).contains(&marker)
}

/// Start-of-frame codes other than the ones this decoder reads
/// (lossless, hierarchical, arithmetic).
pub fn is_unsupported_frame(marker: u8) -> bool {
    (0xC3..=0xCF).contains(&marker) && marker != DHT && marker != JPG && marker != DAC
}

/// Markers that stand alone without a length field.
pub fn is_standalone(marker: u8) -> bool {
    marker == SOI || marker == EOI || marker == TEM || is_restart(marker)
}

/// `ZIGZAG[k]` is the natural (row-major) index of the k-th coefficient in
/// zigzag order.
pub const ZIGZAG: [usize; 64] = [
    0, 1, 8, 16, 9, 2, 3, 10, 17, 24, 32, 25, 18, 11, 4, 5, 12, 19, 26, 33, 40, 48, 41, 34, 27,
    20, 13, 6, 7, 14, 21, 28, 35, 42, 49, 56, 57, 50, 43, 36, 29, 22, 15, 23, 30, 37, 44, 51, 58,
    59, 52, 45, 38, 31, 39, 46, 53, 60, 61, 54, 47, 55, 62, 63,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zigzag_is_permutation() {
        let mut seen = [false; 64];
        for &index in &ZIGZAG {
            assert!(!seen[index]);
            seen[index] = true;
        }
    }

    #[test]
    fn test_marker_classes() {
        assert!(is_restart(0xD4));
        assert!(!is_restart(SOI));
        assert!(is_app(APP1));
        assert!(!is_app(COM));
        assert!(is_unsupported_frame(0xC3));
        assert!(is_unsupported_frame(0xC9));
        assert!(!is_unsupported_frame(SOF0));
        assert!(!is_unsupported_frame(DHT));
        assert!(is_standalone(0xD0));
        assert!(!is_standalone(SOS));
    }
}
