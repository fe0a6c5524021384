//! Bounded scratch buffer for TIFF/Exif data plus byte-order helpers.

use std::io::Read;

use straighten_core::{ProcessingError, ProcessingResult};

/// Byte order of a TIFF block, taken from its two-byte prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// "II", Intel.
    Little,
    /// "MM", Motorola.
    Big,
}

impl ByteOrder {
    pub fn from_marker(marker: &[u8]) -> Option<Self> {
        match marker {
            [b'I', b'I', ..] => Some(ByteOrder::Little),
            [b'M', b'M', ..] => Some(ByteOrder::Big),
            _ => None,
        }
    }

    pub fn marker(self) -> [u8; 2] {
        match self {
            ByteOrder::Little => *b"II",
            ByteOrder::Big => *b"MM",
        }
    }

    pub fn u16_from(self, bytes: [u8; 2]) -> u16 {
        match self {
            ByteOrder::Little => u16::from_le_bytes(bytes),
            ByteOrder::Big => u16::from_be_bytes(bytes),
        }
    }

    pub fn u32_from(self, bytes: [u8; 4]) -> u32 {
        match self {
            ByteOrder::Little => u32::from_le_bytes(bytes),
            ByteOrder::Big => u32::from_be_bytes(bytes),
        }
    }

    pub fn u16_bytes(self, value: u16) -> [u8; 2] {
        match self {
            ByteOrder::Little => value.to_le_bytes(),
            ByteOrder::Big => value.to_be_bytes(),
        }
    }

    pub fn u32_bytes(self, value: u32) -> [u8; 4] {
        match self {
            ByteOrder::Little => value.to_le_bytes(),
            ByteOrder::Big => value.to_be_bytes(),
        }
    }
}

/// Fixed-capacity byte buffer whose accessors refuse to step outside the
/// bytes actually loaded.
#[derive(Debug, Clone)]
pub struct RawSegment {
    data: Vec<u8>,
    capacity: usize,
}

impl RawSegment {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Copy `bytes` into a fresh segment of the given capacity.
    pub fn from_bytes(bytes: &[u8], capacity: usize) -> ProcessingResult<Self> {
        let mut segment = Self::with_capacity(capacity);
        segment.ensure_fits(bytes.len())?;
        segment.data.extend_from_slice(bytes);
        Ok(segment)
    }

    /// Replace the contents with exactly `len` bytes from `reader`.
    pub fn fill_from<R: Read>(&mut self, reader: &mut R, len: usize) -> ProcessingResult<()> {
        self.ensure_fits(len)?;
        self.data.clear();
        self.data.resize(len, 0);
        if let Err(err) = reader.read_exact(&mut self.data) {
            self.data.clear();
            return Err(err.into());
        }
        Ok(())
    }

    fn ensure_fits(&self, len: usize) -> ProcessingResult<()> {
        if len > self.capacity {
            return Err(ProcessingError::Bounds {
                offset: 0,
                len,
                limit: self.capacity,
            });
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn check(&self, offset: usize, len: usize) -> ProcessingResult<std::ops::Range<usize>> {
        match offset.checked_add(len) {
            Some(end) if end <= self.data.len() => Ok(offset..end),
            _ => Err(ProcessingError::Bounds {
                offset,
                len,
                limit: self.data.len(),
            }),
        }
    }

    pub fn bytes(&self, offset: usize, len: usize) -> ProcessingResult<&[u8]> {
        let range = self.check(offset, len)?;
        Ok(&self.data[range])
    }

    pub fn bytes_mut(&mut self, offset: usize, len: usize) -> ProcessingResult<&mut [u8]> {
        let range = self.check(offset, len)?;
        Ok(&mut self.data[range])
    }

    pub fn read_u8(&self, offset: usize) -> ProcessingResult<u8> {
        Ok(self.bytes(offset, 1)?[0])
    }

    pub fn read_u16(&self, offset: usize, order: ByteOrder) -> ProcessingResult<u16> {
        let b = self.bytes(offset, 2)?;
        Ok(order.u16_from([b[0], b[1]]))
    }

    pub fn read_u32(&self, offset: usize, order: ByteOrder) -> ProcessingResult<u32> {
        let b = self.bytes(offset, 4)?;
        Ok(order.u32_from([b[0], b[1], b[2], b[3]]))
    }

    pub fn write_bytes(&mut self, offset: usize, bytes: &[u8]) -> ProcessingResult<()> {
        self.bytes_mut(offset, bytes.len())?.copy_from_slice(bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use straighten_core::ErrorKind;

    #[test]
    fn test_byte_order_marker() {
        assert_eq!(ByteOrder::from_marker(b"II*\0"), Some(ByteOrder::Little));
        assert_eq!(ByteOrder::from_marker(b"MM\0*"), Some(ByteOrder::Big));
        assert_eq!(ByteOrder::from_marker(b"IM"), None);
        assert_eq!(ByteOrder::from_marker(b"I"), None);
    }

    #[test]
    fn test_byte_order_conversions() {
        assert_eq!(ByteOrder::Big.u16_from([0x01, 0x12]), 0x0112);
        assert_eq!(ByteOrder::Little.u16_from([0x12, 0x01]), 0x0112);
        assert_eq!(ByteOrder::Big.u32_bytes(8), [0, 0, 0, 8]);
        assert_eq!(ByteOrder::Little.u32_bytes(8), [8, 0, 0, 0]);
    }

    #[test]
    fn test_reads_are_bounds_checked() {
        let segment = RawSegment::from_bytes(&[1, 2, 3, 4, 5], 16).unwrap();
        assert_eq!(segment.read_u16(3, ByteOrder::Big).unwrap(), 0x0405);

        let err = segment.read_u16(4, ByteOrder::Big).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Bounds);

        let err = segment.bytes(usize::MAX, 2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Bounds);
    }

    #[test]
    fn test_fill_respects_capacity() {
        let mut segment = RawSegment::with_capacity(4);
        let mut reader = Cursor::new(vec![0u8; 10]);
        let err = segment.fill_from(&mut reader, 5).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Bounds);

        segment.fill_from(&mut reader, 4).unwrap();
        assert_eq!(segment.len(), 4);
    }

    #[test]
    fn test_short_read_is_io_error() {
        let mut segment = RawSegment::with_capacity(64);
        let mut reader = Cursor::new(vec![0u8; 3]);
        let err = segment.fill_from(&mut reader, 8).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(segment.is_empty());
    }

    #[test]
    fn test_write_bytes() {
        let mut segment = RawSegment::from_bytes(&[0; 6], 6).unwrap();
        segment.write_bytes(2, &[7, 8]).unwrap();
        assert_eq!(segment.bytes(0, 6).unwrap(), &[0, 0, 7, 8, 0, 0]);
        assert!(segment.write_bytes(5, &[1, 2]).is_err());
    }
}
