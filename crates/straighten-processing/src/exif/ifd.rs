//! Image File Directory entries and the linear tag scan.

use straighten_core::{Orientation, ProcessingError, ProcessingResult};

use super::segment::{ByteOrder, RawSegment};

pub const ORIENTATION_TAG: u16 = 0x0112;
pub const TIFF_TAG_MARK: u16 = 0x002A;
pub const ENTRY_SIZE: usize = 12;
/// TIFF field type SHORT.
pub const FORMAT_UNSIGNED_SHORT: u16 = 3;

/// One 12-byte directory record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IfdEntry {
    pub tag: u16,
    pub format: u16,
    pub count: u32,
    /// Raw value/offset field, still in file byte order.
    pub value: [u8; 4],
}

impl IfdEntry {
    pub fn parse(bytes: &[u8], order: ByteOrder) -> ProcessingResult<Self> {
        if bytes.len() < ENTRY_SIZE {
            return Err(ProcessingError::Bounds {
                offset: 0,
                len: ENTRY_SIZE,
                limit: bytes.len(),
            });
        }
        Ok(Self {
            tag: order.u16_from([bytes[0], bytes[1]]),
            format: order.u16_from([bytes[2], bytes[3]]),
            count: order.u32_from([bytes[4], bytes[5], bytes[6], bytes[7]]),
            value: [bytes[8], bytes[9], bytes[10], bytes[11]],
        })
    }

    /// A SHORT entry with a single component holding `orientation`.
    pub fn orientation(orientation: Orientation, order: ByteOrder) -> Self {
        let short = order.u16_bytes(u16::from(orientation.value()));
        Self {
            tag: ORIENTATION_TAG,
            format: FORMAT_UNSIGNED_SHORT,
            count: 1,
            value: [short[0], short[1], 0, 0],
        }
    }

    pub fn encode(&self, order: ByteOrder) -> [u8; ENTRY_SIZE] {
        let mut out = [0u8; ENTRY_SIZE];
        out[0..2].copy_from_slice(&order.u16_bytes(self.tag));
        out[2..4].copy_from_slice(&order.u16_bytes(self.format));
        out[4..8].copy_from_slice(&order.u32_bytes(self.count));
        out[8..12].copy_from_slice(&self.value);
        out
    }

    /// Decode the value as an orientation. The first two value bytes hold a
    /// SHORT in file order; its high byte must be zero.
    pub fn orientation_value(&self, order: ByteOrder) -> ProcessingResult<Orientation> {
        let raw = order.u16_from([self.value[0], self.value[1]]);
        let value = u8::try_from(raw).map_err(|_| {
            ProcessingError::format(format!("Orientation value {:#06x} does not fit a byte", raw))
        })?;
        Orientation::try_from(value)
    }
}

/// Where a tag was found inside a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagLocation {
    /// Offset of the matching 12-byte entry.
    pub entry_offset: usize,
    /// Offset of the first entry (just past the 2-byte count).
    pub directory_start: usize,
    /// Number of entries declared by the directory.
    pub directory_tags: u16,
}

impl TagLocation {
    /// Offset of the 4-byte next-IFD pointer that follows the last entry.
    pub fn next_ifd_pointer_offset(&self) -> usize {
        self.directory_start + usize::from(self.directory_tags) * ENTRY_SIZE
    }
}

/// Scan the directory at `ifd_offset` for `tag`.
///
/// Returns `Ok(None)` when every declared entry was visited without a match.
/// A zero entry count is a format error and an entry that would run past the
/// end of the segment is a bounds error.
pub fn find_tag(
    segment: &RawSegment,
    order: ByteOrder,
    ifd_offset: usize,
    tag: u16,
) -> ProcessingResult<Option<TagLocation>> {
    let directory_tags = segment.read_u16(ifd_offset, order)?;
    if directory_tags == 0 {
        return Err(ProcessingError::format(format!(
            "Directory at offset {} declares no entries",
            ifd_offset
        )));
    }

    let directory_start = ifd_offset + 2;
    let mut offset = directory_start;
    let mut remaining = directory_tags;

    loop {
        if offset + ENTRY_SIZE > segment.len() {
            return Err(ProcessingError::Bounds {
                offset,
                len: ENTRY_SIZE,
                limit: segment.len(),
            });
        }
        if segment.read_u16(offset, order)? == tag {
            return Ok(Some(TagLocation {
                entry_offset: offset,
                directory_start,
                directory_tags,
            }));
        }
        remaining -= 1;
        if remaining == 0 {
            return Ok(None);
        }
        offset += ENTRY_SIZE;
    }
}
