//! Exif Orientation codec
//!
//! Locates the Orientation tag in IFD0 of a JPEG's Exif APP1 segment or of a
//! bare TIFF file, and reads it or rewrites it in place. Writes patch only the
//! 12-byte directory entries (IFD0 and, when present, the thumbnail IFD1);
//! the rest of the file is never touched.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use straighten_core::{
    Orientation, OrientationMode, ProcessingConfig, ProcessingError, ProcessingResult,
    ThumbnailPolicy,
};

use super::ifd::{find_tag, IfdEntry, TagLocation, ENTRY_SIZE, ORIENTATION_TAG, TIFF_TAG_MARK};
use super::segment::{ByteOrder, RawSegment};

const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];
const APP0: u8 = 0xE0;
const APP1: u8 = 0xE1;
const APP2: u8 = 0xE2;
const EXIF_HEADER: &[u8; 6] = b"Exif\0\0";
const JFIF_HEADER: &[u8; 5] = b"JFIF\0";
const ICC_HEADER: &[u8; 12] = b"ICC_PROFILE\0";
/// Marker length field plus the "Exif\0\0" header.
const EXIF_PREAMBLE: usize = 8;

/// Where the TIFF block came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Jpeg,
    Tiff,
}

/// TIFF block loaded from a file, with its absolute position.
#[derive(Debug)]
struct ExifBlock {
    segment: RawSegment,
    /// Absolute file offset of the TIFF header ("II"/"MM").
    tiff_offset: u64,
    container: Container,
    order: ByteOrder,
    ifd0_offset: usize,
}

/// A pending positional write of one directory entry.
#[derive(Debug, Clone, Copy)]
struct EntryPatch {
    file_offset: u64,
    bytes: [u8; ENTRY_SIZE],
}

/// Reads and writes the EXIF Orientation tag of JPEG and bare TIFF files.
#[derive(Debug, Clone)]
pub struct ExifOrientationCodec {
    buffer_capacity: usize,
    thumbnail_policy: ThumbnailPolicy,
}

impl Default for ExifOrientationCodec {
    fn default() -> Self {
        Self::new(&ProcessingConfig::default())
    }
}

impl ExifOrientationCodec {
    pub fn new(config: &ProcessingConfig) -> Self {
        Self {
            buffer_capacity: config.exif_buffer_capacity,
            thumbnail_policy: config.thumbnail_policy,
        }
    }

    /// Read the stored orientation, or overwrite it.
    ///
    /// In write mode the returned value is the orientation just written.
    pub fn get_or_create_orientation(
        &self,
        path: impl AsRef<Path>,
        mode: OrientationMode,
    ) -> ProcessingResult<Orientation> {
        let path = path.as_ref();
        let result = match mode {
            OrientationMode::Read => self.read_from(path),
            OrientationMode::Write(orientation) => {
                self.write_to(path, orientation).map(|()| orientation)
            }
        };

        if let Err(err) = &result {
            tracing::debug!(
                path = %path.display(),
                mode = ?mode,
                error = %err,
                "Exif orientation call failed"
            );
        }
        result
    }

    pub fn read_orientation(&self, path: impl AsRef<Path>) -> ProcessingResult<Orientation> {
        self.get_or_create_orientation(path, OrientationMode::Read)
    }

    pub fn write_orientation(
        &self,
        path: impl AsRef<Path>,
        orientation: Orientation,
    ) -> ProcessingResult<()> {
        self.get_or_create_orientation(path, OrientationMode::Write(orientation))
            .map(|_| ())
    }

    fn read_from(&self, path: &Path) -> ProcessingResult<Orientation> {
        let mut file = File::open(path)?;
        let block = self.load(&mut file)?;
        let location = find_tag(
            &block.segment,
            block.order,
            block.ifd0_offset,
            ORIENTATION_TAG,
        )?
        .ok_or_else(|| ProcessingError::format("Orientation tag not found in IFD0"))?;

        let entry = IfdEntry::parse(
            block.segment.bytes(location.entry_offset, ENTRY_SIZE)?,
            block.order,
        )?;
        entry.orientation_value(block.order)
    }

    fn write_to(&self, path: &Path, orientation: Orientation) -> ProcessingResult<()> {
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;
        let mut block = self.load(&mut file)?;

        let location = find_tag(
            &block.segment,
            block.order,
            block.ifd0_offset,
            ORIENTATION_TAG,
        )?
        .ok_or_else(|| ProcessingError::format("Orientation tag not found in IFD0"))?;

        let entry = IfdEntry::orientation(orientation, block.order).encode(block.order);
        block.segment.write_bytes(location.entry_offset, &entry)?;

        let mut patches = vec![EntryPatch {
            file_offset: block.tiff_offset + location.entry_offset as u64,
            bytes: entry,
        }];

        if let Some(patch) = self.thumbnail_patch(&mut file, &block, &location, orientation)? {
            patches.push(patch);
        }

        // Everything has been validated; only now touch the file.
        for patch in &patches {
            file.seek(SeekFrom::Start(patch.file_offset))?;
            file.write_all(&patch.bytes)?;
        }
        file.sync_data()?;

        tracing::info!(
            path = %path.display(),
            orientation = orientation.value(),
            entries = patches.len(),
            "Rewrote Exif orientation"
        );
        Ok(())
    }

    /// Locate the Orientation entry of IFD1, if the file has a thumbnail
    /// directory, and build its patch.
    fn thumbnail_patch(
        &self,
        file: &mut File,
        block: &ExifBlock,
        ifd0: &TagLocation,
        orientation: Orientation,
    ) -> ProcessingResult<Option<EntryPatch>> {
        let pointer_offset = ifd0.next_ifd_pointer_offset();
        let ifd1_offset = block.segment.read_u32(pointer_offset, block.order)? as usize;
        if ifd1_offset == 0 {
            return Ok(None);
        }

        tracing::debug!(ifd1_offset, "Following IFD1 pointer");

        let loaded;
        let (directory, base) = if ifd1_offset + 2 <= block.segment.len()
            || block.container == Container::Jpeg
        {
            (&block.segment, ifd1_offset)
        } else {
            loaded = self.read_directory(file, block, ifd1_offset)?;
            (&loaded, 0)
        };

        let Some(location) = find_tag(directory, block.order, base, ORIENTATION_TAG)? else {
            return match self.thumbnail_policy {
                ThumbnailPolicy::Require => Err(ProcessingError::format(
                    "Orientation tag not found in IFD1",
                )),
                ThumbnailPolicy::SkipMissing => {
                    tracing::debug!("IFD1 has no orientation entry, leaving thumbnail untouched");
                    Ok(None)
                }
            };
        };

        let entry_in_tiff = ifd1_offset + (location.entry_offset - base);
        Ok(Some(EntryPatch {
            file_offset: block.tiff_offset + entry_in_tiff as u64,
            bytes: IfdEntry::orientation(orientation, block.order).encode(block.order),
        }))
    }

    /// Read a directory that lies past the buffered prefix of a bare TIFF.
    /// Inside a JPEG the thumbnail directory must lie within the APP1 segment
    /// and this is never used.
    fn read_directory(
        &self,
        file: &mut File,
        block: &ExifBlock,
        ifd_offset: usize,
    ) -> ProcessingResult<RawSegment> {
        file.seek(SeekFrom::Start(block.tiff_offset + ifd_offset as u64))?;
        let mut count = [0u8; 2];
        file.read_exact(&mut count)?;
        let tags = usize::from(block.order.u16_from(count));

        file.seek(SeekFrom::Current(-2))?;
        let mut directory = RawSegment::with_capacity(self.buffer_capacity);
        directory.fill_from(file, 2 + tags * ENTRY_SIZE)?;
        Ok(directory)
    }

    /// Classify the file and load its TIFF block into a bounded buffer.
    fn load(&self, file: &mut File) -> ProcessingResult<ExifBlock> {
        let mut head = [0u8; 4];
        file.read_exact(&mut head)?;

        let (segment, tiff_offset, container) = if ByteOrder::from_marker(&head).is_some() {
            let file_len = file.metadata()?.len();
            let len = file_len.min(self.buffer_capacity as u64) as usize;
            file.seek(SeekFrom::Start(0))?;
            let mut segment = RawSegment::with_capacity(self.buffer_capacity);
            segment.fill_from(file, len)?;
            (segment, 0, Container::Tiff)
        } else if head[..2] == JPEG_SOI {
            let (segment, tiff_offset) = self.load_jpeg_exif(file)?;
            (segment, tiff_offset, Container::Jpeg)
        } else {
            return Err(ProcessingError::format("Not a JPEG or TIFF file"));
        };

        let order = ByteOrder::from_marker(segment.bytes(0, 2)?)
            .ok_or_else(|| ProcessingError::format("Unsupported TIFF byte order marker"))?;

        if segment.read_u16(2, order)? != TIFF_TAG_MARK {
            return Err(ProcessingError::format("Missing TIFF tag mark"));
        }

        let ifd0_offset = segment.read_u32(4, order)? as usize;
        if segment.len() < 2 || ifd0_offset > segment.len() - 2 {
            return Err(ProcessingError::Bounds {
                offset: ifd0_offset,
                len: 2,
                limit: segment.len(),
            });
        }

        tracing::debug!(
            container = ?container,
            byte_order = ?order,
            tiff_offset,
            ifd0_offset,
            length = segment.len(),
            "Loaded TIFF block"
        );

        Ok(ExifBlock {
            segment,
            tiff_offset,
            container,
            order,
            ifd0_offset,
        })
    }

    /// Walk the leading JPEG segments to the Exif APP1 body.
    ///
    /// An APP0 JFIF segment and APP2 ICC profile chunks in front of the Exif
    /// segment are skipped; anything else must be the Exif APP1 itself.
    fn load_jpeg_exif(&self, file: &mut File) -> ProcessingResult<(RawSegment, u64)> {
        let mut position: u64 = 2;
        let mut skipped_jfif = false;

        loop {
            file.seek(SeekFrom::Start(position))?;
            let mut header = [0u8; 4];
            file.read_exact(&mut header)?;
            if header[0] != 0xFF {
                return Err(ProcessingError::format(format!(
                    "Expected a JPEG marker at offset {}",
                    position
                )));
            }
            let marker = header[1];
            let length = usize::from(u16::from_be_bytes([header[2], header[3]]));

            let mut ident = [0u8; 12];
            let ident_len = length.saturating_sub(2).min(ident.len());
            file.read_exact(&mut ident[..ident_len])?;
            let ident = &ident[..ident_len];

            if marker == APP0 && !skipped_jfif && ident.starts_with(JFIF_HEADER) {
                skipped_jfif = true;
            } else if marker == APP2 && ident.starts_with(ICC_HEADER) {
                // ICC profiles may span several APP2 chunks.
            } else {
                if marker != APP1 || !ident.starts_with(EXIF_HEADER) {
                    return Err(ProcessingError::format("Missing Exif marker"));
                }
                if length < EXIF_PREAMBLE {
                    return Err(ProcessingError::format(format!(
                        "Exif segment length {} is too short",
                        length
                    )));
                }
                let body_len = length - EXIF_PREAMBLE;
                if body_len < ENTRY_SIZE {
                    return Err(ProcessingError::format(
                        "Exif segment cannot hold a single directory entry",
                    ));
                }

                let tiff_offset = position + 4 + EXIF_HEADER.len() as u64;
                file.seek(SeekFrom::Start(tiff_offset))?;
                let mut segment = RawSegment::with_capacity(self.buffer_capacity);
                segment.fill_from(file, body_len)?;
                return Ok((segment, tiff_offset));
            }

            tracing::debug!(marker, length, "Skipping segment before Exif");
            position += 2 + length as u64;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use straighten_core::ErrorKind;

    fn write_temp(bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    /// Minimal TIFF: header, IFD0 with one Orientation entry, no IFD1.
    fn tiff_with_orientation(order: ByteOrder, value: u16) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&order.marker());
        out.extend_from_slice(&order.u16_bytes(TIFF_TAG_MARK));
        out.extend_from_slice(&order.u32_bytes(8));
        out.extend_from_slice(&order.u16_bytes(1));
        out.extend_from_slice(&order.u16_bytes(ORIENTATION_TAG));
        out.extend_from_slice(&order.u16_bytes(3));
        out.extend_from_slice(&order.u32_bytes(1));
        out.extend_from_slice(&order.u16_bytes(value));
        out.extend_from_slice(&[0, 0]);
        out.extend_from_slice(&order.u32_bytes(0));
        out
    }

    #[test]
    fn test_reads_big_and_little_endian_tiff() {
        let codec = ExifOrientationCodec::default();
        for order in [ByteOrder::Big, ByteOrder::Little] {
            let file = write_temp(&tiff_with_orientation(order, 6));
            assert_eq!(
                codec.read_orientation(file.path()).unwrap(),
                Orientation::Rotate90
            );
        }
    }

    #[test]
    fn test_rejects_unknown_file_type() {
        let codec = ExifOrientationCodec::default();
        let file = write_temp(b"GIF89a\0\0\0\0");
        let err = codec.read_orientation(file.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn test_rejects_out_of_range_value() {
        let codec = ExifOrientationCodec::default();
        let file = write_temp(&tiff_with_orientation(ByteOrder::Big, 9));
        assert_eq!(
            codec.read_orientation(file.path()).unwrap_err().kind(),
            ErrorKind::Format
        );

        let file = write_temp(&tiff_with_orientation(ByteOrder::Little, 0));
        assert_eq!(
            codec.read_orientation(file.path()).unwrap_err().kind(),
            ErrorKind::Format
        );
    }

    #[test]
    fn test_rejects_bad_tag_mark() {
        let codec = ExifOrientationCodec::default();
        let mut bytes = tiff_with_orientation(ByteOrder::Big, 1);
        bytes[3] = 0x2B;
        let file = write_temp(&bytes);
        assert_eq!(
            codec.read_orientation(file.path()).unwrap_err().kind(),
            ErrorKind::Format
        );
    }

    #[test]
    fn test_rejects_ifd0_offset_past_buffer() {
        let codec = ExifOrientationCodec::default();
        let mut bytes = tiff_with_orientation(ByteOrder::Big, 1);
        bytes[4..8].copy_from_slice(&ByteOrder::Big.u32_bytes(0x1000));
        let file = write_temp(&bytes);
        assert_eq!(
            codec.read_orientation(file.path()).unwrap_err().kind(),
            ErrorKind::Bounds
        );
    }

    #[test]
    fn test_write_then_read_tiff() {
        let codec = ExifOrientationCodec::default();
        let file = write_temp(&tiff_with_orientation(ByteOrder::Little, 1));
        for orientation in Orientation::ALL {
            codec.write_orientation(file.path(), orientation).unwrap();
            assert_eq!(codec.read_orientation(file.path()).unwrap(), orientation);
        }
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let codec = ExifOrientationCodec::default();
        let dir = tempfile::tempdir().unwrap();
        let err = codec
            .read_orientation(dir.path().join("missing.jpg"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
