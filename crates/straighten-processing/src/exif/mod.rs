//! Exif Orientation tag access
//!
//! - `segment`: bounds-checked scratch buffer and byte order handling
//! - `ifd`: 12-byte directory entries and the tag scan
//! - `codec`: file-level read/write of the Orientation tag

pub mod codec;
pub mod ifd;
pub mod segment;

pub use codec::{Container, ExifOrientationCodec};
pub use ifd::{IfdEntry, TagLocation, ORIENTATION_TAG};
pub use segment::{ByteOrder, RawSegment};
