//! Straighten Processing Library
//!
//! Exif orientation access and lossless JPEG rotation:
//! - `exif`: read and rewrite the Orientation tag of JPEG and TIFF files
//! - `jpeg`: coefficient-domain rotations and flips
//! - `pipeline`: auto-orient a file in place
//! - `sniff`: file signature checks and JPEG frame size

pub mod exif;
pub mod jpeg;
pub mod pipeline;
pub mod sniff;

pub use exif::{Container, ExifOrientationCodec};
pub use jpeg::{CoefficientImage, JpegReader, LosslessTransformEngine};
pub use pipeline::{replace_file, AutoOrientOutcome, AutoOrientPipeline};
pub use sniff::{detect_format, jpeg_dimensions, looks_like_jpeg, looks_like_png, ImageDimensions};
