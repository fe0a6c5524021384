//! Cheap file-type checks from leading bytes.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use image::{ImageError, ImageFormat, ImageReader};
use serde::Serialize;
use straighten_core::{ProcessingError, ProcessingResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

/// Reader with its format guessed from content only. `ImageReader::open`
/// would fall back to the file extension, which is not wanted here.
fn guessed_reader(path: &Path) -> ProcessingResult<ImageReader<BufReader<File>>> {
    let reader = ImageReader::new(BufReader::new(File::open(path)?)).with_guessed_format()?;
    Ok(reader)
}

fn image_error(err: ImageError) -> ProcessingError {
    match err {
        ImageError::IoError(err) => ProcessingError::Io(err),
        other => ProcessingError::codec(other.to_string()),
    }
}

pub fn detect_format(path: impl AsRef<Path>) -> ProcessingResult<Option<ImageFormat>> {
    Ok(guessed_reader(path.as_ref())?.format())
}

pub fn looks_like_jpeg(path: impl AsRef<Path>) -> ProcessingResult<bool> {
    Ok(detect_format(path)? == Some(ImageFormat::Jpeg))
}

pub fn looks_like_png(path: impl AsRef<Path>) -> ProcessingResult<bool> {
    Ok(detect_format(path)? == Some(ImageFormat::Png))
}

/// Frame size from the JPEG headers; scan data is not decoded.
pub fn jpeg_dimensions(path: impl AsRef<Path>) -> ProcessingResult<ImageDimensions> {
    let reader = guessed_reader(path.as_ref())?;
    if reader.format() != Some(ImageFormat::Jpeg) {
        return Err(ProcessingError::format("Not a JPEG file"));
    }
    let (width, height) = reader.into_dimensions().map_err(image_error)?;
    tracing::debug!(width, height, "Read JPEG frame header");
    Ok(ImageDimensions { width, height })
}
