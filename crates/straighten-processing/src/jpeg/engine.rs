//! File-level lossless JPEG transform.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use straighten_core::{
    MarkerCopy, ProcessingConfig, ProcessingError, ProcessingResult, TransformCode,
};

use super::reader::JpegReader;
use super::transform;
use super::writer::write_jpeg;

const TEMP_PREFIX: &str = "straighten-";
const TEMP_SUFFIX: &str = ".jpg";

/// Rotates and flips JPEG files without decoding pixels.
#[derive(Debug, Clone)]
pub struct LosslessTransformEngine {
    temp_dir: PathBuf,
    marker_copy: MarkerCopy,
    max_coefficient_bytes: u64,
}

impl Default for LosslessTransformEngine {
    fn default() -> Self {
        Self::new(&ProcessingConfig::default())
    }
}

impl LosslessTransformEngine {
    pub fn new(config: &ProcessingConfig) -> Self {
        Self {
            temp_dir: config.temp_dir(),
            marker_copy: config.marker_copy,
            max_coefficient_bytes: config.max_coefficient_bytes,
        }
    }

    pub fn marker_copy(&self) -> MarkerCopy {
        self.marker_copy
    }

    /// Transform `path` into a fresh file in the configured temp directory
    /// and return its path. The source is never modified.
    pub fn transform(
        &self,
        path: impl AsRef<Path>,
        code: TransformCode,
    ) -> ProcessingResult<PathBuf> {
        self.transform_to(path, code, &self.temp_dir)
    }

    /// Like [`transform`](Self::transform) but writes into `dir`.
    pub fn transform_to(
        &self,
        path: impl AsRef<Path>,
        code: TransformCode,
        dir: impl AsRef<Path>,
    ) -> ProcessingResult<PathBuf> {
        let path = path.as_ref();
        let data = fs::read(path)?;

        let mut reader = JpegReader::new(&data).with_memory_limit(self.max_coefficient_bytes);
        let frame = reader.read_header()?;
        frame.check_mcu_aligned()?;
        frame.check_memory(self.max_coefficient_bytes)?;

        let mut temp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(TEMP_SUFFIX)
            .tempfile_in(dir.as_ref())?;

        // The temp file is removed on drop unless kept below.
        let image = transform::apply(reader.read_coefficients()?, code);
        {
            let mut out = BufWriter::new(temp.as_file_mut());
            write_jpeg(&image, self.marker_copy, &mut out)?;
            out.flush()?;
        }
        temp.as_file().sync_data()?;

        let (_file, output) = temp
            .keep()
            .map_err(|err| ProcessingError::Io(err.error))?;

        tracing::info!(
            source = %path.display(),
            output = %output.display(),
            transform = %code,
            width = image.width(),
            height = image.height(),
            "Wrote losslessly transformed JPEG"
        );
        Ok(output)
    }
}
