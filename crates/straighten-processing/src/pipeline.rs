//! Auto-orientation: read the Exif orientation, bake it into the pixels with
//! a lossless transform, and reset the tag.

use std::fs::{self, File};
use std::path::Path;

use serde::Serialize;
use straighten_core::{
    ImageTransformation, Orientation, ProcessingConfig, ProcessingResult, TransformCode,
};

use crate::exif::ExifOrientationCodec;
use crate::jpeg::markers::APP1;
use crate::jpeg::LosslessTransformEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AutoOrientOutcome {
    /// Orientation was already Normal.
    Unchanged,
    Rotated {
        from: Orientation,
        swapped_dimensions: bool,
    },
}

#[derive(Debug, Clone)]
pub struct AutoOrientPipeline {
    codec: ExifOrientationCodec,
    engine: LosslessTransformEngine,
}

impl Default for AutoOrientPipeline {
    fn default() -> Self {
        Self::new(&ProcessingConfig::default())
    }
}

impl AutoOrientPipeline {
    pub fn new(config: &ProcessingConfig) -> Self {
        Self {
            codec: ExifOrientationCodec::new(config),
            engine: LosslessTransformEngine::new(config),
        }
    }

    pub fn codec(&self) -> &ExifOrientationCodec {
        &self.codec
    }

    pub fn engine(&self) -> &LosslessTransformEngine {
        &self.engine
    }

    /// Rotate the file at `path` upright according to its Exif orientation.
    ///
    /// The tag is reset to Normal on the transformed copy before it replaces
    /// the original, so a failure at any step leaves the original untouched.
    pub fn auto_orient(&self, path: impl AsRef<Path>) -> ProcessingResult<AutoOrientOutcome> {
        let path = path.as_ref();
        let from = self.codec.read_orientation(path)?;
        if from == Orientation::Normal {
            tracing::debug!(path = %path.display(), "Orientation already normal");
            return Ok(AutoOrientOutcome::Unchanged);
        }

        let code = from.transform_code();
        let output = self.engine.transform(path, code)?;

        if self.engine.marker_copy().keeps(APP1) {
            if let Err(err) = self.codec.write_orientation(&output, Orientation::Normal) {
                discard(&output);
                return Err(err);
            }
        }
        replace_file(path, &output)?;

        tracing::info!(
            path = %path.display(),
            from = from.value(),
            transform = %code,
            "Auto-oriented image"
        );
        Ok(AutoOrientOutcome::Rotated {
            from,
            swapped_dimensions: code.swaps_dimensions(),
        })
    }

    /// Apply a user-requested rotation or flip in place. The Exif
    /// orientation is left as it was.
    pub fn apply_transformation(
        &self,
        path: impl AsRef<Path>,
        transformation: ImageTransformation,
    ) -> ProcessingResult<()> {
        let path = path.as_ref();
        let code = TransformCode::from(transformation);
        let output = self.engine.transform(path, code)?;
        replace_file(path, &output)?;

        tracing::info!(
            path = %path.display(),
            transform = %code,
            "Applied transformation"
        );
        Ok(())
    }
}

/// Move `replacement` over `original`, keeping the original's permissions
/// and modification time. On failure the replacement is removed.
pub fn replace_file(original: &Path, replacement: &Path) -> ProcessingResult<()> {
    let metadata = match fs::metadata(original) {
        Ok(metadata) => metadata,
        Err(err) => {
            discard(replacement);
            return Err(err.into());
        }
    };

    if let Err(err) = fs::rename(replacement, original) {
        tracing::debug!(
            error = %err,
            from = %replacement.display(),
            to = %original.display(),
            "Rename failed, copying instead"
        );
        if let Err(err) = fs::copy(replacement, original) {
            discard(replacement);
            return Err(err.into());
        }
        discard(replacement);
    }

    fs::set_permissions(original, metadata.permissions())?;
    let modified = metadata.modified()?;
    File::options()
        .write(true)
        .open(original)?
        .set_modified(modified)?;
    Ok(())
}

fn discard(path: &Path) {
    if let Err(err) = fs::remove_file(path) {
        tracing::warn!(
            path = %path.display(),
            error = %err,
            "Failed to remove temporary file"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};

    #[test]
    fn test_replace_file_keeps_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("photo.jpg");
        let replacement = dir.path().join("new.jpg");
        fs::write(&original, b"old").unwrap();
        fs::write(&replacement, b"new").unwrap();

        let past = SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000);
        File::options()
            .write(true)
            .open(&original)
            .unwrap()
            .set_modified(past)
            .unwrap();

        replace_file(&original, &replacement).unwrap();
        assert_eq!(fs::read(&original).unwrap(), b"new");
        assert!(!replacement.exists());
        assert_eq!(fs::metadata(&original).unwrap().modified().unwrap(), past);
    }

    #[cfg(unix)]
    #[test]
    fn test_replace_file_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("photo.jpg");
        let replacement = dir.path().join("new.jpg");
        fs::write(&original, b"old").unwrap();
        fs::write(&replacement, b"new").unwrap();
        fs::set_permissions(&original, fs::Permissions::from_mode(0o644)).unwrap();
        fs::set_permissions(&replacement, fs::Permissions::from_mode(0o600)).unwrap();

        replace_file(&original, &replacement).unwrap();
        let mode = fs::metadata(&original).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[test]
    fn test_replace_missing_original_discards_replacement() {
        let dir = tempfile::tempdir().unwrap();
        let replacement = dir.path().join("new.jpg");
        fs::write(&replacement, b"new").unwrap();

        assert!(replace_file(&dir.path().join("gone.jpg"), &replacement).is_err());
        assert!(!replacement.exists());
    }

    #[test]
    fn test_outcome_serializes_with_status() {
        let json = serde_json::to_value(AutoOrientOutcome::Rotated {
            from: Orientation::Rotate90,
            swapped_dimensions: true,
        })
        .unwrap();
        assert_eq!(json["status"], "rotated");
        assert_eq!(json["from"], 6);
        assert_eq!(json["swapped_dimensions"], true);

        let json = serde_json::to_value(AutoOrientOutcome::Unchanged).unwrap();
        assert_eq!(json["status"], "unchanged");
    }
}
