//! Configuration module
//!
//! Runtime settings for the orientation codec and the transform engine, read
//! from `STRAIGHTEN_*` environment variables (and an optional `.env` file).

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{ProcessingError, ProcessingResult};

/// Capacity of the in-memory Exif scratch buffer. An APP1 segment can never
/// be larger than this.
pub const DEFAULT_EXIF_BUFFER_CAPACITY: usize = 65536;
const MIN_EXIF_BUFFER_CAPACITY: usize = 16;
const MAX_EXIF_BUFFER_CAPACITY: usize = 1024 * 1024;

/// Ceiling on coefficient storage for one decoded JPEG. Checked against the
/// frame header before anything is allocated.
pub const DEFAULT_MAX_COEFFICIENT_BYTES: u64 = 1024 * 1024 * 1024;
const MIN_MAX_COEFFICIENT_BYTES: u64 = 4096;

/// Which source markers are copied into a transformed JPEG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarkerCopy {
    /// No APPn or COM markers.
    None,
    /// COM markers only.
    Comments,
    /// Every APPn and COM marker.
    #[default]
    All,
}

impl MarkerCopy {
    /// Whether a marker with this code should be carried over.
    pub fn keeps(self, marker: u8) -> bool {
        match self {
            MarkerCopy::None => false,
            MarkerCopy::Comments => marker == 0xFE,
            MarkerCopy::All => marker == 0xFE || (0xE0..=0xEF).contains(&marker),
        }
    }
}

impl FromStr for MarkerCopy {
    type Err = ProcessingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(MarkerCopy::None),
            "comments" => Ok(MarkerCopy::Comments),
            "all" => Ok(MarkerCopy::All),
            other => Err(ProcessingError::Config(format!(
                "STRAIGHTEN_COPY_MARKERS must be one of all, comments, none (got {})",
                other
            ))),
        }
    }
}

/// What an orientation write does when the thumbnail directory (IFD1) carries
/// no Orientation entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThumbnailPolicy {
    /// Fail the write.
    #[default]
    Require,
    /// Leave the thumbnail untouched.
    SkipMissing,
}

impl FromStr for ThumbnailPolicy {
    type Err = ProcessingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "require" => Ok(ThumbnailPolicy::Require),
            "skip-missing" | "skip_missing" => Ok(ThumbnailPolicy::SkipMissing),
            other => Err(ProcessingError::Config(format!(
                "STRAIGHTEN_THUMBNAIL_ORIENTATION must be require or skip-missing (got {})",
                other
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessingConfig {
    /// Directory for transform output. `None` uses the system temp directory.
    pub temp_dir: Option<PathBuf>,
    pub exif_buffer_capacity: usize,
    pub marker_copy: MarkerCopy,
    pub thumbnail_policy: ThumbnailPolicy,
    pub max_coefficient_bytes: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            temp_dir: None,
            exif_buffer_capacity: DEFAULT_EXIF_BUFFER_CAPACITY,
            marker_copy: MarkerCopy::All,
            thumbnail_policy: ThumbnailPolicy::Require,
            max_coefficient_bytes: DEFAULT_MAX_COEFFICIENT_BYTES,
        }
    }
}

impl ProcessingConfig {
    pub fn from_env() -> ProcessingResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> ProcessingResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let temp_dir = lookup("STRAIGHTEN_TEMP_DIR")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        let exif_buffer_capacity = match lookup("STRAIGHTEN_EXIF_BUFFER_BYTES") {
            Some(raw) => raw.trim().parse::<usize>().map_err(|_| {
                ProcessingError::Config(
                    "STRAIGHTEN_EXIF_BUFFER_BYTES must be a valid number".to_string(),
                )
            })?,
            None => defaults.exif_buffer_capacity,
        };

        let marker_copy = match lookup("STRAIGHTEN_COPY_MARKERS") {
            Some(raw) => raw.parse()?,
            None => defaults.marker_copy,
        };

        let thumbnail_policy = match lookup("STRAIGHTEN_THUMBNAIL_ORIENTATION") {
            Some(raw) => raw.parse()?,
            None => defaults.thumbnail_policy,
        };

        let max_coefficient_bytes = match lookup("STRAIGHTEN_MAX_COEFFICIENT_BYTES") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                ProcessingError::Config(
                    "STRAIGHTEN_MAX_COEFFICIENT_BYTES must be a valid number".to_string(),
                )
            })?,
            None => defaults.max_coefficient_bytes,
        };

        let config = Self {
            temp_dir,
            exif_buffer_capacity,
            marker_copy,
            thumbnail_policy,
            max_coefficient_bytes,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ProcessingResult<()> {
        if !(MIN_EXIF_BUFFER_CAPACITY..=MAX_EXIF_BUFFER_CAPACITY)
            .contains(&self.exif_buffer_capacity)
        {
            return Err(ProcessingError::Config(format!(
                "STRAIGHTEN_EXIF_BUFFER_BYTES must be between {} and {}",
                MIN_EXIF_BUFFER_CAPACITY, MAX_EXIF_BUFFER_CAPACITY
            )));
        }

        if self.max_coefficient_bytes < MIN_MAX_COEFFICIENT_BYTES {
            return Err(ProcessingError::Config(format!(
                "STRAIGHTEN_MAX_COEFFICIENT_BYTES must be at least {}",
                MIN_MAX_COEFFICIENT_BYTES
            )));
        }

        if let Some(dir) = &self.temp_dir {
            if dir.exists() && !dir.is_dir() {
                return Err(ProcessingError::Config(format!(
                    "STRAIGHTEN_TEMP_DIR {} is not a directory",
                    dir.display()
                )));
            }
        }

        Ok(())
    }

    /// Directory that receives temporary transform output.
    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(env::temp_dir)
    }

    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    pub fn with_marker_copy(mut self, marker_copy: MarkerCopy) -> Self {
        self.marker_copy = marker_copy;
        self
    }

    pub fn with_thumbnail_policy(mut self, policy: ThumbnailPolicy) -> Self {
        self.thumbnail_policy = policy;
        self
    }

    pub fn with_max_coefficient_bytes(mut self, limit: u64) -> Self {
        self.max_coefficient_bytes = limit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_variables() {
        let config = ProcessingConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, ProcessingConfig::default());
        assert_eq!(config.exif_buffer_capacity, 65536);
        assert_eq!(config.temp_dir(), env::temp_dir());
    }

    #[test]
    fn test_reads_all_variables() {
        let config = ProcessingConfig::from_lookup(lookup_from(&[
            ("STRAIGHTEN_TEMP_DIR", "/var/tmp/straighten"),
            ("STRAIGHTEN_EXIF_BUFFER_BYTES", "131072"),
            ("STRAIGHTEN_COPY_MARKERS", "Comments"),
            ("STRAIGHTEN_THUMBNAIL_ORIENTATION", "skip-missing"),
            ("STRAIGHTEN_MAX_COEFFICIENT_BYTES", "67108864"),
        ]))
        .unwrap();

        assert_eq!(config.temp_dir, Some(PathBuf::from("/var/tmp/straighten")));
        assert_eq!(config.exif_buffer_capacity, 131072);
        assert_eq!(config.marker_copy, MarkerCopy::Comments);
        assert_eq!(config.thumbnail_policy, ThumbnailPolicy::SkipMissing);
        assert_eq!(config.max_coefficient_bytes, 64 * 1024 * 1024);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(ProcessingConfig::from_lookup(lookup_from(&[(
            "STRAIGHTEN_EXIF_BUFFER_BYTES",
            "lots"
        )]))
        .is_err());
        assert!(ProcessingConfig::from_lookup(lookup_from(&[(
            "STRAIGHTEN_EXIF_BUFFER_BYTES",
            "8"
        )]))
        .is_err());
        assert!(ProcessingConfig::from_lookup(lookup_from(&[(
            "STRAIGHTEN_COPY_MARKERS",
            "some"
        )]))
        .is_err());
        assert!(ProcessingConfig::from_lookup(lookup_from(&[(
            "STRAIGHTEN_THUMBNAIL_ORIENTATION",
            "maybe"
        )]))
        .is_err());
        assert!(ProcessingConfig::from_lookup(lookup_from(&[(
            "STRAIGHTEN_MAX_COEFFICIENT_BYTES",
            "100"
        )]))
        .is_err());
    }

    #[test]
    fn test_marker_copy_keeps() {
        assert!(MarkerCopy::All.keeps(0xE1));
        assert!(MarkerCopy::All.keeps(0xFE));
        assert!(!MarkerCopy::All.keeps(0xDB));
        assert!(MarkerCopy::Comments.keeps(0xFE));
        assert!(!MarkerCopy::Comments.keeps(0xE0));
        assert!(!MarkerCopy::None.keeps(0xFE));
    }
}
