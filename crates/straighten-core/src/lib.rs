//! Straighten Core Library
//!
//! This crate provides the domain types, error types and configuration shared
//! by the orientation codec, the lossless transform engine and the CLI.

pub mod config;
pub mod error;
pub mod orientation;

// Re-export commonly used types
pub use config::{
    MarkerCopy, ProcessingConfig, ThumbnailPolicy, DEFAULT_EXIF_BUFFER_CAPACITY,
    DEFAULT_MAX_COEFFICIENT_BYTES,
};
pub use error::{ErrorKind, LogLevel, ProcessingError, ProcessingResult};
pub use orientation::{ImageTransformation, Orientation, OrientationMode, TransformCode};
