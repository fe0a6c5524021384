//! Error types module
//!
//! Every fallible operation in the workspace returns [`ProcessingError`]. The
//! variants follow the failure categories of the orientation codec and the
//! lossless transform engine: I/O, malformed container data, out-of-range
//! offsets, unaligned geometry and JPEG stream problems.

use std::io;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like files without Exif data
    Debug,
    /// Warning level - for malformed or unsupported input
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Coarse category of a [`ProcessingError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Io,
    Format,
    Bounds,
    Geometry,
    Codec,
    Config,
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Format error: {0}")]
    Format(String),

    #[error("Offset {offset} with length {len} exceeds buffer limit {limit}")]
    Bounds { offset: usize, len: usize, limit: usize },

    #[error(
        "Image size {width}x{height} is not a multiple of the {block_width}x{block_height} block size"
    )]
    Geometry {
        width: u32,
        height: u32,
        block_width: u32,
        block_height: u32,
    },

    #[error("JPEG codec error: {0}")]
    Codec(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type ProcessingResult<T> = Result<T, ProcessingError>;

impl ProcessingError {
    pub fn format(message: impl Into<String>) -> Self {
        ProcessingError::Format(message.into())
    }

    pub fn codec(message: impl Into<String>) -> Self {
        ProcessingError::Codec(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ProcessingError::Io(_) => ErrorKind::Io,
            ProcessingError::Format(_) => ErrorKind::Format,
            ProcessingError::Bounds { .. } => ErrorKind::Bounds,
            ProcessingError::Geometry { .. } => ErrorKind::Geometry,
            ProcessingError::Codec(_) => ErrorKind::Codec,
            ProcessingError::Config(_) => ErrorKind::Config,
        }
    }

    /// Machine-readable error code (e.g., "FORMAT_ERROR")
    pub fn error_code(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Io => "IO_ERROR",
            ErrorKind::Format => "FORMAT_ERROR",
            ErrorKind::Bounds => "BOUNDS_ERROR",
            ErrorKind::Geometry => "GEOMETRY_ERROR",
            ErrorKind::Codec => "CODEC_ERROR",
            ErrorKind::Config => "CONFIG_ERROR",
        }
    }

    /// Log level for this error
    pub fn log_level(&self) -> LogLevel {
        match self.kind() {
            ErrorKind::Format | ErrorKind::Geometry => LogLevel::Debug,
            ErrorKind::Bounds | ErrorKind::Codec | ErrorKind::Config => LogLevel::Warn,
            ErrorKind::Io => LogLevel::Error,
        }
    }
}
