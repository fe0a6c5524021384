use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use straighten_core::{LogLevel, ProcessingError};
use straighten_processing::AutoOrientOutcome;

/// Result line for one file of a batch command.
#[derive(Debug, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<AutoOrientOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
}

impl FileReport {
    pub fn from_result(path: &Path, result: Result<AutoOrientOutcome, ProcessingError>) -> Self {
        match result {
            Ok(outcome) => Self {
                path: path.to_path_buf(),
                outcome: Some(outcome),
                error: None,
                error_code: None,
            },
            Err(err) => {
                log_failure(path, &err);
                Self {
                    path: path.to_path_buf(),
                    outcome: None,
                    error: Some(err.to_string()),
                    error_code: Some(err.error_code()),
                }
            }
        }
    }

    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Log a per-file failure at the level its category calls for.
pub fn log_failure(path: &Path, err: &ProcessingError) {
    match err.log_level() {
        LogLevel::Debug => tracing::debug!(path = %path.display(), error = %err, "Skipped file"),
        LogLevel::Warn => tracing::warn!(path = %path.display(), error = %err, "Skipped file"),
        LogLevel::Error => tracing::error!(path = %path.display(), error = %err, "Failed to process file"),
    }
}

/// Move a finished temp file to `target`. Both must live on the same
/// filesystem; the engine is pointed at the target's directory for that.
pub fn move_into_place(temp: &Path, target: &Path) -> std::io::Result<()> {
    if let Err(err) = fs::rename(temp, target) {
        if let Err(cleanup) = fs::remove_file(temp) {
            tracing::warn!(path = %temp.display(), error = %cleanup, "Failed to remove temporary file");
        }
        return Err(err);
    }
    Ok(())
}

/// Directory an output path will be written into.
pub fn output_dir(target: &Path) -> PathBuf {
    match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Initialize tracing for the CLI binary.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
