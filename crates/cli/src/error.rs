//! Error types for CLI operations.

use std::path::PathBuf;

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {}", path.display())]
    ConfigNotFound { path: PathBuf },

    /// Recording directory not found
    #[error("Recording directory not found: {}", path.display())]
    RecordingNotFound { path: PathBuf },

    /// Command-line overrides produced an invalid configuration
    #[error("Invalid override: {0}")]
    InvalidOverride(#[from] contracts::TimingError),
}

impl CliError {
    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn recording_not_found(path: impl Into<PathBuf>) -> Self {
        Self::RecordingNotFound { path: path.into() }
    }
}
