//! Session error types

use std::path::PathBuf;

use contracts::TimingError;
use thiserror::Error;

/// Session specific error
#[derive(Debug, Error)]
pub enum SessionError {
    /// Recording directory has no manifest
    #[error("{} contains no manifest.json, this is not a usable recording", path.display())]
    MissingManifest { path: PathBuf },

    /// Manifest predates the versioned format
    #[error("unversioned recording manifest is not supported")]
    MissingVersion,

    /// Manifest version this reader does not understand
    #[error("unknown recording version {0}")]
    UnsupportedVersion(i64),

    /// Recording without a single keyframe
    #[error("{} contains no keyframes", path.display())]
    NoKeyframes { path: PathBuf },

    /// Keyframe or intra-frame could not be read
    #[error("frame {frame}: {message}")]
    Frame { frame: u64, message: String },

    /// Diff operation could not be applied
    #[error("cannot apply diff: {message}")]
    Patch { message: String },

    /// Procedure not served by this session
    #[error("unknown procedure '{0}'")]
    UnknownProcedure(String),

    /// No state provider / recording for the service
    #[error("unknown service '{0}'")]
    UnknownService(String),

    /// Failure injected by a test
    #[error("injected failure: {0}")]
    Injected(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SessionError {
    pub fn patch(message: impl Into<String>) -> Self {
        Self::Patch {
            message: message.into(),
        }
    }

    pub fn frame(frame: u64, message: impl ToString) -> Self {
        Self::Frame {
            frame,
            message: message.to_string(),
        }
    }
}

impl From<SessionError> for TimingError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Io(e) => TimingError::Io(e),
            other => TimingError::session(other.to_string()),
        }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, SessionError>;
