//! # Timing Session
//!
//! `TimingSession` implementations the core can run against.
//!
//! - [`MemorySession`]: in-process publish/subscribe router with failure
//!   injection, used by tests and the live demo
//! - [`RecordingSession`]: serves time-indexed state out of directory-backed
//!   recordings (manifest + keyframes + intra-frames)

pub mod error;
pub mod memory;
pub mod patch;
pub mod recording;

pub use error::{Result, SessionError};
pub use memory::{MemorySession, StateProvider};
pub use patch::apply_diff;
pub use recording::{frame_file_name, DirectoryRecording, RecordingSession, MAX_MESSAGES};

/// Service id addressed by a `<namespace>.requestState.<id>` procedure
pub(crate) fn requested_service<'a>(namespace: &str, procedure: &'a str) -> Option<&'a str> {
    procedure
        .strip_prefix(namespace)?
        .strip_prefix(".requestState.")
        .filter(|id| !id.is_empty())
}
