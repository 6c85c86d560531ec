//! # Integration Tests
//!
//! End-to-end scenarios across crates.
//!
//! Covers:
//! - Live feeds through the delay buffer
//! - Subscription lifecycle against the service directory
//! - Playback of recorded services, in memory and from disk

#[cfg(test)]
mod support;

#[cfg(test)]
mod live_tests;

#[cfg(test)]
mod playback_tests;

#[cfg(test)]
mod recording_tests;
