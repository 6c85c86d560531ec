//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the timing viewer.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Virtual playback time is seconds (f64) from the start of a recording
//! - Message timestamps are epoch seconds (f64), as published by timing services

mod envelope;
mod error;
mod service;
mod service_id;
mod session;
mod view_state;
mod viewer_config;

pub use envelope::{message_class, Envelope, WireMessage};
pub use error::*;
pub use service::*;
pub use service_id::ServiceId;
pub use session::{
    request_state_procedure, DeliveryCallback, LocalTimingSession, SubscriptionId, TimingSession,
};
pub use view_state::*;
pub use viewer_config::*;
