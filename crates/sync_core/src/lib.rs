//! # Sync Core
//!
//! Synchronization core of the timing viewer.
//!
//! ## Data flow
//! ```text
//! session ──▶ SubscriptionManager ──▶ DelayBuffer ──────┐
//!                                                        ├──▶ reducer ──▶ ViewState
//! session ──▶ PlaybackScheduler ─────────────────────────┘
//! ```
//!
//! ## Concurrency
//! A single task owns the [`TimingCore`]. Session round-trips and timers run
//! as spawned tasks that only post [`CoreEvent`]s back to it, so no component
//! state is shared across tasks.
//!
//! ## Time
//! Component methods take an explicit `now` so they can be driven
//! deterministically with [`TimerDriver::manual`].

mod delay_buffer;
mod events;
mod gateway;
mod playback;
mod reducer;
mod runtime;
mod subscription;
mod timer;
mod timing_core;

pub use delay_buffer::{DelayBuffer, FlushBarrier, QueuedMessage};
pub use events::{CoreEvent, EventReceiver, EventSender, Intent, TimerKind};
pub use gateway::SessionGateway;
pub use playback::{PlaybackScheduler, PlaybackState};
pub use reducer::{apply, prepend_message, reset, SystemNotice};
pub use runtime::{CoreHandle, IntentSender};
pub use subscription::{LinkState, SubscriptionManager};
pub use timer::{CancelableTimer, TimerDriver};
pub use timing_core::{CoreStats, PlaybackView, TimingCore, ViewSnapshot};
