//! Events processed by the core's single event loop.

use contracts::{ServiceId, ServiceList, SubscriptionId, TimingError};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Sender half of the core's event queue
pub type EventSender = mpsc::UnboundedSender<CoreEvent>;

/// Receiver half of the core's event queue
pub type EventReceiver = mpsc::UnboundedReceiver<CoreEvent>;

/// External intents accepted at the presentation boundary
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    ChooseService(ServiceId),
    Seek(f64),
    SetDelay(u32),
    Play,
    Pause,
}

/// Which periodic timer fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    DelayRelease,
    PlaybackTick,
}

/// Everything that can wake the core
#[derive(Debug)]
pub enum CoreEvent {
    /// User intent from the renderer
    Intent(Intent),

    /// The externally maintained service directory changed
    DirectoryChanged(ServiceList),

    /// A publication arrived on the live subscription of `generation`
    Delivery {
        generation: u64,
        messages: Vec<Value>,
        arrived_at: Instant,
    },

    /// Subscribe call of `generation` completed
    Subscribed {
        generation: u64,
        result: Result<SubscriptionId, TimingError>,
    },

    /// Initial live snapshot of `generation` completed
    SnapshotFetched {
        generation: u64,
        arrived_at: Instant,
        result: Result<Value, TimingError>,
    },

    /// Time-indexed state request completed
    ///
    /// Not correlated with the request that produced it beyond the service:
    /// a slow response to an older seek is still applied.
    PlaybackFetched {
        service_id: ServiceId,
        time_seconds: f64,
        result: Result<Value, TimingError>,
    },

    /// A periodic timer fired
    Timer(TimerKind),

    /// Tear down and stop the loop
    Shutdown,
}
