//! TimingSession trait - publish/subscribe session abstraction
//!
//! The transport itself is owned by the host. The synchronization core only
//! borrows it through this trait to issue calls and manage one subscription
//! at a time.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::{ServiceId, TimingError};

/// Delivery callback type
///
/// Receives the raw wire messages of one publication (a publication may
/// carry several messages).
pub type DeliveryCallback = Arc<dyn Fn(Vec<Value>) + Send + Sync>;

/// Handle of an established subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// Remote procedure returning the state of a service
pub fn request_state_procedure(namespace: &str, service_id: &ServiceId) -> String {
    format!("{namespace}.requestState.{service_id}")
}

/// Connected publish/subscribe session
#[trait_variant::make(TimingSession: Send)]
pub trait LocalTimingSession {
    /// Invoke a remote procedure
    ///
    /// # Errors
    /// Returns the rejection reported by the callee or the transport
    async fn call(&self, procedure: &str, args: Vec<Value>) -> Result<Value, TimingError>;

    /// Subscribe `handler` to `topic`
    async fn subscribe(
        &self,
        topic: &str,
        handler: DeliveryCallback,
    ) -> Result<SubscriptionId, TimingError>;

    /// Drop a subscription; unknown handles are ignored
    async fn unsubscribe(&self, subscription: SubscriptionId) -> Result<(), TimingError>;
}
