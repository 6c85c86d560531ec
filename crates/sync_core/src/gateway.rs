//! Session gateway.
//!
//! Every round-trip against the session runs as a spawned task whose only
//! side effect is posting a [`CoreEvent`] back into the event loop.

use std::sync::Arc;

use contracts::{
    request_state_procedure, DeliveryCallback, ServiceId, SubscriptionId, TimingError,
    TimingSession,
};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::events::{CoreEvent, EventSender};

pub struct SessionGateway<S> {
    session: Arc<S>,
    events: EventSender,
    namespace: String,
}

impl<S> Clone for SessionGateway<S> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            events: self.events.clone(),
            namespace: self.namespace.clone(),
        }
    }
}

impl<S> SessionGateway<S>
where
    S: TimingSession + Send + Sync + 'static,
{
    pub fn new(session: Arc<S>, events: EventSender, namespace: impl Into<String>) -> Self {
        Self {
            session,
            events,
            namespace: namespace.into(),
        }
    }

    pub fn procedure(&self, service_id: &ServiceId) -> String {
        request_state_procedure(&self.namespace, service_id)
    }

    /// Fetch the current live state; posts [`CoreEvent::SnapshotFetched`]
    pub fn fetch_snapshot(&self, service_id: &ServiceId, generation: u64) {
        let session = Arc::clone(&self.session);
        let events = self.events.clone();
        let procedure = self.procedure(service_id);

        tokio::spawn(async move {
            let result = session
                .call(&procedure, Vec::new())
                .await
                .map_err(|e| request_error(&procedure, e));
            let _ = events.send(CoreEvent::SnapshotFetched {
                generation,
                arrived_at: Instant::now(),
                result,
            });
        });
    }

    /// Fetch the state at a virtual time; posts [`CoreEvent::PlaybackFetched`]
    pub fn fetch_at(&self, service_id: &ServiceId, time_seconds: f64) {
        let session = Arc::clone(&self.session);
        let events = self.events.clone();
        let procedure = self.procedure(service_id);
        let service_id = service_id.clone();

        tokio::spawn(async move {
            let result = session
                .call(&procedure, vec![Value::from(time_seconds)])
                .await
                .map_err(|e| TimingError::PlaybackFetchFailure {
                    service_id: service_id.clone(),
                    time_seconds,
                    message: e.to_string(),
                });
            let _ = events.send(CoreEvent::PlaybackFetched {
                service_id,
                time_seconds,
                result,
            });
        });
    }

    /// Subscribe to the service's live topic
    ///
    /// Deliveries are tagged with `generation` so the core can drop those of a
    /// superseded binding. Posts [`CoreEvent::Subscribed`] once acknowledged.
    pub fn subscribe(&self, service_id: &ServiceId, generation: u64) {
        let session = Arc::clone(&self.session);
        let events = self.events.clone();
        let service_id = service_id.clone();

        let delivery_events = self.events.clone();
        let handler: DeliveryCallback = Arc::new(move |messages: Vec<Value>| {
            let _ = delivery_events.send(CoreEvent::Delivery {
                generation,
                messages,
                arrived_at: Instant::now(),
            });
        });

        tokio::spawn(async move {
            let result = session
                .subscribe(&service_id, handler)
                .await
                .map_err(|e| match e {
                    TimingError::SubscriptionFailure { .. } => e,
                    other => TimingError::subscription(service_id.clone(), other.to_string()),
                });
            let _ = events.send(CoreEvent::Subscribed { generation, result });
        });
    }

    /// Fire-and-forget unsubscribe
    pub fn unsubscribe(&self, subscription: SubscriptionId) {
        let session = Arc::clone(&self.session);
        tokio::spawn(async move {
            match session.unsubscribe(subscription).await {
                Ok(()) => debug!(%subscription, "unsubscribed"),
                Err(e) => warn!(%subscription, error = %e, "unsubscribe failed"),
            }
        });
    }
}

fn request_error(procedure: &str, err: TimingError) -> TimingError {
    match err {
        TimingError::RequestFailure { .. } => err,
        other => TimingError::request(procedure, other.to_string()),
    }
}
