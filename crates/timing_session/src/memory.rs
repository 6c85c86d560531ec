//! In-process publish/subscribe session.
//!
//! Routes `publish(topic, messages)` to the handlers subscribed to `topic`
//! and answers `requestState` calls from registered state providers.
//! Failures and per-request latency can be injected.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use contracts::{DeliveryCallback, Envelope, SubscriptionId, TimingError, TimingSession};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, instrument, trace};

use crate::error::SessionError;
use crate::requested_service;

/// Produces the state of a service; the argument is the requested virtual
/// time, if any
pub type StateProvider = Arc<dyn Fn(Option<f64>) -> Value + Send + Sync>;

#[derive(Default)]
struct Router {
    providers: HashMap<String, StateProvider>,
    subscriptions: HashMap<u64, (String, DeliveryCallback)>,
    next_subscription: u64,
    subscribe_calls: usize,
    unsubscribe_calls: usize,
    calls: Vec<(String, Vec<Value>)>,
    fail_subscribe: VecDeque<String>,
    fail_call: VecDeque<String>,
    latency: Vec<(f64, Duration)>,
}

/// In-memory [`TimingSession`]
pub struct MemorySession {
    namespace: String,
    router: Mutex<Router>,
}

impl MemorySession {
    /// Session answering under the default `livetiming.service` namespace
    pub fn new() -> Self {
        Self::with_namespace("livetiming.service")
    }

    pub fn with_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            router: Mutex::new(Router::default()),
        }
    }

    /// Answer every state request for `service_id` with `state`
    pub fn set_state(&self, service_id: &str, state: Value) {
        self.set_provider(service_id, move |_| state.clone());
    }

    /// Answer state requests for `service_id` from `provider`
    pub fn set_provider<F>(&self, service_id: &str, provider: F)
    where
        F: Fn(Option<f64>) -> Value + Send + Sync + 'static,
    {
        self.router
            .lock()
            .providers
            .insert(service_id.to_string(), Arc::new(provider));
    }

    /// Deliver one publication to every subscriber of `topic`
    ///
    /// Returns the number of handlers reached.
    pub fn publish(&self, topic: &str, messages: Vec<Value>) -> usize {
        let handlers: Vec<DeliveryCallback> = self
            .router
            .lock()
            .subscriptions
            .values()
            .filter(|(t, _)| t == topic)
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        for handler in &handlers {
            handler(messages.clone());
        }
        trace!(topic, messages = messages.len(), receivers = handlers.len(), "published");
        handlers.len()
    }

    /// Encode an envelope and publish it alone
    pub fn publish_envelope(
        &self,
        topic: &str,
        envelope: &Envelope,
    ) -> Result<usize, TimingError> {
        let wire = serde_json::to_value(envelope.to_wire()?)?;
        Ok(self.publish(topic, vec![wire]))
    }

    /// Make the next subscribe call fail
    pub fn fail_next_subscribe(&self, message: impl Into<String>) {
        self.router.lock().fail_subscribe.push_back(message.into());
    }

    /// Make the next call fail
    pub fn fail_next_call(&self, message: impl Into<String>) {
        self.router.lock().fail_call.push_back(message.into());
    }

    /// Hold time-indexed requests for `time_seconds` back by `latency`
    pub fn delay_requests_at(&self, time_seconds: f64, latency: Duration) {
        self.router.lock().latency.push((time_seconds, latency));
    }

    pub fn subscribe_calls(&self) -> usize {
        self.router.lock().subscribe_calls
    }

    pub fn unsubscribe_calls(&self) -> usize {
        self.router.lock().unsubscribe_calls
    }

    /// Live subscriptions on `topic`
    pub fn active_subscriptions(&self, topic: &str) -> usize {
        self.router
            .lock()
            .subscriptions
            .values()
            .filter(|(t, _)| t == topic)
            .count()
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<(String, Vec<Value>)> {
        self.router.lock().calls.clone()
    }

    fn resolve(
        &self,
        procedure: &str,
        args: &[Value],
    ) -> Result<(StateProvider, Option<Duration>), SessionError> {
        let mut router = self.router.lock();
        router.calls.push((procedure.to_string(), args.to_vec()));

        if let Some(message) = router.fail_call.pop_front() {
            return Err(SessionError::Injected(message));
        }
        let id = requested_service(&self.namespace, procedure)
            .ok_or_else(|| SessionError::UnknownProcedure(procedure.to_string()))?;
        let provider = router
            .providers
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::UnknownService(id.to_string()))?;

        let time = args.first().and_then(Value::as_f64);
        let latency = time.and_then(|t| {
            router
                .latency
                .iter()
                .find(|(at, _)| *at == t)
                .map(|(_, latency)| *latency)
        });
        Ok((provider, latency))
    }
}

impl Default for MemorySession {
    fn default() -> Self {
        Self::new()
    }
}

impl TimingSession for MemorySession {
    #[instrument(name = "memory_session_call", skip(self, args))]
    async fn call(&self, procedure: &str, args: Vec<Value>) -> Result<Value, TimingError> {
        let (provider, latency) = self
            .resolve(procedure, &args)
            .map_err(|e| TimingError::request(procedure, e.to_string()))?;

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        Ok(provider(args.first().and_then(Value::as_f64)))
    }

    #[instrument(name = "memory_session_subscribe", skip(self, handler))]
    async fn subscribe(
        &self,
        topic: &str,
        handler: DeliveryCallback,
    ) -> Result<SubscriptionId, TimingError> {
        let mut router = self.router.lock();
        router.subscribe_calls += 1;

        if let Some(message) = router.fail_subscribe.pop_front() {
            return Err(TimingError::subscription(
                topic.into(),
                SessionError::Injected(message).to_string(),
            ));
        }

        router.next_subscription += 1;
        let id = router.next_subscription;
        router.subscriptions.insert(id, (topic.to_string(), handler));
        debug!(topic, subscription = id, "subscribed");
        Ok(SubscriptionId(id))
    }

    async fn unsubscribe(&self, subscription: SubscriptionId) -> Result<(), TimingError> {
        let mut router = self.router.lock();
        router.unsubscribe_calls += 1;
        router.subscriptions.remove(&subscription.0);
        Ok(())
    }
}
