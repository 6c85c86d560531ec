//! Subscription lifecycle for the live service.
//!
//! ```text
//! Unbound ──bind──▶ Subscribing ──ack──▶ Active ◀──restore── Disconnected
//!    ▲                                     │                     ▲
//!    └────────────── unbind ───────────────┴──────── loss ───────┘
//! ```
//!
//! Each bind gets a generation number. Deliveries, snapshots and subscribe
//! acknowledgements carry the generation they were issued for; anything from
//! a superseded generation is dropped, and a late acknowledgement is
//! unsubscribed right away so no subscription outlives its binding.

use std::sync::Arc;

use contracts::{
    find_service, Service, ServiceId, SubscriptionId, SystemMessageConfig, TimingError,
    TimingSession, ViewState, ViewerConfig,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::events::EventSender;
use crate::gateway::SessionGateway;
use crate::reducer::{self, SystemNotice};

/// Link state of the live subscription
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    #[default]
    Unbound,
    Subscribing,
    Active,
    Disconnected,
}

pub struct SubscriptionManager<S> {
    gateway: SessionGateway<S>,
    notices: SystemMessageConfig,
    service: Option<Service>,
    state: LinkState,
    subscription: Option<SubscriptionId>,
    generation: u64,
    ack_pending: bool,
    available: bool,
    disconnected: bool,
}

impl<S> SubscriptionManager<S>
where
    S: TimingSession + Send + Sync + 'static,
{
    pub fn new(session: Arc<S>, events: EventSender, config: &ViewerConfig) -> Self {
        Self {
            gateway: SessionGateway::new(session, events, config.namespace.clone()),
            notices: config.messages.clone(),
            service: None,
            state: LinkState::Unbound,
            subscription: None,
            generation: 0,
            ack_pending: false,
            available: false,
            disconnected: true,
        }
    }

    /// Fetch the initial state of `service` and subscribe to its deltas
    ///
    /// Re-binding the bound service is a no-op, except after a failed
    /// subscribe where it issues a fresh attempt. Binding another service
    /// unbinds the current one first. Returns whether anything was issued.
    pub fn bind(&mut self, service: &Service) -> bool {
        if let Some(current) = &self.service {
            if current.id == service.id {
                let settled = match self.state {
                    LinkState::Active | LinkState::Disconnected => true,
                    LinkState::Subscribing => self.ack_pending,
                    LinkState::Unbound => false,
                };
                if settled {
                    debug!(service_id = %service.id, state = ?self.state, "already bound");
                    return false;
                }
            } else {
                self.unbind();
            }
        }

        self.available = true;
        self.issue(service.clone());
        true
    }

    /// Drop the subscription and forget the service; idempotent
    pub fn unbind(&mut self) {
        if self.state == LinkState::Unbound {
            return;
        }
        if let Some(subscription) = self.subscription.take() {
            self.gateway.unsubscribe(subscription);
        }
        self.generation += 1;
        self.ack_pending = false;
        self.state = LinkState::Unbound;
        self.disconnected = true;
        if let Some(service) = self.service.take() {
            info!(service_id = %service.id, "unbound");
        }
    }

    /// Result of the subscribe call issued for `generation`
    pub fn on_subscribed(&mut self, generation: u64, result: Result<SubscriptionId, TimingError>) {
        if generation != self.generation || self.state != LinkState::Subscribing {
            if let Ok(subscription) = result {
                debug!(%subscription, generation, "late acknowledgement, unsubscribing");
                self.gateway.unsubscribe(subscription);
            }
            return;
        }

        self.ack_pending = false;
        match result {
            Ok(subscription) => {
                self.subscription = Some(subscription);
                self.state = LinkState::Active;
                self.disconnected = false;
                info!(service_id = ?self.service_id(), %subscription, "subscription active");
            }
            Err(e) => {
                observability::record_failure("subscribe");
                warn!(service_id = ?self.service_id(), error = %e, "subscribe failed");
            }
        }
    }

    /// React to the bound service appearing in or leaving the directory
    ///
    /// Returns whether a transition happened.
    pub fn on_availability_change(
        &mut self,
        is_available: bool,
        view: &mut ViewState,
        epoch_seconds: f64,
    ) -> bool {
        let Some(service) = self.service.clone() else {
            return false;
        };
        if is_available == self.available {
            return false;
        }
        self.available = is_available;
        observability::record_availability_transition(&service.id, is_available);

        if is_available {
            self.issue(service);
            self.disconnected = false;
            reducer::prepend_message(
                view,
                SystemNotice::ServiceRestored.to_message(&self.notices, epoch_seconds),
            );
            info!(service_id = %self.service_id_or_empty(), "service restored, re-binding");
        } else {
            if let Some(subscription) = self.subscription.take() {
                self.gateway.unsubscribe(subscription);
            }
            self.generation += 1;
            self.ack_pending = false;
            self.state = LinkState::Disconnected;
            self.disconnected = true;
            reducer::prepend_message(
                view,
                SystemNotice::ServiceLost.to_message(&self.notices, epoch_seconds),
            );
            let error = TimingError::ServiceUnavailable {
                service_id: service.id.clone(),
            };
            warn!(error = %error, "disconnected");
        }
        true
    }

    /// Reconcile against a new directory listing
    pub fn on_directory(
        &mut self,
        services: &[Service],
        view: &mut ViewState,
        epoch_seconds: f64,
    ) -> bool {
        let Some(current) = &self.service else {
            return false;
        };
        let listed = find_service(services, &current.id);
        if let Some(record) = listed {
            if record != current {
                debug!(service_id = %record.id, "service record replaced");
                self.service = Some(record.clone());
            }
        }
        self.on_availability_change(listed.is_some(), view, epoch_seconds)
    }

    /// Whether traffic tagged with `generation` belongs to the current binding
    pub fn accepts(&self, generation: u64) -> bool {
        generation == self.generation
            && matches!(self.state, LinkState::Subscribing | LinkState::Active)
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn service(&self) -> Option<&Service> {
        self.service.as_ref()
    }

    pub fn service_id(&self) -> Option<&ServiceId> {
        self.service.as_ref().map(|s| &s.id)
    }

    pub fn subscription(&self) -> Option<SubscriptionId> {
        self.subscription
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    fn service_id_or_empty(&self) -> &str {
        self.service_id().map(|id| id.as_str()).unwrap_or("")
    }

    fn issue(&mut self, service: Service) {
        self.generation += 1;
        self.ack_pending = true;
        self.state = LinkState::Subscribing;
        self.gateway.fetch_snapshot(&service.id, self.generation);
        self.gateway.subscribe(&service.id, self.generation);
        info!(service_id = %service.id, generation = self.generation, "binding");
        self.service = Some(service);
    }
}
