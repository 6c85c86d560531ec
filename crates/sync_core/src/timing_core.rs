//! TimingCore - owns every component and reconciles them into one view.
//!
//! The core is driven by [`TimingCore::handle`], one event at a time, from a
//! single task. Live services flow through the subscription manager and the
//! delay buffer; recorded services through the playback scheduler. Either
//! way the reducer is the only writer of the view.

use std::sync::Arc;

use contracts::{
    find_service, CarRow, Envelope, Service, ServiceId, ServiceList, SessionInfo, StatePayload,
    TimingError, TimingMessage, TimingSession, ViewState, ViewerConfig,
};
use observability::HoldSummary;
use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::delay_buffer::DelayBuffer;
use crate::events::{CoreEvent, EventSender, Intent, TimerKind};
use crate::playback::PlaybackScheduler;
use crate::reducer::{self, SystemNotice};
use crate::subscription::{LinkState, SubscriptionManager};
use crate::timer::TimerDriver;

/// Read-only view published to the renderer
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ViewSnapshot {
    pub service: Option<Service>,
    pub cars: Vec<CarRow>,
    pub session: SessionInfo,
    pub messages: Vec<TimingMessage>,
    pub disconnected: bool,
    pub delay_seconds: u32,
    pub link: LinkState,
    pub playback: Option<PlaybackView>,
}

/// Playback position as shown to the renderer
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlaybackView {
    pub virtual_time_seconds: f64,
    pub duration_seconds: f64,
    pub playing: bool,
}

/// Counters kept by the core
#[derive(Debug, Clone, Default)]
pub struct CoreStats {
    pub events: u64,
    pub deliveries: u64,
    pub stale_deliveries: u64,
    pub decode_failures: u64,
    pub snapshots: u64,
    pub playback_frames: u64,
    pub failures: u64,
    pub directory_updates: u64,
    /// Payloads released by the delay buffer
    pub released: u64,
    /// Time payloads spent in the delay buffer, in milliseconds
    pub hold_ms: HoldSummary,
}

pub struct TimingCore<S> {
    session: Arc<S>,
    config: ViewerConfig,
    events: EventSender,
    timers: TimerDriver,
    directory: ServiceList,
    /// Service chosen before the directory listed it
    pending: Option<ServiceId>,
    view: ViewState,
    subscription: SubscriptionManager<S>,
    delay: DelayBuffer,
    playback: Option<PlaybackScheduler<S>>,
    stats: CoreStats,
}

impl<S> TimingCore<S>
where
    S: TimingSession + Send + Sync + 'static,
{
    pub fn new(
        session: Arc<S>,
        config: ViewerConfig,
        events: EventSender,
        timers: TimerDriver,
    ) -> Self {
        let subscription = SubscriptionManager::new(Arc::clone(&session), events.clone(), &config);
        let delay = DelayBuffer::new(&config.delay, timers.clone());
        Self {
            session,
            config,
            events,
            timers,
            directory: Vec::new(),
            pending: None,
            view: ViewState::default(),
            subscription,
            delay,
            playback: None,
            stats: CoreStats::default(),
        }
    }

    /// Process one event; returns `false` once the core has shut down
    pub fn handle(&mut self, event: CoreEvent, now: Instant) -> bool {
        self.stats.events += 1;
        match event {
            CoreEvent::Intent(intent) => self.on_intent(intent, now),
            CoreEvent::DirectoryChanged(services) => self.update_directory(services, now),
            CoreEvent::Delivery {
                generation,
                messages,
                arrived_at,
            } => self.on_delivery(generation, messages, arrived_at, now),
            CoreEvent::Subscribed { generation, result } => {
                if result.is_err() {
                    self.stats.failures += 1;
                }
                self.subscription.on_subscribed(generation, result);
            }
            CoreEvent::SnapshotFetched {
                generation,
                arrived_at,
                result,
            } => self.on_snapshot(generation, arrived_at, result),
            CoreEvent::PlaybackFetched {
                service_id,
                time_seconds,
                result,
            } => self.on_playback_fetched(&service_id, time_seconds, result),
            CoreEvent::Timer(TimerKind::DelayRelease) => {
                if self.playback.is_none() {
                    self.delay.on_tick(now, &mut self.view);
                }
            }
            CoreEvent::Timer(TimerKind::PlaybackTick) => {
                if let Some(playback) = self.playback.as_mut() {
                    playback.tick(now);
                }
            }
            CoreEvent::Shutdown => {
                self.teardown();
                return false;
            }
        }
        true
    }

    fn on_intent(&mut self, intent: Intent, now: Instant) {
        match intent {
            Intent::ChooseService(id) => self.choose_service(&id, now),
            Intent::Seek(time_seconds) => match self.playback.as_mut() {
                Some(playback) => {
                    playback.seek(time_seconds, now);
                }
                None => debug!(time_seconds, "seek ignored, not in playback"),
            },
            Intent::SetDelay(seconds) => {
                if self.playback.is_some() {
                    debug!(seconds, "delay ignored in playback");
                    return;
                }
                self.delay.set_delay(seconds, now, &mut self.view);
            }
            Intent::Play => match self.playback.as_mut() {
                Some(playback) => {
                    playback.play(now);
                }
                None => debug!("play ignored, not in playback"),
            },
            Intent::Pause => match self.playback.as_mut() {
                Some(playback) => {
                    playback.pause(now);
                }
                None => debug!("pause ignored, not in playback"),
            },
        }
    }

    /// Switch to another service
    ///
    /// A service the directory does not list yet is remembered and bound as
    /// soon as a listing includes it.
    #[instrument(skip_all, fields(service_id = %id))]
    pub fn choose_service(&mut self, id: &ServiceId, now: Instant) {
        let Some(service) = find_service(&self.directory, id).cloned() else {
            if self.pending.as_ref() != Some(id) {
                info!("service not listed yet, waiting for the directory");
                self.release_service();
                self.pending = Some(id.clone());
            }
            return;
        };
        self.pending = None;
        if self.current_service().map(|s| &s.id) == Some(id) {
            debug!("service already selected");
            return;
        }

        self.release_service();

        if service.is_recorded() {
            info!(
                name = %service.name,
                duration_seconds = ?service.duration_seconds,
                "recorded service selected"
            );
            let mut playback = PlaybackScheduler::new(
                Arc::clone(&self.session),
                service,
                self.events.clone(),
                self.timers.clone(),
                &self.config,
                now,
            );
            self.delay.set_delay(0, now, &mut self.view);
            playback.seek(0.0, now);
            self.playback = Some(playback);
        } else {
            info!(name = %service.name, "live service selected");
            self.delay
                .set_delay(self.config.delay.initial_seconds, now, &mut self.view);
            self.subscription.bind(&service);
        }
    }

    /// Replace the mirror of the service directory
    pub fn update_directory(&mut self, services: ServiceList, now: Instant) {
        self.stats.directory_updates += 1;
        debug!(services = services.len(), "directory updated");
        self.directory = services;
        self.subscription
            .on_directory(&self.directory, &mut self.view, epoch_seconds());

        let listed = self
            .pending
            .as_ref()
            .and_then(|id| find_service(&self.directory, id))
            .cloned();
        if let Some(service) = listed {
            self.choose_service(&service.id, now);
            if !service.is_recorded() {
                reducer::prepend_message(
                    &mut self.view,
                    SystemNotice::ServiceRestored.to_message(&self.config.messages, epoch_seconds()),
                );
            }
        }
    }

    fn on_delivery(
        &mut self,
        generation: u64,
        messages: Vec<Value>,
        arrived_at: Instant,
        now: Instant,
    ) {
        if !self.subscription.accepts(generation) {
            self.stats.stale_deliveries += 1;
            debug!(generation, "delivery for superseded binding dropped");
            return;
        }
        self.stats.deliveries += 1;
        if let Some(id) = self.subscription.service_id() {
            observability::record_delivery_received(id, messages.len());
        }

        for raw in messages {
            match Envelope::decode(raw) {
                Ok(Envelope::StateDelta(payload)) => {
                    self.delay.push(payload, arrived_at, &mut self.view);
                }
                Ok(Envelope::ControlUpdate(services)) => self.update_directory(services, now),
                Err(e) => {
                    self.stats.decode_failures += 1;
                    let reason = match e {
                        TimingError::UnsupportedMessageClass(_) => "unsupported_class",
                        _ => "payload",
                    };
                    observability::record_decode_failure(reason);
                    warn!(error = %e, "skipping undecodable message");
                }
            }
        }
    }

    fn on_snapshot(
        &mut self,
        generation: u64,
        arrived_at: Instant,
        result: Result<Value, TimingError>,
    ) {
        if !self.subscription.accepts(generation) {
            debug!(generation, "snapshot for superseded binding dropped");
            return;
        }
        let payload = result.and_then(|value| {
            serde_json::from_value::<StatePayload>(value).map_err(TimingError::from)
        });
        match payload {
            Ok(payload) => {
                self.stats.snapshots += 1;
                self.delay.push(payload, arrived_at, &mut self.view);
            }
            Err(e) => {
                self.stats.failures += 1;
                observability::record_failure("request");
                warn!(error = %e, "initial state request failed");
            }
        }
    }

    fn on_playback_fetched(
        &mut self,
        service_id: &ServiceId,
        time_seconds: f64,
        result: Result<Value, TimingError>,
    ) {
        let Some(playback) = self.playback.as_mut() else {
            debug!(%service_id, "playback response without playback");
            return;
        };
        if &playback.service().id != service_id {
            debug!(%service_id, "playback response for another service dropped");
            return;
        }
        if playback.on_fetched(time_seconds, result, &mut self.view) {
            self.stats.playback_frames += 1;
        } else {
            self.stats.failures += 1;
        }
    }

    fn release_service(&mut self) {
        self.pending = None;
        self.subscription.unbind();
        self.delay.clear();
        self.playback = None;
        reducer::reset(&mut self.view);
    }

    /// Cancel every timer and subscription
    pub fn teardown(&mut self) {
        self.release_service();
        info!(events = self.stats.events, "timing core torn down");
    }

    pub fn current_service(&self) -> Option<&Service> {
        match &self.playback {
            Some(playback) => Some(playback.service()),
            None => self.subscription.service(),
        }
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn directory(&self) -> &[Service] {
        &self.directory
    }

    /// Service waiting to appear in the directory
    pub fn pending_service(&self) -> Option<&ServiceId> {
        self.pending.as_ref()
    }

    pub fn subscription(&self) -> &SubscriptionManager<S> {
        &self.subscription
    }

    pub fn delay_buffer(&self) -> &DelayBuffer {
        &self.delay
    }

    pub fn playback(&self) -> Option<&PlaybackScheduler<S>> {
        self.playback.as_ref()
    }

    /// What the renderer should show right now
    pub fn snapshot(&self) -> ViewSnapshot {
        let playback = self.playback.as_ref().map(|p| PlaybackView {
            virtual_time_seconds: p.virtual_time(),
            duration_seconds: p.duration(),
            playing: p.is_playing(),
        });
        ViewSnapshot {
            service: self.current_service().cloned(),
            cars: self.view.cars.clone(),
            session: self.view.session.clone(),
            messages: self.view.messages.clone(),
            disconnected: self.pending.is_some()
                || (self.playback.is_none()
                    && self.subscription.service().is_some()
                    && self.subscription.is_disconnected()),
            delay_seconds: self.delay.delay_seconds(),
            link: self.subscription.state(),
            playback,
        }
    }

    pub fn stats(&self) -> CoreStats {
        CoreStats {
            released: self.delay.released(),
            hold_ms: self.delay.hold_stats().summary(),
            ..self.stats.clone()
        }
    }
}

/// Wall-clock epoch seconds, used to stamp synthetic messages
fn epoch_seconds() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventReceiver;
    use serde_json::json;
    use std::time::Duration;
    use timing_session::MemorySession;
    use tokio::sync::mpsc;

    struct Harness {
        session: Arc<MemorySession>,
        core: TimingCore<MemorySession>,
        rx: EventReceiver,
    }

    impl Harness {
        fn new() -> Self {
            let session = Arc::new(MemorySession::new());
            session.set_state("live", json!({"cars": [["snapshot"]]}));
            session.set_provider("rec", |time| {
                json!({"session": {"timeElapsed": time.unwrap_or(0.0)}})
            });
            let (tx, rx) = mpsc::unbounded_channel();
            let mut core = TimingCore::new(
                Arc::clone(&session),
                ViewerConfig::default(),
                tx,
                TimerDriver::manual(),
            );
            core.update_directory(
                vec![
                    Service::live("live", "Live"),
                    Service::recorded("rec", "Recording", 100.0),
                ],
                Instant::now(),
            );
            Self { session, core, rx }
        }

        /// Feed queued events back into the core until it goes quiet
        async fn pump(&mut self, now: Instant) {
            for _ in 0..8 {
                tokio::task::yield_now().await;
                while let Ok(event) = self.rx.try_recv() {
                    self.core.handle(event, now);
                }
            }
        }
    }

    fn delta(tag: &str) -> Value {
        json!({"msgClass": 4, "payload": {"cars": [[tag]]}})
    }

    fn first_car(core: &TimingCore<MemorySession>) -> Option<String> {
        core.view()
            .cars
            .first()
            .and_then(|row| row.number())
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }

    #[tokio::test]
    async fn test_live_choice_applies_snapshot_and_deltas() {
        let mut h = Harness::new();
        let now = Instant::now();

        h.core.choose_service(&ServiceId::from("live"), now);
        h.pump(now).await;
        assert_eq!(h.core.subscription().state(), LinkState::Active);
        assert_eq!(first_car(&h.core).as_deref(), Some("snapshot"));

        h.session.publish("live", vec![delta("A"), json!({"msgClass": 9})]);
        h.pump(now).await;
        assert_eq!(first_car(&h.core).as_deref(), Some("A"));
        assert_eq!(h.core.stats().decode_failures, 1);
        assert!(!h.core.snapshot().disconnected);
    }

    #[tokio::test]
    async fn test_control_update_replaces_directory() {
        let mut h = Harness::new();
        let now = Instant::now();
        h.core.choose_service(&ServiceId::from("live"), now);
        h.pump(now).await;

        let listing = json!({"msgClass": 5, "payload": [{"uuid": "live", "name": "Live"}]});
        h.session.publish("live", vec![listing]);
        h.pump(now).await;

        assert_eq!(h.core.directory().len(), 1);
        assert_eq!(h.core.subscription().state(), LinkState::Active);
    }

    #[tokio::test]
    async fn test_directory_loss_notifies_once() {
        let mut h = Harness::new();
        let now = Instant::now();
        h.core.choose_service(&ServiceId::from("live"), now);
        h.pump(now).await;

        let without_live = vec![Service::recorded("rec", "Recording", 100.0)];
        h.core.update_directory(without_live.clone(), now);
        h.core.update_directory(without_live, now);
        h.pump(now).await;

        let snapshot = h.core.snapshot();
        assert!(snapshot.disconnected);
        assert_eq!(snapshot.link, LinkState::Disconnected);
        let lost = snapshot
            .messages
            .iter()
            .filter(|m| m.text == "Service no longer available")
            .count();
        assert_eq!(lost, 1);
        assert_eq!(h.session.active_subscriptions("live"), 0);
    }

    #[tokio::test]
    async fn test_recorded_choice_seeks_to_start() {
        let mut h = Harness::new();
        let now = Instant::now();

        h.core.choose_service(&ServiceId::from("rec"), now);
        h.pump(now).await;

        let snapshot = h.core.snapshot();
        let playback = snapshot.playback.expect("playback view");
        assert_eq!(playback.virtual_time_seconds, 0.0);
        assert_eq!(playback.duration_seconds, 100.0);
        assert_eq!(snapshot.link, LinkState::Unbound);
        assert_eq!(h.session.subscribe_calls(), 0);

        // Delay intents do nothing for recordings
        h.core.handle(CoreEvent::Intent(Intent::SetDelay(30)), now);
        assert_eq!(h.core.snapshot().delay_seconds, 0);

        h.core.handle(CoreEvent::Intent(Intent::Seek(55.0)), now);
        h.pump(now).await;
        assert_eq!(h.core.view().session.time_elapsed_seconds, 55.0);
    }

    #[tokio::test]
    async fn test_switching_services_releases_previous() {
        let mut h = Harness::new();
        let now = Instant::now();
        h.core.choose_service(&ServiceId::from("live"), now);
        h.pump(now).await;
        h.core.handle(CoreEvent::Intent(Intent::SetDelay(10)), now);
        assert!(h.core.delay_buffer().is_armed());

        h.core.choose_service(&ServiceId::from("rec"), now);
        h.pump(now).await;

        assert_eq!(h.session.active_subscriptions("live"), 0);
        assert!(!h.core.delay_buffer().is_armed());
        assert!(h.core.playback().is_some());
        assert_eq!(h.core.snapshot().delay_seconds, 0);

        // Publications for the old binding no longer reach the view
        h.session.publish("live", vec![delta("late")]);
        h.pump(now).await;
        assert_ne!(first_car(&h.core).as_deref(), Some("late"));
    }

    #[tokio::test]
    async fn test_unlisted_choice_binds_once_listed() {
        let mut h = Harness::new();
        let now = Instant::now();
        h.session.set_state("late", json!({"cars": [["late"]]}));

        h.core.choose_service(&ServiceId::from("late"), now);
        assert!(h.core.current_service().is_none());
        assert_eq!(h.core.pending_service().map(|id| id.as_str()), Some("late"));
        assert!(h.core.snapshot().disconnected);

        // Listings without it change nothing
        h.core.update_directory(vec![Service::live("live", "Live")], now);
        h.pump(now).await;
        assert_eq!(h.session.subscribe_calls(), 0);

        h.core.update_directory(vec![Service::live("late", "Late")], now);
        assert!(h.core.pending_service().is_none());
        assert_eq!(h.core.view().messages[0].text, "Service now available");
        h.pump(now).await;

        let snapshot = h.core.snapshot();
        assert_eq!(snapshot.link, LinkState::Active);
        assert!(!snapshot.disconnected);
        assert_eq!(first_car(&h.core).as_deref(), Some("late"));
        assert_eq!(h.session.subscribe_calls(), 1);
    }

    #[tokio::test]
    async fn test_listed_choice_replaces_pending() {
        let mut h = Harness::new();
        let now = Instant::now();
        h.core.choose_service(&ServiceId::from("late"), now);
        h.core.choose_service(&ServiceId::from("rec"), now);
        assert!(h.core.pending_service().is_none());

        h.core.update_directory(vec![Service::live("late", "Late")], now);
        h.pump(now).await;
        assert_eq!(h.session.subscribe_calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_playback_fetch_keeps_time() {
        let mut h = Harness::new();
        let now = Instant::now();
        h.core.choose_service(&ServiceId::from("rec"), now);
        h.pump(now).await;
        h.core.handle(CoreEvent::Intent(Intent::Seek(30.0)), now);
        h.pump(now).await;

        h.session.fail_next_call("gone");
        h.core.handle(CoreEvent::Intent(Intent::Seek(80.0)), now);
        h.pump(now).await;

        let snapshot = h.core.snapshot();
        assert_eq!(snapshot.playback.map(|p| p.virtual_time_seconds), Some(30.0));
        assert_eq!(snapshot.session.time_elapsed_seconds, 30.0);
        assert_eq!(h.core.stats().failures, 1);
    }

    #[tokio::test]
    async fn test_delay_release_timer_event() {
        let mut h = Harness::new();
        let t0 = Instant::now();
        h.core.choose_service(&ServiceId::from("live"), t0);
        h.core.handle(CoreEvent::Intent(Intent::SetDelay(5)), t0);
        h.pump(t0).await;
        // Snapshot is held too
        assert!(h.core.view().cars.is_empty());

        h.core
            .handle(CoreEvent::Timer(TimerKind::DelayRelease), t0 + Duration::from_secs(6));
        assert_eq!(first_car(&h.core).as_deref(), Some("snapshot"));
    }

    #[tokio::test]
    async fn test_shutdown_tears_down() {
        let mut h = Harness::new();
        let now = Instant::now();
        h.core.choose_service(&ServiceId::from("live"), now);
        h.pump(now).await;

        assert!(!h.core.handle(CoreEvent::Shutdown, now));
        h.pump(now).await;
        assert_eq!(h.core.subscription().state(), LinkState::Unbound);
        assert_eq!(h.session.active_subscriptions("live"), 0);
    }
}
