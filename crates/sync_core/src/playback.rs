//! Virtual-time playback of a recorded service.
//!
//! The ticker fires every `tick_interval`; a step of virtual time is taken
//! once `step` of wall time has passed since the last frame, so a slow or
//! bursty ticker never advances more than one step per firing.
//!
//! Virtual time moves as soon as a request is issued. If the request for the
//! current time fails, it falls back to the time of the last applied frame so
//! the clock and the shown state stay in step.

use std::sync::Arc;
use std::time::Duration;

use contracts::{Service, StatePayload, TimingError, TimingSession, ViewState, ViewerConfig};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::events::{EventSender, TimerKind};
use crate::gateway::SessionGateway;
use crate::reducer;
use crate::timer::{CancelableTimer, TimerDriver};

/// Virtual clock
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackState {
    pub virtual_time_seconds: f64,
    pub playing: bool,
    /// When the last step (or seek, or resume point) happened
    pub last_frame: Instant,
}

pub struct PlaybackScheduler<S> {
    gateway: SessionGateway<S>,
    service: Service,
    timers: TimerDriver,
    tick_interval: Duration,
    step: Duration,
    state: PlaybackState,
    /// Virtual time of the last frame applied for the then-current time
    committed_seconds: f64,
    paused_progress: Duration,
    ticker: Option<CancelableTimer>,
    requests: u64,
}

impl<S> PlaybackScheduler<S>
where
    S: TimingSession + Send + Sync + 'static,
{
    pub fn new(
        session: Arc<S>,
        service: Service,
        events: EventSender,
        timers: TimerDriver,
        config: &ViewerConfig,
        now: Instant,
    ) -> Self {
        Self {
            gateway: SessionGateway::new(session, events, config.namespace.clone()),
            service,
            timers,
            tick_interval: config.playback.tick_interval(),
            step: config.playback.step(),
            state: PlaybackState {
                virtual_time_seconds: 0.0,
                playing: false,
                last_frame: now,
            },
            committed_seconds: 0.0,
            paused_progress: Duration::ZERO,
            ticker: None,
            requests: 0,
        }
    }

    /// Start the ticker, resuming any progress made before the last pause
    pub fn play(&mut self, now: Instant) -> bool {
        if self.state.playing {
            return false;
        }
        self.ticker = Some(self.timers.arm(TimerKind::PlaybackTick, self.tick_interval));
        self.state.last_frame = now.checked_sub(self.paused_progress).unwrap_or(now);
        self.paused_progress = Duration::ZERO;
        self.state.playing = true;
        info!(
            service_id = %self.service.id,
            virtual_time = self.state.virtual_time_seconds,
            "playing"
        );
        true
    }

    /// Stop the ticker and remember how far the current step had got
    pub fn pause(&mut self, now: Instant) -> bool {
        if !self.state.playing {
            return false;
        }
        self.ticker = None;
        self.paused_progress = now
            .saturating_duration_since(self.state.last_frame)
            .min(self.step);
        self.state.playing = false;
        info!(
            service_id = %self.service.id,
            virtual_time = self.state.virtual_time_seconds,
            progress_ms = self.paused_progress.as_millis() as u64,
            "paused"
        );
        true
    }

    /// Ticker firing; returns the new virtual time when a step was taken
    pub fn tick(&mut self, now: Instant) -> Option<f64> {
        if !self.state.playing {
            return None;
        }
        if now.saturating_duration_since(self.state.last_frame) < self.step {
            return None;
        }
        self.state.last_frame = now;

        let current = self.state.virtual_time_seconds;
        let next = self.service.clamp_time(current + self.step.as_secs_f64());
        if next <= current {
            debug!(virtual_time = current, "end of recording");
            return None;
        }
        self.state.virtual_time_seconds = next;
        self.fetch(next);
        Some(next)
    }

    /// Jump to `time_seconds` (clamped) and request the state there
    pub fn seek(&mut self, time_seconds: f64, now: Instant) -> f64 {
        let target = self.service.clamp_time(time_seconds);
        self.state.virtual_time_seconds = target;
        self.state.last_frame = now;
        self.paused_progress = Duration::ZERO;
        debug!(requested = time_seconds, virtual_time = target, "seek");
        self.fetch(target);
        target
    }

    /// Apply a time-indexed response; last response wins
    pub fn on_fetched(
        &mut self,
        time_seconds: f64,
        result: Result<Value, TimingError>,
        view: &mut ViewState,
    ) -> bool {
        let payload = result.and_then(|value| {
            serde_json::from_value::<StatePayload>(value).map_err(|e| {
                TimingError::PlaybackFetchFailure {
                    service_id: self.service.id.clone(),
                    time_seconds,
                    message: e.to_string(),
                }
            })
        });

        match payload {
            Ok(payload) => {
                reducer::apply(view, payload);
                if time_seconds == self.state.virtual_time_seconds {
                    self.committed_seconds = time_seconds;
                }
                debug!(time_seconds, "playback frame applied");
                true
            }
            Err(e) => {
                observability::record_failure("playback_fetch");
                warn!(error = %e, "playback fetch failed");
                if time_seconds == self.state.virtual_time_seconds {
                    self.state.virtual_time_seconds = self.committed_seconds;
                }
                false
            }
        }
    }

    pub fn service(&self) -> &Service {
        &self.service
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn virtual_time(&self) -> f64 {
        self.state.virtual_time_seconds
    }

    pub fn is_playing(&self) -> bool {
        self.state.playing
    }

    pub fn duration(&self) -> f64 {
        self.service.duration_seconds.unwrap_or(0.0)
    }

    /// Time-indexed requests issued so far
    pub fn requests(&self) -> u64 {
        self.requests
    }

    fn fetch(&mut self, time_seconds: f64) {
        self.requests += 1;
        observability::record_playback_request(&self.service.id, time_seconds);
        self.gateway.fetch_at(&self.service.id, time_seconds);
    }
}
