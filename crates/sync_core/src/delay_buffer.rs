//! Delay buffer for live mode.
//!
//! Holds live payloads for `delay` seconds after arrival and releases them to
//! the reducer in arrival order. Immediate application (delay 0) and timed
//! release both go through [`DelayBuffer::drain`] with a different
//! [`FlushBarrier`].

use std::collections::VecDeque;
use std::time::Duration;

use contracts::{DelayConfig, StatePayload, ViewState};
use observability::HoldTimes;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::events::TimerKind;
use crate::reducer;
use crate::timer::{CancelableTimer, TimerDriver};

/// Payload waiting for release
#[derive(Debug, Clone)]
pub struct QueuedMessage {
    pub arrived_at: Instant,
    pub payload: StatePayload,
}

/// How far a drain may go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushBarrier {
    /// Release the whole backlog
    Everything,
    /// Release while `arrived_at + delay <= now`
    DueBy(Instant),
}

/// FIFO of delayed payloads with its own release timer
#[derive(Debug)]
pub struct DelayBuffer {
    queue: VecDeque<QueuedMessage>,
    delay_seconds: u32,
    max_seconds: u32,
    release_interval: Duration,
    timers: TimerDriver,
    release_timer: Option<CancelableTimer>,
    hold_ms: HoldTimes,
    released: u64,
}

impl DelayBuffer {
    pub fn new(config: &DelayConfig, timers: TimerDriver) -> Self {
        Self {
            queue: VecDeque::new(),
            delay_seconds: 0,
            max_seconds: config.max_seconds,
            release_interval: config.release_interval(),
            timers,
            release_timer: None,
            hold_ms: HoldTimes::default(),
            released: 0,
        }
    }

    /// Accept a payload; with no delay it is applied straight away
    ///
    /// Returns how many payloads reached the view.
    pub fn push(
        &mut self,
        payload: StatePayload,
        arrived_at: Instant,
        state: &mut ViewState,
    ) -> usize {
        self.queue.push_back(QueuedMessage {
            arrived_at,
            payload,
        });
        observability::record_delay_queue_depth(self.queue.len());

        if self.delay_seconds == 0 {
            self.drain(FlushBarrier::Everything, arrived_at, state)
        } else {
            0
        }
    }

    /// Change the viewing delay, clamped to the configured maximum
    ///
    /// Going to zero disarms the release timer and flushes the backlog.
    /// Returns the delay actually applied and how many payloads were released.
    pub fn set_delay(&mut self, seconds: u32, now: Instant, state: &mut ViewState) -> (u32, usize) {
        let seconds = seconds.min(self.max_seconds);
        let previous = self.delay_seconds;
        self.delay_seconds = seconds;
        observability::record_delay_seconds(seconds);

        if seconds > 0 {
            if self.release_timer.is_none() {
                self.release_timer =
                    Some(self.timers.arm(TimerKind::DelayRelease, self.release_interval));
            }
            if previous != seconds {
                info!(delay_seconds = seconds, backlog = self.queue.len(), "delay changed");
            }
            return (seconds, 0);
        }

        self.release_timer = None;
        let released = self.drain(FlushBarrier::Everything, now, state);
        if previous != 0 {
            info!(released, "delay cleared, backlog flushed");
        }
        (0, released)
    }

    /// Periodic release
    pub fn on_tick(&mut self, now: Instant, state: &mut ViewState) -> usize {
        self.drain(FlushBarrier::DueBy(now), now, state)
    }

    /// Dequeue and apply in arrival order up to `barrier`
    pub fn drain(&mut self, barrier: FlushBarrier, now: Instant, state: &mut ViewState) -> usize {
        let delay = Duration::from_secs(u64::from(self.delay_seconds));
        let mut released = 0;

        while let Some(front) = self.queue.front() {
            if let FlushBarrier::DueBy(deadline) = barrier {
                if front.arrived_at + delay > deadline {
                    break;
                }
            }
            let Some(message) = self.queue.pop_front() else {
                break;
            };
            let held = now.saturating_duration_since(message.arrived_at);
            let held_ms = held.as_secs_f64() * 1000.0;
            self.hold_ms.record(held_ms);
            observability::record_delay_release(1, held_ms);
            reducer::apply(state, message.payload);
            released += 1;
        }

        if released > 0 {
            self.released += released as u64;
            observability::record_delay_queue_depth(self.queue.len());
            debug!(released, remaining = self.queue.len(), ?barrier, "delay buffer drained");
        }
        released
    }

    /// Drop the backlog and the timer without applying anything
    pub fn clear(&mut self) {
        self.queue.clear();
        self.release_timer = None;
        observability::record_delay_queue_depth(0);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn delay_seconds(&self) -> u32 {
        self.delay_seconds
    }

    /// Whether the release timer is armed
    pub fn is_armed(&self) -> bool {
        self.release_timer.is_some()
    }

    /// Total payloads released since creation
    pub fn released(&self) -> u64 {
        self.released
    }

    /// Hold time of released payloads, in milliseconds
    pub fn hold_stats(&self) -> &HoldTimes {
        &self.hold_ms
    }
}
