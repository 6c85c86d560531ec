//! Cancelable periodic timers.
//!
//! A [`CancelableTimer`] is owned by the component that armed it. Dropping it
//! aborts the ticking task, so replacing or clearing the owning field is
//! enough to release the timer on mode change, service change or teardown.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{trace, warn};

use crate::events::{CoreEvent, EventSender, TimerKind};

/// Armed periodic timer
#[derive(Debug)]
pub struct CancelableTimer {
    kind: TimerKind,
    period: Duration,
    task: Option<JoinHandle<()>>,
}

impl CancelableTimer {
    pub fn kind(&self) -> TimerKind {
        self.kind
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Whether a background task is driving this timer
    pub fn is_driven(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Cancel explicitly (same as dropping)
    pub fn cancel(self) {}
}

impl Drop for CancelableTimer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            trace!(kind = ?self.kind, "timer cancelled");
        }
    }
}

/// Arms timers that post [`CoreEvent::Timer`] into the event loop
#[derive(Debug, Clone)]
pub struct TimerDriver {
    events: Option<EventSender>,
}

impl TimerDriver {
    /// Timers tick on the tokio runtime and post into `events`
    pub fn new(events: EventSender) -> Self {
        Self {
            events: Some(events),
        }
    }

    /// Timers are tracked but never fire; the owner ticks by hand
    pub fn manual() -> Self {
        Self { events: None }
    }

    /// Arm a periodic timer; the first firing is one `period` from now
    pub fn arm(&self, kind: TimerKind, period: Duration) -> CancelableTimer {
        let task = self.events.as_ref().and_then(|events| {
            let Ok(runtime) = Handle::try_current() else {
                warn!(?kind, "no tokio runtime, timer will not fire");
                return None;
            };
            let events = events.clone();
            Some(runtime.spawn(async move {
                let mut ticker = time::interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    if events.send(CoreEvent::Timer(kind)).is_err() {
                        break;
                    }
                }
            }))
        });

        trace!(?kind, period_ms = period.as_millis() as u64, "timer armed");
        CancelableTimer { kind, period, task }
    }
}
