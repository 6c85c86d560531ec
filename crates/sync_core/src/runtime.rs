//! CoreHandle - runs a TimingCore on its own task.
//!
//! The worker owns the core outright. Intents go in through a cloneable
//! [`IntentSender`]; the view comes out on a `watch` channel that is only
//! bumped when the snapshot actually changed.
//!
//! The core keeps senders of its own for timers and session callbacks, so the
//! channel never closes by itself. Dropping the handle posts a shutdown.

use std::sync::Arc;

use contracts::{ServiceId, ServiceList, TimingSession, ViewerConfig};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, instrument, warn};

use crate::events::{CoreEvent, EventReceiver, EventSender, Intent};
use crate::timer::TimerDriver;
use crate::timing_core::{CoreStats, TimingCore, ViewSnapshot};

/// Cloneable intent entry point of a running core
#[derive(Debug, Clone)]
pub struct IntentSender {
    tx: EventSender,
}

impl IntentSender {
    pub fn on_choose_service(&self, id: impl Into<ServiceId>) -> bool {
        self.send(CoreEvent::Intent(Intent::ChooseService(id.into())))
    }

    pub fn on_seek(&self, time_seconds: f64) -> bool {
        self.send(CoreEvent::Intent(Intent::Seek(time_seconds)))
    }

    pub fn on_set_delay(&self, seconds: u32) -> bool {
        self.send(CoreEvent::Intent(Intent::SetDelay(seconds)))
    }

    pub fn on_play(&self) -> bool {
        self.send(CoreEvent::Intent(Intent::Play))
    }

    pub fn on_pause(&self) -> bool {
        self.send(CoreEvent::Intent(Intent::Pause))
    }

    /// Push a new directory listing
    pub fn update_directory(&self, services: ServiceList) -> bool {
        self.send(CoreEvent::DirectoryChanged(services))
    }

    fn send(&self, event: CoreEvent) -> bool {
        if self.tx.send(event).is_err() {
            warn!("timing core has stopped, event dropped");
            return false;
        }
        true
    }
}

/// Handle to a running core worker
pub struct CoreHandle {
    intents: IntentSender,
    view: watch::Receiver<ViewSnapshot>,
    worker: Option<JoinHandle<CoreStats>>,
}

impl CoreHandle {
    /// Build a core over `session` and spawn its event loop
    pub fn spawn<S>(session: Arc<S>, config: ViewerConfig, directory: ServiceList) -> Self
    where
        S: TimingSession + Send + Sync + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let timers = TimerDriver::new(tx.clone());
        let mut core = TimingCore::new(session, config, tx.clone(), timers);
        core.update_directory(directory, Instant::now());

        let (view_tx, view_rx) = watch::channel(core.snapshot());
        let worker = tokio::spawn(core_worker(core, rx, view_tx));

        Self {
            intents: IntentSender { tx },
            view: view_rx,
            worker: Some(worker),
        }
    }

    pub fn intents(&self) -> &IntentSender {
        &self.intents
    }

    /// Subscribe to snapshot changes
    pub fn view(&self) -> watch::Receiver<ViewSnapshot> {
        self.view.clone()
    }

    /// Latest published snapshot
    pub fn current(&self) -> ViewSnapshot {
        self.view.borrow().clone()
    }

    /// Tear the core down and wait for the worker
    #[instrument(name = "core_handle_shutdown", skip(self))]
    pub async fn shutdown(mut self) -> CoreStats {
        let _ = self.intents.tx.send(CoreEvent::Shutdown);
        let Some(worker) = self.worker.take() else {
            return CoreStats::default();
        };
        match worker.await {
            Ok(stats) => {
                debug!(events = stats.events, "CoreHandle shutdown complete");
                stats
            }
            Err(e) => {
                error!(error = ?e, "timing core worker panicked");
                CoreStats::default()
            }
        }
    }
}

impl Drop for CoreHandle {
    fn drop(&mut self) {
        if self.worker.take().is_some() {
            debug!("CoreHandle dropped without shutdown, stopping core");
            let _ = self.intents.tx.send(CoreEvent::Shutdown);
        }
    }
}

#[instrument(name = "timing_core_loop", skip_all)]
async fn core_worker<S>(
    mut core: TimingCore<S>,
    mut rx: EventReceiver,
    view: watch::Sender<ViewSnapshot>,
) -> CoreStats
where
    S: TimingSession + Send + Sync + 'static,
{
    debug!("timing core started");

    while let Some(event) = rx.recv().await {
        let running = core.handle(event, Instant::now());

        let snapshot = core.snapshot();
        view.send_if_modified(|current| {
            if *current == snapshot {
                return false;
            }
            *current = snapshot;
            true
        });

        if !running {
            break;
        }
    }

    debug!("timing core stopped");
    core.stats()
}
