//! `demo` command implementation.
//!
//! Publishes a synthetic race through a [`MemorySession`] and shows the
//! core releasing it after the selected delay.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use contracts::{
    CarRow, Envelope, FlagState, Service, SessionInfo, StatePayload, TimingMessage,
};
use serde_json::json;
use sync_core::CoreHandle;
use timing_session::MemorySession;
use tracing::{debug, info, warn};

use super::report::{print_snapshot, print_stats};
use super::{init_metrics, load_config, shutdown_signal};
use crate::cli::DemoArgs;
use crate::error::CliError;

const DEMO_SERVICE: &str = "demo";

/// Execute the `demo` command
pub async fn run_demo(args: &DemoArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    config.delay.initial_seconds = args.delay;
    if config.delay.max_seconds < args.delay {
        config.delay.max_seconds = args.delay;
    }
    config_loader::ConfigLoader::validate(&config).map_err(CliError::from)?;
    init_metrics(args.metrics_port)?;

    let session = Arc::new(MemorySession::with_namespace(config.namespace.clone()));
    session.set_state(
        DEMO_SERVICE,
        serde_json::to_value(race_state(0)).context("Failed to encode demo state")?,
    );

    let service = Service::live(DEMO_SERVICE, "Demo Endurance Race");
    let handle = CoreHandle::spawn(Arc::clone(&session), config, vec![service]);
    handle.intents().on_choose_service(DEMO_SERVICE);

    info!(
        delay = args.delay,
        updates = args.messages,
        interval_ms = args.interval_ms,
        "Demo feed starting"
    );
    let publisher = tokio::spawn(publish_race(
        Arc::clone(&session),
        args.messages,
        Duration::from_millis(args.interval_ms),
    ));

    // Everything published is released `delay` seconds later
    let feed = Duration::from_millis(args.interval_ms.saturating_mul(args.messages as u64 + 1));
    let deadline = tokio::time::sleep(feed + Duration::from_secs(u64::from(args.delay) + 1));
    tokio::pin!(deadline);
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let mut view = handle.view();
    loop {
        tokio::select! {
            changed = view.changed() => {
                if changed.is_err() {
                    warn!("Timing core stopped unexpectedly");
                    break;
                }
                let snapshot = view.borrow_and_update().clone();
                print_snapshot(&snapshot, args.json)?;
            }
            _ = &mut deadline => {
                info!("Demo feed drained");
                break;
            }
            _ = &mut shutdown => {
                warn!("Received shutdown signal, stopping demo...");
                break;
            }
        }
    }

    publisher.abort();
    let stats = handle.shutdown().await;
    if !args.json {
        print_stats(&stats);
    }
    Ok(())
}

async fn publish_race(session: Arc<MemorySession>, updates: usize, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;

    for lap in 1..=updates {
        ticker.tick().await;
        let envelope = Envelope::StateDelta(race_state(lap));
        match session.publish_envelope(DEMO_SERVICE, &envelope) {
            Ok(receivers) => debug!(lap, receivers, "published demo update"),
            Err(e) => warn!(lap, error = %e, "failed to publish demo update"),
        }
    }
}

/// Synthetic three-car race after `lap` updates
fn race_state(lap: usize) -> StatePayload {
    let now = chrono::Utc::now().timestamp() as f64;
    let drivers = ["Alpha", "Bravo", "Charlie"];
    // Leader rotates every third update
    let cars = (0..drivers.len())
        .map(|position| {
            let car = (position + lap / 3) % drivers.len();
            CarRow(vec![
                json!((car + 1).to_string()),
                json!(drivers[car]),
                json!(lap),
                json!(format!("1:{:02}.{:03}", 40 + car, (lap * 137 + car * 71) % 1000)),
            ])
        })
        .collect();

    let messages = (1..=lap)
        .rev()
        .map(|n| TimingMessage::new(now, "Race Control", format!("Lap {n} completed"), "raceControl"))
        .take(10)
        .collect();

    StatePayload {
        cars,
        session: SessionInfo {
            flag_state: if lap % 7 == 6 { FlagState::Yellow } else { FlagState::Green },
            time_elapsed_seconds: (lap * 100) as f64,
            time_remain_seconds: 3600.0 - (lap * 100) as f64,
            laps_remaining: None,
            track_data: Vec::new(),
        },
        messages,
    }
}
