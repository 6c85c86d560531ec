//! `replay` command implementation.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sync_core::CoreHandle;
use timing_session::RecordingSession;
use tracing::{info, warn};

use super::report::{clock, print_snapshot, print_stats};
use super::{init_metrics, load_config, shutdown_signal};
use crate::cli::ReplayArgs;
use crate::error::CliError;

/// Execute the `replay` command
pub async fn run_replay(args: &ReplayArgs) -> Result<()> {
    if !args.recording.is_dir() {
        return Err(CliError::recording_not_found(&args.recording).into());
    }

    let mut config = load_config(args.config.as_deref())?;
    if let Some(step) = args.step_seconds {
        info!(step, "Overriding playback step from CLI");
        config.playback.step_seconds = step;
        config_loader::ConfigLoader::validate(&config).map_err(CliError::from)?;
    }
    init_metrics(args.metrics_port)?;

    let mut session = RecordingSession::new(config.namespace.clone());
    let service = session
        .add_directory(&args.recording)
        .with_context(|| format!("Failed to open recording {}", args.recording.display()))?;
    let directory = session.services();

    info!(
        service_id = %service.id,
        name = %service.name,
        duration = %clock(service.duration_seconds.unwrap_or_default()),
        "Recording loaded"
    );

    let handle = CoreHandle::spawn(Arc::new(session), config, directory);
    let intents = handle.intents().clone();
    intents.on_choose_service(service.id.clone());
    if let Some(position) = args.seek {
        intents.on_seek(position);
    }
    intents.on_play();

    let mut view = handle.view();
    let window = (args.play_for > 0).then(|| Duration::from_secs(args.play_for));
    let deadline = async move {
        match window {
            Some(window) => tokio::time::sleep(window).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            changed = view.changed() => {
                if changed.is_err() {
                    warn!("Timing core stopped unexpectedly");
                    break;
                }
                let snapshot = view.borrow_and_update().clone();
                print_snapshot(&snapshot, args.json)?;

                let finished = snapshot
                    .playback
                    .is_some_and(|p| p.virtual_time_seconds >= p.duration_seconds);
                if finished {
                    info!("Reached the end of the recording");
                    break;
                }
            }
            _ = &mut deadline => {
                info!(seconds = args.play_for, "Playback window elapsed");
                break;
            }
            _ = &mut shutdown => {
                warn!("Received shutdown signal, stopping playback...");
                break;
            }
        }
    }

    let stats = handle.shutdown().await;
    if !args.json {
        print_stats(&stats);
    }
    Ok(())
}
