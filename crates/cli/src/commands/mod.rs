//! Command implementations.

mod demo;
mod inspect;
mod replay;
mod report;
mod validate;

pub use demo::run_demo;
pub use inspect::run_inspect;
pub use replay::run_replay;
pub use validate::run_validate;

use std::path::Path;

use anyhow::{Context, Result};
use contracts::ViewerConfig;
use tracing::{info, warn};

use crate::error::CliError;

/// Load the viewer config, or defaults when no file is given
fn load_config(path: Option<&Path>) -> Result<ViewerConfig> {
    if let Some(path) = path {
        if !path.exists() {
            return Err(CliError::config_not_found(path).into());
        }
        info!(config = %path.display(), "Loading configuration");
    }
    config_loader::ConfigLoader::load_or_default(path).with_context(|| match path {
        Some(path) => format!("Failed to load config from {}", path.display()),
        None => "Default configuration is invalid".to_string(),
    })
}

/// Start the Prometheus exporter when a port is given
fn init_metrics(port: u16) -> Result<()> {
    if port != 0 {
        observability::init_metrics_only(port)?;
        info!("Metrics endpoint available on port {}", port);
    }
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
