//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Timing Viewer - live and recorded race timing from the command line
#[derive(Parser, Debug)]
#[command(
    name = "timing-viewer",
    author,
    version,
    about = "Live timing viewer synchronization core",
    long_about = "Drives the timing viewer core from the terminal.\n\n\
                  Replays recorded sessions, runs a delayed live demo feed, \n\
                  inspects recordings and validates viewer configuration."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "TIMING_VIEWER_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "TIMING_VIEWER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Play back a recorded session
    Replay(ReplayArgs),

    /// Run a synthetic live feed through the delay buffer
    Demo(DemoArgs),

    /// Summarize a recording directory
    Inspect(InspectArgs),

    /// Validate a viewer configuration file
    Validate(ValidateArgs),
}

/// Arguments for the `replay` command
#[derive(Parser, Debug, Clone)]
pub struct ReplayArgs {
    /// Recording directory (manifest.json plus frame files)
    #[arg(short, long, env = "TIMING_VIEWER_RECORDING")]
    pub recording: PathBuf,

    /// Start position in seconds from the start of the recording
    #[arg(long)]
    pub seek: Option<f64>,

    /// Wall-clock seconds to keep playing (0 = until the end or Ctrl+C)
    #[arg(long, default_value = "30", env = "TIMING_VIEWER_PLAY_FOR")]
    pub play_for: u64,

    /// Viewer configuration file (TOML or JSON)
    #[arg(short, long, env = "TIMING_VIEWER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the playback step in seconds
    #[arg(long, env = "TIMING_VIEWER_STEP_SECONDS")]
    pub step_seconds: Option<u32>,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "TIMING_VIEWER_METRICS_PORT")]
    pub metrics_port: u16,

    /// Print snapshots as JSON lines
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `demo` command
#[derive(Parser, Debug, Clone)]
pub struct DemoArgs {
    /// Delay applied to the live feed, in seconds
    #[arg(short, long, default_value = "5", env = "TIMING_VIEWER_DELAY")]
    pub delay: u32,

    /// Number of updates the synthetic publisher sends
    #[arg(short, long, default_value = "10")]
    pub messages: usize,

    /// Milliseconds between published updates
    #[arg(long, default_value = "1000")]
    pub interval_ms: u64,

    /// Viewer configuration file (TOML or JSON)
    #[arg(short, long, env = "TIMING_VIEWER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "TIMING_VIEWER_METRICS_PORT")]
    pub metrics_port: u16,

    /// Print snapshots as JSON lines
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `inspect` command
#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// Recording directory
    #[arg(short, long)]
    pub recording: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "viewer.toml", env = "TIMING_VIEWER_CONFIG")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => observability::LogFormat::Json,
            LogFormat::Pretty => observability::LogFormat::Pretty,
            LogFormat::Compact => observability::LogFormat::Compact,
        }
    }
}
