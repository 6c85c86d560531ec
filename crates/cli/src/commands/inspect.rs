//! `inspect` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use timing_session::DirectoryRecording;
use tracing::info;

use super::report::clock;
use crate::cli::InspectArgs;
use crate::error::CliError;

/// Recording summary for JSON output
#[derive(Serialize)]
struct RecordingInfo {
    uuid: String,
    name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    description: String,
    start_time: u64,
    start: String,
    duration_seconds: u64,
    keyframes: usize,
    iframes: usize,
}

/// Execute the `inspect` command
pub fn run_inspect(args: &InspectArgs) -> Result<()> {
    info!(recording = %args.recording.display(), "Inspecting recording");

    if !args.recording.is_dir() {
        return Err(CliError::recording_not_found(&args.recording).into());
    }

    let recording = DirectoryRecording::open(&args.recording)
        .with_context(|| format!("Failed to open recording {}", args.recording.display()))?;
    let info = build_recording_info(&recording)?;

    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize recording info")?;
        println!("{}", json);
    } else {
        print_recording_info(&info);
    }
    Ok(())
}

fn build_recording_info(recording: &DirectoryRecording) -> Result<RecordingInfo> {
    let service = recording
        .service()
        .context("Manifest does not describe a timing service")?;
    let start = chrono::DateTime::from_timestamp(recording.start_time() as i64, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_default();

    Ok(RecordingInfo {
        uuid: service.id.to_string(),
        name: service.name,
        description: service.description,
        start_time: recording.start_time(),
        start,
        duration_seconds: recording.duration(),
        keyframes: recording.keyframe_count(),
        iframes: recording.iframe_count(),
    })
}

fn print_recording_info(info: &RecordingInfo) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                      Timing Recording                        ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("🏁 {}", info.name);
    if !info.description.is_empty() {
        println!("   ├─ Description: {}", info.description);
    }
    println!("   ├─ UUID: {}", info.uuid);
    println!("   ├─ Start: {} ({})", info.start, info.start_time);
    println!("   └─ Duration: {}", clock(info.duration_seconds as f64));

    println!("\n🎞  Frames ({})", info.keyframes + info.iframes);
    println!("   ├─ Keyframes: {}", info.keyframes);
    println!("   └─ Intra-frames: {}", info.iframes);
    println!();
}
