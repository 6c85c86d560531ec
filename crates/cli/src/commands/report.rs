//! Terminal rendering of view snapshots and core statistics.

use anyhow::{Context, Result};
use contracts::{CarRow, TimingMessage};
use sync_core::{CoreStats, ViewSnapshot};

/// Print one snapshot, either as a JSON line or as a short table
pub fn print_snapshot(snapshot: &ViewSnapshot, json: bool) -> Result<()> {
    if json {
        let line = serde_json::to_string(snapshot).context("Failed to serialize snapshot")?;
        println!("{line}");
        return Ok(());
    }

    let name = snapshot
        .service
        .as_ref()
        .map_or("(no service)", |s| s.name.as_str());
    let position = match &snapshot.playback {
        Some(playback) => format!(
            "{} / {} {}",
            clock(playback.virtual_time_seconds),
            clock(playback.duration_seconds),
            if playback.playing { "▶" } else { "⏸" }
        ),
        None => format!("live, delay {}s", snapshot.delay_seconds),
    };
    let link = if snapshot.disconnected {
        "DISCONNECTED".to_string()
    } else {
        format!("{:?}", snapshot.link)
    };

    println!(
        "── {name} │ {position} │ flag {:?} │ elapsed {} │ {link}",
        snapshot.session.flag_state,
        clock(snapshot.session.time_elapsed_seconds),
    );
    for row in snapshot.cars.iter().take(5) {
        println!("   {}", format_row(row));
    }
    if snapshot.cars.len() > 5 {
        println!("   … {} more", snapshot.cars.len() - 5);
    }
    if let Some(message) = snapshot.messages.first() {
        println!("   ✉ {}", format_message(message));
    }
    Ok(())
}

/// Print the counters collected by the core
pub fn print_stats(stats: &CoreStats) {
    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║                    Timing Core Statistics                    ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("📊 Overview");
    println!("   ├─ Events handled: {}", stats.events);
    println!("   ├─ Deliveries: {}", stats.deliveries);
    println!("   ├─ Stale deliveries dropped: {}", stats.stale_deliveries);
    println!("   ├─ Decode failures: {}", stats.decode_failures);
    println!("   ├─ Snapshots fetched: {}", stats.snapshots);
    println!("   ├─ Playback frames: {}", stats.playback_frames);
    println!("   ├─ Directory updates: {}", stats.directory_updates);
    println!("   └─ Failures: {}", stats.failures);

    println!("\n⏱  Delay Buffer");
    println!("   ├─ Released: {}", stats.released);
    println!("   └─ Hold time (ms): {}", stats.hold_ms);
    println!();
}

fn format_row(row: &CarRow) -> String {
    row.0
        .iter()
        .map(|cell| match cell {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join("  ")
}

fn format_message(message: &TimingMessage) -> String {
    let time = chrono::DateTime::from_timestamp(message.timestamp as i64, 0)
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string());
    format!("{time} [{}] {}", message.category, message.text)
}

/// `h:mm:ss` rendering of a duration in seconds
pub fn clock(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{}:{:02}:{:02}", total / 3600, total / 60 % 60, total % 60)
}
