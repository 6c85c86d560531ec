//! Recorded services served from a recording directory on disk.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use contracts::{FlagState, ViewerConfig};
use serde_json::{json, Value};
use sync_core::CoreHandle;
use tempfile::TempDir;
use timing_session::{frame_file_name, RecordingSession};

use crate::support::*;

const START: u64 = 1_600_000_000;

fn write(dir: &Path, name: &str, value: Value) {
    fs::write(dir.join(name), value.to_string()).unwrap();
}

/// Keyframes at +0 and +30, intra-frames at +10, +20 and +40
fn recording() -> TempDir {
    let dir = TempDir::new().unwrap();
    let path = dir.path();
    write(
        path,
        "manifest.json",
        json!({"uuid": RECORDED, "name": "Le Mans", "version": 1, "colSpec": ["Num", "Driver"]}),
    );
    write(
        path,
        &frame_file_name(START, false),
        json!({
            "cars": [["7", "Kobayashi"], ["8", "Buemi"]],
            "session": {"flagState": "green", "timeElapsed": 0},
            "messages": [[START as f64, "Race Control", "Race start", "green"]]
        }),
    );
    write(
        path,
        &frame_file_name(START + 10, true),
        json!({
            "cars": [["change", [1, 1], ["Buemi", "Hartley"]]],
            "session": [["change", "timeElapsed", [0, 10]]],
            "messages": [[(START + 10) as f64, "Pits", "Car 8 driver change", "pit", "8"]]
        }),
    );
    write(
        path,
        &frame_file_name(START + 20, true),
        json!({
            "cars": [],
            "session": [["change", "flagState", ["green", "sc"]]],
            "messages": []
        }),
    );
    write(
        path,
        &frame_file_name(START + 30, false),
        json!({
            "cars": [["8", "Hartley"], ["7", "Kobayashi"]],
            "session": {"flagState": "red", "timeElapsed": 30},
            "messages": []
        }),
    );
    write(
        path,
        &frame_file_name(START + 40, true),
        json!({
            "cars": [["remove", "", [[1, ["7", "Kobayashi"]]]]],
            "session": [["add", "", [["lapsRemain", 3]]]],
            "messages": []
        }),
    );
    dir
}

fn fast_playback() -> ViewerConfig {
    let mut config = ViewerConfig::default();
    config.playback.step_seconds = 1;
    config.playback.tick_interval_ms = 50;
    config
}

fn spawn(dir: &TempDir, config: ViewerConfig) -> CoreHandle {
    let mut session = RecordingSession::new(config.namespace.clone());
    session.add_directory(dir.path()).unwrap();
    let directory = session.services();
    CoreHandle::spawn(Arc::new(session), config, directory)
}

fn driver(snapshot: &sync_core::ViewSnapshot, row: usize) -> Option<&str> {
    snapshot.cars.get(row)?.0.get(1)?.as_str()
}

#[tokio::test]
async fn test_directory_lists_recording() {
    let dir = recording();
    let mut session = RecordingSession::new("livetiming.service");
    let service = session.add_directory(dir.path()).unwrap();

    assert_eq!(service.id.as_str(), RECORDED);
    assert_eq!(service.duration_seconds, Some(40.0));
    assert_eq!(service.start_timestamp, Some(START as f64));
    assert!(service.is_recorded());
    assert_eq!(session.services().len(), 1);
}

#[tokio::test]
async fn test_seek_reconstructs_recorded_state() {
    let dir = recording();
    let handle = spawn(&dir, ViewerConfig::default());
    let mut view = handle.view();
    let intents = handle.intents().clone();

    intents.on_choose_service(RECORDED);
    let start = wait_until(&mut view, |s| first_car(s).as_deref() == Some("7")).await;
    assert_eq!(driver(&start, 1), Some("Buemi"));
    assert_eq!(start.session.flag_state, FlagState::Green);

    // Keyframe at +0 plus the intra-frame at +10
    intents.on_seek(15.0);
    let pits = wait_until(&mut view, |s| driver(s, 1) == Some("Hartley")).await;
    assert_eq!(pits.session.time_elapsed_seconds, 10.0);
    assert_eq!(pits.session.flag_state, FlagState::Green);
    assert_eq!(pits.messages.len(), 2);
    assert_eq!(pits.messages[0].text, "Car 8 driver change");
    assert_eq!(pits.messages[0].car_number, Some(json!("8")));

    intents.on_seek(25.0);
    let safety_car = wait_until(&mut view, |s| s.session.flag_state == FlagState::Sc).await;
    assert_eq!(driver(&safety_car, 1), Some("Hartley"));

    intents.on_seek(35.0);
    let red = wait_until(&mut view, |s| s.session.flag_state == FlagState::Red).await;
    assert_eq!(first_car(&red).as_deref(), Some("8"));
    assert!(red.messages.is_empty());

    handle.shutdown().await;
}

#[tokio::test]
async fn test_play_to_end_of_recording() {
    let dir = recording();
    let handle = spawn(&dir, fast_playback());
    let mut view = handle.view();
    let intents = handle.intents().clone();

    intents.on_choose_service(RECORDED);
    intents.on_seek(38.0);
    wait_until(&mut view, |s| s.session.flag_state == FlagState::Red).await;

    intents.on_play();
    let end = wait_until(&mut view, |s| s.session.laps_remaining == Some(3)).await;
    assert_eq!(end.cars.len(), 1);
    assert_eq!(first_car(&end).as_deref(), Some("8"));
    assert_eq!(virtual_time(&end), Some(40.0));

    let stats = handle.shutdown().await;
    assert_eq!(stats.failures, 0);
    assert!(stats.playback_frames >= 3);
}

#[tokio::test]
async fn test_recording_rejects_live_subscription() {
    use contracts::{TimingError, TimingSession};

    let dir = recording();
    let mut session = RecordingSession::new("livetiming.service");
    session.add_directory(dir.path()).unwrap();

    let handler: contracts::DeliveryCallback = Arc::new(|_: Vec<Value>| {});
    let result = session.subscribe(RECORDED, handler).await;
    assert!(matches!(result, Err(TimingError::SubscriptionFailure { .. })));
}
