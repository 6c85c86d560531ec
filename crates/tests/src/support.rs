//! Shared fixtures for the scenarios.

use std::time::Duration;

use contracts::{Envelope, StatePayload, ViewerConfig};
use serde_json::{json, Value};
use sync_core::ViewSnapshot;
use tokio::sync::watch;

pub const LIVE: &str = "live";
pub const RECORDED: &str = "rec";

/// State whose single car row is `[tag]`
pub fn payload(tag: &str) -> Value {
    json!({
        "cars": [[tag]],
        "session": {"flagState": "green", "timeElapsed": 0},
        "messages": []
    })
}

/// Wire message carrying `payload(tag)` as a state delta
pub fn delta(tag: &str) -> Value {
    let payload: StatePayload = serde_json::from_value(payload(tag)).unwrap();
    serde_json::to_value(Envelope::StateDelta(payload).to_wire().unwrap()).unwrap()
}

pub fn first_car(snapshot: &ViewSnapshot) -> Option<String> {
    snapshot
        .cars
        .first()
        .and_then(|row| row.number())
        .and_then(Value::as_str)
        .map(str::to_string)
}

pub fn virtual_time(snapshot: &ViewSnapshot) -> Option<f64> {
    snapshot.playback.map(|p| p.virtual_time_seconds)
}

pub fn config_with_delay(seconds: u32) -> ViewerConfig {
    let mut config = ViewerConfig::default();
    config.delay.initial_seconds = seconds;
    config
}

/// Wait for the next published snapshot
pub async fn next_change(view: &mut watch::Receiver<ViewSnapshot>) -> ViewSnapshot {
    tokio::time::timeout(Duration::from_secs(3600), view.changed())
        .await
        .expect("no view change")
        .expect("core stopped");
    view.borrow_and_update().clone()
}

/// Wait until a published snapshot satisfies `done`
pub async fn wait_until<F>(view: &mut watch::Receiver<ViewSnapshot>, done: F) -> ViewSnapshot
where
    F: Fn(&ViewSnapshot) -> bool,
{
    {
        let current = view.borrow_and_update();
        if done(&current) {
            return current.clone();
        }
    }
    loop {
        let snapshot = next_change(view).await;
        if done(&snapshot) {
            return snapshot;
        }
    }
}

/// Whether the view stays unchanged for `window`
pub async fn stays_quiet(view: &mut watch::Receiver<ViewSnapshot>, window: Duration) -> bool {
    tokio::time::timeout(window, view.changed()).await.is_err()
}
