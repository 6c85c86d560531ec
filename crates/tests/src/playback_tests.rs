//! Recorded services served from memory: seek, play, pause.

use std::sync::Arc;
use std::time::Duration;

use contracts::{Service, ViewerConfig};
use serde_json::Value;
use sync_core::CoreHandle;
use timing_session::MemorySession;
use tokio::time::Instant;

use crate::support::*;

/// Session whose recorded state at time `t` has the single car `t<t>`
fn recorded_session() -> Arc<MemorySession> {
    let session = Arc::new(MemorySession::new());
    session.set_provider(RECORDED, |time| {
        payload(&format!("t{}", time.unwrap_or(-1.0)))
    });
    session
}

fn recorded(duration: f64) -> Service {
    Service::recorded(RECORDED, "Recorded Race", duration)
}

fn requested_times(session: &MemorySession) -> Vec<f64> {
    session
        .calls()
        .into_iter()
        .filter_map(|(_, args)| args.first().and_then(Value::as_f64))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_recorded_choice_starts_at_zero() {
    let session = recorded_session();
    let handle = CoreHandle::spawn(Arc::clone(&session), ViewerConfig::default(), vec![recorded(600.0)]);
    let mut view = handle.view();

    handle.intents().on_choose_service(RECORDED);
    let snapshot = wait_until(&mut view, |s| first_car(s).as_deref() == Some("t0")).await;
    let playback = snapshot.playback.expect("playback view");
    assert_eq!(playback.virtual_time_seconds, 0.0);
    assert_eq!(playback.duration_seconds, 600.0);
    assert!(!playback.playing);
    assert!(!snapshot.disconnected);
    assert_eq!(session.subscribe_calls(), 0);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_play_pause_play_resumes_position() {
    let session = recorded_session();
    let handle = CoreHandle::spawn(Arc::clone(&session), ViewerConfig::default(), vec![recorded(600.0)]);
    let mut view = handle.view();
    let intents = handle.intents().clone();

    intents.on_choose_service(RECORDED);
    wait_until(&mut view, |s| first_car(s).as_deref() == Some("t0")).await;

    intents.on_play();
    wait_until(&mut view, |s| virtual_time(s) == Some(20.0)).await;
    intents.on_pause();
    let paused = wait_until(&mut view, |s| s.playback.is_some_and(|p| !p.playing)).await;
    assert_eq!(virtual_time(&paused), Some(20.0));

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(virtual_time(&handle.current()), Some(20.0));

    intents.on_play();
    let resumed = Instant::now();
    let snapshot = wait_until(&mut view, |s| virtual_time(s) == Some(30.0)).await;
    let took = resumed.elapsed();
    assert!(
        took >= Duration::from_secs(10) && took < Duration::from_secs(11),
        "resumed step took {took:?}"
    );
    assert!(snapshot.playback.is_some_and(|p| p.playing));

    wait_until(&mut view, |s| first_car(s).as_deref() == Some("t30")).await;
    assert_eq!(requested_times(&session), [0.0, 10.0, 20.0, 30.0]);
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_playback_stops_at_duration() {
    let session = recorded_session();
    let handle = CoreHandle::spawn(Arc::clone(&session), ViewerConfig::default(), vec![recorded(25.0)]);
    let mut view = handle.view();

    handle.intents().on_choose_service(RECORDED);
    handle.intents().on_play();
    wait_until(&mut view, |s| first_car(s).as_deref() == Some("t25")).await;

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(virtual_time(&handle.current()), Some(25.0));
    assert_eq!(requested_times(&session), [0.0, 10.0, 20.0, 25.0]);

    let stats = handle.shutdown().await;
    assert_eq!(stats.playback_frames, 4);
}

#[tokio::test(start_paused = true)]
async fn test_stale_seek_response_still_applies() {
    let session = recorded_session();
    session.delay_requests_at(40.0, Duration::from_secs(3));
    let handle = CoreHandle::spawn(Arc::clone(&session), ViewerConfig::default(), vec![recorded(600.0)]);
    let mut view = handle.view();
    let intents = handle.intents().clone();

    intents.on_choose_service(RECORDED);
    wait_until(&mut view, |s| first_car(s).as_deref() == Some("t0")).await;

    intents.on_seek(40.0);
    intents.on_seek(120.0);
    let newest = wait_until(&mut view, |s| first_car(s).as_deref() == Some("t120")).await;
    assert_eq!(virtual_time(&newest), Some(120.0));

    // The superseded request lands last and wins
    let late = wait_until(&mut view, |s| first_car(s).as_deref() == Some("t40")).await;
    assert_eq!(virtual_time(&late), Some(120.0));
    assert!(stays_quiet(&mut view, Duration::from_secs(10)).await);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_seek_is_clamped_and_failures_keep_view() {
    let session = recorded_session();
    let handle = CoreHandle::spawn(Arc::clone(&session), ViewerConfig::default(), vec![recorded(100.0)]);
    let mut view = handle.view();
    let intents = handle.intents().clone();

    intents.on_choose_service(RECORDED);
    wait_until(&mut view, |s| first_car(s).as_deref() == Some("t0")).await;

    intents.on_seek(500.0);
    wait_until(&mut view, |s| first_car(s).as_deref() == Some("t100")).await;

    session.fail_next_call("recording unavailable");
    intents.on_seek(50.0);
    tokio::time::sleep(Duration::from_secs(1)).await;

    // The failed seek leaves time and state where the last frame put them
    let after = handle.current();
    assert_eq!(first_car(&after).as_deref(), Some("t100"));
    assert_eq!(virtual_time(&after), Some(100.0));

    let stats = handle.shutdown().await;
    assert_eq!(stats.failures, 1);
}

#[tokio::test(start_paused = true)]
async fn test_switching_to_live_stops_playback() {
    let session = recorded_session();
    session.set_state(LIVE, payload("live"));
    let handle = CoreHandle::spawn(
        Arc::clone(&session),
        ViewerConfig::default(),
        vec![recorded(600.0), Service::live(LIVE, "Live Feed")],
    );
    let mut view = handle.view();
    let intents = handle.intents().clone();

    intents.on_choose_service(RECORDED);
    intents.on_play();
    wait_until(&mut view, |s| virtual_time(s) == Some(10.0)).await;

    intents.on_choose_service(LIVE);
    let live = wait_until(&mut view, |s| first_car(s).as_deref() == Some("live")).await;
    assert!(live.playback.is_none());

    let requests = session.calls().len();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(session.calls().len(), requests);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_dropped_handle_stops_playback() {
    let session = recorded_session();
    let handle = CoreHandle::spawn(Arc::clone(&session), ViewerConfig::default(), vec![recorded(600.0)]);
    let mut view = handle.view();
    let intents = handle.intents().clone();

    intents.on_choose_service(RECORDED);
    intents.on_play();
    wait_until(&mut view, |s| first_car(s).as_deref() == Some("t10")).await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    let requested = session.calls().len();

    drop(handle);
    tokio::time::sleep(Duration::from_secs(120)).await;

    assert_eq!(session.calls().len(), requested);
    assert!(!intents.on_play());
}
