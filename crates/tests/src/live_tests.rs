//! Live services: delay buffer and subscription lifecycle.

use std::sync::Arc;
use std::time::Duration;

use config_loader::{ConfigFormat, ConfigLoader};
use contracts::{Envelope, Service, ViewerConfig};
use sync_core::{CoreHandle, LinkState};
use timing_session::MemorySession;
use tokio::time::Instant;

use crate::support::*;

fn live_service() -> Service {
    Service::live(LIVE, "Live Feed")
}

fn live_session() -> Arc<MemorySession> {
    let session = Arc::new(MemorySession::new());
    session.set_state(LIVE, payload("snapshot"));
    session
}

fn system_messages(snapshot: &sync_core::ViewSnapshot, text: &str) -> usize {
    snapshot
        .messages
        .iter()
        .filter(|m| m.category == "System" && m.text == text)
        .count()
}

#[tokio::test(start_paused = true)]
async fn test_live_choice_shows_snapshot_then_deltas() {
    let session = live_session();
    let handle = CoreHandle::spawn(Arc::clone(&session), ViewerConfig::default(), vec![live_service()]);
    let mut view = handle.view();

    handle.intents().on_choose_service(LIVE);
    let snapshot = wait_until(&mut view, |s| {
        s.link == LinkState::Active && first_car(s).as_deref() == Some("snapshot")
    })
    .await;
    assert_eq!(snapshot.service.map(|s| s.id.to_string()), Some(LIVE.to_string()));
    assert!(!snapshot.disconnected);

    session.publish(LIVE, vec![delta("P0")]);
    wait_until(&mut view, |s| first_car(s).as_deref() == Some("P0")).await;

    let stats = handle.shutdown().await;
    assert_eq!(stats.snapshots, 1);
    assert_eq!(stats.deliveries, 1);
    assert_eq!(stats.released, 2);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(session.active_subscriptions(LIVE), 0);
}

#[tokio::test(start_paused = true)]
async fn test_delayed_release_schedule() {
    // Delay comes from a loaded config file
    let config =
        ConfigLoader::load_from_str("[delay]\ninitial_seconds = 5\n", ConfigFormat::Toml).unwrap();
    let session = live_session();
    let handle = CoreHandle::spawn(Arc::clone(&session), config, vec![live_service()]);
    let mut view = handle.view();

    handle.intents().on_choose_service(LIVE);
    let bound = wait_until(&mut view, |s| s.link == LinkState::Active).await;
    assert_eq!(bound.delay_seconds, 5);
    assert!(bound.cars.is_empty());

    let t0 = Instant::now();
    for (i, tag) in ["P0", "P1", "P2"].into_iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        session.publish(LIVE, vec![delta(tag)]);
    }

    let mut applied: Vec<(String, Duration)> = Vec::new();
    while applied.len() < 3 {
        let snapshot = next_change(&mut view).await;
        if let Some(tag) = first_car(&snapshot).filter(|t| t.starts_with('P')) {
            if applied.last().map(|(last, _)| last.as_str()) != Some(tag.as_str()) {
                applied.push((tag, t0.elapsed()));
            }
        }
    }

    let tags: Vec<&str> = applied.iter().map(|(t, _)| t.as_str()).collect();
    assert_eq!(tags, ["P0", "P1", "P2"]);
    for (i, (tag, at)) in applied.iter().enumerate() {
        let due = Duration::from_secs(5 + i as u64);
        assert!(
            *at >= due && *at < due + Duration::from_secs(1),
            "{tag} applied at {at:?}, due at {due:?}"
        );
    }

    // Nothing is applied twice
    assert!(stays_quiet(&mut view, Duration::from_secs(30)).await);
    let stats = handle.shutdown().await;
    assert_eq!(stats.released, 4);
    assert_eq!(stats.hold_ms.count, 4);
}

#[tokio::test(start_paused = true)]
async fn test_zero_delay_flushes_everything_once() {
    let session = live_session();
    let handle = CoreHandle::spawn(Arc::clone(&session), config_with_delay(30), vec![live_service()]);
    let mut view = handle.view();

    handle.intents().on_choose_service(LIVE);
    wait_until(&mut view, |s| s.link == LinkState::Active).await;

    let t0 = Instant::now();
    for tag in ["P0", "P1", "P2"] {
        session.publish(LIVE, vec![delta(tag)]);
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    assert!(handle.current().cars.is_empty());

    handle.intents().on_set_delay(0);
    let flushed = wait_until(&mut view, |s| first_car(s).as_deref() == Some("P2")).await;
    assert_eq!(flushed.delay_seconds, 0);
    assert!(t0.elapsed() < Duration::from_secs(30));

    assert!(stays_quiet(&mut view, Duration::from_secs(60)).await);
    let stats = handle.shutdown().await;
    assert_eq!(stats.released, 4);
}

#[tokio::test(start_paused = true)]
async fn test_delay_is_clamped_to_maximum() {
    let mut config = ViewerConfig::default();
    config.delay.max_seconds = 60;
    let handle = CoreHandle::spawn(live_session(), config, vec![live_service()]);
    let mut view = handle.view();

    handle.intents().on_choose_service(LIVE);
    wait_until(&mut view, |s| s.link == LinkState::Active).await;
    handle.intents().on_set_delay(600);
    let snapshot = wait_until(&mut view, |s| s.delay_seconds != 0).await;
    assert_eq!(snapshot.delay_seconds, 60);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_repeated_choice_subscribes_once() {
    let session = live_session();
    let handle = CoreHandle::spawn(Arc::clone(&session), ViewerConfig::default(), vec![live_service()]);
    let mut view = handle.view();
    let intents = handle.intents().clone();

    intents.on_choose_service(LIVE);
    intents.on_choose_service(LIVE);
    wait_until(&mut view, |s| s.link == LinkState::Active).await;
    intents.on_choose_service(LIVE);
    intents.update_directory(vec![live_service()]);
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(session.subscribe_calls(), 1);
    assert_eq!(session.active_subscriptions(LIVE), 1);
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_failed_subscribe_is_retried_on_next_choice() {
    let session = live_session();
    session.fail_next_subscribe("router unavailable");
    let other = Service::live("other", "Other Feed");
    let handle = CoreHandle::spawn(
        Arc::clone(&session),
        ViewerConfig::default(),
        vec![live_service(), other],
    );
    let mut view = handle.view();
    let intents = handle.intents().clone();

    intents.on_choose_service(LIVE);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(handle.current().link, LinkState::Subscribing);

    intents.on_choose_service("other");
    intents.on_choose_service(LIVE);
    wait_until(&mut view, |s| {
        s.link == LinkState::Active && s.service.as_ref().is_some_and(|svc| svc.id.as_str() == LIVE)
    })
    .await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(session.subscribe_calls(), 3);
    assert_eq!(session.active_subscriptions(LIVE), 1);
    assert_eq!(session.active_subscriptions("other"), 0);
    let stats = handle.shutdown().await;
    assert_eq!(stats.failures, 1);
}

#[tokio::test(start_paused = true)]
async fn test_directory_loss_and_restore() {
    let session = live_session();
    let handle = CoreHandle::spawn(Arc::clone(&session), ViewerConfig::default(), vec![live_service()]);
    let mut view = handle.view();
    let intents = handle.intents().clone();

    intents.on_choose_service(LIVE);
    wait_until(&mut view, |s| s.link == LinkState::Active).await;

    intents.update_directory(Vec::new());
    intents.update_directory(Vec::new());
    let lost = wait_until(&mut view, |s| s.disconnected).await;
    assert_eq!(lost.link, LinkState::Disconnected);
    tokio::time::sleep(Duration::from_secs(1)).await;

    let snapshot = handle.current();
    assert_eq!(system_messages(&snapshot, "Service no longer available"), 1);
    assert_eq!(session.active_subscriptions(LIVE), 0);

    // Deliveries while disconnected are ignored
    assert_eq!(session.publish(LIVE, vec![delta("ghost")]), 0);

    // Coming back re-subscribes and re-fetches the state
    session.set_state(LIVE, payload("refetched"));
    intents.update_directory(vec![live_service()]);
    let restored = wait_until(&mut view, |s| {
        !s.disconnected
            && s.link == LinkState::Active
            && first_car(s).as_deref() == Some("refetched")
    })
    .await;
    assert!(restored.service.is_some());
    assert_eq!(session.subscribe_calls(), 2);
    assert_eq!(session.active_subscriptions(LIVE), 1);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_control_update_in_feed_replaces_directory() {
    let session = live_session();
    let handle = CoreHandle::spawn(Arc::clone(&session), ViewerConfig::default(), vec![live_service()]);
    let mut view = handle.view();

    handle.intents().on_choose_service(LIVE);
    wait_until(&mut view, |s| s.link == LinkState::Active).await;

    // A listing without the bound service arrives on the feed itself
    let listing = Envelope::ControlUpdate(vec![Service::live("other", "Other Feed")]);
    session.publish_envelope(LIVE, &listing).unwrap();
    let lost = wait_until(&mut view, |s| s.disconnected).await;
    assert_eq!(system_messages(&lost, "Service no longer available"), 1);

    let stats = handle.shutdown().await;
    assert_eq!(stats.directory_updates, 2);
}

#[tokio::test(start_paused = true)]
async fn test_undecodable_messages_are_skipped() {
    let session = live_session();
    let handle = CoreHandle::spawn(Arc::clone(&session), ViewerConfig::default(), vec![live_service()]);
    let mut view = handle.view();

    handle.intents().on_choose_service(LIVE);
    wait_until(&mut view, |s| s.link == LinkState::Active).await;

    let compressed = serde_json::json!({"msgClass": 8, "date": 0, "payload": "...", "retain": false});
    session.publish(LIVE, vec![compressed, delta("P0")]);
    wait_until(&mut view, |s| first_car(s).as_deref() == Some("P0")).await;

    let stats = handle.shutdown().await;
    assert_eq!(stats.decode_failures, 1);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_handle_releases_subscription() {
    let session = live_session();
    let handle = CoreHandle::spawn(Arc::clone(&session), config_with_delay(5), vec![live_service()]);
    let mut view = handle.view();

    handle.intents().on_choose_service(LIVE);
    wait_until(&mut view, |s| s.link == LinkState::Active).await;
    assert_eq!(session.active_subscriptions(LIVE), 1);

    drop(handle);
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(session.active_subscriptions(LIVE), 0);
    assert_eq!(session.unsubscribe_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_placeholder_session_fields_still_apply() {
    let session = live_session();
    let handle = CoreHandle::spawn(Arc::clone(&session), ViewerConfig::default(), vec![live_service()]);
    let mut view = handle.view();

    handle.intents().on_choose_service(LIVE);
    wait_until(&mut view, |s| first_car(s).as_deref() == Some("snapshot")).await;

    let unreadable_clock = serde_json::json!({
        "msgClass": 4,
        "date": 0,
        "payload": {
            "cars": [["A"]],
            "session": {"flagState": "green", "timeElapsed": "-- : -- : --", "lapsRemain": -1},
            "messages": []
        },
        "retain": true
    });
    session.publish(LIVE, vec![unreadable_clock]);
    let shown = wait_until(&mut view, |s| first_car(s).as_deref() == Some("A")).await;
    assert_eq!(shown.session.time_elapsed_seconds, 0.0);
    assert_eq!(shown.session.laps_remaining, Some(-1));

    let stats = handle.shutdown().await;
    assert_eq!(stats.decode_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn test_choice_waits_for_listing() {
    let session = live_session();
    let handle = CoreHandle::spawn(Arc::clone(&session), ViewerConfig::default(), Vec::new());
    let mut view = handle.view();
    let intents = handle.intents().clone();

    intents.on_choose_service(LIVE);
    let waiting = wait_until(&mut view, |s| s.disconnected).await;
    assert!(waiting.service.is_none());
    assert_eq!(waiting.link, LinkState::Unbound);
    assert_eq!(session.subscribe_calls(), 0);

    intents.update_directory(vec![live_service()]);
    let bound = wait_until(&mut view, |s| {
        s.link == LinkState::Active && first_car(s).as_deref() == Some("snapshot")
    })
    .await;
    assert!(!bound.disconnected);
    assert_eq!(bound.service.map(|s| s.id.to_string()), Some(LIVE.to_string()));
    assert_eq!(session.subscribe_calls(), 1);

    handle.shutdown().await;
}
