//! Unit tests for the connection supervision loop, driven by fake timers and
//! a scripted transport.

use std::time::Duration;

use serde_json::json;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::time::sleep;

use crate::error::stream_interrupted;
use crate::router::{EVENT_FILE_CHANGE, EVENT_SYNCED};
use crate::tests::harness::{fixture, fixture_with_auth, StaticWitness};

/// Let the supervision loop drain its pending work.
async fn settle() {
    sleep(Duration::from_millis(10)).await;
}

#[tokio::test(start_paused = true)]
async fn rapid_initiate_calls_collapse_into_one_attempt() {
    let fx = fixture();
    let _feeder = fx.transport.script_connection();

    for _ in 0..5 {
        fx.supervisor.initiate("alice").await;
        sleep(Duration::from_millis(100)).await;
    }

    assert_eq!(fx.transport.opened(), 1);
}

#[tokio::test(start_paused = true)]
async fn initiate_after_window_elapses_may_connect_again() {
    let fx = fixture();
    let feeder1 = fx.transport.script_connection();
    let _feeder2 = fx.transport.script_connection();

    fx.supervisor.initiate("alice").await;
    settle().await;
    assert_eq!(fx.transport.opened(), 1);

    sleep(Duration::from_millis(3_000)).await;
    fx.supervisor.initiate("bob").await;
    settle().await;

    assert_eq!(fx.transport.opened(), 2);
    let calls = fx.transport.calls();
    assert_eq!(calls[0].0, "alice");
    assert_eq!(calls[1].0, "bob");
    // The superseded handle is detached.
    assert!(feeder1.send(Ok("h".to_string())).is_err());
}

#[tokio::test(start_paused = true)]
async fn absent_credential_produces_zero_attempts() {
    let fx = fixture_with_auth(StaticWitness::absent());

    for _ in 0..10 {
        fx.supervisor.initiate("alice").await;
        sleep(Duration::from_millis(700)).await;
    }

    assert_eq!(fx.transport.opened(), 0);
}

#[tokio::test(start_paused = true)]
async fn credential_appearing_later_allows_the_connect() {
    let fx = fixture_with_auth(StaticWitness::absent());
    let _feeder = fx.transport.script_connection();

    fx.supervisor.initiate("alice").await;
    settle().await;
    assert_eq!(fx.transport.opened(), 0);

    fx.auth.set_present(true);
    sleep(Duration::from_millis(3_000)).await;
    fx.supervisor.initiate("alice").await;
    settle().await;

    assert_eq!(fx.transport.opened(), 1);
}

#[tokio::test(start_paused = true)]
async fn heartbeats_keep_the_connection_alive_without_dispatch() {
    let fx = fixture();
    let feeder = fx.transport.script_connection();
    let mut updates = fx.bus.subscribe();

    fx.supervisor.initiate("alice").await;
    settle().await;

    for _ in 0..4 {
        feeder.send(Ok("h".to_string())).unwrap();
        sleep(Duration::from_millis(4_000)).await;
    }

    assert_eq!(fx.transport.opened(), 1);
    assert!(matches!(updates.try_recv(), Err(TryRecvError::Empty)));
    assert!(fx.notifications.snapshot().is_empty());
}

#[tokio::test(start_paused = true)]
async fn stale_connection_is_closed_and_reconnected() {
    let fx = fixture();
    let feeder1 = fx.transport.script_connection();
    let _feeder2 = fx.transport.script_connection();

    fx.supervisor.initiate("alice").await;
    settle().await;
    assert_eq!(fx.transport.opened(), 1);

    // Ticks at ~3s: heartbeat age still within the stale threshold.
    sleep(Duration::from_millis(5_000)).await;
    assert_eq!(fx.transport.opened(), 1);

    // The tick at ~6s sees the heartbeat overdue, closes the handle and
    // reconnects through the gate within the same tick.
    sleep(Duration::from_millis(2_000)).await;
    assert_eq!(fx.transport.opened(), 2);
    assert!(feeder1.send(Ok("h".to_string())).is_err());
}

#[tokio::test(start_paused = true)]
async fn synced_envelope_dispatches_exactly_one_state_update() {
    let fx = fixture();
    let feeder = fx.transport.script_connection();
    let mut updates = fx.bus.subscribe();

    fx.supervisor.initiate("alice").await;
    settle().await;

    let envelope = json!({"url": "synced", "body": {"files": 3}});
    feeder.send(Ok(envelope.to_string())).unwrap();
    settle().await;

    let update = updates.try_recv().unwrap();
    assert_eq!(update.event, EVENT_SYNCED);
    assert_eq!(update.payload, envelope);
    assert!(matches!(updates.try_recv(), Err(TryRecvError::Empty)));
    assert!(fx.notifications.snapshot().is_empty());
}

#[tokio::test(start_paused = true)]
async fn stream_error_reconnects_with_same_identity_and_session() {
    let fx = fixture();
    let feeder = fx.transport.script_connection();
    let _feeder2 = fx.transport.script_connection();

    fx.supervisor.initiate("alice").await;
    settle().await;

    feeder.send(Err(stream_interrupted("connection reset"))).unwrap();
    // The immediate retry is throttled; the next liveness tick reconnects.
    sleep(Duration::from_millis(3_500)).await;

    assert_eq!(fx.transport.opened(), 2);
    let calls = fx.transport.calls();
    assert_eq!(calls[1].0, "alice");
    assert_eq!(calls[0].1, calls[1].1);
    assert_eq!(calls[1].1, fx.supervisor.session_id());
}

#[tokio::test(start_paused = true)]
async fn server_close_reconnects_through_the_gate() {
    let fx = fixture();
    let feeder = fx.transport.script_connection();
    let _feeder2 = fx.transport.script_connection();

    fx.supervisor.initiate("alice").await;
    settle().await;

    drop(feeder);
    sleep(Duration::from_millis(3_500)).await;

    assert_eq!(fx.transport.opened(), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_connect_is_retried_by_the_next_tick() {
    let fx = fixture();
    fx.transport.script_failure("server down");
    let _feeder = fx.transport.script_connection();

    fx.supervisor.initiate("alice").await;
    settle().await;
    assert_eq!(fx.transport.opened(), 1);

    sleep(Duration::from_millis(3_500)).await;
    assert_eq!(fx.transport.opened(), 2);
}

#[tokio::test(start_paused = true)]
async fn malformed_payload_does_not_kill_the_connection() {
    let fx = fixture();
    let feeder = fx.transport.script_connection();
    let mut updates = fx.bus.subscribe();

    fx.supervisor.initiate("alice").await;
    settle().await;

    feeder.send(Ok("{not json".to_string())).unwrap();
    settle().await;

    let envelope = json!({"url": "operationFile", "body": {"operation": "move", "code": 0, "from": "/a", "to": "/b"}});
    feeder.send(Ok(envelope.to_string())).unwrap();
    settle().await;

    assert_eq!(fx.transport.opened(), 1);
    let update = updates.try_recv().unwrap();
    assert_eq!(update.event, EVENT_FILE_CHANGE);
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_reconnecting() {
    let fx = fixture();
    let feeder = fx.transport.script_connection();

    fx.supervisor.initiate("alice").await;
    settle().await;
    assert_eq!(fx.transport.opened(), 1);

    fx.supervisor.shutdown().await;
    settle().await;
    drop(feeder);

    sleep(Duration::from_millis(10_000)).await;
    assert_eq!(fx.transport.opened(), 1);
}
