//! Unit tests for the state update bus.

use std::time::Duration;

use serde_json::json;
use tokio::time::timeout;

use crate::event_bus::{EventBus, StateUpdate};

#[tokio::test]
async fn publish_reaches_every_subscriber() {
    let bus = EventBus::new(64);
    let mut rx1 = bus.subscribe();
    let mut rx2 = bus.subscribe();

    let update = StateUpdate::new("msg/synced", json!({"url": "synced", "body": {}}));
    let receivers = bus.publish(update).await;
    assert_eq!(receivers, 2);

    let received1 = timeout(Duration::from_secs(1), rx1.recv())
        .await
        .unwrap()
        .unwrap();
    let received2 = timeout(Duration::from_secs(1), rx2.recv())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(received1.event, "msg/synced");
    assert_eq!(received2.event, "msg/synced");

    let stats = bus.get_stats().await;
    assert_eq!(stats.updates_published, 1);
    assert_eq!(*stats.event_counts.get("msg/synced").unwrap(), 1);
}

#[tokio::test]
async fn publish_without_subscribers_is_counted_as_dropped() {
    let bus = EventBus::new(64);

    let receivers = bus
        .publish(StateUpdate::new("msg/synced", json!({})))
        .await;
    assert_eq!(receivers, 0);

    let stats = bus.get_stats().await;
    assert_eq!(stats.updates_published, 0);
    assert_eq!(stats.updates_dropped, 1);
}

#[tokio::test]
async fn reset_stats_clears_counters() {
    let bus = EventBus::new(64);
    let _rx = bus.subscribe();

    for i in 0..5 {
        bus.publish(StateUpdate::new(
            &format!("msg/event{i}"),
            json!({"data": i}),
        ))
        .await;
    }

    let stats_before = bus.get_stats().await;
    assert_eq!(stats_before.updates_published, 5);

    bus.reset_stats().await;

    let stats_after = bus.get_stats().await;
    assert_eq!(stats_after.updates_published, 0);
    assert_eq!(stats_after.event_counts.len(), 0);
}

#[tokio::test]
async fn subscriber_count_tracks_live_receivers() {
    let bus = EventBus::new(64);
    assert_eq!(bus.subscriber_count(), 0);

    let _rx1 = bus.subscribe();
    let _rx2 = bus.subscribe();
    assert_eq!(bus.subscriber_count(), 2);

    {
        let _temp = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 3);
    }
    assert_eq!(bus.subscriber_count(), 2);
}
