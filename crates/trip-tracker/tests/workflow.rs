
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use trip_tracker::{Config, Delivery, Outcome, Tracker};

use self::provider::{MockProvider, TEN_KM};

fn tracker(provider: &MockProvider) -> Tracker<MockProvider> {
    Tracker::new(Arc::new(Config::default()), provider.clone())
}

fn location(trip_id: &str, latitude: f64, longitude: f64) -> Vec<u8> {
    json!({
        "type": "locationUpdate",
        "scheduledBusId": trip_id,
        "latitude": latitude,
        "longitude": longitude
    })
    .to_string()
    .into_bytes()
}

fn reply(outcome: Outcome) -> Value {
    let Outcome::Reply(bytes) = outcome else {
        panic!("should be a direct reply, got {outcome:?}");
    };
    serde_json::from_slice(&bytes).expect("reply should be JSON")
}

fn decode(frame: &Bytes) -> Value {
    serde_json::from_slice(frame).expect("frame should be JSON")
}

#[tokio::test]
async fn update_fans_out_roster() {
    let provider = MockProvider::new();
    let tracker = tracker(&provider);
    let mut observers: Vec<_> = (0..3).map(|_| tracker.subscribe()).collect();

    let outcome = tracker.handle(&location("t1", 0.0, 0.0)).await;
    assert_eq!(outcome, Outcome::Broadcast(Delivery { delivered: 3 }));

    for observer in &mut observers {
        let frame = decode(&observer.recv().await.expect("should receive"));
        assert_eq!(frame["type"], "busUpdate");

        let buses = frame["buses"].as_array().expect("buses array");
        assert_eq!(buses.len(), 4);
        assert_eq!(buses[0]["id"], "t1");
        assert_eq!(buses[0]["stopLog"][0]["stopId"], "s1");
    }
}

#[tokio::test]
async fn departed_observer_does_not_block_others() {
    let provider = MockProvider::new();
    let tracker = tracker(&provider);
    let mut observers: Vec<_> = (0..3).map(|_| tracker.subscribe()).collect();
    let departed = tracker.subscribe();
    assert_eq!(tracker.observers(), 4);

    drop(departed);
    let outcome = tracker.handle(&location("t1", 0.0, 0.0)).await;

    assert_eq!(outcome, Outcome::Broadcast(Delivery { delivered: 3 }));
    assert_eq!(tracker.observers(), 3);
    for observer in &mut observers {
        assert!(observer.try_recv().is_some());
    }
}

#[tokio::test]
async fn slow_observer_ends_on_newest_roster() {
    let provider = MockProvider::new();
    let config = Config { observer_queue_capacity: 1, ..Config::default() };
    let tracker = Tracker::new(Arc::new(config), provider.clone());
    let mut fast = tracker.subscribe();
    let mut slow = tracker.subscribe();

    for longitude in [0.0, TEN_KM / 2.0, TEN_KM] {
        let outcome = tracker.handle(&location("t1", 0.0, longitude)).await;
        assert_eq!(outcome, Outcome::Broadcast(Delivery { delivered: 2 }));
        assert!(fast.try_recv().is_some());
    }

    let mut last = None;
    while let Some(frame) = slow.try_recv() {
        last = Some(decode(&frame));
    }
    let last = last.expect("slow observer should hold a frame");
    let stored = provider.stored("t1").and_then(|trip| trip.position).expect("t1 has a position");

    assert_eq!(last["buses"][0]["position"]["longitude"], json!(stored.longitude));
    assert_eq!(slow.skipped(), 2);
    assert_eq!(tracker.observers(), 2);
}

#[tokio::test]
async fn late_roster_read_does_not_overwrite_newer_state() {
    let provider = MockProvider::new();
    let tracker = tracker(&provider);
    let mut observer = tracker.subscribe();

    // the first update's roster snapshot misses t2 and arrives after t2 is stored
    provider.delay_roster_once(Duration::from_millis(100));
    let at_origin = location("t1", 0.0, 0.0);
    let at_destination = location("t2", 0.0, TEN_KM);
    let (first, second) = tokio::join!(tracker.handle(&at_origin), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        tracker.handle(&at_destination).await
    });
    assert!(matches!(first, Outcome::Broadcast(_)));
    assert!(matches!(second, Outcome::Broadcast(_)));

    let mut frames = Vec::new();
    while let Some(frame) = observer.try_recv() {
        frames.push(decode(&frame));
    }
    assert_eq!(frames.len(), 2);

    let last = frames.last().expect("two frames");
    let stored = provider.stored("t2").and_then(|trip| trip.position).expect("t2 has a position");
    assert_eq!(last["buses"][1]["id"], "t2");
    assert_eq!(last["buses"][1]["position"]["longitude"], json!(stored.longitude));
    assert_eq!(last["buses"][0]["stopLog"][0]["stopId"], "s1");
}

#[tokio::test]
async fn roster_failure_broadcasts_updated_trip() {
    let provider = MockProvider::new();
    provider.fail_roster(true);
    let tracker = tracker(&provider);
    let mut observer = tracker.subscribe();

    let outcome = tracker.handle(&location("t2", 0.0, 0.0)).await;
    assert!(matches!(outcome, Outcome::Broadcast(_)));

    let frame = decode(&observer.recv().await.expect("should receive"));
    let buses = frame["buses"].as_array().expect("buses array");
    assert_eq!(buses.len(), 1);
    assert_eq!(buses[0]["id"], "t2");
}

#[tokio::test]
async fn invalid_update_replies_to_sender_only() {
    let provider = MockProvider::new();
    let tracker = tracker(&provider);
    let mut observer = tracker.subscribe();

    let frame = br#"{"type": "locationUpdate", "scheduledBusId": "t1"}"#;
    let value = reply(tracker.handle(frame).await);

    assert_eq!(value, json!({"error": "Latitude and longitude are required"}));
    assert!(observer.try_recv().is_none());
    assert_eq!(provider.writes(), 0);
}

#[tokio::test]
async fn missing_trip_id() {
    let provider = MockProvider::new();
    let frame = br#"{"type": "locationUpdate", "latitude": 1.0, "longitude": 2.0}"#;

    let value = reply(tracker(&provider).handle(frame).await);
    assert_eq!(value, json!({"error": "Scheduled bus ID is required"}));
}

#[tokio::test]
async fn data_integrity_message_is_returned() {
    let provider = MockProvider::new();
    let value = reply(tracker(&provider).handle(&location("t4", 1.0, 1.0)).await);

    assert_eq!(value, json!({"error": "Route broken has no positive total distance"}));
}

#[tokio::test]
async fn store_failure_is_generic() {
    let provider = MockProvider::new();
    provider.fail_writes(true);

    let value = reply(tracker(&provider).handle(&location("t1", 0.0, 0.0)).await);
    assert_eq!(value, json!({"error": "Failed to process request"}));
}

#[tokio::test]
async fn malformed_frames() {
    let provider = MockProvider::new();
    let tracker = tracker(&provider);

    let frames: [&[u8]; 3] = [b"{not json", br#"{"type": "teleport"}"#, br#""hello""#];
    for frame in frames {
        let value = reply(tracker.handle(frame).await);
        assert_eq!(value, json!({"error": "Failed to process request"}));
    }
}

#[tokio::test]
async fn stop_request_replies_with_page() {
    let provider = MockProvider::new();
    let tracker = tracker(&provider);
    let mut observer = tracker.subscribe();

    let frame = json!({"type": "busStopRequest", "busStopId": "s2", "pageSize": 1}).to_string();
    let value = reply(tracker.handle(frame.as_bytes()).await);

    assert_eq!(value["type"], "busStopResponse");
    assert_eq!(value["buses"]["totalDocs"], 2);
    assert_eq!(value["buses"]["pageSize"], 1);
    assert_eq!(value["buses"]["hasNextPage"], true);
    assert_eq!(value["buses"]["docs"][0]["id"], "t1");

    assert!(observer.try_recv().is_none());
}

#[tokio::test]
async fn stop_request_without_stop() {
    let provider = MockProvider::new();
    let value = reply(tracker(&provider).handle(br#"{"type": "busStopRequest"}"#).await);

    assert_eq!(value, json!({"error": "Bus stop ID is required"}));
}

#[tokio::test]
async fn trip_lookup() {
    let provider = MockProvider::new();
    let tracker = tracker(&provider);

    assert_eq!(tracker.trip("t1").await.expect("should read").map(|trip| trip.id), Some("t1".to_string()));
    assert_eq!(tracker.trip("nope").await.expect("should read"), None);
}
