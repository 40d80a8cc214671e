//! Needs a JetStream-enabled server: `nats-server -js`, then
//! `cargo test --test nats_store_tests -- --ignored`

use chrono::Utc;
use cowatch::room::PlaybackStateRecord;
use cowatch::store::{NatsStore, StateStore};
use std::time::Duration;

fn nats_url() -> String {
    std::env::var("COWATCH_TEST_NATS_URL").unwrap_or_else(|_| "nats://localhost:4222".to_string())
}

#[tokio::test]
#[ignore]
async fn test_watch_outlives_the_store_handle() {
    let reader = NatsStore::connect(&nats_url(), "cowatch-test-rooms", "cowatch-test-playback")
        .await
        .unwrap();
    let writer = NatsStore::connect(&nats_url(), "cowatch-test-rooms", "cowatch-test-playback")
        .await
        .unwrap();

    let room = writer.create_room("alice").await.unwrap();
    let mut feed = reader.watch_state(&room.id).await.unwrap();
    drop(reader);

    let record = PlaybackStateRecord {
        room_id: room.id.clone(),
        video_url: Some("https://cdn.example.com/live/master.m3u8".to_string()),
        is_playing: true,
        playback_time: 12.0,
        updated_at: Utc::now(),
    };
    writer.write_state("alice", record).await.unwrap();

    let update = tokio::time::timeout(Duration::from_secs(2), feed.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(update.playback_time, 12.0);
    assert!(update.is_playing);
}
