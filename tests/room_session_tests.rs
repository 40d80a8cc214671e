mod common;

use common::*;
use cowatch::room::Role;
use cowatch::session::{RoomSession, SessionConfig, SessionPhase};
use cowatch::store::{MemoryStore, StateStore};
use cowatch::sync::{OwnerPhase, SyncPhase};
use std::sync::Arc;

fn config(code: &str, user: &str) -> SessionConfig {
    SessionConfig {
        sync: fast_settings(),
        ..SessionConfig::new(code, user)
    }
}

#[tokio::test]
async fn test_join_unknown_room() {
    let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());

    let err = RoomSession::join(config("12345", "alice"), store.clone(), headless_env())
        .await
        .err()
        .unwrap();
    assert!(err.to_string().contains("not found"));

    let err = RoomSession::join(config("0123", "alice"), store, headless_env())
        .await
        .err()
        .unwrap();
    assert!(err.to_string().contains("Invalid room code"));
}

#[tokio::test]
async fn test_roles_follow_room_owner() {
    let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
    let room = store.create_room("alice").await.unwrap();

    let owner = RoomSession::join(config(&room.code, "alice"), store.clone(), headless_env())
        .await
        .unwrap();
    let viewer = RoomSession::join(config(&room.code, "bob"), store, headless_env())
        .await
        .unwrap();

    assert_eq!(owner.role(), Role::Owner);
    assert_eq!(viewer.role(), Role::Viewer);

    let err = viewer.toggle_play_pause().await.unwrap_err();
    assert!(err.to_string().contains("Only the room owner"));
    assert!(viewer.set_source(STREAM_URL).await.is_err());
    assert!(viewer.seek_relative(5.0).await.is_err());

    owner.leave().await.unwrap();
    viewer.leave().await.unwrap();
}

#[tokio::test]
async fn test_viewer_follows_owner() {
    let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
    let room = store.create_room("alice").await.unwrap();

    let owner = RoomSession::join(config(&room.code, "alice"), store.clone(), headless_env())
        .await
        .unwrap();
    let viewer = RoomSession::join(config(&room.code, "bob"), store.clone(), headless_env())
        .await
        .unwrap();

    owner.set_source(STREAM_URL).await.unwrap();
    owner.toggle_play_pause().await.unwrap();
    owner.seek_relative(60.0).await.unwrap();

    let synced = eventually(|| async {
        let status = viewer.status().await;
        status.ready
            && status.is_playing
            && status.source_url.as_deref() == Some(STREAM_URL)
            && status.local_position_secs.is_some_and(|t| (t - 60.0).abs() < 1.5)
    })
    .await;
    assert!(synced, "viewer never caught up: {:?}", viewer.status().await);

    let status = viewer.status().await;
    assert_eq!(status.phase, SessionPhase::Viewer(SyncPhase::Synced));
    assert!(status.updates_applied >= 3);

    // Owner pauses; viewer pauses too
    owner.toggle_play_pause().await.unwrap();
    let paused = eventually(|| async { !viewer.status().await.is_playing }).await;
    assert!(paused);

    let owner_paused = eventually(|| async {
        owner.status().await.phase == SessionPhase::Owner(OwnerPhase::Paused)
    })
    .await;
    assert!(owner_paused);
    assert_eq!(owner.status().await.publish_failures, 0);

    owner.leave().await.unwrap();
    viewer.leave().await.unwrap();
}

#[tokio::test]
async fn test_late_viewer_starts_from_current_state() {
    let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
    let room = store.create_room("alice").await.unwrap();

    let owner = RoomSession::join(config(&room.code, "alice"), store.clone(), headless_env())
        .await
        .unwrap();
    owner.set_source(STREAM_URL).await.unwrap();
    owner.toggle_play_pause().await.unwrap();
    owner.seek_relative(120.0).await.unwrap();

    let published = eventually(|| async {
        store
            .fetch_state(&room.id)
            .await
            .unwrap()
            .is_some_and(|r| r.is_playing && r.playback_time >= 119.0)
    })
    .await;
    assert!(published);

    let viewer = RoomSession::join(config(&room.code, "carol"), store, headless_env())
        .await
        .unwrap();

    let synced = eventually(|| async {
        viewer
            .status()
            .await
            .local_position_secs
            .is_some_and(|t| (t - 120.0).abs() < 1.5)
    })
    .await;
    assert!(synced, "late viewer not placed: {:?}", viewer.status().await);

    owner.leave().await.unwrap();
    viewer.leave().await.unwrap();
}

#[tokio::test]
async fn test_leave_ends_session() {
    let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
    let room = store.create_room("alice").await.unwrap();

    let owner = RoomSession::join(config(&room.code, "alice"), store, headless_env())
        .await
        .unwrap();
    owner.set_source(STREAM_URL).await.unwrap();

    let final_status = owner.leave().await.unwrap();
    assert!(!final_status.active);
    assert!(!final_status.ready);
    assert!(!owner.is_active());

    // Commands after leaving are refused, a second leave is harmless
    assert!(owner.toggle_play_pause().await.is_err());
    assert!(owner.leave().await.is_ok());
}

#[tokio::test]
async fn test_owner_status_follows_reported_playhead() {
    let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
    let room = store.create_room("alice").await.unwrap();

    let owner = RoomSession::join(config(&room.code, "alice"), store, headless_env())
        .await
        .unwrap();

    owner.set_source(STREAM_URL).await.unwrap();
    owner.toggle_play_pause().await.unwrap();

    let advancing = eventually(|| async {
        let status = owner.status().await;
        status.phase == SessionPhase::Owner(OwnerPhase::Playing)
            && status.local_position_secs.is_some_and(|t| t > 0.2)
    })
    .await;
    assert!(advancing, "owner playhead never reported: {:?}", owner.status().await);

    owner.leave().await.unwrap();
}
