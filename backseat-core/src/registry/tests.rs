use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use backseat_proto::{Role, ServerMessage, VideoSubmission};

use crate::models::UserId;
use crate::test_helpers::{seeded_room, video_fixture, MemoryRoomStore};

use super::*;

const CODE: &str = "ABCDEF";

fn rig() -> (Arc<MemoryRoomStore>, RoomRegistry) {
    let store = Arc::new(MemoryRoomStore::new());
    let registry = RoomRegistry::new(store.clone());
    (store, registry)
}

async fn attach_guest(
    registry: &RoomRegistry,
    user: &str,
    conn: &str,
) -> (Snapshot, mpsc::Receiver<ServerMessage>) {
    let (tx, rx) = mpsc::channel(SESSION_CHANNEL_CAPACITY);
    let snapshot = registry
        .attach(AttachRequest {
            room_code: CODE.to_string(),
            user_id: UserId::from_string(user.to_string()),
            role: Role::Guest,
            connection_id: conn.to_string(),
            sender: tx,
        })
        .await
        .expect("attach");
    (snapshot, rx)
}

fn submission(external_id: &str) -> VideoSubmission {
    VideoSubmission {
        external_id: external_id.to_string(),
        title: format!("Title {external_id}"),
        thumbnail: format!("https://thumbs.invalid/{external_id}.jpg"),
    }
}

fn drain(rx: &mut mpsc::Receiver<ServerMessage>) -> Vec<ServerMessage> {
    let mut out = Vec::new();
    while let Ok(message) = rx.try_recv() {
        out.push(message);
    }
    out
}

fn user(id: &str) -> UserId {
    UserId::from_string(id.to_string())
}

#[tokio::test]
async fn attach_unknown_room_is_not_found() {
    let (_store, registry) = rig();
    let (tx, _rx) = mpsc::channel(1);
    let err = registry
        .attach(AttachRequest {
            room_code: "ZZZZZZ".to_string(),
            user_id: user("u1"),
            role: Role::Guest,
            connection_id: "c1".to_string(),
            sender: tx,
        })
        .await
        .expect_err("should not attach");
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn attach_seeds_snapshot_from_durable_store() {
    let (store, registry) = rig();
    let room = seeded_room(&store, CODE);
    store.seed_video(video_fixture(&room.id, "v2", 1));
    store.seed_video(video_fixture(&room.id, "v1", 0));

    let (snapshot, _rx) = attach_guest(&registry, "u1", "c1").await;
    assert_eq!(snapshot.current_video_id, None);
    assert!(!snapshot.is_playing);
    assert_eq!(snapshot.current_time, 0.0);
    let externals: Vec<&str> = snapshot.playlist.iter().map(|e| e.external_id.as_str()).collect();
    assert_eq!(externals, vec!["v1", "v2"], "playlist sorted by order");
}

#[tokio::test]
async fn rejoin_with_same_user_evicts_previous_session() {
    let (store, registry) = rig();
    seeded_room(&store, CODE);

    let (_, mut rx_old) = attach_guest(&registry, "u1", "c1").await;
    let (_, mut rx_new) = attach_guest(&registry, "u1", "c2").await;
    assert_eq!(registry.session_count(CODE).await, 1);

    registry
        .add_video(CODE, &submission("v1"), &user("u1"))
        .await
        .expect("add video");

    assert!(drain(&mut rx_old).is_empty(), "evicted channel must not receive");
    let delivered = drain(&mut rx_new);
    assert!(!delivered.is_empty(), "new channel receives the broadcast");
}

#[tokio::test]
async fn first_video_auto_starts_with_play_video_before_playlist_update() {
    let (store, registry) = rig();
    seeded_room(&store, CODE);
    let (_, mut rx) = attach_guest(&registry, "u1", "c1").await;

    registry
        .add_video(CODE, &submission("v1"), &user("u1"))
        .await
        .expect("add video");

    let messages = drain(&mut rx);
    assert_eq!(messages.len(), 2);
    assert_eq!(
        messages[0],
        ServerMessage::PlayVideo {
            video_id: Some("v1".to_string())
        }
    );
    match &messages[1] {
        ServerMessage::PlaylistUpdate { playlist } => {
            assert_eq!(playlist.len(), 1);
            assert_eq!(playlist[0].external_id, "v1");
        }
        other => panic!("expected PLAYLIST_UPDATE, got {other:?}"),
    }

    assert_eq!(
        store.persisted_playback(CODE),
        Some((Some("v1".to_string()), true, 0.0))
    );
}

#[tokio::test]
async fn adding_to_a_busy_room_does_not_touch_playback() {
    let (store, registry) = rig();
    seeded_room(&store, CODE);
    let (_, mut rx) = attach_guest(&registry, "u1", "c1").await;

    registry.add_video(CODE, &submission("v1"), &user("u1")).await.expect("add");
    drain(&mut rx);

    registry.add_video(CODE, &submission("v2"), &user("u1")).await.expect("add");
    let messages = drain(&mut rx);
    assert_eq!(messages.len(), 1, "no PLAY_VIDEO for a non-idle room");
    assert!(matches!(messages[0], ServerMessage::PlaylistUpdate { .. }));
    assert_eq!(
        store.persisted_playback(CODE),
        Some((Some("v1".to_string()), true, 0.0))
    );
}

#[tokio::test]
async fn bulk_add_preserves_input_order_and_auto_starts_first() {
    let (store, registry) = rig();
    seeded_room(&store, CODE);
    let (_, mut rx) = attach_guest(&registry, "u1", "c1").await;

    let batch = vec![submission("a"), submission("b"), submission("c")];
    registry.add_videos(CODE, &batch, &user("u1")).await.expect("bulk add");

    let messages = drain(&mut rx);
    assert_eq!(
        messages[0],
        ServerMessage::PlayVideo {
            video_id: Some("a".to_string())
        }
    );
    match &messages[1] {
        ServerMessage::PlaylistUpdate { playlist } => {
            let externals: Vec<&str> = playlist.iter().map(|e| e.external_id.as_str()).collect();
            assert_eq!(externals, vec!["a", "b", "c"]);
            let orders: Vec<i32> = playlist.iter().map(|e| e.order).collect();
            assert_eq!(orders, vec![0, 1, 2]);
        }
        other => panic!("expected PLAYLIST_UPDATE, got {other:?}"),
    }
}

#[tokio::test]
async fn removing_the_playing_entry_leaves_current_video_dangling() {
    let (store, registry) = rig();
    seeded_room(&store, CODE);
    let (_, mut rx) = attach_guest(&registry, "u1", "c1").await;

    registry.add_video(CODE, &submission("v1"), &user("u1")).await.expect("add");
    drain(&mut rx);

    let video_id = {
        let (snapshot, _rx2) = attach_guest(&registry, "u2", "c2").await;
        snapshot.playlist[0].id.clone()
    };

    registry.remove_video(CODE, &video_id).await.expect("remove");

    // The playing entry is gone but playback still points at it.
    assert_eq!(
        store.persisted_playback(CODE),
        Some((Some("v1".to_string()), true, 0.0))
    );
    let messages = drain(&mut rx);
    assert_eq!(messages.len(), 1);
    match &messages[0] {
        ServerMessage::PlaylistUpdate { playlist } => assert!(playlist.is_empty()),
        other => panic!("expected PLAYLIST_UPDATE, got {other:?}"),
    }
}

#[tokio::test]
async fn removing_an_unknown_video_is_not_found_and_silent() {
    let (store, registry) = rig();
    seeded_room(&store, CODE);
    let (_, mut rx) = attach_guest(&registry, "u1", "c1").await;

    let err = registry.remove_video(CODE, "missing").await.expect_err("no video");
    assert!(matches!(err, Error::NotFound(_)));
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn select_video_restarts_from_zero() {
    let (store, registry) = rig();
    seeded_room(&store, CODE);
    let (_, mut rx) = attach_guest(&registry, "u1", "c1").await;

    registry.add_video(CODE, &submission("v1"), &user("u1")).await.expect("add");
    registry.add_video(CODE, &submission("v2"), &user("u1")).await.expect("add");
    drain(&mut rx);

    registry.select_video(CODE, "v2").await.expect("select");
    let messages = drain(&mut rx);
    assert_eq!(
        messages,
        vec![ServerMessage::PlayVideo {
            video_id: Some("v2".to_string())
        }]
    );
    assert_eq!(
        store.persisted_playback(CODE),
        Some((Some("v2".to_string()), true, 0.0))
    );
}

#[tokio::test]
async fn next_video_advances_in_order_and_marks_played() {
    let (store, registry) = rig();
    seeded_room(&store, CODE);
    let (_, mut rx) = attach_guest(&registry, "u1", "c1").await;

    registry
        .add_videos(CODE, &[submission("v1"), submission("v2")], &user("u1"))
        .await
        .expect("add");
    drain(&mut rx);

    registry.next_video(CODE).await.expect("next");
    let messages = drain(&mut rx);
    assert_eq!(
        messages[0],
        ServerMessage::PlayVideo {
            video_id: Some("v2".to_string())
        }
    );
    match &messages[1] {
        ServerMessage::PlaylistUpdate { playlist } => {
            assert!(playlist[0].is_played, "advanced-past entry is marked played");
            assert!(!playlist[1].is_played);
        }
        other => panic!("expected PLAYLIST_UPDATE, got {other:?}"),
    }
    assert_eq!(
        store.persisted_playback(CODE),
        Some((Some("v2".to_string()), true, 0.0))
    );
}

#[tokio::test]
async fn next_video_past_the_last_entry_stops_playback() {
    let (store, registry) = rig();
    seeded_room(&store, CODE);
    let (_, mut rx) = attach_guest(&registry, "u1", "c1").await;

    registry
        .add_videos(CODE, &[submission("v1"), submission("v2")], &user("u1"))
        .await
        .expect("add");
    registry.select_video(CODE, "v2").await.expect("select");
    drain(&mut rx);

    registry.next_video(CODE).await.expect("next");
    let messages = drain(&mut rx);
    assert_eq!(messages[0], ServerMessage::PlayVideo { video_id: None });
    assert!(matches!(messages[1], ServerMessage::PlaylistUpdate { .. }));
    assert_eq!(store.persisted_playback(CODE), Some((None, false, 0.0)));
}

#[tokio::test]
async fn next_video_with_unknown_current_stops_playback() {
    let (store, registry) = rig();
    seeded_room(&store, CODE);
    let (_, mut rx) = attach_guest(&registry, "u1", "c1").await;

    registry.add_video(CODE, &submission("v1"), &user("u1")).await.expect("add");
    registry.select_video(CODE, "not-in-playlist").await.expect("select");
    drain(&mut rx);

    registry.next_video(CODE).await.expect("next");
    let messages = drain(&mut rx);
    assert_eq!(messages[0], ServerMessage::PlayVideo { video_id: None });
    assert_eq!(store.persisted_playback(CODE), Some((None, false, 0.0)));
}

#[tokio::test(start_paused = true)]
async fn cooldown_shields_the_play_bit_from_stale_host_reports() {
    let (store, registry) = rig();
    seeded_room(&store, CODE);
    let (_, mut host_rx) = attach_guest(&registry, "host", "h1").await;
    let (_, mut guest_rx) = attach_guest(&registry, "guest", "g1").await;

    registry.add_video(CODE, &submission("v1"), &user("guest")).await.expect("add");
    drain(&mut host_rx);
    drain(&mut guest_rx);

    // Guest pauses; cooldown starts now.
    registry.set_playing(CODE, false).await.expect("pause");
    drain(&mut host_rx);
    drain(&mut guest_rx);

    // 500 ms later the host still believes it is playing.
    tokio::time::advance(Duration::from_millis(500)).await;
    let effective = registry
        .report_position(CODE, "h1", 10.3, true)
        .await
        .expect("report");
    assert_eq!(
        effective,
        EffectivePosition {
            current_time: 10.3,
            is_playing: false,
        }
    );

    // Other clients see the reconciled values.
    let guest_messages = drain(&mut guest_rx);
    assert_eq!(
        guest_messages,
        vec![ServerMessage::SyncTime {
            current_time: 10.3,
            is_playing: false,
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn cooldown_expiry_is_inclusive_at_exactly_three_seconds() {
    let (store, registry) = rig();
    seeded_room(&store, CODE);
    let (_, mut rx) = attach_guest(&registry, "host", "h1").await;
    registry.add_video(CODE, &submission("v1"), &user("host")).await.expect("add");
    registry.set_playing(CODE, false).await.expect("pause");
    drain(&mut rx);

    tokio::time::advance(PLAY_PAUSE_COOLDOWN).await;
    let effective = registry
        .report_position(CODE, "h1", 4.2, true)
        .await
        .expect("report");
    assert!(effective.is_playing, "equality counts as out-of-cooldown");
}

#[tokio::test]
async fn sync_time_is_not_echoed_to_the_reporter() {
    let (store, registry) = rig();
    seeded_room(&store, CODE);
    let (_, mut host_rx) = attach_guest(&registry, "host", "h1").await;
    let (_, mut guest_rx) = attach_guest(&registry, "guest", "g1").await;

    registry.add_video(CODE, &submission("v1"), &user("guest")).await.expect("add");
    drain(&mut host_rx);
    drain(&mut guest_rx);

    registry.report_position(CODE, "h1", 1.0, true).await.expect("report");
    assert!(drain(&mut host_rx).is_empty(), "reporter must not see its own SYNC_TIME");
    assert_eq!(drain(&mut guest_rx).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn position_persistence_is_throttled_to_five_seconds() {
    let (store, registry) = rig();
    seeded_room(&store, CODE);
    let (_, mut rx) = attach_guest(&registry, "host", "h1").await;

    registry.add_video(CODE, &submission("v1"), &user("host")).await.expect("add");
    drain(&mut rx);
    assert_eq!(store.playback_save_count(), 1, "auto-start persists eagerly");

    // Reports every 2 s; only every third one may hit the store.
    registry.report_position(CODE, "h1", 2.0, true).await.expect("report");
    assert_eq!(store.playback_save_count(), 1);

    tokio::time::advance(Duration::from_secs(2)).await;
    registry.report_position(CODE, "h1", 4.0, true).await.expect("report");
    assert_eq!(store.playback_save_count(), 1);

    tokio::time::advance(Duration::from_secs(3)).await;
    registry.report_position(CODE, "h1", 7.0, true).await.expect("report");
    assert_eq!(store.playback_save_count(), 2);

    tokio::time::advance(Duration::from_secs(1)).await;
    registry.report_position(CODE, "h1", 8.0, true).await.expect("report");
    assert_eq!(store.playback_save_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn throttled_persist_failures_are_swallowed() {
    let (store, registry) = rig();
    seeded_room(&store, CODE);
    let (_, mut rx) = attach_guest(&registry, "host", "h1").await;
    registry.add_video(CODE, &submission("v1"), &user("host")).await.expect("add");
    drain(&mut rx);

    tokio::time::advance(Duration::from_secs(5)).await;
    store.set_fail_writes(true);
    let effective = registry
        .report_position(CODE, "h1", 9.0, true)
        .await
        .expect("report must survive a store failure");
    assert_eq!(effective.current_time, 9.0);
}

#[tokio::test]
async fn playlist_write_failure_errors_without_broadcast() {
    let (store, registry) = rig();
    seeded_room(&store, CODE);
    let (_, mut rx) = attach_guest(&registry, "u1", "c1").await;

    store.set_fail_writes(true);
    let err = registry
        .add_video(CODE, &submission("v1"), &user("u1"))
        .await
        .expect_err("store is down");
    assert!(matches!(err, Error::Internal(_)));
    assert!(drain(&mut rx).is_empty(), "failed mutation must not broadcast");
}

#[tokio::test]
async fn playlist_order_stays_total_under_adds_and_removes() {
    let (store, registry) = rig();
    seeded_room(&store, CODE);
    let (_, mut rx) = attach_guest(&registry, "u1", "c1").await;

    for ext in ["a", "b", "c", "d"] {
        registry.add_video(CODE, &submission(ext), &user("u1")).await.expect("add");
    }
    let (snapshot, _rx2) = attach_guest(&registry, "u2", "c2").await;
    let to_remove = snapshot.playlist[1].id.clone();
    registry.remove_video(CODE, &to_remove).await.expect("remove");
    registry.add_video(CODE, &submission("e"), &user("u1")).await.expect("add");
    drain(&mut rx);

    let (snapshot, _rx3) = attach_guest(&registry, "u3", "c3").await;
    let orders: Vec<i32> = snapshot.playlist.iter().map(|e| e.order).collect();
    let mut sorted = orders.clone();
    sorted.sort_unstable();
    sorted.dedup();
    assert_eq!(orders, sorted, "orders strictly increasing with no duplicates");
    assert_eq!(snapshot.playlist.len(), 4);
}

#[tokio::test]
async fn play_with_nothing_selected_is_ignored() {
    let (store, registry) = rig();
    seeded_room(&store, CODE);
    let (_, mut rx) = attach_guest(&registry, "u1", "c1").await;

    registry.set_playing(CODE, true).await.expect("play");
    assert!(drain(&mut rx).is_empty());
    let (snapshot, _rx2) = attach_guest(&registry, "u2", "c2").await;
    assert!(!snapshot.is_playing);
}

#[tokio::test]
async fn play_broadcast_carries_video_and_position() {
    let (store, registry) = rig();
    seeded_room(&store, CODE);
    let (_, mut rx) = attach_guest(&registry, "u1", "c1").await;

    registry.add_video(CODE, &submission("v1"), &user("u1")).await.expect("add");
    registry.report_position(CODE, "other", 42.0, true).await.expect("report");
    registry.set_playing(CODE, false).await.expect("pause");
    drain(&mut rx);

    registry.set_playing(CODE, true).await.expect("play");
    let messages = drain(&mut rx);
    assert_eq!(
        messages,
        vec![ServerMessage::Play {
            video_id: Some("v1".to_string()),
            current_time: 42.0,
        }]
    );
}

#[tokio::test]
async fn detach_garbage_collects_live_state_but_not_the_room() {
    let (store, registry) = rig();
    seeded_room(&store, CODE);
    let (_, _rx) = attach_guest(&registry, "u1", "c1").await;

    registry.add_video(CODE, &submission("v1"), &user("u1")).await.expect("add");
    assert!(registry.is_live(CODE));

    registry.detach(CODE, "c1").await;
    assert!(!registry.is_live(CODE));

    // The durable record and playlist survive; the next join re-seeds.
    let (snapshot, _rx2) = attach_guest(&registry, "u1", "c2").await;
    assert_eq!(snapshot.playlist.len(), 1);
    assert_eq!(snapshot.current_video_id, Some("v1".to_string()));
}

#[tokio::test]
async fn mutating_a_room_with_no_live_state_is_not_found() {
    let (store, registry) = rig();
    seeded_room(&store, CODE);

    let err = registry
        .add_video(CODE, &submission("v1"), &user("u1"))
        .await
        .expect_err("room not live");
    assert!(matches!(err, Error::NotFound(_)));
}
