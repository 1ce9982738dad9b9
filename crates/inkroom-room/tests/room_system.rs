//! Integration tests for the room system: registry, membership, relay,
//! and empty-room reaping.

use std::time::Duration;

use inkroom_protocol::{PlayerId, RoomId, ServerEvent};
use inkroom_room::{
    JoinKind, Occupancy, RelayAction, RoomConfig, RoomError, RoomHandle, RoomRegistry,
};
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time;

const GRACE: Duration = Duration::from_secs(300);

fn config(capacity: usize) -> RoomConfig {
    RoomConfig {
        capacity,
        empty_grace: GRACE,
        ..RoomConfig::default()
    }
}

struct Member {
    id: PlayerId,
    rx: mpsc::UnboundedReceiver<ServerEvent>,
}

impl Member {
    /// Every event queued so far.
    fn drain(&mut self) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}

async fn join(handle: &RoomHandle, id: u64, name: &str) -> Result<(Member, u32), RoomError> {
    let (tx, rx) = mpsc::unbounded_channel();
    let outcome = handle.join(PlayerId(id), name, tx, JoinKind::Join).await?;
    Ok((Member { id: PlayerId(id), rx }, outcome.player.slot))
}

/// Lets every runnable task (actors, reaper) finish its current work.
async fn settle() {
    time::sleep(Duration::from_millis(1)).await;
}

// =========================================================================
// Membership
// =========================================================================

#[tokio::test]
async fn test_join_capacity_never_exceeded() {
    let registry = RoomRegistry::new(config(3));
    let room = registry.create_room(None).await.unwrap();

    let mut members = Vec::new();
    for id in 1..=3 {
        members.push(join(&room, id, "p").await.unwrap());
    }
    for id in 4..=6 {
        let err = join(&room, id, "late").await.err().unwrap();
        assert!(matches!(err, RoomError::RoomFull(_)));
    }

    let info = registry.room_info(room.room_id()).await.unwrap();
    assert_eq!(info.player_count(), 3);
    assert_eq!(info.capacity, 3);
}

#[tokio::test]
async fn test_join_concurrent_burst_respects_capacity() {
    let registry = RoomRegistry::new(config(4));
    let room = registry.create_room(None).await.unwrap();

    let mut tasks = Vec::new();
    for id in 1..=20 {
        let room = room.clone();
        tasks.push(tokio::spawn(async move {
            let (tx, rx) = mpsc::unbounded_channel();
            let result = room.join(PlayerId(id), "p", tx, JoinKind::Join).await;
            (result.map(|o| o.player.slot), rx)
        }));
    }

    let mut slots = Vec::new();
    let mut receivers = Vec::new();
    for task in tasks {
        let (result, rx) = task.await.unwrap();
        receivers.push(rx);
        match result {
            Ok(slot) => slots.push(slot),
            Err(err) => assert!(matches!(err, RoomError::RoomFull(_))),
        }
    }
    slots.sort_unstable();
    assert_eq!(slots, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn test_slot_after_departure_is_fresh() {
    let registry = RoomRegistry::new(config(10));
    let room = registry.create_room(None).await.unwrap();

    let (a, slot_a) = join(&room, 1, "A").await.unwrap();
    let (_b, slot_b) = join(&room, 2, "B").await.unwrap();
    assert_eq!((slot_a, slot_b), (1, 2));

    room.leave(a.id).await.unwrap();
    let (_c, slot_c) = join(&room, 3, "C").await.unwrap();
    assert_eq!(slot_c, 3);

    let info = room.get_info().await.unwrap();
    let slots: Vec<u32> = info.players.iter().map(|p| p.slot).collect();
    assert_eq!(slots, vec![2, 3]);
}

#[tokio::test]
async fn test_leave_twice_notifies_once() {
    let registry = RoomRegistry::new(config(10));
    let room = registry.create_room(None).await.unwrap();
    let (mut ann, _) = join(&room, 1, "Ann").await.unwrap();
    let (bo, _) = join(&room, 2, "Bo").await.unwrap();
    ann.drain();

    assert!(room.leave(bo.id).await.unwrap().is_some());
    assert!(room.leave(bo.id).await.unwrap().is_none());
    room.get_info().await.unwrap();

    let left: Vec<_> = ann
        .drain()
        .into_iter()
        .filter(|e| matches!(e, ServerEvent::PlayerLeft { .. }))
        .collect();
    assert_eq!(left.len(), 1);
}

// =========================================================================
// Canvas and relay
// =========================================================================

#[tokio::test]
async fn test_join_snapshot_tracks_last_draw_and_clear() {
    let registry = RoomRegistry::new(config(10));
    let room = registry.create_room(None).await.unwrap();
    let (ann, _) = join(&room, 1, "Ann").await.unwrap();

    room.draw(ann.id, json!({"op": "line"}), Some(json!("v1")))
        .await
        .unwrap();
    let (tx, _rx) = mpsc::unbounded_channel();
    let bo = room.join(PlayerId(2), "Bo", tx, JoinKind::Join).await.unwrap();
    assert_eq!(bo.canvas, Some(json!("v1")));

    room.clear(ann.id).await.unwrap();
    let (tx, _rx) = mpsc::unbounded_channel();
    let cid = room.join(PlayerId(3), "Cid", tx, JoinKind::Join).await.unwrap();
    assert_eq!(cid.canvas, None);
}

#[tokio::test]
async fn test_relay_excludes_sender_for_draw_undo_redo() {
    let registry = RoomRegistry::new(config(10));
    let room = registry.create_room(None).await.unwrap();
    let (mut ann, _) = join(&room, 1, "Ann").await.unwrap();
    let (mut bo, _) = join(&room, 2, "Bo").await.unwrap();
    ann.drain();
    bo.drain();

    room.draw(ann.id, json!("P1"), None).await.unwrap();
    room.relay(ann.id, RelayAction::Undo).await.unwrap();
    room.relay(ann.id, RelayAction::Redo).await.unwrap();
    room.get_info().await.unwrap();

    assert!(ann.drain().is_empty());
    let received = bo.drain();
    assert_eq!(received.len(), 3);
    assert!(matches!(&received[0], ServerEvent::Draw { payload, .. } if *payload == json!("P1")));
    assert!(matches!(received[1], ServerEvent::Undo { slot: 1, .. }));
    assert!(matches!(received[2], ServerEvent::Redo { slot: 1, .. }));
}

#[tokio::test]
async fn test_clear_and_chat_reach_everyone() {
    let registry = RoomRegistry::new(config(10));
    let room = registry.create_room(None).await.unwrap();
    let (mut ann, _) = join(&room, 1, "Ann").await.unwrap();
    let (mut bo, _) = join(&room, 2, "Bo").await.unwrap();
    ann.drain();
    bo.drain();

    room.clear(bo.id).await.unwrap();
    room.chat(bo.id, "hi").await.unwrap();
    room.get_info().await.unwrap();

    for member in [&mut ann, &mut bo] {
        let events = member.drain();
        assert!(matches!(events[0], ServerEvent::CanvasCleared { slot: 2, .. }));
        assert!(matches!(&events[1], ServerEvent::ChatMessage { text, .. } if text == "hi"));
    }
}

#[tokio::test]
async fn test_rooms_are_isolated() {
    let registry = RoomRegistry::new(config(10));
    let first = registry.create_room(None).await.unwrap();
    let second = registry.create_room(None).await.unwrap();
    let (ann, _) = join(&first, 1, "Ann").await.unwrap();
    let (mut bo, _) = join(&second, 2, "Bo").await.unwrap();
    bo.drain();

    first.draw(ann.id, json!("x"), Some(json!("snap"))).await.unwrap();
    first.get_info().await.unwrap();

    assert!(bo.drain().is_empty());
    assert!(!second.get_info().await.unwrap().has_canvas);
}

// =========================================================================
// Reaper
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_reaper_waits_full_grace_before_deleting() {
    let registry = RoomRegistry::new(config(10));
    let room = registry.create_room(None).await.unwrap();
    let room_id = room.room_id().clone();
    drop(room);

    time::advance(GRACE - Duration::from_secs(1)).await;
    settle().await;
    assert!(registry.get_room(&room_id).await.is_ok());

    time::advance(Duration::from_secs(2)).await;
    settle().await;
    assert!(matches!(
        registry.get_room(&room_id).await,
        Err(RoomError::NotFound(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_reaper_rejoin_within_grace_keeps_room() {
    let registry = RoomRegistry::new(config(10));
    let room = registry.create_room(None).await.unwrap();
    let room_id = room.room_id().clone();

    let (ann, _) = join(&room, 1, "Ann").await.unwrap();
    room.leave(ann.id).await.unwrap();
    assert_eq!(room.get_info().await.unwrap().occupancy, Occupancy::Draining);

    time::advance(GRACE / 2).await;
    let again = registry.room_for_join(&room_id).await.unwrap();
    let (_ann, slot) = join(&again, 1, "Ann").await.unwrap();
    assert_eq!(slot, 2);

    time::advance(GRACE * 2).await;
    settle().await;
    let info = registry.room_info(&room_id).await.unwrap();
    assert_eq!(info.occupancy, Occupancy::Active);
}

#[tokio::test(start_paused = true)]
async fn test_reaper_reemptied_room_gets_fresh_grace() {
    let registry = RoomRegistry::new(config(10));
    let room = registry.create_room(None).await.unwrap();
    let room_id = room.room_id().clone();

    // Empty at t=0; rejoined and emptied again at t=200.
    time::advance(Duration::from_secs(200)).await;
    let (ann, _) = join(&room, 1, "Ann").await.unwrap();
    room.leave(ann.id).await.unwrap();
    drop(room);

    // Past the first deadline, short of the second.
    time::advance(Duration::from_secs(150)).await;
    settle().await;
    assert!(registry.get_room(&room_id).await.is_ok());

    time::advance(Duration::from_secs(151)).await;
    settle().await;
    assert!(registry.get_room(&room_id).await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_reaper_leaves_occupied_room_alone() {
    let registry = RoomRegistry::new(config(10));
    let room = registry.create_room(None).await.unwrap();
    let (_ann, _) = join(&room, 1, "Ann").await.unwrap();

    time::advance(GRACE * 3).await;
    settle().await;
    assert_eq!(registry.room_count().await, 1);
}

#[tokio::test]
async fn test_delete_room_then_join_fails_not_found() {
    let registry = RoomRegistry::new(config(10));
    let room = registry.create_room(None).await.unwrap();
    let room_id: RoomId = room.room_id().clone();

    assert!(registry.delete_room(&room_id).await.unwrap());
    assert!(matches!(
        registry.room_for_join(&room_id).await,
        Err(RoomError::NotFound(_))
    ));
    assert!(matches!(
        join(&room, 1, "Ann").await,
        Err(RoomError::Unavailable(_))
    ));
}
