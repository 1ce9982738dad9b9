//! Room registry: creates, looks up, and deletes rooms.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use inkroom_protocol::RoomId;
use tokio::sync::{Mutex, mpsc};

use crate::reaper::spawn_reaper;
use crate::room::{CloseOutcome, spawn_room};
use crate::{CreationPolicy, MissingRoomPolicy, RoomConfig, RoomError, RoomHandle, RoomInfo};

/// How long a reap waits before retrying a room whose mailbox was full.
const BUSY_REAP_RETRY: Duration = Duration::from_millis(250);

/// Aggregate counts across every live room.
#[derive(Debug, Clone)]
pub struct RegistryStats {
    pub total_rooms: usize,
    pub total_players: usize,
    /// Per-room details, in no particular order.
    pub rooms: Vec<RoomInfo>,
}

/// Owns every live room.
///
/// This is the entry point for room operations from the session layer.
/// Clones share the same rooms. The map lock guards only the map itself
/// and the check-then-delete sequence; room state lives in each room's
/// actor, so unrelated rooms never wait on each other.
///
/// Deleting a room asks its actor under the map lock. The request is never
/// queued behind a full mailbox (a busy room is skipped instead), so the
/// lock is held for at most one mailbox's worth of in-memory commands.
///
/// Dropping the last clone stops the reaper and every room actor.
#[derive(Clone)]
pub struct RoomRegistry {
    inner: Arc<RegistryInner>,
}

pub(crate) struct RegistryInner {
    rooms: Mutex<HashMap<RoomId, RoomHandle>>,
    config: RoomConfig,
    reap_tx: mpsc::UnboundedSender<RoomId>,
}

impl RoomRegistry {
    /// Creates an empty registry and starts its reaper.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: RoomConfig) -> Self {
        let (reap_tx, reap_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(RegistryInner {
            rooms: Mutex::new(HashMap::new()),
            config,
            reap_tx,
        });
        spawn_reaper(Arc::downgrade(&inner), reap_rx);
        Self { inner }
    }

    /// Returns the configuration every room is created with.
    pub fn config(&self) -> &RoomConfig {
        &self.inner.config
    }

    /// Creates a room.
    ///
    /// With no id, a fresh one is generated, retrying on collision with a
    /// live room. With an explicit id that is already live, the outcome
    /// follows [`RoomConfig::creation`].
    pub async fn create_room(&self, requested: Option<RoomId>) -> Result<RoomHandle, RoomError> {
        let mut rooms = self.inner.rooms.lock().await;
        let room_id = match requested {
            Some(room_id) => {
                if let Some(existing) = rooms.get(&room_id) {
                    return match self.inner.config.creation {
                        CreationPolicy::Idempotent => Ok(existing.clone()),
                        CreationPolicy::CreateOnly => Err(RoomError::AlreadyExists(room_id)),
                    };
                }
                room_id
            }
            None => loop {
                let candidate = RoomId::generate();
                if !rooms.contains_key(&candidate) {
                    break candidate;
                }
                tracing::debug!(room_id = %candidate, "generated room id collided, retrying");
            },
        };
        Ok(self.inner.insert_room(&mut rooms, room_id))
    }

    /// Looks up a live room.
    pub async fn get_room(&self, room_id: &RoomId) -> Result<RoomHandle, RoomError> {
        self.inner
            .rooms
            .lock()
            .await
            .get(room_id)
            .cloned()
            .ok_or_else(|| RoomError::NotFound(room_id.clone()))
    }

    /// Resolves the room a `join-room` should enter.
    ///
    /// An unknown id is created or rejected per
    /// [`RoomConfig::join_missing`].
    pub async fn room_for_join(&self, room_id: &RoomId) -> Result<RoomHandle, RoomError> {
        let mut rooms = self.inner.rooms.lock().await;
        if let Some(handle) = rooms.get(room_id) {
            return Ok(handle.clone());
        }
        match self.inner.config.join_missing {
            MissingRoomPolicy::Reject => Err(RoomError::NotFound(room_id.clone())),
            MissingRoomPolicy::Create => Ok(self.inner.insert_room(&mut rooms, room_id.clone())),
        }
    }

    /// Deletes a room if it is empty.
    ///
    /// Returns `Ok(false)` and leaves the room alone if it has members or
    /// its mailbox is too full to take the request.
    /// The emptiness check runs inside the room actor while the registry
    /// lock is held, so a concurrent join either lands first (and the room
    /// stays) or finds the room gone.
    pub async fn delete_room(&self, room_id: &RoomId) -> Result<bool, RoomError> {
        let mut rooms = self.inner.rooms.lock().await;
        let handle = rooms
            .get(room_id)
            .cloned()
            .ok_or_else(|| RoomError::NotFound(room_id.clone()))?;
        let outcome = RegistryInner::close_locked(&mut rooms, &handle, false).await;
        Ok(outcome == CloseOutcome::Closed)
    }

    /// Returns info about a specific room.
    pub async fn room_info(&self, room_id: &RoomId) -> Result<RoomInfo, RoomError> {
        let handle = self.get_room(room_id).await?;
        handle.get_info().await.map_err(|err| match err {
            RoomError::Unavailable(id) => RoomError::NotFound(id),
            other => other,
        })
    }

    /// Lists every live room.
    ///
    /// Rooms that fail to respond (closing down) are skipped.
    pub async fn list_rooms(&self) -> Vec<RoomInfo> {
        let handles: Vec<RoomHandle> = self.inner.rooms.lock().await.values().cloned().collect();
        let mut infos = Vec::with_capacity(handles.len());
        for handle in handles {
            if let Ok(info) = handle.get_info().await {
                infos.push(info);
            }
        }
        infos
    }

    /// Aggregate room and player counts.
    pub async fn stats(&self) -> RegistryStats {
        let rooms = self.list_rooms().await;
        RegistryStats {
            total_rooms: rooms.len(),
            total_players: rooms.iter().map(RoomInfo::player_count).sum(),
            rooms,
        }
    }

    /// Number of live rooms.
    pub async fn room_count(&self) -> usize {
        self.inner.rooms.lock().await.len()
    }

    /// Stops every room, members or not.
    pub async fn shutdown(&self) {
        let drained: Vec<(RoomId, RoomHandle)> = self.inner.rooms.lock().await.drain().collect();
        for (room_id, handle) in drained {
            let _ = handle.shutdown().await;
            tracing::debug!(%room_id, "room stopped for shutdown");
        }
    }
}

impl RegistryInner {
    fn insert_room(&self, rooms: &mut HashMap<RoomId, RoomHandle>, room_id: RoomId) -> RoomHandle {
        let handle = spawn_room(room_id.clone(), self.config.clone(), self.reap_tx.clone());
        rooms.insert(room_id.clone(), handle.clone());
        tracing::info!(%room_id, rooms = rooms.len(), "room created");
        handle
    }

    /// Deletes a room whose grace period has run out.
    ///
    /// A room rejoined since it expired is no longer `Expired` and stays.
    /// A room too busy to answer is retried after [`BUSY_REAP_RETRY`].
    pub(crate) async fn reap(&self, room_id: &RoomId) {
        let mut rooms = self.rooms.lock().await;
        let Some(handle) = rooms.get(room_id).cloned() else {
            return;
        };
        match Self::close_locked(&mut rooms, &handle, true).await {
            CloseOutcome::Closed => {}
            CloseOutcome::Kept => tracing::debug!(%room_id, "reap skipped, room repopulated"),
            CloseOutcome::Busy => {
                tracing::debug!(%room_id, "room mailbox full, retrying reap later");
                let reap_tx = self.reap_tx.clone();
                let room_id = room_id.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(BUSY_REAP_RETRY).await;
                    let _ = reap_tx.send(room_id);
                });
            }
        }
    }

    /// Asks the actor to stop and, if it does, drops it from the map.
    async fn close_locked(
        rooms: &mut HashMap<RoomId, RoomHandle>,
        handle: &RoomHandle,
        expired_only: bool,
    ) -> CloseOutcome {
        let room_id = handle.room_id();
        match handle.try_close(expired_only).await {
            Ok(CloseOutcome::Closed) => {
                rooms.remove(room_id);
                tracing::info!(%room_id, rooms = rooms.len(), "room deleted");
                CloseOutcome::Closed
            }
            Ok(outcome) => outcome,
            Err(err) => {
                rooms.remove(room_id);
                tracing::warn!(%room_id, %err, "dropped stale room entry");
                CloseOutcome::Closed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use inkroom_protocol::PlayerId;

    use super::*;
    use crate::JoinKind;

    fn registry_with(config: RoomConfig) -> RoomRegistry {
        RoomRegistry::new(config)
    }

    fn id(code: &str) -> RoomId {
        RoomId::parse(code).unwrap()
    }

    #[tokio::test]
    async fn test_create_room_generates_unique_ids() {
        let registry = registry_with(RoomConfig::default());
        let a = registry.create_room(None).await.unwrap();
        let b = registry.create_room(None).await.unwrap();
        assert_eq!(a.room_id().as_str().len(), 6);
        assert_ne!(a.room_id(), b.room_id());
        assert_eq!(registry.room_count().await, 2);
    }

    #[tokio::test]
    async fn test_create_room_explicit_id_idempotent_by_default() {
        let registry = registry_with(RoomConfig::default());
        registry.create_room(Some(id("ABC123"))).await.unwrap();
        let again = registry.create_room(Some(id("ABC123"))).await.unwrap();
        assert_eq!(again.room_id(), &id("ABC123"));
        assert_eq!(registry.room_count().await, 1);
    }

    #[tokio::test]
    async fn test_create_room_create_only_rejects_taken_id() {
        let registry = registry_with(RoomConfig {
            creation: CreationPolicy::CreateOnly,
            ..RoomConfig::default()
        });
        registry.create_room(Some(id("ABC123"))).await.unwrap();
        let err = registry.create_room(Some(id("ABC123"))).await.err().unwrap();
        assert!(matches!(err, RoomError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_get_room_unknown_is_not_found() {
        let registry = registry_with(RoomConfig::default());
        let err = registry.get_room(&id("ZZZ999")).await.err().unwrap();
        assert!(matches!(err, RoomError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_room_for_join_missing_rejects_by_default() {
        let registry = registry_with(RoomConfig::default());
        let err = registry.room_for_join(&id("ZZZ999")).await.err().unwrap();
        assert!(matches!(err, RoomError::NotFound(_)));
        assert_eq!(registry.room_count().await, 0);
    }

    #[tokio::test]
    async fn test_room_for_join_missing_creates_when_configured() {
        let registry = registry_with(RoomConfig {
            join_missing: MissingRoomPolicy::Create,
            ..RoomConfig::default()
        });
        let handle = registry.room_for_join(&id("ZZZ999")).await.unwrap();
        assert_eq!(handle.room_id(), &id("ZZZ999"));
        assert_eq!(registry.room_count().await, 1);
    }

    #[tokio::test]
    async fn test_delete_room_refuses_occupied_room() {
        let registry = registry_with(RoomConfig::default());
        let handle = registry.create_room(None).await.unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        handle
            .join(PlayerId(1), "Ann", tx, JoinKind::Create)
            .await
            .unwrap();

        assert!(!registry.delete_room(handle.room_id()).await.unwrap());
        assert!(registry.get_room(handle.room_id()).await.is_ok());

        handle.leave(PlayerId(1)).await.unwrap();
        assert!(registry.delete_room(handle.room_id()).await.unwrap());
        assert!(registry.get_room(handle.room_id()).await.is_err());
    }

    #[tokio::test]
    async fn test_stats_counts_rooms_and_players() {
        let registry = registry_with(RoomConfig::default());
        let first = registry.create_room(None).await.unwrap();
        registry.create_room(None).await.unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        first
            .join(PlayerId(1), "Ann", tx, JoinKind::Create)
            .await
            .unwrap();

        let stats = registry.stats().await;
        assert_eq!(stats.total_rooms, 2);
        assert_eq!(stats.total_players, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reap_busy_room_does_not_wait_and_retries() {
        let registry = registry_with(RoomConfig::default());
        let room_id = id("BUSY01");
        let (sender, mailbox) = mpsc::channel(1);
        let handle = RoomHandle::detached(room_id.clone(), sender);
        handle.shutdown().await.unwrap();
        registry
            .inner
            .rooms
            .lock()
            .await
            .insert(room_id.clone(), handle);

        registry.inner.reap(&room_id).await;
        assert_eq!(registry.room_count().await, 1);
        assert!(registry.create_room(None).await.is_ok());

        // Once the stuck room goes away, the retried reap clears its entry.
        drop(mailbox);
        tokio::time::sleep(BUSY_REAP_RETRY * 2).await;
        assert!(registry.get_room(&room_id).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_room_busy_room_left_alone() {
        let registry = registry_with(RoomConfig::default());
        let room_id = id("BUSY02");
        let (sender, _mailbox) = mpsc::channel(1);
        let handle = RoomHandle::detached(room_id.clone(), sender);
        handle.shutdown().await.unwrap();
        registry
            .inner
            .rooms
            .lock()
            .await
            .insert(room_id.clone(), handle);

        assert!(!registry.delete_room(&room_id).await.unwrap());
        assert!(registry.get_room(&room_id).await.is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_stops_all_rooms() {
        let registry = registry_with(RoomConfig::default());
        let handle = registry.create_room(None).await.unwrap();
        registry.shutdown().await;
        assert_eq!(registry.room_count().await, 0);
        assert!(matches!(
            handle.get_info().await,
            Err(RoomError::Unavailable(_))
        ));
    }
}
