//! Session: the server's record of one connected client.
//!
//! A session tracks:
//! - WHO the client is (`PlayerId`, derived from the connection id)
//! - WHERE it is (which room, and in which slot)
//! - HOW to reach it (the outbound queue its writer task drains)
//!
//! It owns no shared state. Every change to a room goes through the
//! [`RoomRegistry`] or the room's [`RoomHandle`], so the room actor stays
//! the single place where membership and canvas rules are enforced.

use inkroom_protocol::{ClientEvent, PlayerId, RoomId, RoomSummary, ServerEvent, unix_millis};
use inkroom_room::{
    JoinKind, PlayerSender, RelayAction, RoomError, RoomHandle, RoomInfo, RoomRegistry,
};

use crate::SessionError;

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Where a session is in its lifecycle.
///
/// ```text
///   Unjoined ──(create/join)──→ Joined ──(leave-room)──→ Unjoined
///       │                          │
///       └───────(disconnect)───────┴──(disconnect)──→ Closed
/// ```
///
/// - **Unjoined**: connected, not a member of any room.
/// - **Joined**: a member of exactly one room. The handle is a cached
///   lookup; the room's own member list stays authoritative.
/// - **Closed**: the connection is gone. Terminal.
///
/// The room is left on exactly one transition out of `Joined`, which is
/// what makes `leave-room` followed by a disconnect produce a single
/// `player-left`.
#[derive(Debug, Clone)]
pub enum SessionState {
    Unjoined,
    Joined { room: RoomHandle, slot: u32 },
    Closed,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One connection's session.
///
/// Owned by the connection's handler task; nothing else touches it, so it
/// needs no locking. Events are handled one at a time in arrival order.
pub struct Session {
    player_id: PlayerId,
    outbound: PlayerSender,
    registry: RoomRegistry,
    state: SessionState,
}

impl Session {
    /// Creates an unjoined session.
    ///
    /// `outbound` is the queue this connection's writer drains. Rooms get
    /// a clone of it when the session joins.
    pub fn new(player_id: PlayerId, outbound: PlayerSender, registry: RoomRegistry) -> Self {
        Self {
            player_id,
            outbound,
            registry,
            state: SessionState::Unjoined,
        }
    }

    /// This session's player id.
    pub fn player_id(&self) -> PlayerId {
        self.player_id
    }

    /// The current lifecycle state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// The room this session is in, if any.
    pub fn room_id(&self) -> Option<&RoomId> {
        match &self.state {
            SessionState::Joined { room, .. } => Some(room.room_id()),
            _ => None,
        }
    }

    /// The slot held in the current room, if any.
    pub fn slot(&self) -> Option<u32> {
        match &self.state {
            SessionState::Joined { slot, .. } => Some(*slot),
            _ => None,
        }
    }

    /// Handles one client event, reporting any failure back to the client.
    ///
    /// This is what the connection handler calls for every decoded frame.
    /// Failures never escape: they become an `error` event to this client
    /// only.
    pub async fn dispatch(&mut self, event: ClientEvent) {
        let kind = event.kind();
        if let Err(err) = self.handle(event).await {
            self.report(kind, &err);
        }
    }

    /// Handles one client event.
    pub async fn handle(&mut self, event: ClientEvent) -> Result<(), SessionError> {
        if matches!(self.state, SessionState::Closed) {
            return Err(SessionError::Closed);
        }

        match event {
            ClientEvent::CreateRoom { display_name } => {
                self.ensure_unjoined()?;
                let room = self.registry.create_room(None).await?;
                self.enter(room, &display_name, JoinKind::Create).await
            }
            ClientEvent::JoinRoom {
                room_id,
                display_name,
            } => {
                self.ensure_unjoined()?;
                let room_id = RoomId::parse(&room_id)?;
                let room = self.registry.room_for_join(&room_id).await?;
                self.enter(room, &display_name, JoinKind::Join).await
            }
            ClientEvent::Draw {
                payload,
                canvas_data,
            } => {
                let room = self.current_room()?;
                room.draw(self.player_id, payload, canvas_data).await?;
                Ok(())
            }
            ClientEvent::ClearCanvas => {
                self.current_room()?.clear(self.player_id).await?;
                Ok(())
            }
            ClientEvent::Undo => self.relay(RelayAction::Undo).await,
            ClientEvent::Redo => self.relay(RelayAction::Redo).await,
            ClientEvent::ChatMessage { text } => {
                let room = self.current_room()?;
                let text = text.trim();
                if text.is_empty() {
                    return Err(SessionError::Validation("chat text is empty".into()));
                }
                room.chat(self.player_id, text).await?;
                Ok(())
            }
            ClientEvent::LeaveRoom => self.leave().await,
            ClientEvent::Ping => {
                self.send(ServerEvent::Pong {
                    timestamp: unix_millis(),
                });
                Ok(())
            }
            ClientEvent::GetRoom { room_id } => {
                let room_id = RoomId::parse(&room_id)?;
                self.send_room_info(room_id).await
            }
            ClientEvent::GetStats => {
                let stats = self.registry.stats().await;
                self.send(ServerEvent::Stats {
                    total_rooms: stats.total_rooms,
                    total_players: stats.total_players,
                    active_rooms: stats
                        .rooms
                        .iter()
                        .filter(|info| info.player_count() > 0)
                        .map(summary)
                        .collect(),
                });
                Ok(())
            }
            ClientEvent::Health => {
                let stats = self.registry.stats().await;
                self.send(ServerEvent::Health {
                    status: "ok".to_string(),
                    timestamp: unix_millis(),
                    rooms: stats.total_rooms,
                    players: stats.total_players,
                });
                Ok(())
            }
        }
    }

    /// Leaves the current room explicitly and acknowledges with
    /// `left-room`.
    pub async fn leave(&mut self) -> Result<(), SessionError> {
        let room = self.current_room()?.clone();
        let result = room.leave(self.player_id).await;
        // Out of the room either way; a stopped actor has no members left.
        self.state = SessionState::Unjoined;
        if let Err(err) = result {
            tracing::debug!(player_id = %self.player_id, %err, "leave hit a stopped room");
        }

        tracing::debug!(player_id = %self.player_id, room_id = %room.room_id(), "left room");
        self.send(ServerEvent::LeftRoom {
            room_id: room.room_id().clone(),
        });
        Ok(())
    }

    /// Releases the session's slot after the connection went away.
    ///
    /// Safe to call more than once and after an explicit `leave-room`:
    /// the room is left at most once, so remaining members see exactly one
    /// `player-left`.
    pub async fn disconnect(&mut self) {
        let previous = std::mem::replace(&mut self.state, SessionState::Closed);
        if let SessionState::Joined { room, slot } = previous {
            tracing::info!(
                player_id = %self.player_id,
                room_id = %room.room_id(),
                slot,
                "player disconnected, releasing slot"
            );
            if let Err(err) = room.leave(self.player_id).await {
                tracing::warn!(player_id = %self.player_id, %err, "disconnect cleanup failed");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    async fn enter(
        &mut self,
        room: RoomHandle,
        display_name: &str,
        kind: JoinKind,
    ) -> Result<(), SessionError> {
        let outcome = room
            .join(self.player_id, display_name, self.outbound.clone(), kind)
            .await
            .map_err(|err| match err {
                // The room closed between lookup and join.
                RoomError::Unavailable(room_id) => RoomError::NotFound(room_id),
                other => other,
            })?;

        tracing::debug!(
            player_id = %self.player_id,
            room_id = %room.room_id(),
            slot = outcome.player.slot,
            "session joined room"
        );
        self.state = SessionState::Joined {
            room,
            slot: outcome.player.slot,
        };
        Ok(())
    }

    async fn relay(&self, action: RelayAction) -> Result<(), SessionError> {
        self.current_room()?.relay(self.player_id, action).await?;
        Ok(())
    }

    async fn send_room_info(&self, room_id: RoomId) -> Result<(), SessionError> {
        let event = match self.registry.room_info(&room_id).await {
            Ok(info) => ServerEvent::RoomInfo {
                room_id: info.room_id.to_string(),
                exists: true,
                player_count: info.player_count(),
                players: info.players,
                created_at: Some(info.created_at),
            },
            Err(RoomError::NotFound(_)) => ServerEvent::RoomInfo {
                room_id: room_id.to_string(),
                exists: false,
                player_count: 0,
                players: Vec::new(),
                created_at: None,
            },
            Err(err) => return Err(err.into()),
        };
        self.send(event);
        Ok(())
    }

    fn ensure_unjoined(&self) -> Result<(), SessionError> {
        match self.room_id() {
            Some(room_id) => Err(SessionError::AlreadyInRoom(room_id.clone())),
            None => Ok(()),
        }
    }

    fn current_room(&self) -> Result<&RoomHandle, SessionError> {
        match &self.state {
            SessionState::Joined { room, .. } => Ok(room),
            _ => Err(SessionError::NotInRoom),
        }
    }

    fn send(&self, event: ServerEvent) {
        if self.outbound.send(event).is_err() {
            tracing::debug!(player_id = %self.player_id, "outbound queue closed");
        }
    }

    /// Reports a failed event to this client only.
    ///
    /// `kind` names the event for the log; frames that never decoded use
    /// a placeholder.
    pub fn report(&self, kind: &str, err: &SessionError) {
        if err.is_internal() {
            tracing::warn!(
                player_id = %self.player_id,
                event = kind,
                error = %err,
                "internal error handling event"
            );
        } else {
            tracing::debug!(player_id = %self.player_id, event = kind, error = %err, "event rejected");
        }
        self.send(ServerEvent::Error {
            code: err.code(),
            message: err.client_message(),
        });
    }
}

/// Releases the slot if the owner never called [`Session::disconnect`]
/// (for example, the handler task panicked).
///
/// `Drop` is synchronous, so the leave runs as a fire-and-forget task.
impl Drop for Session {
    fn drop(&mut self) {
        let previous = std::mem::replace(&mut self.state, SessionState::Closed);
        let SessionState::Joined { room, .. } = previous else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let player_id = self.player_id;
        runtime.spawn(async move {
            let _ = room.leave(player_id).await;
        });
    }
}

fn summary(info: &RoomInfo) -> RoomSummary {
    RoomSummary {
        room_id: info.room_id.clone(),
        players: info.player_count(),
        created_at: info.created_at,
    }
}
