//! Room actor: an isolated Tokio task that owns one room's shared state.
//!
//! Each room runs in its own task and is reached only through its mailbox,
//! so join, leave, draw, clear, relay and close are serialized per room
//! while unrelated rooms proceed in parallel. The actor also carries the
//! room's deletion timer (see [`Occupancy`]).

use inkroom_protocol::{PlayerId, PlayerInfo, RoomId, ServerEvent, unix_millis};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant};

use crate::broadcast::{BroadcastRouter, PlayerSender};
use crate::member::new_member;
use crate::{Occupancy, RoomConfig, RoomError};

/// Which confirmation the joiner receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// First member of a room it just created: `room-created`.
    Create,
    /// Anyone else: `room-joined` with the canvas snapshot.
    Join,
}

/// Stateless relays that carry no payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayAction {
    Undo,
    Redo,
}

/// What a successful join returns to the caller.
#[derive(Debug, Clone)]
pub struct JoinOutcome {
    /// The joiner's own record.
    pub player: PlayerInfo,
    /// All members in join order, the joiner last.
    pub members: Vec<PlayerInfo>,
    /// The canvas snapshot the joiner was sent.
    pub canvas: Option<Value>,
}

/// What a leave that removed someone returns.
#[derive(Debug, Clone)]
pub struct LeaveOutcome {
    /// The departed member's record.
    pub player: PlayerInfo,
    /// Members still in the room.
    pub remaining: Vec<PlayerInfo>,
}

/// A snapshot of room metadata.
#[derive(Debug, Clone)]
pub struct RoomInfo {
    pub room_id: RoomId,
    pub occupancy: Occupancy,
    pub players: Vec<PlayerInfo>,
    pub capacity: usize,
    pub has_canvas: bool,
    /// Unix milliseconds.
    pub created_at: u64,
}

impl RoomInfo {
    pub fn player_count(&self) -> usize {
        self.players.len()
    }
}

/// Commands sent to a room actor through its channel.
pub(crate) enum RoomCommand {
    Join {
        player_id: PlayerId,
        display_name: String,
        sender: PlayerSender,
        kind: JoinKind,
        reply: oneshot::Sender<Result<JoinOutcome, RoomError>>,
    },
    Leave {
        player_id: PlayerId,
        reply: oneshot::Sender<Option<LeaveOutcome>>,
    },
    Draw {
        sender: PlayerId,
        payload: Value,
        canvas_data: Option<Value>,
    },
    Clear {
        sender: PlayerId,
    },
    Relay {
        sender: PlayerId,
        action: RelayAction,
    },
    Chat {
        sender: PlayerId,
        text: String,
    },
    GetInfo {
        reply: oneshot::Sender<RoomInfo>,
    },
    /// Stop if empty. With `expired_only`, stop only once the grace
    /// period has run out.
    TryClose {
        expired_only: bool,
        reply: oneshot::Sender<bool>,
    },
    Shutdown,
}

/// Answer to a close request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CloseOutcome {
    /// The actor stopped.
    Closed,
    /// Members present, or not empty for long enough.
    Kept,
    /// Mailbox full; the request was not delivered.
    Busy,
}

/// Handle to a running room actor.
///
/// Cheap to clone; the registry holds one per room.
#[derive(Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    /// Returns the room's id.
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// Adds a member.
    ///
    /// Before replying, the actor has already queued the joiner's
    /// confirmation (with the canvas snapshot) on `sender` and told the
    /// other members, so nothing relayed afterwards can overtake it.
    pub async fn join(
        &self,
        player_id: PlayerId,
        display_name: &str,
        sender: PlayerSender,
        kind: JoinKind,
    ) -> Result<JoinOutcome, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RoomCommand::Join {
            player_id,
            display_name: display_name.to_string(),
            sender,
            kind,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| self.unavailable())?
    }

    /// Removes a member. Returns `None` if they were not a member.
    pub async fn leave(&self, player_id: PlayerId) -> Result<Option<LeaveOutcome>, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RoomCommand::Leave {
            player_id,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    /// Relays a drawing operation to the other members, storing
    /// `canvas_data` as the new snapshot when present.
    pub async fn draw(
        &self,
        sender: PlayerId,
        payload: Value,
        canvas_data: Option<Value>,
    ) -> Result<(), RoomError> {
        self.send(RoomCommand::Draw {
            sender,
            payload,
            canvas_data,
        })
        .await
    }

    /// Empties the canvas and tells everyone.
    pub async fn clear(&self, sender: PlayerId) -> Result<(), RoomError> {
        self.send(RoomCommand::Clear { sender }).await
    }

    /// Relays an undo or redo to the other members.
    pub async fn relay(&self, sender: PlayerId, action: RelayAction) -> Result<(), RoomError> {
        self.send(RoomCommand::Relay { sender, action }).await
    }

    /// Sends a chat line to everyone, stamped with the sender's identity.
    pub async fn chat(&self, sender: PlayerId, text: &str) -> Result<(), RoomError> {
        self.send(RoomCommand::Chat {
            sender,
            text: text.to_string(),
        })
        .await
    }

    /// Requests the current room info.
    pub async fn get_info(&self) -> Result<RoomInfo, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RoomCommand::GetInfo { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    /// Asks the actor to stop if it is empty (or, with `expired_only`,
    /// empty for a whole grace period).
    ///
    /// Never waits for mailbox space: a full mailbox answers
    /// [`CloseOutcome::Busy`] straight away.
    pub(crate) async fn try_close(&self, expired_only: bool) -> Result<CloseOutcome, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let cmd = RoomCommand::TryClose {
            expired_only,
            reply: reply_tx,
        };
        match self.sender.try_send(cmd) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => return Ok(CloseOutcome::Busy),
            Err(mpsc::error::TrySendError::Closed(_)) => return Err(self.unavailable()),
        }
        let closed = reply_rx.await.map_err(|_| self.unavailable())?;
        Ok(if closed {
            CloseOutcome::Closed
        } else {
            CloseOutcome::Kept
        })
    }

    /// Tells the room to stop regardless of membership.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.send(RoomCommand::Shutdown).await
    }

    async fn send(&self, cmd: RoomCommand) -> Result<(), RoomError> {
        self.sender.send(cmd).await.map_err(|_| self.unavailable())
    }

    fn unavailable(&self) -> RoomError {
        RoomError::Unavailable(self.room_id.clone())
    }
}

impl std::fmt::Debug for RoomHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomHandle")
            .field("room_id", &self.room_id)
            .finish_non_exhaustive()
    }
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor {
    room_id: RoomId,
    config: RoomConfig,
    created_at: u64,
    /// Members in join order.
    members: Vec<PlayerInfo>,
    router: BroadcastRouter,
    canvas: Option<Value>,
    /// Next slot to hand out. Never reused within the room's lifetime.
    next_slot: u32,
    occupancy: Occupancy,
    /// Armed only while `Draining`.
    deadline: Option<Instant>,
    receiver: mpsc::Receiver<RoomCommand>,
    reaper: mpsc::UnboundedSender<RoomId>,
}

impl RoomActor {
    /// Runs the actor loop until shutdown, a successful close, or every
    /// handle being dropped.
    async fn run(mut self) {
        tracing::debug!(room_id = %self.room_id, "room actor started");

        loop {
            let deadline = self.deadline;
            tokio::select! {
                // Commands first: a join queued alongside the timer wins.
                biased;

                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else { break };
                    if !self.handle(cmd) {
                        break;
                    }
                }
                () = wait_until(deadline) => self.expire(),
            }
        }

        tracing::debug!(room_id = %self.room_id, "room actor stopped");
    }

    /// Handles one command. Returns `false` when the actor should stop.
    fn handle(&mut self, cmd: RoomCommand) -> bool {
        match cmd {
            RoomCommand::Join {
                player_id,
                display_name,
                sender,
                kind,
                reply,
            } => {
                let result = self.handle_join(player_id, &display_name, sender, kind);
                let _ = reply.send(result);
            }
            RoomCommand::Leave { player_id, reply } => {
                let _ = reply.send(self.handle_leave(player_id));
            }
            RoomCommand::Draw {
                sender,
                payload,
                canvas_data,
            } => self.handle_draw(sender, payload, canvas_data),
            RoomCommand::Clear { sender } => self.handle_clear(sender),
            RoomCommand::Relay { sender, action } => self.handle_relay(sender, action),
            RoomCommand::Chat { sender, text } => self.handle_chat(sender, text),
            RoomCommand::GetInfo { reply } => {
                let _ = reply.send(self.info());
            }
            RoomCommand::TryClose {
                expired_only,
                reply,
            } => {
                let close = if expired_only {
                    self.occupancy.is_reapable()
                } else {
                    self.members.is_empty()
                };
                let _ = reply.send(close);
                if close {
                    return false;
                }
            }
            RoomCommand::Shutdown => {
                tracing::info!(room_id = %self.room_id, "room shutting down");
                return false;
            }
        }
        true
    }

    fn handle_join(
        &mut self,
        player_id: PlayerId,
        display_name: &str,
        sender: PlayerSender,
        kind: JoinKind,
    ) -> Result<JoinOutcome, RoomError> {
        if self.member(player_id).is_some() {
            return Err(RoomError::AlreadyMember(player_id, self.room_id.clone()));
        }
        if self.members.len() >= self.config.capacity {
            return Err(RoomError::RoomFull(self.room_id.clone()));
        }

        let slot = self.next_slot;
        self.next_slot += 1;
        let player = new_member(player_id, display_name, slot);
        self.members.push(player.clone());
        self.router.add(player_id, sender);
        self.set_occupancy(Occupancy::Active);

        tracing::info!(
            room_id = %self.room_id,
            %player_id,
            slot,
            players = self.members.len(),
            "player joined"
        );

        let confirmation = match kind {
            JoinKind::Create => ServerEvent::RoomCreated {
                room_id: self.room_id.clone(),
                player: player.clone(),
                players: self.members.clone(),
            },
            JoinKind::Join => ServerEvent::RoomJoined {
                room_id: self.room_id.clone(),
                player: player.clone(),
                players: self.members.clone(),
                canvas_state: self.canvas.clone(),
            },
        };
        self.router.send_to(player_id, confirmation);
        self.router.relay_to_others(
            player_id,
            ServerEvent::PlayerJoined {
                player: player.clone(),
                players: self.members.clone(),
            },
        );

        Ok(JoinOutcome {
            player,
            members: self.members.clone(),
            canvas: self.canvas.clone(),
        })
    }

    fn handle_leave(&mut self, player_id: PlayerId) -> Option<LeaveOutcome> {
        let index = self.members.iter().position(|p| p.id == player_id)?;
        let player = self.members.remove(index);
        self.router.remove(player_id);

        tracing::info!(
            room_id = %self.room_id,
            %player_id,
            slot = player.slot,
            players = self.members.len(),
            "player left"
        );

        self.router.relay_to_all(ServerEvent::PlayerLeft {
            player_id,
            slot: player.slot,
            players: self.members.clone(),
        });

        if self.members.is_empty() {
            self.set_occupancy(Occupancy::Draining);
        }

        Some(LeaveOutcome {
            player,
            remaining: self.members.clone(),
        })
    }

    fn handle_draw(&mut self, sender: PlayerId, payload: Value, canvas_data: Option<Value>) {
        let Some(slot) = self.member_slot(sender) else {
            return;
        };
        if let Some(snapshot) = &canvas_data {
            self.canvas = Some(snapshot.clone());
        }
        self.router.relay_to_others(
            sender,
            ServerEvent::Draw {
                player_id: sender,
                slot,
                payload,
                canvas_data,
            },
        );
    }

    fn handle_clear(&mut self, sender: PlayerId) {
        let Some(slot) = self.member_slot(sender) else {
            return;
        };
        self.canvas = None;
        tracing::debug!(room_id = %self.room_id, %sender, "canvas cleared");
        self.router.relay_to_all(ServerEvent::CanvasCleared {
            player_id: sender,
            slot,
        });
    }

    fn handle_relay(&self, sender: PlayerId, action: RelayAction) {
        let Some(slot) = self.member_slot(sender) else {
            return;
        };
        let event = match action {
            RelayAction::Undo => ServerEvent::Undo {
                player_id: sender,
                slot,
            },
            RelayAction::Redo => ServerEvent::Redo {
                player_id: sender,
                slot,
            },
        };
        self.router.relay_to_others(sender, event);
    }

    fn handle_chat(&self, sender: PlayerId, text: String) {
        let Some(player) = self.member(sender) else {
            self.warn_non_member(sender, "chat-message");
            return;
        };
        self.router.relay_to_all(ServerEvent::ChatMessage {
            player_id: sender,
            display_name: player.display_name.clone(),
            slot: player.slot,
            text,
            timestamp: unix_millis(),
        });
    }

    /// The grace timer fired while the room was still empty.
    fn expire(&mut self) {
        self.set_occupancy(Occupancy::Expired);
        tracing::debug!(room_id = %self.room_id, "empty room expired, requesting reap");
        let _ = self.reaper.send(self.room_id.clone());
    }

    fn set_occupancy(&mut self, next: Occupancy) {
        if self.occupancy == next {
            return;
        }
        debug_assert!(self.occupancy.can_transition_to(next));
        self.occupancy = next;
        self.deadline = match next {
            Occupancy::Draining => Some(Instant::now() + self.config.empty_grace),
            Occupancy::Active | Occupancy::Expired => None,
        };
    }

    fn member(&self, player_id: PlayerId) -> Option<&PlayerInfo> {
        self.members.iter().find(|p| p.id == player_id)
    }

    /// The sender's slot, or `None` (logged) for non-members.
    fn member_slot(&self, sender: PlayerId) -> Option<u32> {
        let slot = self.member(sender).map(|p| p.slot);
        if slot.is_none() {
            self.warn_non_member(sender, "relay");
        }
        slot
    }

    fn warn_non_member(&self, sender: PlayerId, what: &str) {
        tracing::warn!(
            room_id = %self.room_id,
            %sender,
            what,
            "event from non-member, ignoring"
        );
    }

    fn info(&self) -> RoomInfo {
        RoomInfo {
            room_id: self.room_id.clone(),
            occupancy: self.occupancy,
            players: self.members.clone(),
            capacity: self.config.capacity,
            has_canvas: self.canvas.is_some(),
            created_at: self.created_at,
        }
    }
}

/// Resolves at `deadline`, or never when there is none.
async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

/// Spawns a new room actor task and returns a handle to it.
///
/// The room starts empty, so its deletion timer is armed immediately.
pub(crate) fn spawn_room(
    room_id: RoomId,
    config: RoomConfig,
    reaper: mpsc::UnboundedSender<RoomId>,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(config.channel_size.max(1));
    let deadline = Some(Instant::now() + config.empty_grace);

    let actor = RoomActor {
        router: BroadcastRouter::new(room_id.clone()),
        room_id: room_id.clone(),
        config,
        created_at: unix_millis(),
        members: Vec::new(),
        canvas: None,
        next_slot: 1,
        occupancy: Occupancy::Draining,
        deadline,
        receiver: rx,
        reaper,
    };

    tokio::spawn(actor.run());

    RoomHandle { room_id, sender: tx }
}

#[cfg(test)]
impl RoomHandle {
    /// A handle whose mailbox is driven by the test instead of an actor.
    pub(crate) fn detached(room_id: RoomId, sender: mpsc::Sender<RoomCommand>) -> Self {
        Self { room_id, sender }
    }
}
