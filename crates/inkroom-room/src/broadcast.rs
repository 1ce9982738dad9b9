//! Fan-out of room events to member connections.
//!
//! Every member registers an unbounded outbound queue when it joins. The
//! room actor is the only caller, so a relay reaches exactly the members
//! present when the actor processes it, and each member's queue sees
//! events in the order the actor emitted them.

use std::collections::HashMap;

use inkroom_protocol::{PlayerId, RoomId, ServerEvent};
use tokio::sync::mpsc;

/// Channel sender for delivering outbound events to one connection.
pub type PlayerSender = mpsc::UnboundedSender<ServerEvent>;

/// Who should receive an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    /// Every member of the room.
    All,
    /// One specific member.
    Player(PlayerId),
    /// Every member except the given one (usually the sender).
    AllExcept(PlayerId),
}

/// The per-room address book.
pub(crate) struct BroadcastRouter {
    room_id: RoomId,
    senders: HashMap<PlayerId, PlayerSender>,
}

impl BroadcastRouter {
    pub(crate) fn new(room_id: RoomId) -> Self {
        Self {
            room_id,
            senders: HashMap::new(),
        }
    }

    pub(crate) fn add(&mut self, player_id: PlayerId, sender: PlayerSender) {
        self.senders.insert(player_id, sender);
    }

    pub(crate) fn remove(&mut self, player_id: PlayerId) {
        self.senders.remove(&player_id);
    }

    /// Delivers to everyone but `sender`.
    pub(crate) fn relay_to_others(&self, sender: PlayerId, event: ServerEvent) {
        self.dispatch(Recipient::AllExcept(sender), event);
    }

    /// Delivers to everyone, `sender` included.
    pub(crate) fn relay_to_all(&self, event: ServerEvent) {
        self.dispatch(Recipient::All, event);
    }

    pub(crate) fn send_to(&self, player_id: PlayerId, event: ServerEvent) {
        self.dispatch(Recipient::Player(player_id), event);
    }

    /// Delivers an event to the chosen members.
    ///
    /// Best effort: a member whose connection is already gone is skipped
    /// silently; there is no retry and no confirmation.
    pub(crate) fn dispatch(&self, recipient: Recipient, event: ServerEvent) {
        match recipient {
            Recipient::Player(player_id) => {
                self.deliver(player_id, event);
            }
            Recipient::All => {
                for player_id in self.senders.keys() {
                    self.deliver(*player_id, event.clone());
                }
            }
            Recipient::AllExcept(excluded) => {
                for player_id in self.senders.keys().filter(|p| **p != excluded) {
                    self.deliver(*player_id, event.clone());
                }
            }
        }
    }

    fn deliver(&self, player_id: PlayerId, event: ServerEvent) {
        if let Some(sender) = self.senders.get(&player_id) {
            if sender.send(event).is_err() {
                tracing::debug!(
                    room_id = %self.room_id,
                    %player_id,
                    "outbound queue closed, dropping event"
                );
            }
        }
    }
}
