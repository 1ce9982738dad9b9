//! Error types for the session layer.

use inkroom_protocol::{ProtocolError, RoomId};
use inkroom_room::RoomError;

/// Errors that can occur while a session handles one client event.
///
/// Every variant is connection-local: it rejects the single event that
/// caused it, leaves shared room state untouched, and is reported only to
/// the sender as an `error` event with the status from [`code`](Self::code).
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A required field was blank or otherwise unusable.
    #[error("invalid event: {0}")]
    Validation(String),

    /// `create-room` or `join-room` while already a member somewhere.
    /// A connection must `leave-room` before entering another room.
    #[error("already in room {0}; leave it first")]
    AlreadyInRoom(RoomId),

    /// A room-scoped event (draw, chat, leave...) sent outside any room.
    #[error("not in a room")]
    NotInRoom,

    /// The connection has already disconnected.
    #[error("session closed")]
    Closed,

    /// The event could not be decoded, or named a malformed room id.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The room layer refused the operation.
    #[error(transparent)]
    Room(#[from] RoomError),
}

impl SessionError {
    /// HTTP-style status sent to the client.
    ///
    /// - `400`: the event itself was invalid
    /// - `404`: the room does not exist
    /// - `409`: the room is full (or the id is already taken)
    /// - `500`: something failed on the server side
    pub fn code(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::AlreadyInRoom(_) | Self::NotInRoom | Self::Closed => 400,
            Self::Protocol(ProtocolError::Encode(_)) => 500,
            Self::Protocol(_) => 400,
            Self::Room(RoomError::NotFound(_)) => 404,
            Self::Room(RoomError::RoomFull(_) | RoomError::AlreadyExists(_)) => 409,
            Self::Room(RoomError::AlreadyMember(..)) => 400,
            Self::Room(RoomError::Unavailable(_)) => 500,
        }
    }

    /// Returns `true` for failures the client did not cause.
    pub fn is_internal(&self) -> bool {
        self.code() >= 500
    }

    /// The message sent to the client.
    ///
    /// Internal failures are reported opaquely; their detail goes to the
    /// log instead.
    pub fn client_message(&self) -> String {
        if self.is_internal() {
            "internal error".to_string()
        } else {
            self.to_string()
        }
    }
}
