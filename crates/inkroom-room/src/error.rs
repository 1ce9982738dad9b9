//! Error types for the room layer.

use inkroom_protocol::{PlayerId, RoomId};

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// The room is at capacity; membership is unchanged.
    #[error("room {0} is full")]
    RoomFull(RoomId),

    /// Creation-only semantics were requested and the id is taken.
    #[error("room {0} already exists")]
    AlreadyExists(RoomId),

    /// The player is already a member of this room.
    #[error("player {0} already in room {1}")]
    AlreadyMember(PlayerId, RoomId),

    /// The room's actor has stopped or its mailbox is closed.
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),
}
