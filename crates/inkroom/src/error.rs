//! Unified error type for inkroom.

use inkroom_protocol::ProtocolError;
use inkroom_room::RoomError;
use inkroom_session::SessionError;
use inkroom_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impls,
/// so `?` converts layer errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum InkroomError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, malformed room id).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (validation, not in a room).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room-level error (full, not found, unavailable).
    #[error(transparent)]
    Room(#[from] RoomError),
}
