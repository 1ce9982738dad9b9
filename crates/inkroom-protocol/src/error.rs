//! Error types for the protocol layer.

/// Errors that can occur in the protocol layer.
///
/// Encoding and decoding failures wrap the original `serde_json::Error`
/// so the message names the offending field ("missing field `roomId`").
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning an event into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, an unknown event `type`,
    /// or a missing required field.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// A room code that is not six characters from `A-Z0-9`.
    #[error("invalid room id {0:?}: expected 6 characters from A-Z and 0-9")]
    InvalidRoomId(String),
}
