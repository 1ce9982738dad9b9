//! Wire protocol for inkroom.
//!
//! This crate defines the events that drawing clients and the room broker
//! exchange ([`ClientEvent`], [`ServerEvent`], wrapped in an [`Envelope`])
//! and the [`Codec`] that turns them into frames. [`JsonCodec`] is the one
//! in use.
//!
//! ```text
//! Transport (frames) → Protocol (Envelope<ClientEvent>) → Session → Room
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{
    ClientEvent, Envelope, PlayerId, PlayerInfo, ROOM_ID_ALPHABET, ROOM_ID_LEN, RoomId,
    RoomSummary, ServerEvent, unix_millis,
};
