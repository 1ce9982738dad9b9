//! Core protocol types for inkroom's wire format.
//!
//! Every type here travels "on the wire": it is serialized to JSON, sent
//! over a WebSocket, and parsed by the browser client (or the reverse).
//!
//! Events are internally tagged with a kebab-case `type` and use camelCase
//! field names, so a join request looks like:
//!
//! ```json
//! { "type": "join-room", "roomId": "K7Q2ZD", "displayName": "Ann" }
//! ```

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use inkroom_transport::ConnectionId;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A player's identity: the id of the connection that owns it.
///
/// A player never outlives its connection, so the connection id doubles
/// as the player id. `#[serde(transparent)]` puts it on the wire as a
/// plain number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl From<ConnectionId> for PlayerId {
    fn from(id: ConnectionId) -> Self {
        Self(id.into_inner())
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// Length of a room code.
pub const ROOM_ID_LEN: usize = 6;

/// Symbols a room code is drawn from. 36^6 ≈ 2.2 billion codes.
pub const ROOM_ID_ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// A short, human-typeable room code such as `K7Q2ZD`.
///
/// Not a secret: anyone who knows the code can join the room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Parses a code typed by a human.
    ///
    /// Surrounding whitespace is ignored and lowercase letters are
    /// accepted, so `" k7q2zd "` parses to `K7Q2ZD`.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidRoomId`] if the code has the wrong
    /// length or contains a symbol outside [`ROOM_ID_ALPHABET`].
    pub fn parse(value: &str) -> Result<Self, ProtocolError> {
        let code = value.trim().to_ascii_uppercase();
        let valid = code.len() == ROOM_ID_LEN
            && code.bytes().all(|b| ROOM_ID_ALPHABET.contains(&b));
        if !valid {
            return Err(ProtocolError::InvalidRoomId(value.to_string()));
        }
        Ok(Self(code))
    }

    /// Draws a fresh random code.
    ///
    /// Uniqueness is the caller's concern; the registry regenerates on a
    /// collision with a live room.
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let code = (0..ROOM_ID_LEN)
            .map(|_| ROOM_ID_ALPHABET[rng.random_range(0..ROOM_ID_ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for RoomId {
    type Err = ProtocolError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

/// Milliseconds since the Unix epoch, as stamped on chat messages, pongs,
/// and room creation times.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Players and rooms as seen by clients
// ---------------------------------------------------------------------------

/// A room member as shown in member lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInfo {
    /// The owning connection's identity.
    pub id: PlayerId,
    /// Name shown in the UI.
    pub display_name: String,
    /// 1-based arrival position, stable while the player stays.
    pub slot: u32,
    /// Hex colour derived from the slot (`#RRGGBB`).
    pub color: String,
    /// Unix milliseconds at which the player joined.
    pub joined_at: u64,
}

/// One entry of the `activeRooms` list in [`ServerEvent::Stats`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub room_id: RoomId,
    pub players: usize,
    pub created_at: u64,
}

// ---------------------------------------------------------------------------
// ClientEvent (inbound)
// ---------------------------------------------------------------------------

/// Everything a client may send.
///
/// Decoding fails on an unknown `type` or a missing required field; the
/// server answers that with a validation error to the sender only.
/// Extra fields are ignored; clients send a few of their own, and the
/// envelope fields share the same object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    /// Create a fresh room and join it as its first member.
    CreateRoom { display_name: String },

    /// Join an existing room by code.
    JoinRoom { room_id: String, display_name: String },

    /// A drawing operation.
    ///
    /// `payload` is relayed to the other members untouched. When
    /// `canvas_data` is present it also becomes the room's stored
    /// snapshot, which late joiners receive.
    Draw {
        payload: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        canvas_data: Option<Value>,
    },

    /// Wipe the shared canvas for everyone.
    ClearCanvas,

    /// Ask the other members to undo (no server-side history).
    Undo,

    /// Ask the other members to redo (no server-side history).
    Redo,

    /// A chat line for the whole room.
    ChatMessage { text: String },

    /// Leave the current room.
    LeaveRoom,

    /// Liveness probe.
    Ping,

    /// Does this room exist, and who is in it?
    GetRoom { room_id: String },

    /// Aggregate room and player counts.
    GetStats,

    /// Health probe.
    Health,
}

impl ClientEvent {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreateRoom { .. } => "create-room",
            Self::JoinRoom { .. } => "join-room",
            Self::Draw { .. } => "draw",
            Self::ClearCanvas => "clear-canvas",
            Self::Undo => "undo",
            Self::Redo => "redo",
            Self::ChatMessage { .. } => "chat-message",
            Self::LeaveRoom => "leave-room",
            Self::Ping => "ping",
            Self::GetRoom { .. } => "get-room",
            Self::GetStats => "get-stats",
            Self::Health => "health",
        }
    }
}

// ---------------------------------------------------------------------------
// ServerEvent (outbound)
// ---------------------------------------------------------------------------

/// Everything the server may send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// To the creator: the room exists and you are its first member.
    RoomCreated {
        room_id: RoomId,
        player: PlayerInfo,
        players: Vec<PlayerInfo>,
    },

    /// To a joiner: current members and the canvas to render.
    RoomJoined {
        room_id: RoomId,
        player: PlayerInfo,
        players: Vec<PlayerInfo>,
        canvas_state: Option<Value>,
    },

    /// To the other members: someone joined.
    PlayerJoined {
        player: PlayerInfo,
        players: Vec<PlayerInfo>,
    },

    /// To the remaining members: someone left or disconnected.
    PlayerLeft {
        player_id: PlayerId,
        slot: u32,
        players: Vec<PlayerInfo>,
    },

    /// To the leaver: the explicit `leave-room` went through.
    LeftRoom { room_id: RoomId },

    /// Relayed drawing operation.
    Draw {
        player_id: PlayerId,
        slot: u32,
        payload: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        canvas_data: Option<Value>,
    },

    /// To everyone in the room, the clearer included.
    CanvasCleared { player_id: PlayerId, slot: u32 },

    /// Relayed undo request.
    Undo { player_id: PlayerId, slot: u32 },

    /// Relayed redo request.
    Redo { player_id: PlayerId, slot: u32 },

    /// A chat line, stamped by the server.
    ChatMessage {
        player_id: PlayerId,
        display_name: String,
        slot: u32,
        text: String,
        timestamp: u64,
    },

    /// Reply to `ping`.
    Pong { timestamp: u64 },

    /// Reply to `get-room`.
    RoomInfo {
        room_id: String,
        exists: bool,
        player_count: usize,
        players: Vec<PlayerInfo>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        created_at: Option<u64>,
    },

    /// Reply to `get-stats`.
    Stats {
        total_rooms: usize,
        total_players: usize,
        active_rooms: Vec<RoomSummary>,
    },

    /// Reply to `health`.
    Health {
        status: String,
        timestamp: u64,
        rooms: usize,
        players: usize,
    },

    /// Something the sender did was rejected. Only the sender sees it.
    ///
    /// `code` follows HTTP conventions: 400 invalid event, 404 unknown
    /// room, 409 room full, 500 internal failure.
    Error { code: u16, message: String },
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Wrapper carried by every frame.
///
/// The event's own fields are flattened next to the metadata:
///
/// ```json
/// { "seq": 4, "sentAt": 1718000000000, "type": "pong", "timestamp": 1718000000000 }
/// ```
///
/// Clients may omit `seq` and `sentAt`; both default to 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Per-connection, per-direction sequence number.
    #[serde(default)]
    pub seq: u64,

    /// Unix milliseconds at which the frame was sent.
    #[serde(default, rename = "sentAt")]
    pub sent_at: u64,

    /// The event itself.
    #[serde(flatten)]
    pub event: T,
}

// =========================================================================
// Tests
// =========================================================================
