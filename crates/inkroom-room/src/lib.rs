//! Rooms for inkroom.
//!
//! Each room runs as an isolated Tokio task (actor model) owning its
//! member list, canvas snapshot, and deletion timer.
//!
//! # Key types
//!
//! - [`RoomRegistry`]: creates, looks up, and deletes rooms
//! - [`RoomHandle`]: send commands to a running room actor
//! - [`RoomConfig`]: capacity, grace period, creation policies
//! - [`Occupancy`]: the empty-room reaping state machine

mod broadcast;
mod config;
mod error;
mod member;
mod reaper;
mod registry;
mod room;

pub use broadcast::PlayerSender;
pub use config::{CreationPolicy, MissingRoomPolicy, Occupancy, RoomConfig};
pub use error::RoomError;
pub use member::{MAX_NAME_CHARS, PALETTE, color_for_slot};
pub use registry::{RegistryStats, RoomRegistry};
pub use room::{JoinKind, JoinOutcome, LeaveOutcome, RelayAction, RoomHandle, RoomInfo};
