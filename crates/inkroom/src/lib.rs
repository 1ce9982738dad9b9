//! # inkroom
//!
//! Real-time room broker for shared drawing canvases.
//!
//! Clients connect over WebSocket, create or join a short-coded room, and
//! have their strokes, clears, undo/redo and chat relayed to the other
//! members. Late joiners receive the last canvas snapshot. Rooms that stay
//! empty past a grace period are reaped.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use inkroom::prelude::*;
//!
//! # async fn start() -> Result<(), InkroomError> {
//! let server = InkroomServer::builder().bind("0.0.0.0:3001").build().await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;

pub use error::InkroomError;
pub use server::{DEFAULT_BIND_ADDR, DEFAULT_IDLE_TIMEOUT, InkroomServer, InkroomServerBuilder};

pub use inkroom_protocol as protocol;
pub use inkroom_room as room;
pub use inkroom_session as session;
pub use inkroom_transport as transport;

/// Common imports for running and configuring a server.
pub mod prelude {
    pub use crate::{InkroomError, InkroomServer, InkroomServerBuilder};
    pub use inkroom_protocol::{
        ClientEvent, Envelope, PlayerId, PlayerInfo, RoomId, ServerEvent,
    };
    pub use inkroom_room::{CreationPolicy, MissingRoomPolicy, RoomConfig, RoomRegistry};
}
