//! Per-connection sessions for inkroom.
//!
//! A [`Session`] is the explicit record of one connection: which player it
//! is, which room it is in, and where its outbound events go. The
//! connection handler feeds it decoded [`ClientEvent`]s one at a time.
//!
//! # How it fits in the stack
//!
//! ```text
//! Server (above)              ← owns the connection, decodes frames
//!     ↕
//! Session Layer (this crate)  ← validates events, tracks room membership
//!     ↕
//! Room Layer (below)          ← registry, room actors, broadcast
//! ```
//!
//! [`ClientEvent`]: inkroom_protocol::ClientEvent

mod error;
mod session;

pub use error::SessionError;
pub use session::{Session, SessionState};
