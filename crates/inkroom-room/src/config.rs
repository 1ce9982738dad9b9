//! Room configuration and the occupancy state machine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// What `create_room` does when handed an id that is already live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CreationPolicy {
    /// Return the existing room; the second creator simply joins it.
    #[default]
    Idempotent,
    /// Fail with `RoomError::AlreadyExists`.
    CreateOnly,
}

/// What `join-room` does with an id that has no live room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MissingRoomPolicy {
    /// Fail with `RoomError::NotFound`.
    #[default]
    Reject,
    /// Create the room under the requested id and join it.
    Create,
}

/// Configuration shared by every room a registry creates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Maximum concurrent members per room.
    pub capacity: usize,

    /// How long a room may stay empty before the reaper deletes it.
    pub empty_grace: Duration,

    /// Behaviour of `create_room` with an explicit, already-live id.
    pub creation: CreationPolicy,

    /// Behaviour of joins to ids with no live room.
    pub join_missing: MissingRoomPolicy,

    /// Mailbox size of each room actor.
    pub channel_size: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            empty_grace: Duration::from_secs(300),
            creation: CreationPolicy::default(),
            join_missing: MissingRoomPolicy::default(),
            channel_size: 64,
        }
    }
}

// ---------------------------------------------------------------------------
// Occupancy
// ---------------------------------------------------------------------------

/// Where a room is in its reaping lifecycle.
///
/// ```text
///            last member leaves           grace elapses
/// Active ───────────────────→ Draining ───────────────→ Expired ──→ (deleted)
///   ↑                             │                         │
///   └──────────── join ───────────┴────────── join ─────────┘
/// ```
///
/// - **Active**: at least one member.
/// - **Draining**: empty, deletion timer armed. A freshly created room
///   starts here.
/// - **Expired**: empty for the whole grace period; the reaper has been
///   asked to delete it. A join that gets in first cancels the deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Occupancy {
    Active,
    Draining,
    Expired,
}

impl Occupancy {
    /// Returns `true` if the room has no members.
    pub fn is_empty(&self) -> bool {
        !matches!(self, Self::Active)
    }

    /// Returns `true` if the reaper may delete the room.
    pub fn is_reapable(&self) -> bool {
        matches!(self, Self::Expired)
    }

    /// Returns `true` if moving to `target` is a legal transition.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Active, Self::Draining)
                | (Self::Draining, Self::Active)
                | (Self::Draining, Self::Expired)
                | (Self::Expired, Self::Active)
        )
    }
}

impl std::fmt::Display for Occupancy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "Active"),
            Self::Draining => write!(f, "Draining"),
            Self::Expired => write!(f, "Expired"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_occupancy_transitions() {
        assert!(Occupancy::Active.can_transition_to(Occupancy::Draining));
        assert!(Occupancy::Draining.can_transition_to(Occupancy::Expired));
        assert!(Occupancy::Draining.can_transition_to(Occupancy::Active));
        assert!(Occupancy::Expired.can_transition_to(Occupancy::Active));
        assert!(!Occupancy::Active.can_transition_to(Occupancy::Expired));
        assert!(!Occupancy::Expired.can_transition_to(Occupancy::Draining));
    }

    #[test]
    fn test_occupancy_only_expired_is_reapable() {
        assert!(!Occupancy::Active.is_reapable());
        assert!(!Occupancy::Draining.is_reapable());
        assert!(Occupancy::Expired.is_reapable());
        assert!(Occupancy::Draining.is_empty());
        assert!(!Occupancy::Active.is_empty());
    }

    #[test]
    fn test_occupancy_display() {
        assert_eq!(Occupancy::Draining.to_string(), "Draining");
    }

    #[test]
    fn test_room_config_default() {
        let config = RoomConfig::default();
        assert_eq!(config.capacity, 10);
        assert_eq!(config.empty_grace, Duration::from_secs(300));
        assert_eq!(config.creation, CreationPolicy::Idempotent);
        assert_eq!(config.join_missing, MissingRoomPolicy::Reject);
    }
}
