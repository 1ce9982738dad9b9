//! Background deletion of rooms that stayed empty past their grace period.
//!
//! Each room actor arms its own deadline when it empties and sends its id
//! here once the deadline passes. The reaper then re-checks under the
//! registry lock, so a join that got in first keeps the room alive.

use std::sync::Weak;

use inkroom_protocol::RoomId;
use tokio::sync::mpsc;

use crate::registry::RegistryInner;

/// Spawns the reaper task for a registry.
///
/// Holds the registry weakly; the task ends once the registry is dropped
/// and every room actor has released its reap sender.
pub(crate) fn spawn_reaper(
    registry: Weak<RegistryInner>,
    mut requests: mpsc::UnboundedReceiver<RoomId>,
) {
    tokio::spawn(async move {
        while let Some(room_id) = requests.recv().await {
            let Some(registry) = registry.upgrade() else {
                break;
            };
            registry.reap(&room_id).await;
        }
        tracing::debug!("reaper stopped");
    });
}
