//! Member records: slot-derived colours and display-name cleanup.

use inkroom_protocol::{PlayerId, PlayerInfo, unix_millis};

/// Colours handed out by slot, wrapping after the last one.
pub const PALETTE: [&str; 12] = [
    "#e6194b", "#3cb44b", "#4363d8", "#f58231", "#911eb4", "#42d4f4", "#f032e6", "#bfef45",
    "#469990", "#9a6324", "#800000", "#000075",
];

/// Longest display name kept, in characters.
pub const MAX_NAME_CHARS: usize = 32;

/// Colour for a 1-based slot.
pub fn color_for_slot(slot: u32) -> &'static str {
    let index = (slot.max(1) - 1) as usize % PALETTE.len();
    PALETTE[index]
}

/// Builds the canonical record for a new member.
///
/// Blank names become `Player <slot>`; long names are cut at
/// [`MAX_NAME_CHARS`].
pub(crate) fn new_member(id: PlayerId, requested_name: &str, slot: u32) -> PlayerInfo {
    let trimmed = requested_name.trim();
    let display_name = if trimmed.is_empty() {
        format!("Player {slot}")
    } else {
        trimmed.chars().take(MAX_NAME_CHARS).collect()
    };
    PlayerInfo {
        id,
        display_name,
        slot,
        color: color_for_slot(slot).to_string(),
        joined_at: unix_millis(),
    }
}
