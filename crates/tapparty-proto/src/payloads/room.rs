//! Room membership and roster payloads.
//!
//! Room codes travel as plain strings so the relay can reject malformed codes
//! with a readable [`RoomError`] instead of a decode failure.

use serde::{Deserialize, Serialize};

/// Maximum player name length, in characters.
pub const MAX_NAME_LEN: usize = 20;

/// Host asks the relay to open a room under a caller-chosen code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRoom {
    /// Requested room code.
    pub room_code: String,
    /// Host display name.
    pub host_name: String,
    /// Host skin.
    pub host_skin: u32,
}

/// Player asks to join an existing room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRoom {
    /// Room code to join.
    pub room_code: String,
    /// Display name.
    pub name: String,
    /// Skin.
    pub skin_id: u32,
    /// Stable client identifier, survives reconnects.
    pub client_id: String,
}

/// One player as seen in a [`JoinSuccess`] roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    /// Connection ID of the player.
    pub player_id: u64,
    /// Display name.
    pub name: String,
    /// Skin.
    pub skin_id: u32,
    /// Ready flag.
    pub ready: bool,
    /// Whether this player hosts the room.
    pub is_host: bool,
}

/// Relay admitted a join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinSuccess {
    /// Room that was joined.
    pub room_code: String,
    /// Players already in the room, in join order (host first).
    pub players: Vec<RosterEntry>,
}

/// Relay rejected a create or join. The message is shown to the user
/// verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomError {
    /// Reason, e.g. "Room not found" or "Room is full".
    pub message: String,
}

/// A player joined the room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerJoined {
    /// Connection ID of the new player.
    pub player_id: u64,
    /// Display name.
    pub name: String,
    /// Skin.
    pub skin_id: u32,
    /// Ready flag.
    pub ready: bool,
}

/// A player left the room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerLeft {
    /// Display name of the player who left.
    pub name: String,
}

/// Client changes its own name and/or skin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatePlayerInfo {
    /// Name before the change.
    pub old_name: String,
    /// New name (same as `old_name` when only the skin changes).
    pub new_nickname: String,
    /// New skin.
    pub new_skin_id: u32,
}

/// Relay broadcast of an [`UpdatePlayerInfo`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfoUpdate {
    /// Name before the change.
    pub old_name: String,
    /// Name after the change.
    pub new_name: String,
    /// Skin after the change.
    pub new_skin: u32,
}
