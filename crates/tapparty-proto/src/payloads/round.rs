//! Round payloads.
//!
//! `GameStart`, `GameStarting` and `PlayerTap` carry no payload.

use serde::{Deserialize, Serialize};

/// Relay broadcast of a single tap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapEvent {
    /// Connection ID of the player who tapped.
    pub player_id: u64,
}

/// Round state published by the host and fanned out by the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    /// The round is over.
    pub game_ended: bool,
}
