//! User intents forwarded into the client.

/// An action the player asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Host a room. Without a code, one is generated.
    CreateRoom {
        /// Code to use, if the UI chose one
        room_code: Option<String>,
        /// Display name
        name: String,
        /// Skin
        skin_id: u32,
    },

    /// Join a room by code.
    JoinRoom {
        /// Code as typed
        room_code: String,
        /// Display name
        name: String,
        /// Skin
        skin_id: u32,
    },

    /// Change own name/skin.
    UpdatePlayerInfo {
        /// New name
        new_name: String,
        /// New skin
        new_skin_id: u32,
    },

    /// Host: "Everyone's In".
    StartGame,

    /// Tap the play area.
    Tap,

    /// Host: push round state.
    UpdateGameState {
        /// End the round now
        game_ended: bool,
    },

    /// Leave the current room.
    LeaveRoom,

    /// Disconnect and stop the runtime.
    Quit,
}
