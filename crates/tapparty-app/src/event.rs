//! Notifications delivered to the UI.

use tapparty_client::{ClientAction, Player, Winner};

/// Something the UI should react to.
///
/// Produced by the [`Bridge`](crate::Bridge) from client actions and handed
/// to the registered [`GameObserver`](crate::GameObserver) in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    /// Relay handshake completed.
    Connected {
        /// Relay-assigned connection ID
        connection_id: u64,
    },

    /// Link lost, reconnecting.
    Reconnecting {
        /// Attempt number (1-based)
        attempt: u32,
    },

    /// Could not reach the relay. No more retries.
    ConnectFailed {
        /// Last failure
        reason: String,
    },

    /// Connection lost after retries were exhausted.
    ConnectionLost {
        /// Last failure
        reason: String,
    },

    /// We are hosting a new room.
    RoomCreated {
        /// Room code
        room_code: String,
    },

    /// Relay admitted us.
    JoinSuccess {
        /// Room code
        room_code: String,
        /// Everyone in the room, join order
        players: Vec<Player>,
    },

    /// Create/join rejected or request refused. Message is shown verbatim.
    RoomError {
        /// Reason
        message: String,
    },

    /// Another player joined.
    PlayerJoined {
        /// Their connection ID
        connection_id: u64,
        /// Name
        name: String,
        /// Skin
        skin_id: u32,
        /// Readiness flag
        ready: bool,
    },

    /// A player left.
    PlayerLeft {
        /// Name
        name: String,
    },

    /// A player changed name or skin.
    PlayerInfoUpdate {
        /// Previous name
        old_name: String,
        /// New name
        new_name: String,
        /// New skin
        new_skin: u32,
    },

    /// Round is starting.
    GameStarting,

    /// A tap was counted.
    TapEvent {
        /// Who tapped
        connection_id: u64,
        /// Their count after this tap
        tap_count: u32,
    },

    /// Host round state.
    GameStateUpdate {
        /// Round over
        game_ended: bool,
    },

    /// Round finished.
    RoundEnded {
        /// Winner, `None` for an empty roster
        winner: Option<Winner>,
    },

    /// Room is gone. Reset to pre-lobby.
    RoomClosed,
}

impl GameEvent {
    /// Map a client action to its UI notification. Transport plumbing maps
    /// to `None`.
    pub fn from_action(action: ClientAction) -> Option<Self> {
        let event = match action {
            ClientAction::OpenTransport
            | ClientAction::Send(_)
            | ClientAction::CloseTransport { .. } => return None,
            ClientAction::Connected { connection_id } => Self::Connected { connection_id },
            ClientAction::ConnectFailed { reason } => Self::ConnectFailed { reason },
            ClientAction::Reconnecting { attempt } => Self::Reconnecting { attempt },
            ClientAction::ConnectionLost { reason } => Self::ConnectionLost { reason },
            ClientAction::RoomCreated { room_code } => Self::RoomCreated { room_code },
            ClientAction::JoinSuccess { room_code, players } => {
                Self::JoinSuccess { room_code, players }
            },
            ClientAction::RoomError { message } => Self::RoomError { message },
            ClientAction::PlayerJoined { connection_id, name, skin_id, ready } => {
                Self::PlayerJoined { connection_id, name, skin_id, ready }
            },
            ClientAction::PlayerLeft { name } => Self::PlayerLeft { name },
            ClientAction::PlayerInfoUpdated { old_name, new_name, new_skin } => {
                Self::PlayerInfoUpdate { old_name, new_name, new_skin }
            },
            ClientAction::GameStarting => Self::GameStarting,
            ClientAction::TapEvent { connection_id, tap_count } => {
                Self::TapEvent { connection_id, tap_count }
            },
            ClientAction::GameStateUpdate { game_ended } => Self::GameStateUpdate { game_ended },
            ClientAction::RoundEnded { winner } => Self::RoundEnded { winner },
            ClientAction::RoomClosed => Self::RoomClosed,
        };
        Some(event)
    }
}
