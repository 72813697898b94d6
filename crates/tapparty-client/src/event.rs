//! Client events and actions.

use tapparty_proto::Frame;

use crate::roster::{Player, Winner};

/// Events the caller feeds into the client.
///
/// The caller is responsible for:
/// - Reporting transport lifecycle (opened, failed, closed)
/// - Receiving frames from the relay
/// - Driving time forward via ticks
/// - Forwarding user intents
///
/// Generic over `I` (Instant type) so simulation can drive virtual time.
#[derive(Debug, Clone)]
pub enum ClientEvent<I = std::time::Instant> {
    /// Connect to the relay (no-op if already connected or connecting).
    Connect,

    /// Leave any room and close the connection.
    Disconnect,

    /// Transport requested by `ClientAction::OpenTransport` is open.
    TransportOpened,

    /// Transport could not be opened, or failed.
    TransportFailed {
        /// Failure description
        reason: String,
    },

    /// Transport closed by the remote end.
    TransportClosed {
        /// Close description
        reason: String,
    },

    /// Frame received from the relay.
    FrameReceived(Frame),

    /// Time tick for timer processing.
    Tick {
        /// Current time from the environment.
        now: I,
    },

    /// Open a room under a caller-chosen code, as host.
    CreateRoom {
        /// Room code (validated, case-insensitive)
        room_code: String,
        /// Host display name
        name: String,
        /// Host skin
        skin_id: u32,
    },

    /// Join an existing room.
    JoinRoom {
        /// Room code (validated, case-insensitive)
        room_code: String,
        /// Display name
        name: String,
        /// Skin
        skin_id: u32,
    },

    /// Change our own name and/or skin.
    UpdatePlayerInfo {
        /// New display name
        new_name: String,
        /// New skin
        new_skin_id: u32,
    },

    /// Host starts the round.
    StartGame,

    /// Local tap.
    Tap,

    /// Host publishes round state. `game_ended: true` ends the round now.
    UpdateGameState {
        /// Round is over
        game_ended: bool,
    },

    /// Leave the current room.
    LeaveRoom,
}

/// Actions the client produces for the caller to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    /// Open a transport to the relay.
    OpenTransport,

    /// Send a frame to the relay.
    Send(Frame),

    /// Close the transport.
    CloseTransport {
        /// Reason for closing
        reason: String,
    },

    /// Handshake completed.
    Connected {
        /// Connection ID assigned by the relay
        connection_id: u64,
    },

    /// Initial connect gave up.
    ConnectFailed {
        /// Last failure
        reason: String,
    },

    /// Link lost, reconnect scheduled.
    Reconnecting {
        /// Attempt number (1-based)
        attempt: u32,
    },

    /// Link lost and reconnect gave up.
    ConnectionLost {
        /// Last failure
        reason: String,
    },

    /// Room created locally; we are host.
    RoomCreated {
        /// Room code
        room_code: String,
    },

    /// Relay admitted our join.
    JoinSuccess {
        /// Room code
        room_code: String,
        /// Players in the room, in join order
        players: Vec<Player>,
    },

    /// Relay rejected a create or join. Message is for display as-is.
    RoomError {
        /// Reason from the relay
        message: String,
    },

    /// A player joined.
    PlayerJoined {
        /// Connection ID
        connection_id: u64,
        /// Display name
        name: String,
        /// Skin
        skin_id: u32,
        /// Ready flag
        ready: bool,
    },

    /// A player left.
    PlayerLeft {
        /// Display name
        name: String,
    },

    /// A player changed name and/or skin.
    PlayerInfoUpdated {
        /// Name before the change
        old_name: String,
        /// Name after the change
        new_name: String,
        /// Skin after the change
        new_skin: u32,
    },

    /// Round is starting; taps count from now.
    GameStarting,

    /// A tap was counted.
    TapEvent {
        /// Player who tapped
        connection_id: u64,
        /// Their count after this tap
        tap_count: u32,
    },

    /// Round state changed.
    GameStateUpdate {
        /// Round is over
        game_ended: bool,
    },

    /// Round ended; fires once per round.
    RoundEnded {
        /// Highest tap count, ties to roster order
        winner: Option<Winner>,
    },

    /// Room is gone; back to pre-lobby.
    RoomClosed,
}
