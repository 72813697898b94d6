//! Operation codes.
//!
//! Opcodes are grouped by range:
//! - `0x00xx`: session control (handshake, heartbeat, goodbye, errors)
//! - `0x01xx`: room membership and roster
//! - `0x02xx`: round lifecycle and taps

/// Identifies the payload type carried by a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Opcode {
    /// Client handshake.
    Hello = 0x0001,
    /// Relay handshake reply carrying the connection ID.
    HelloReply = 0x0002,
    /// Liveness probe.
    Ping = 0x0003,
    /// Liveness reply.
    Pong = 0x0004,
    /// Graceful close.
    Goodbye = 0x0005,
    /// Session-level error.
    Error = 0x0006,

    /// Host asks the relay to open a room.
    CreateRoom = 0x0100,
    /// Player asks to join a room.
    JoinRoom = 0x0101,
    /// Relay admitted the join.
    JoinSuccess = 0x0102,
    /// Relay rejected a create or join.
    RoomError = 0x0103,
    /// Another player joined the room.
    PlayerJoined = 0x0104,
    /// A player left the room.
    PlayerLeft = 0x0105,
    /// Client changes its own name or skin.
    UpdatePlayerInfo = 0x0106,
    /// Relay broadcast of a name or skin change.
    PlayerInfoUpdate = 0x0107,
    /// Client leaves its room.
    LeaveRoom = 0x0108,
    /// Host connection dropped; the room is gone.
    RoomClosed = 0x0109,

    /// Host starts the round.
    GameStart = 0x0200,
    /// Relay broadcast that the round is starting.
    GameStarting = 0x0201,
    /// Client tapped.
    PlayerTap = 0x0202,
    /// Relay broadcast of a tap.
    TapEvent = 0x0203,
    /// Host publishes round state.
    UpdateGameState = 0x0204,
    /// Relay broadcast of round state.
    GameStateUpdate = 0x0205,
}

impl Opcode {
    /// Every opcode, in wire order.
    pub const ALL: [Self; 22] = [
        Self::Hello,
        Self::HelloReply,
        Self::Ping,
        Self::Pong,
        Self::Goodbye,
        Self::Error,
        Self::CreateRoom,
        Self::JoinRoom,
        Self::JoinSuccess,
        Self::RoomError,
        Self::PlayerJoined,
        Self::PlayerLeft,
        Self::UpdatePlayerInfo,
        Self::PlayerInfoUpdate,
        Self::LeaveRoom,
        Self::RoomClosed,
        Self::GameStart,
        Self::GameStarting,
        Self::PlayerTap,
        Self::TapEvent,
        Self::UpdateGameState,
        Self::GameStateUpdate,
    ];

    /// Numeric wire value.
    #[must_use]
    pub const fn to_u16(self) -> u16 {
        self as u16
    }

    /// Parse a wire value. `None` for unknown opcodes.
    #[must_use]
    pub const fn from_u16(value: u16) -> Option<Self> {
        let opcode = match value {
            0x0001 => Self::Hello,
            0x0002 => Self::HelloReply,
            0x0003 => Self::Ping,
            0x0004 => Self::Pong,
            0x0005 => Self::Goodbye,
            0x0006 => Self::Error,
            0x0100 => Self::CreateRoom,
            0x0101 => Self::JoinRoom,
            0x0102 => Self::JoinSuccess,
            0x0103 => Self::RoomError,
            0x0104 => Self::PlayerJoined,
            0x0105 => Self::PlayerLeft,
            0x0106 => Self::UpdatePlayerInfo,
            0x0107 => Self::PlayerInfoUpdate,
            0x0108 => Self::LeaveRoom,
            0x0109 => Self::RoomClosed,
            0x0200 => Self::GameStart,
            0x0201 => Self::GameStarting,
            0x0202 => Self::PlayerTap,
            0x0203 => Self::TapEvent,
            0x0204 => Self::UpdateGameState,
            0x0205 => Self::GameStateUpdate,
            _ => return None,
        };
        Some(opcode)
    }

    /// Session-control opcodes are handled by the transport session, not the
    /// room layer.
    #[must_use]
    pub const fn is_session(self) -> bool {
        self.to_u16() < 0x0100
    }

    /// Opcodes whose payload is empty.
    #[must_use]
    pub const fn is_empty_payload(self) -> bool {
        matches!(
            self,
            Self::Ping
                | Self::Pong
                | Self::LeaveRoom
                | Self::RoomClosed
                | Self::GameStart
                | Self::GameStarting
                | Self::PlayerTap
        )
    }
}
