//! Session payloads: handshake, goodbye and errors.
//!
//! Ping and Pong carry no payload.

use serde::{Deserialize, Serialize};

/// Client handshake, sent once the transport is open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hello {
    /// Protocol version (currently 1).
    pub version: u8,
    /// Stable client identifier, survives reconnects.
    pub client_id: String,
}

/// Relay reply to [`Hello`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloReply {
    /// Opaque connection ID assigned by the relay. Identifies this client in
    /// roster and tap messages for the lifetime of the connection.
    pub connection_id: u64,
}

/// Graceful close from either side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goodbye {
    /// Human-readable reason.
    pub reason: String,
}

/// Session-level error from the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Error code identifying the type of error.
    pub code: u16,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorPayload {
    /// Frame could not be parsed.
    pub const INVALID_FRAME: u16 = 0x0001;
    /// Action requires room membership.
    pub const NOT_IN_ROOM: u16 = 0x0002;
    /// Action is reserved for the room host.
    pub const NOT_HOST: u16 = 0x0003;
    /// Frame arrived before the handshake completed.
    pub const NOT_AUTHENTICATED: u16 = 0x0004;

    /// Whether the relay is dropping this connection.
    ///
    /// Room-level refusals (`NOT_IN_ROOM`, `NOT_HOST`) leave the connection
    /// usable; every other code ends the session.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self.code, Self::NOT_IN_ROOM | Self::NOT_HOST)
    }

    /// Create an invalid frame error.
    pub fn invalid_frame(reason: impl Into<String>) -> Self {
        Self { code: Self::INVALID_FRAME, message: reason.into() }
    }

    /// Create a not-in-room error.
    pub fn not_in_room() -> Self {
        Self { code: Self::NOT_IN_ROOM, message: "not in a room".to_string() }
    }

    /// Create a not-host error.
    pub fn not_host() -> Self {
        Self { code: Self::NOT_HOST, message: "only the host can do that".to_string() }
    }

    /// Create a not-authenticated error.
    pub fn not_authenticated() -> Self {
        Self { code: Self::NOT_AUTHENTICATED, message: "handshake required".to_string() }
    }
}
