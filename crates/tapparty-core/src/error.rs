//! Error types for the transport session.
//!
//! Transport failures are recovered inside the session and reported as
//! actions. These errors cover the remaining cases: misuse of the state
//! machine, frames the relay should not have sent, and bad configuration.

use std::time::Duration;

use thiserror::Error;

use crate::session::SessionState;

/// Errors from [`crate::Session`] operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Operation not valid in the current state
    #[error("invalid state transition: cannot {operation} from {state:?}")]
    InvalidState {
        /// Current state when the error occurred
        state: SessionState,
        /// Operation that was attempted
        operation: &'static str,
    },

    /// Frame not valid in the current state
    #[error("unexpected frame: received opcode {opcode:#06x} in state {state:?}")]
    UnexpectedFrame {
        /// Current state when the frame arrived
        state: SessionState,
        /// Opcode of the frame
        opcode: u16,
    },

    /// Handshake did not complete in time
    #[error("connect timeout after {elapsed:?}")]
    ConnectTimeout {
        /// How long we waited
        elapsed: Duration,
    },

    /// No pong within the heartbeat timeout
    #[error("heartbeat timeout: no pong for {elapsed:?}")]
    HeartbeatTimeout {
        /// Time since the last pong
        elapsed: Duration,
    },

    /// Rejected configuration
    #[error("invalid session config: {0}")]
    InvalidConfig(String),

    /// Frame or payload could not be decoded
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Transport reported a failure
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<tapparty_proto::ProtocolError> for SessionError {
    fn from(err: tapparty_proto::ProtocolError) -> Self {
        Self::Protocol(err.to_string())
    }
}
