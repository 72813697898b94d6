//! Client error types.
//!
//! Most of these are local precondition violations (acting while
//! disconnected, a guest trying to start the round). They are reported to
//! the caller and never change client state.

use tapparty_core::SessionError;
use tapparty_proto::{ProtocolError, RoomCodeError};
use thiserror::Error;

use crate::round::RoundPhase;

/// Errors from [`crate::Client`] operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// A join was sent and the relay has not answered yet
    #[error("still waiting to join room {room_code}")]
    JoinPending {
        /// Room the pending join asked for
        room_code: String,
    },

    /// Operation needs a live relay connection
    #[error("cannot {operation}: not connected")]
    NotConnected {
        /// Operation that was attempted
        operation: &'static str,
    },

    /// Operation needs room membership
    #[error("not in a room")]
    NotInRoom,

    /// Already in a room (leave first)
    #[error("already in room {room_code}")]
    AlreadyInRoom {
        /// Current room
        room_code: String,
    },

    /// Operation is reserved for the host
    #[error("only the host can {operation}")]
    NotHost {
        /// Operation that was attempted
        operation: &'static str,
    },

    /// Display name rejected
    #[error("invalid name: {reason}")]
    InvalidName {
        /// Why the name was rejected
        reason: &'static str,
    },

    /// Room code rejected
    #[error("invalid room code: {0}")]
    InvalidRoomCode(#[from] RoomCodeError),

    /// Operation not valid in the current round phase
    #[error("cannot {operation} while round is {phase:?}")]
    WrongPhase {
        /// Operation that was attempted
        operation: &'static str,
        /// Current phase
        phase: RoundPhase,
    },

    /// Second host in one roster
    #[error("room already has host {existing}")]
    HostConflict {
        /// Connection ID of the current host
        existing: u64,
    },

    /// Session state machine error
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Frame or payload could not be decoded or encoded
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl ClientError {
    /// Whether this is a local precondition violation: the request was
    /// dropped and nothing changed.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::NotConnected { .. }
                | Self::NotInRoom
                | Self::AlreadyInRoom { .. }
                | Self::JoinPending { .. }
                | Self::NotHost { .. }
                | Self::InvalidName { .. }
                | Self::InvalidRoomCode(_)
                | Self::WrongPhase { .. }
        )
    }
}

impl From<ProtocolError> for ClientError {
    fn from(err: ProtocolError) -> Self {
        Self::Protocol(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition_classification() {
        assert!(ClientError::NotHost { operation: "start the game" }.is_precondition());
        assert!(ClientError::JoinPending { room_code: "BCDF".to_string() }.is_precondition());
        assert!(ClientError::InvalidRoomCode(RoomCodeError::WrongLength(3)).is_precondition());
        assert!(!ClientError::Protocol("bad cbor".to_string()).is_precondition());
        assert!(!ClientError::HostConflict { existing: 1 }.is_precondition());
    }

    #[test]
    fn messages_are_readable() {
        let err = ClientError::WrongPhase { operation: "tap", phase: RoundPhase::Idle };
        assert_eq!(err.to_string(), "cannot tap while round is Idle");
    }
}
