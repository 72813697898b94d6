//! Local view of the room this client is in.

use std::time::Duration;

use tapparty_core::TimePoint;
use tapparty_proto::RoomCode;

use crate::{
    roster::Roster,
    round::{Round, RoundPhase},
};

/// Room lifecycle phase.
///
/// Derived from the round, so it only moves forward
/// (`Lobby → Starting → InRound → Ended`). A restart from `Ended` re-enters
/// `Starting`; nothing returns to `Lobby` except tearing the room down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    /// Waiting for players
    Lobby,
    /// Start signal in flight
    Starting,
    /// Round running
    InRound,
    /// Round over
    Ended,
}

impl From<RoundPhase> for RoomPhase {
    fn from(phase: RoundPhase) -> Self {
        match phase {
            RoundPhase::Idle => Self::Lobby,
            RoundPhase::Starting => Self::Starting,
            RoundPhase::Running => Self::InRound,
            RoundPhase::Ended => Self::Ended,
        }
    }
}

/// Our role in the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Created the room, owns the round timer
    Host,
    /// Joined by code
    Guest,
}

/// Room membership: code, role, roster and round.
#[derive(Debug, Clone)]
pub struct Room<I> {
    /// Room code.
    pub code: RoomCode,
    /// Our role.
    pub role: Role,
    /// Players in join order.
    pub roster: Roster,
    /// Current round.
    pub round: Round<I>,
}

impl<I: TimePoint> Room<I> {
    /// Empty room in the lobby.
    pub fn new(code: RoomCode, role: Role, round_duration: Duration) -> Self {
        Self { code, role, roster: Roster::new(), round: Round::new(round_duration) }
    }

    /// Phase derived from the round.
    #[must_use]
    pub fn phase(&self) -> RoomPhase {
        self.round.phase().into()
    }

    /// Whether we host this room.
    #[must_use]
    pub fn is_host(&self) -> bool {
        self.role == Role::Host
    }
}
