//! Generated scenarios.
//!
//! A [`Scenario`] seats a host and a few guests in one room, then applies a
//! list of [`Step`]s, checking the standard invariants whenever the network
//! settles. Steps derive [`Arbitrary`], so property tests and fuzz targets
//! can produce them straight from raw bytes.

use std::time::Duration;

use arbitrary::{Arbitrary, Unstructured};
use tapparty_app::Intent;
use tapparty_client::ClientError;
use tracing::debug;

use crate::{InvariantRegistry, SimNetwork, Violation};

/// Room every scenario plays in.
pub const SCENARIO_ROOM: &str = "TAPS";

/// Longest single clock jump. Long enough to outlast a heartbeat timeout.
const MAX_ADVANCE_SECS: u8 = 90;

/// Display names handed out by [`Step::Rename`]. Few enough to collide.
const NAMES: &[&str] = &["ann", "bea", "cal", "dee"];

/// One thing that happens during a scenario. Player indices wrap around the
/// number of seated players; player 0 hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum Step {
    /// Player taps.
    Tap {
        /// Player index.
        player: u8,
    },
    /// Host starts a round.
    StartGame,
    /// Host ends the round early.
    EndRound,
    /// Time passes.
    Advance {
        /// Seconds, wrapped to at most 90.
        seconds: u8,
    },
    /// Player renames and reskins.
    Rename {
        /// Player index.
        player: u8,
        /// Index into a small name pool.
        name: u8,
        /// New skin.
        skin: u8,
    },
    /// Player leaves the room.
    Leave {
        /// Player index.
        player: u8,
    },
    /// Player asks to be seated again: the host re-creates the room, a guest
    /// joins it.
    Rejoin {
        /// Player index.
        player: u8,
    },
    /// Player's connection resets.
    DropConnection {
        /// Player index.
        player: u8,
    },
    /// Player's link goes silent.
    Cut {
        /// Player index.
        player: u8,
    },
    /// Player's link comes back.
    Heal {
        /// Player index.
        player: u8,
    },
}

/// A seated room plus the invariants checked against it.
pub struct Scenario {
    network: SimNetwork,
    players: usize,
    registry: InvariantRegistry,
}

impl Scenario {
    /// Seat a host and `guests` guests in [`SCENARIO_ROOM`].
    ///
    /// # Errors
    ///
    /// - `ClientError` if a client cannot be built
    pub fn seated(seed: u64, guests: usize) -> Result<Self, ClientError> {
        let mut network = SimNetwork::new(seed);
        let players = guests + 1;

        for index in 0..players {
            let player = network.add_client()?;
            let intent = if index == 0 {
                Intent::CreateRoom {
                    room_code: Some(SCENARIO_ROOM.to_string()),
                    name: player_name(index),
                    skin_id: 0,
                }
            } else {
                Intent::JoinRoom {
                    room_code: SCENARIO_ROOM.to_string(),
                    name: player_name(index),
                    skin_id: 0,
                }
            };
            network.intent(player, intent);
        }

        Ok(Self { network, players, registry: InvariantRegistry::standard() })
    }

    /// The network, for inspection.
    pub fn network(&self) -> &SimNetwork {
        &self.network
    }

    /// Check the standard invariants now.
    ///
    /// # Errors
    ///
    /// Every violation found.
    pub fn check(&self) -> Result<(), Vec<Violation>> {
        self.registry.check_all(&self.network.snapshot())
    }

    /// Apply one step, then check invariants.
    ///
    /// # Errors
    ///
    /// Every violation found after the step.
    pub fn apply(&mut self, step: Step) -> Result<(), Vec<Violation>> {
        debug!(?step, "scenario step");
        let player = |index: u8| usize::from(index) % self.players;

        match step {
            Step::Tap { player: p } => self.network.intent(player(p), Intent::Tap),
            Step::StartGame => self.network.intent(0, Intent::StartGame),
            Step::EndRound => {
                self.network.intent(0, Intent::UpdateGameState { game_ended: true });
            },
            Step::Advance { seconds } => {
                let seconds = u64::from(seconds % (MAX_ADVANCE_SECS + 1));
                self.network.advance(Duration::from_secs(seconds));
            },
            Step::Rename { player: p, name, skin } => {
                let name = NAMES[usize::from(name) % NAMES.len()].to_string();
                self.network.intent(player(p), Intent::UpdatePlayerInfo {
                    new_name: name,
                    new_skin_id: u32::from(skin),
                });
            },
            Step::Leave { player: p } => self.network.intent(player(p), Intent::LeaveRoom),
            Step::Rejoin { player: p } => {
                let index = player(p);
                let intent = if index == 0 {
                    Intent::CreateRoom {
                        room_code: Some(SCENARIO_ROOM.to_string()),
                        name: player_name(index),
                        skin_id: 0,
                    }
                } else {
                    Intent::JoinRoom {
                        room_code: SCENARIO_ROOM.to_string(),
                        name: player_name(index),
                        skin_id: 0,
                    }
                };
                self.network.intent(index, intent);
            },
            Step::DropConnection { player: p } => self.network.drop_connection(player(p)),
            Step::Cut { player: p } => self.network.set_reachable(player(p), false),
            Step::Heal { player: p } => self.network.set_reachable(player(p), true),
        }

        self.check()
    }

    /// Apply steps in order, stopping at the first violation.
    ///
    /// # Errors
    ///
    /// The violations found and the index of the step that caused them.
    pub fn run(&mut self, steps: &[Step]) -> Result<(), (usize, Vec<Violation>)> {
        for (index, step) in steps.iter().enumerate() {
            self.apply(*step).map_err(|violations| (index, violations))?;
        }
        Ok(())
    }
}

/// Decode as many steps as `bytes` hold.
pub fn steps_from_bytes(bytes: &[u8]) -> Vec<Step> {
    let mut unstructured = Unstructured::new(bytes);
    let mut steps = Vec::new();
    while !unstructured.is_empty() {
        match Step::arbitrary(&mut unstructured) {
            Ok(step) => steps.push(step),
            Err(_) => break,
        }
    }
    steps
}

fn player_name(index: usize) -> String {
    format!("player{index}")
}
