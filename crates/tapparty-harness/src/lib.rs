//! Deterministic simulation harness for Tap Party.
//!
//! Virtual-time, seeded implementations of the environment, the relay and
//! the runtime driver, so whole games replay identically for a given seed.
//!
//! # Simulation
//!
//! [`SimNetwork`] runs several clients against one [`SimRelay`] on the
//! caller's thread. [`SimDriver`] feeds the production
//! [`tapparty_app::Runtime`] from in-memory queues instead.
//!
//! # Invariant Testing
//!
//! The `invariants` module checks properties that must hold whenever the
//! network is quiet. [`Scenario`] applies generated [`Step`]s and checks them
//! after each one. Use [`InvariantRegistry::standard()`] for the room
//! invariants.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod scenario;
pub mod sim_driver;
pub mod sim_env;
pub mod sim_network;
pub mod sim_relay;

pub use invariants::{
    ClientSnapshot, Invariant, InvariantRegistry, InvariantResult, PlayerSnapshot,
    RosterAgreement, SingleHost, SystemSnapshot, TapAgreement, UniquePlayers, Violation,
};
pub use scenario::{SCENARIO_ROOM, Scenario, Step, steps_from_bytes};
pub use sim_driver::{SimDriver, SimDriverError};
pub use sim_env::{SimEnv, SimInstant};
pub use sim_network::{SimNetwork, TICK};
pub use sim_relay::{Delivery, MAX_PLAYERS, SimRelay};
