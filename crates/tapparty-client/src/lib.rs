//! Client
//!
//! Action-based client state machine for Tap Party. Manages the relay
//! session, room membership, the roster and the tap round.
//!
//! # Architecture
//!
//! The client follows the same Sans-IO pattern as [`tapparty_core`]. It
//! receives events ([`ClientEvent`]), processes them through pure state
//! machine logic, and returns actions ([`ClientAction`]) for the caller to
//! execute.
//!
//! # Components
//!
//! - [`Client`]: top-level state machine
//! - [`Roster`]: players in the current room
//! - [`Round`]: round phase and host timer
//! - [`ClientEvent`]: events fed into the client
//! - [`ClientAction`]: actions produced by the client
//!
//! # Transport (optional)
//!
//! With the `transport` feature enabled, this crate also provides:
//! - [`transport::ConnectedClient`]: frame channels over a WebSocket
//! - [`transport::connect`]: connect to a relay

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod client;
mod error;
mod event;
pub mod room;
pub mod roster;
pub mod round;

#[cfg(feature = "transport")]
pub mod transport;

pub use client::{Client, ClientConfig, Profile, normalize_name};
pub use error::ClientError;
pub use event::{ClientAction, ClientEvent};
pub use room::{Role, Room, RoomPhase};
pub use roster::{Player, Roster, Winner};
pub use round::{DEFAULT_ROUND_DURATION, Round, RoundPhase};
pub use tapparty_core::{Environment, SessionConfig, SessionState};
pub use tapparty_proto::RoomCode;
