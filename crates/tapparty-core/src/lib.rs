//! Tap Party protocol core.
//!
//! Sans-IO building blocks shared by the client and the simulation harness:
//!
//! - [`Environment`]: time and randomness supplied by the driver
//! - [`Timer`]: cancellable one-shot deadline
//! - [`Session`]: relay connection lifecycle (handshake, heartbeat, bounded
//!   reconnect)
//!
//! Nothing in this crate performs I/O. Methods take `now` and return actions
//! for a driver to execute.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod env;
pub mod error;
pub mod session;
pub mod timer;

pub use env::Environment;
pub use error::SessionError;
pub use session::{Session, SessionAction, SessionConfig, SessionState};
pub use timer::{TimePoint, Timer};
