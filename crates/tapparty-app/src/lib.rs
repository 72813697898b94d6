//! Application layer for Tap Party
//!
//! The boundary between the Sans-IO client and whatever renders the game.
//! The same [`Runtime`] orchestration runs in the headless bot and in
//! deterministic simulation.
//!
//! # Components
//!
//! - [`GameObserver`]: callbacks the UI implements
//! - [`GameEvent`]: the notifications delivered to the observer
//! - [`Intent`]: user actions forwarded into the client
//! - [`Bridge`]: translates intents to client events and client actions to
//!   game events, frames and transport commands
//! - [`Driver`]: trait for platform-specific I/O
//! - [`Runtime`]: generic orchestration loop using a Driver

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod bridge;
mod driver;
mod event;
mod intent;
mod observer;
mod runtime;

pub use bridge::{Bridge, TransportCommand};
pub use driver::Driver;
pub use event::GameEvent;
pub use intent::Intent;
pub use observer::GameObserver;
pub use runtime::{DEFAULT_TICK_INTERVAL, Runtime};
