//! Headless Tap Party player.
//!
//! Drives the shared [`Runtime`] against a live relay with a scripted
//! [`Plan`]: create or join, start when the room fills (host), tap on an
//! interval while the round runs, quit when it ends.
//!
//! # Components
//!
//! - [`Script`]: Sans-IO intent schedule fed by game events
//! - [`WsDriver`]: WebSocket [`Driver`](tapparty_app::Driver)
//! - [`BotObserver`]: forwards bridge events to the script
//! - [`SystemEnv`]: real clock and OS randomness

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod driver;
mod script;
mod system_env;

use std::sync::{Arc, Mutex};

pub use driver::{BotObserver, DriverError, SharedScript, WsDriver};
pub use script::{Plan, Script, Seat};
pub use system_env::SystemEnv;
use tapparty_app::{Bridge, DEFAULT_TICK_INTERVAL, Runtime};
use tapparty_client::{ClientConfig, ClientError};
use thiserror::Error;
use tracing::info;

/// Bot errors.
#[derive(Debug, Error)]
pub enum BotError {
    /// Client setup failed.
    #[error("client error: {0}")]
    Client(#[from] ClientError),

    /// Driver failed.
    #[error("driver error: {0}")]
    Driver(#[from] DriverError),
}

/// Play one session against the relay at `url`. Returns the number of taps
/// sent.
pub async fn play(url: &str, plan: Plan, config: ClientConfig) -> Result<u32, BotError> {
    let env = SystemEnv::new();
    // Taps go out at most once per cycle.
    let tick = plan.tap_interval.min(DEFAULT_TICK_INTERVAL);
    let script: SharedScript = Arc::new(Mutex::new(Script::new(plan)));

    let mut bridge = Bridge::new(env, config)?;
    bridge.set_observer(BotObserver::new(env, Arc::clone(&script)));
    info!(client_id = bridge.client().client_id(), %url, "bot starting");

    let driver = WsDriver::new(url, env, Arc::clone(&script));
    Runtime::new(driver, bridge).with_tick_interval(tick).run().await?;

    let taps = script.lock().map_or(0, |s| s.taps());
    Ok(taps)
}
