//! Generic runtime for client orchestration.
//!
//! The Runtime drives the event loop, coordinating between:
//! - [`Bridge`]: protocol bridge to the client
//! - [`Driver`]: platform-specific I/O
//!
//! It owns both and runs on a single task, so all protocol handling is
//! serialized: intents, frames and ticks are processed one at a time in the
//! order the driver yields them.

use std::time::Duration;

use tapparty_core::Environment;
use tapparty_proto::Frame;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::{Bridge, Driver, Intent, TransportCommand};

/// Default pause between cycles.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(50);

/// Generic runtime that orchestrates Bridge and Driver.
///
/// # Type Parameters
///
/// - `D`: Platform-specific I/O driver
/// - `E`: Environment for time and randomness
pub struct Runtime<D, E>
where
    D: Driver,
    E: Environment,
{
    driver: D,
    bridge: Bridge<E>,
    tick_interval: Duration,
    transport_open: bool,
}

impl<D, E> Runtime<D, E>
where
    D: Driver<Instant = E::Instant>,
    E: Environment,
{
    /// Create a new runtime.
    pub fn new(driver: D, bridge: Bridge<E>) -> Self {
        Self { driver, bridge, tick_interval: DEFAULT_TICK_INTERVAL, transport_open: false }
    }

    /// Override the cycle interval.
    #[must_use]
    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    /// The bridge.
    pub fn bridge(&self) -> &Bridge<E> {
        &self.bridge
    }

    /// The bridge, mutably (observer registration).
    pub fn bridge_mut(&mut self) -> &mut Bridge<E> {
        &mut self.bridge
    }

    /// The driver.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Whether the driver currently holds an open transport.
    pub fn is_transport_open(&self) -> bool {
        self.transport_open
    }

    /// Run until a [`Intent::Quit`] arrives.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver's input source fails. Transport errors
    /// are handed to the client and never end the loop.
    pub async fn run(mut self) -> Result<(), D::Error> {
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(tick = ?self.tick_interval, "runtime started");
        loop {
            interval.tick().await;
            if self.process_cycle().await? {
                break;
            }
        }

        self.shutdown().await;
        info!("runtime stopped");
        Ok(())
    }

    /// Process one cycle: pending intents, then relay frames, then a tick.
    ///
    /// Returns `true` once a quit intent was seen.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver's input source fails.
    pub async fn process_cycle(&mut self) -> Result<bool, D::Error> {
        while let Some(intent) = self.driver.poll_intent().await? {
            if intent == Intent::Quit {
                return Ok(true);
            }
            self.bridge.process_intent(intent);
            self.flush().await;
        }

        while self.transport_open {
            match self.driver.recv_frame().await {
                Ok(Some(frame)) => {
                    self.bridge.handle_frame(frame);
                    self.flush().await;
                },
                Ok(None) => break,
                Err(e) => {
                    self.lost_transport(e.to_string());
                    self.flush().await;
                },
            }
        }

        let now = self.driver.now();
        self.bridge.handle_tick(now);
        self.flush().await;

        Ok(false)
    }

    /// Leave, say goodbye and close the transport.
    pub async fn shutdown(&mut self) {
        self.bridge.process_intent(Intent::Quit);
        self.flush().await;

        if self.transport_open {
            self.driver.close_transport();
            self.transport_open = false;
        }
    }

    /// Execute everything the bridge queued. Frames go first: a batch that
    /// ends with a close carries its goodbye ahead of it.
    async fn flush(&mut self) {
        loop {
            let frames = self.bridge.take_outgoing();
            let commands = self.bridge.take_transport_commands();
            if frames.is_empty() && commands.is_empty() {
                return;
            }

            for frame in frames {
                self.send(frame).await;
            }

            for command in commands {
                match command {
                    TransportCommand::Open => match self.driver.open_transport().await {
                        Ok(()) => {
                            self.transport_open = true;
                            self.bridge.transport_opened();
                        },
                        Err(e) => {
                            self.bridge.transport_failed(e.to_string());
                        },
                    },
                    TransportCommand::Close { reason } => {
                        debug!(%reason, "closing transport");
                        self.driver.close_transport();
                        self.transport_open = false;
                    },
                }
            }
        }
    }

    async fn send(&mut self, frame: Frame) {
        if !self.transport_open {
            debug!(opcode = ?frame.opcode(), "dropping frame, transport closed");
            return;
        }

        if let Err(e) = self.driver.send_frame(frame).await {
            self.lost_transport(e.to_string());
        }
    }

    fn lost_transport(&mut self, reason: String) {
        self.transport_open = false;
        self.driver.close_transport();
        self.bridge.transport_closed(reason);
    }
}
