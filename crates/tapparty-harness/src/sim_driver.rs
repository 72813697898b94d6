//! Simulation driver implementing the [`Driver`] trait.
//!
//! `SimDriver` stands in for the bot's WebSocket driver so the same
//! [`tapparty_app::Runtime`] orchestration code runs in both production and
//! simulation. Tests play the relay by injecting frames and reading back
//! what the runtime sent.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use tapparty_app::{Driver, Intent};
use tapparty_core::Environment;
use tapparty_proto::Frame;

use crate::{
    SimEnv,
    sim_env::{SimInstant, lock},
};

/// Error type for simulation driver.
#[derive(Debug, Clone)]
pub struct SimDriverError(pub String);

impl std::fmt::Display for SimDriverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimDriverError: {}", self.0)
    }
}

impl std::error::Error for SimDriverError {}

/// Shared state for injection from outside the runtime.
#[derive(Default)]
struct SharedState {
    pending_intents: VecDeque<Intent>,
    incoming_frames: VecDeque<Frame>,
    outgoing_frames: Vec<Frame>,
    open: bool,
    refuse_connections: bool,
    severed: Option<String>,
    opens: usize,
}

/// Simulation driver for deterministic testing.
///
/// Cheap to clone; clones share queues, so a test keeps one handle while the
/// runtime owns another.
#[derive(Clone)]
pub struct SimDriver {
    env: SimEnv,
    state: Arc<Mutex<SharedState>>,
}

impl SimDriver {
    /// Create a driver reading time from `env`.
    pub fn new(env: SimEnv) -> Self {
        Self { env, state: Arc::new(Mutex::new(SharedState::default())) }
    }

    /// The environment whose clock the driver reports.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// Queue a user intent.
    pub fn inject_intent(&self, intent: Intent) {
        lock(&self.state).pending_intents.push_back(intent);
    }

    /// Queue a frame from the relay.
    pub fn inject_frame(&self, frame: Frame) {
        lock(&self.state).incoming_frames.push_back(frame);
    }

    /// Take all captured outgoing frames.
    pub fn take_outgoing(&self) -> Vec<Frame> {
        std::mem::take(&mut lock(&self.state).outgoing_frames)
    }

    /// Whether the transport is open.
    pub fn is_open(&self) -> bool {
        lock(&self.state).open
    }

    /// How many times the transport was opened.
    pub fn open_count(&self) -> usize {
        lock(&self.state).opens
    }

    /// Make subsequent connection attempts fail.
    pub fn refuse_connections(&self, refuse: bool) {
        lock(&self.state).refuse_connections = refuse;
    }

    /// Kill the open transport. The next receive reports the loss.
    pub fn sever(&self, reason: impl Into<String>) {
        let mut state = lock(&self.state);
        state.open = false;
        state.incoming_frames.clear();
        state.severed = Some(reason.into());
    }

    /// Check if there is queued input.
    pub fn has_pending(&self) -> bool {
        let state = lock(&self.state);
        !state.pending_intents.is_empty() || !state.incoming_frames.is_empty()
    }
}

impl Driver for SimDriver {
    type Error = SimDriverError;
    type Instant = SimInstant;

    async fn poll_intent(&mut self) -> Result<Option<Intent>, Self::Error> {
        Ok(lock(&self.state).pending_intents.pop_front())
    }

    async fn open_transport(&mut self) -> Result<(), Self::Error> {
        let mut state = lock(&self.state);
        if state.refuse_connections {
            return Err(SimDriverError("connection refused".to_string()));
        }
        state.open = true;
        state.severed = None;
        state.opens += 1;
        Ok(())
    }

    fn close_transport(&mut self) {
        let mut state = lock(&self.state);
        state.open = false;
        state.incoming_frames.clear();
    }

    async fn send_frame(&mut self, frame: Frame) -> Result<(), Self::Error> {
        let mut state = lock(&self.state);
        if !state.open {
            return Err(SimDriverError("transport closed".to_string()));
        }
        state.outgoing_frames.push(frame);
        Ok(())
    }

    async fn recv_frame(&mut self) -> Result<Option<Frame>, Self::Error> {
        let mut state = lock(&self.state);
        if let Some(reason) = state.severed.take() {
            return Err(SimDriverError(reason));
        }
        Ok(state.incoming_frames.pop_front())
    }

    fn now(&self) -> Self::Instant {
        self.env.now()
    }
}

#[cfg(test)]
mod tests {
    use tapparty_proto::{FrameHeader, Opcode};

    use super::*;

    #[test]
    fn inject_intent_queues_intent() {
        let driver = SimDriver::new(SimEnv::new());
        driver.inject_intent(Intent::Tap);

        assert!(driver.has_pending());
    }

    #[test]
    fn inject_frame_queues_frame() {
        let driver = SimDriver::new(SimEnv::new());
        driver.inject_frame(Frame::new(FrameHeader::new(Opcode::Ping), Vec::new()));

        assert!(driver.has_pending());
    }

    #[test]
    fn clones_share_queues() {
        let driver = SimDriver::new(SimEnv::new());
        let handle = driver.clone();
        handle.inject_intent(Intent::StartGame);

        assert!(driver.has_pending());
    }
}
