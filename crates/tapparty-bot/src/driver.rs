//! WebSocket driver for the bot.
//!
//! Frames travel over [`tapparty_client::transport`]; intents come from the
//! shared [`Script`], which the [`BotObserver`] feeds from inside the bridge.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Instant,
};

use tapparty_app::{Driver, GameEvent, GameObserver, Intent};
use tapparty_client::transport::{self, ConnectedClient, TransportError};
use tapparty_core::Environment;
use tapparty_proto::Frame;
use thiserror::Error;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::debug;

use crate::{Script, SystemEnv};

/// Script shared between the observer and the driver.
pub type SharedScript = Arc<Mutex<Script<Instant>>>;

/// Driver errors.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Could not open or use the WebSocket.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Send attempted with no open connection.
    #[error("transport not open")]
    NotConnected,

    /// The relay side of the socket went away.
    #[error("relay closed the connection")]
    Closed,
}

fn lock(script: &SharedScript) -> MutexGuard<'_, Script<Instant>> {
    script.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Driver speaking to a relay over WebSocket.
pub struct WsDriver {
    url: String,
    env: SystemEnv,
    script: SharedScript,
    connection: Option<ConnectedClient>,
}

impl WsDriver {
    /// Driver for the relay at `url` following `script`.
    pub fn new(url: impl Into<String>, env: SystemEnv, script: SharedScript) -> Self {
        Self { url: url.into(), env, script, connection: None }
    }
}

impl Driver for WsDriver {
    type Error = DriverError;
    type Instant = Instant;

    async fn poll_intent(&mut self) -> Result<Option<Intent>, Self::Error> {
        let now = self.env.now();
        Ok(lock(&self.script).next_intent(now))
    }

    async fn open_transport(&mut self) -> Result<(), Self::Error> {
        debug!(url = %self.url, "connecting");
        self.connection = Some(transport::connect(&self.url).await?);
        Ok(())
    }

    fn close_transport(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.stop();
        }
    }

    async fn send_frame(&mut self, frame: Frame) -> Result<(), Self::Error> {
        let connection = self.connection.as_ref().ok_or(DriverError::NotConnected)?;
        connection.to_server.send(frame).await.map_err(|_| DriverError::Closed)
    }

    async fn recv_frame(&mut self) -> Result<Option<Frame>, Self::Error> {
        let Some(connection) = self.connection.as_mut() else {
            return Ok(None);
        };

        match connection.from_server.try_recv() {
            Ok(frame) => Ok(Some(frame)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(DriverError::Closed),
        }
    }

    fn now(&self) -> Self::Instant {
        self.env.now()
    }
}

/// Observer that forwards every game event to the script.
pub struct BotObserver {
    env: SystemEnv,
    script: SharedScript,
}

impl BotObserver {
    /// Observer feeding `script`.
    pub fn new(env: SystemEnv, script: SharedScript) -> Self {
        Self { env, script }
    }
}

impl GameObserver for BotObserver {
    fn on_event(&mut self, event: &GameEvent) {
        let now = self.env.now();
        lock(&self.script).observe(event, now);
    }
}
