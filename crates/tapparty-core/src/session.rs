//! Transport session state machine.
//!
//! Owns the lifecycle of the single connection to the relay: handshake,
//! heartbeat, bounded retry and reconnect. Uses the action pattern: methods
//! take time as input and return actions for the driver to execute, so the
//! same machine runs against a WebSocket or the in-memory relay.
//!
//! # State Machine
//!
//! ```text
//!                  connect()
//! ┌──────────────┐──────────>┌────────────┐  HelloReply  ┌───────────┐
//! │ Disconnected │           │ Connecting │─────────────>│ Connected │
//! └──────────────┘<──────────└────────────┘              └───────────┘
//!        ↑       attempts exhausted                       │        ↑
//!        │       (ConnectFailed)           heartbeat/link │        │ HelloReply
//!        │                                          death ↓        │
//!        │                                        ┌──────────────┐ │
//!        └────────────────────────────────────────│ Reconnecting │─┘
//!              attempts exhausted (ConnectionLost) └──────────────┘
//! ```
//!
//! # Timers
//!
//! Four one-shot deadlines: connect timeout, retry backoff, heartbeat ping and
//! liveness (last pong + timeout). Every transition runs through
//! `teardown_timers` before arming what the new state needs, so a superseded
//! timer can never fire.

use std::time::{Duration, Instant};

use tapparty_proto::{
    Frame, Opcode, Payload,
    payloads::session::{Goodbye, Hello},
};
use tracing::{debug, info, warn};

use crate::{
    error::SessionError,
    timer::{TimePoint, Timer},
};

/// Protocol version sent in `Hello`.
pub const PROTOCOL_VERSION: u8 = 1;

/// Connect attempts per cycle before giving up.
pub const DEFAULT_CONNECT_ATTEMPTS: u32 = 5;

/// Time allowed for transport open plus handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Interval between pings while connected.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);

/// Link is declared dead when no pong arrives for this long.
pub const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(60);

/// Delay before the next attempt after a failure or link death.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Actions returned by the session state machine.
///
/// Transport actions (`OpenTransport`, `SendFrame`, `CloseTransport`) are for
/// the driver; the rest are notifications for the layer above.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Open a new transport to the relay, then call
    /// [`Session::transport_opened`] or [`Session::transport_failed`].
    OpenTransport,

    /// Send this frame to the relay
    SendFrame(Frame),

    /// Close the current transport
    CloseTransport {
        /// Reason for closing
        reason: String,
    },

    /// Handshake completed
    Connected {
        /// Connection ID assigned by the relay
        connection_id: u64,
    },

    /// Initial connect gave up after exhausting its attempts
    ConnectFailed {
        /// Last failure
        reason: String,
    },

    /// Reconnect attempt scheduled after the link was lost
    Reconnecting {
        /// Attempt number within this reconnect cycle (1-based)
        attempt: u32,
    },

    /// Link was lost and reconnect gave up
    ConnectionLost {
        /// Last failure
        reason: String,
    },
}

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No transport, no pending attempt
    Disconnected,
    /// First connect cycle in progress
    Connecting,
    /// Handshake complete, heartbeat running
    Connected,
    /// Link lost, reconnect cycle in progress
    Reconnecting,
}

/// Session configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Attempts per connect or reconnect cycle
    pub connect_attempts: u32,
    /// Deadline for transport open plus handshake, per attempt
    pub connect_timeout: Duration,
    /// Ping interval while connected (must be < `heartbeat_timeout`)
    pub heartbeat_interval: Duration,
    /// Silence after which the link is declared dead
    pub heartbeat_timeout: Duration,
    /// Backoff between attempts
    pub reconnect_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_attempts: DEFAULT_CONNECT_ATTEMPTS,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            heartbeat_timeout: DEFAULT_HEARTBEAT_TIMEOUT,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

impl SessionConfig {
    /// Check the configuration is usable.
    ///
    /// # Errors
    ///
    /// - `SessionError::InvalidConfig` if there are zero attempts, a zero
    ///   timeout, or the heartbeat interval is not shorter than its timeout
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.connect_attempts == 0 {
            return Err(SessionError::InvalidConfig("connect_attempts must be >= 1".to_string()));
        }
        if self.connect_timeout.is_zero() {
            return Err(SessionError::InvalidConfig("connect_timeout must be > 0".to_string()));
        }
        if self.heartbeat_interval.is_zero() {
            return Err(SessionError::InvalidConfig("heartbeat_interval must be > 0".to_string()));
        }
        if self.heartbeat_interval >= self.heartbeat_timeout {
            return Err(SessionError::InvalidConfig(format!(
                "heartbeat_interval {:?} must be shorter than heartbeat_timeout {:?}",
                self.heartbeat_interval, self.heartbeat_timeout
            )));
        }
        Ok(())
    }
}

/// Transport progress within one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Link {
    /// No transport (disconnected, connected-and-done, or backing off)
    Idle,
    /// `OpenTransport` issued, waiting for the driver
    Opening,
    /// Hello sent, waiting for `HelloReply`
    Handshaking,
}

/// Transport session state machine.
///
/// Pure state machine: no I/O, no clock. Generic over the instant type so
/// tests can run on virtual time.
#[derive(Debug, Clone)]
pub struct Session<I = Instant>
where
    I: TimePoint,
{
    state: SessionState,
    config: SessionConfig,
    client_id: String,
    connection_id: Option<u64>,
    /// Attempts made in the current cycle
    attempt: u32,
    link: Link,
    attempt_started: Option<I>,
    last_pong: Option<I>,
    connect_timer: Timer<I>,
    retry_timer: Timer<I>,
    heartbeat_timer: Timer<I>,
    liveness_timer: Timer<I>,
}

impl<I> Session<I>
where
    I: TimePoint,
{
    /// Create a disconnected session.
    ///
    /// `client_id` is sent in every `Hello` and stays the same across
    /// reconnects.
    ///
    /// # Errors
    ///
    /// - `SessionError::InvalidConfig` if `config` fails validation
    pub fn new(config: SessionConfig, client_id: impl Into<String>) -> Result<Self, SessionError> {
        config.validate()?;

        Ok(Self {
            state: SessionState::Disconnected,
            config,
            client_id: client_id.into(),
            connection_id: None,
            attempt: 0,
            link: Link::Idle,
            attempt_started: None,
            last_pong: None,
            connect_timer: Timer::new(),
            retry_timer: Timer::new(),
            heartbeat_timer: Timer::new(),
            liveness_timer: Timer::new(),
        })
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the handshake has completed and the link is live.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    /// Connection ID assigned by the relay. `None` unless connected.
    #[must_use]
    pub fn connection_id(&self) -> Option<u64> {
        self.connection_id
    }

    /// Stable client identifier.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// When the last pong (or the handshake) was observed.
    #[must_use]
    pub fn last_pong(&self) -> Option<I> {
        self.last_pong
    }

    /// Attempts made in the current connect or reconnect cycle.
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Start connecting.
    ///
    /// Idempotent: a no-op while connecting, reconnecting or connected.
    pub fn connect(&mut self, now: I) -> Vec<SessionAction> {
        if self.state != SessionState::Disconnected {
            debug!(state = ?self.state, "connect ignored");
            return Vec::new();
        }

        self.state = SessionState::Connecting;
        self.attempt = 0;
        self.begin_attempt(now)
    }

    /// Driver opened the transport requested by `OpenTransport`.
    ///
    /// # Errors
    ///
    /// - `SessionError::InvalidState` if no transport was requested
    /// - `SessionError::Protocol` if the Hello frame cannot be encoded
    pub fn transport_opened(&mut self, now: I) -> Result<Vec<SessionAction>, SessionError> {
        let connecting =
            matches!(self.state, SessionState::Connecting | SessionState::Reconnecting);
        if !connecting || self.link != Link::Opening {
            return Err(SessionError::InvalidState {
                state: self.state,
                operation: "transport_opened",
            });
        }

        let hello = Payload::Hello(Hello {
            version: PROTOCOL_VERSION,
            client_id: self.client_id.clone(),
        })
        .into_frame()?;

        self.link = Link::Handshaking;
        debug!(
            attempt = self.attempt,
            elapsed = ?self.attempt_started.map(|t| now - t),
            "transport open, sending hello"
        );

        Ok(vec![SessionAction::SendFrame(hello)])
    }

    /// Driver could not open the transport, or it failed mid-session.
    pub fn transport_failed(&mut self, now: I, reason: impl Into<String>) -> Vec<SessionAction> {
        let reason = SessionError::Transport(reason.into()).to_string();
        self.link_down(now, reason, false)
    }

    /// Transport closed underneath us.
    pub fn transport_closed(&mut self, now: I, reason: impl Into<String>) -> Vec<SessionAction> {
        let reason = format!("transport closed: {}", reason.into());
        self.link_down(now, reason, false)
    }

    /// Process an incoming session frame.
    ///
    /// Only session opcodes (see [`Opcode::is_session`]) belong here; room and
    /// round traffic is handled by the client.
    ///
    /// # Errors
    ///
    /// - `SessionError::UnexpectedFrame` if the opcode is invalid for the
    ///   current state
    /// - `SessionError::Protocol` if the payload cannot be decoded
    pub fn handle_frame(
        &mut self,
        frame: &Frame,
        now: I,
    ) -> Result<Vec<SessionAction>, SessionError> {
        let Some(opcode) = frame.opcode() else {
            return Err(SessionError::UnexpectedFrame {
                state: self.state,
                opcode: frame.header.opcode(),
            });
        };

        let handshaking = self.link == Link::Handshaking;

        match (self.state, opcode) {
            (SessionState::Connecting | SessionState::Reconnecting, Opcode::HelloReply)
                if handshaking =>
            {
                let Payload::HelloReply(reply) = Payload::from_frame(frame)? else {
                    return Err(SessionError::UnexpectedFrame {
                        state: self.state,
                        opcode: opcode.to_u16(),
                    });
                };

                self.teardown_timers();
                self.state = SessionState::Connected;
                self.link = Link::Idle;
                self.attempt = 0;
                self.attempt_started = None;
                self.connection_id = Some(reply.connection_id);
                self.last_pong = Some(now);
                self.heartbeat_timer.arm(now, self.config.heartbeat_interval);
                self.liveness_timer.arm(now, self.config.heartbeat_timeout);

                info!(connection_id = reply.connection_id, "session connected");

                Ok(vec![SessionAction::Connected { connection_id: reply.connection_id }])
            },

            (SessionState::Connected, Opcode::Ping) => {
                Ok(vec![SessionAction::SendFrame(Frame::empty(Opcode::Pong))])
            },

            (SessionState::Connected, Opcode::Pong) => {
                self.last_pong = Some(now);
                self.liveness_timer.arm(now, self.config.heartbeat_timeout);
                Ok(Vec::new())
            },

            (state, Opcode::Goodbye) if state != SessionState::Disconnected => {
                let reason = match Payload::from_frame(frame)? {
                    Payload::Goodbye(goodbye) => goodbye.reason,
                    _ => String::new(),
                };
                Ok(self.link_down(now, format!("relay goodbye: {reason}"), true))
            },

            (state, Opcode::Error) if state != SessionState::Disconnected => {
                let reason = match Payload::from_frame(frame)? {
                    Payload::Error(error) => error.message,
                    _ => String::new(),
                };
                Ok(self.link_down(now, format!("relay error: {reason}"), true))
            },

            (state, opcode) => {
                Err(SessionError::UnexpectedFrame { state, opcode: opcode.to_u16() })
            },
        }
    }

    /// Fire due timers: connect timeout, retry backoff, liveness and ping.
    ///
    /// Call periodically; resolution only needs to be finer than the
    /// shortest configured duration.
    pub fn tick(&mut self, now: I) -> Vec<SessionAction> {
        match self.state {
            SessionState::Disconnected => Vec::new(),

            SessionState::Connecting | SessionState::Reconnecting => {
                if self.connect_timer.fire_if_due(now) {
                    let elapsed =
                        self.attempt_started.map_or(self.config.connect_timeout, |t| now - t);
                    let reason = SessionError::ConnectTimeout { elapsed }.to_string();
                    return self.attempt_failed(now, reason, true);
                }

                if self.retry_timer.fire_if_due(now) {
                    return self.begin_attempt(now);
                }

                Vec::new()
            },

            SessionState::Connected => {
                if self.liveness_timer.fire_if_due(now) {
                    let elapsed =
                        self.last_pong.map_or(self.config.heartbeat_timeout, |t| now - t);
                    let reason = SessionError::HeartbeatTimeout { elapsed }.to_string();
                    return self.link_lost(now, reason, true);
                }

                if self.heartbeat_timer.fire_if_due(now) {
                    self.heartbeat_timer.arm(now, self.config.heartbeat_interval);
                    debug!("heartbeat ping");
                    return vec![SessionAction::SendFrame(Frame::empty(Opcode::Ping))];
                }

                Vec::new()
            },
        }
    }

    /// Tear down the session.
    ///
    /// Cancels every timer on every path. Sends `Goodbye` if connected and
    /// closes any open transport.
    pub fn disconnect(&mut self) -> Vec<SessionAction> {
        if self.state == SessionState::Disconnected {
            return Vec::new();
        }

        let mut actions = Vec::new();
        let reason = "client disconnect".to_string();

        if self.state == SessionState::Connected {
            match Payload::Goodbye(Goodbye { reason: reason.clone() }).into_frame() {
                Ok(frame) => actions.push(SessionAction::SendFrame(frame)),
                Err(error) => warn!(%error, "failed to encode goodbye"),
            }
        }

        if self.state == SessionState::Connected || self.link != Link::Idle {
            actions.push(SessionAction::CloseTransport { reason });
        }

        info!(state = ?self.state, "session disconnected");
        self.reset();

        actions
    }

    fn begin_attempt(&mut self, now: I) -> Vec<SessionAction> {
        self.teardown_timers();
        self.attempt += 1;
        self.link = Link::Opening;
        self.attempt_started = Some(now);
        self.connect_timer.arm(now, self.config.connect_timeout);

        info!(
            attempt = self.attempt,
            max = self.config.connect_attempts,
            reconnect = self.state == SessionState::Reconnecting,
            "opening transport"
        );

        vec![SessionAction::OpenTransport]
    }

    /// Route a transport loss according to where we are in the lifecycle.
    fn link_down(&mut self, now: I, reason: String, close: bool) -> Vec<SessionAction> {
        match self.state {
            SessionState::Disconnected => Vec::new(),
            SessionState::Connected => self.link_lost(now, reason, close),
            SessionState::Connecting | SessionState::Reconnecting => {
                if self.link == Link::Idle {
                    debug!(%reason, "ignoring stale transport event during backoff");
                    Vec::new()
                } else {
                    self.attempt_failed(now, reason, close)
                }
            },
        }
    }

    /// Connected link died: schedule exactly one reconnect attempt.
    fn link_lost(&mut self, now: I, reason: String, close: bool) -> Vec<SessionAction> {
        warn!(%reason, connection_id = ?self.connection_id, "link lost, scheduling reconnect");

        self.teardown_timers();
        self.state = SessionState::Reconnecting;
        self.link = Link::Idle;
        self.connection_id = None;
        self.attempt = 0;
        self.attempt_started = None;
        self.retry_timer.arm(now, self.config.reconnect_delay);

        let mut actions = Vec::with_capacity(2);
        if close {
            actions.push(SessionAction::CloseTransport { reason });
        }
        actions.push(SessionAction::Reconnecting { attempt: 1 });
        actions
    }

    fn attempt_failed(&mut self, now: I, reason: String, close: bool) -> Vec<SessionAction> {
        self.teardown_timers();
        self.link = Link::Idle;
        self.attempt_started = None;

        let mut actions = Vec::with_capacity(2);
        if close {
            actions.push(SessionAction::CloseTransport { reason: reason.clone() });
        }

        if self.attempt < self.config.connect_attempts {
            warn!(attempt = self.attempt, %reason, "connect attempt failed, retrying");
            self.retry_timer.arm(now, self.config.reconnect_delay);
            if self.state == SessionState::Reconnecting {
                actions.push(SessionAction::Reconnecting { attempt: self.attempt + 1 });
            }
            return actions;
        }

        warn!(attempts = self.attempt, %reason, "giving up");
        let was_reconnecting = self.state == SessionState::Reconnecting;
        self.reset();

        actions.push(if was_reconnecting {
            SessionAction::ConnectionLost { reason }
        } else {
            SessionAction::ConnectFailed { reason }
        });
        actions
    }

    fn reset(&mut self) {
        self.teardown_timers();
        self.state = SessionState::Disconnected;
        self.link = Link::Idle;
        self.connection_id = None;
        self.attempt = 0;
        self.attempt_started = None;
        self.last_pong = None;
    }

    fn teardown_timers(&mut self) {
        self.connect_timer.cancel();
        self.retry_timer.cancel();
        self.heartbeat_timer.cancel();
        self.liveness_timer.cancel();
    }
}
