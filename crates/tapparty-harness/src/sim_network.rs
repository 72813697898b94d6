//! Multi-client simulation.
//!
//! `SimNetwork` wires several [`Bridge`]s to one [`SimRelay`] over perfect
//! in-memory links that deliver frames FIFO per connection. Everything runs
//! on the caller's thread against a shared [`SimEnv`] clock, so a scenario
//! replays identically for a given seed.
//!
//! Links can be cut to model a silent network failure: frames in either
//! direction vanish and new connections are refused.

use std::{collections::VecDeque, time::Duration};

use tapparty_app::{Bridge, GameEvent, Intent, TransportCommand};
use tapparty_client::{Client, ClientConfig, ClientError};
use tapparty_core::Environment;
use tapparty_proto::Frame;
use tracing::warn;

use crate::{
    SimEnv,
    invariants::{ClientSnapshot, PlayerSnapshot, SystemSnapshot},
    sim_relay::{Delivery, SimRelay},
};

/// Clock step used by [`SimNetwork::advance`].
pub const TICK: Duration = Duration::from_millis(100);

/// Upper bound on pump rounds per settle. Reaching it means two parties
/// are bouncing frames forever.
const MAX_SETTLE_ROUNDS: usize = 10_000;

struct SimClient {
    bridge: Bridge<SimEnv>,
    connection: Option<u64>,
    inbox: VecDeque<Frame>,
    events: Vec<GameEvent>,
    reachable: bool,
}

/// Several clients and one relay on a virtual clock.
pub struct SimNetwork {
    env: SimEnv,
    relay: SimRelay,
    clients: Vec<SimClient>,
}

impl SimNetwork {
    /// Empty network with a seeded environment.
    pub fn new(seed: u64) -> Self {
        Self::with_relay(seed, SimRelay::new())
    }

    /// Empty network around a preconfigured relay.
    pub fn with_relay(seed: u64, relay: SimRelay) -> Self {
        Self { env: SimEnv::with_seed(seed), relay, clients: Vec::new() }
    }

    /// Shared environment.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// The relay.
    pub fn relay(&self) -> &SimRelay {
        &self.relay
    }

    /// Add a client with default configuration. Returns its index.
    ///
    /// # Errors
    ///
    /// Never with the default configuration.
    pub fn add_client(&mut self) -> Result<usize, ClientError> {
        self.add_client_with(ClientConfig::default())
    }

    /// Add a client. Returns its index.
    ///
    /// # Errors
    ///
    /// - `ClientError::Session` if the config is invalid
    pub fn add_client_with(&mut self, config: ClientConfig) -> Result<usize, ClientError> {
        let bridge = Bridge::new(self.env.clone(), config)?;
        self.clients.push(SimClient {
            bridge,
            connection: None,
            inbox: VecDeque::new(),
            events: Vec::new(),
            reachable: true,
        });
        Ok(self.clients.len() - 1)
    }

    /// Number of clients.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Whether there are no clients.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Client `index`.
    ///
    /// # Panics
    ///
    /// If `index` is out of range.
    pub fn client(&self, index: usize) -> &Client<SimEnv> {
        self.clients[index].bridge.client()
    }

    /// Bridge of client `index`, e.g. to register an observer.
    ///
    /// # Panics
    ///
    /// If `index` is out of range.
    pub fn bridge_mut(&mut self, index: usize) -> &mut Bridge<SimEnv> {
        &mut self.clients[index].bridge
    }

    /// Events client `index` produced so far.
    pub fn events(&self, index: usize) -> &[GameEvent] {
        &self.clients[index].events
    }

    /// Drain the events client `index` produced so far.
    pub fn take_events(&mut self, index: usize) -> Vec<GameEvent> {
        std::mem::take(&mut self.clients[index].events)
    }

    /// Forward an intent from client `index` and settle the network.
    pub fn intent(&mut self, index: usize, intent: Intent) {
        let client = &mut self.clients[index];
        let events = client.bridge.process_intent(intent);
        client.events.extend(events);
        self.settle();
    }

    /// Cut or restore client `index`'s link. While cut, frames vanish and
    /// connection attempts are refused; the relay notices nothing.
    ///
    /// Restoring a link resets a connection that survived the cut, since the
    /// frames lost meanwhile leave the stream unusable.
    pub fn set_reachable(&mut self, index: usize, reachable: bool) {
        let was = std::mem::replace(&mut self.clients[index].reachable, reachable);
        if reachable && !was {
            self.drop_connection(index);
        }
    }

    /// Reset client `index`'s connection: both ends see the transport
    /// close.
    pub fn drop_connection(&mut self, index: usize) {
        let Some(connection) = self.clients[index].connection.take() else {
            return;
        };

        let deliveries = self.relay.close(connection);
        self.route(deliveries);

        let client = &mut self.clients[index];
        client.inbox.clear();
        let events = client.bridge.transport_closed("connection reset");
        client.events.extend(events);
        self.settle();
    }

    /// Move the clock forward in [`TICK`] steps, ticking every client and
    /// settling after each step.
    pub fn advance(&mut self, by: Duration) {
        let mut left = by;
        while !left.is_zero() {
            let step = left.min(TICK);
            self.env.advance(step);
            left -= step;

            let now = self.env.now();
            for client in &mut self.clients {
                let events = client.bridge.handle_tick(now);
                client.events.extend(events);
            }
            self.settle();
        }
    }

    /// Exchange frames and transport commands until nothing moves.
    pub fn settle(&mut self) {
        for _ in 0..MAX_SETTLE_ROUNDS {
            let mut progressed = false;
            for index in 0..self.clients.len() {
                progressed |= self.pump(index);
            }
            if !progressed {
                return;
            }
        }
        warn!("network did not settle");
    }

    /// Observable state of every client.
    pub fn snapshot(&self) -> SystemSnapshot {
        let clients = self
            .clients
            .iter()
            .enumerate()
            .map(|(index, sim)| {
                let client = sim.bridge.client();
                ClientSnapshot {
                    index,
                    reachable: sim.reachable,
                    connection_id: client.connection_id(),
                    room_code: client.room_code(),
                    awaiting_join: client.has_pending_request(),
                    is_host: client.is_host(),
                    round_phase: client.round_phase(),
                    roster: client
                        .roster()
                        .map(|r| r.players().iter().map(PlayerSnapshot::from).collect())
                        .unwrap_or_default(),
                }
            })
            .collect();

        SystemSnapshot::from_clients(clients)
    }

    /// Run one client's queued work. Returns whether anything happened.
    fn pump(&mut self, index: usize) -> bool {
        let mut deliveries: Vec<Delivery> = Vec::new();
        let client = &mut self.clients[index];

        let frames = client.bridge.take_outgoing();
        let commands = client.bridge.take_transport_commands();
        let mut progressed = !frames.is_empty() || !commands.is_empty();

        for frame in frames {
            if let Some(connection) = client.connection
                && client.reachable
            {
                deliveries.extend(self.relay.handle(connection, &frame));
            }
        }

        for command in commands {
            match command {
                TransportCommand::Open if client.reachable => {
                    client.connection = Some(self.relay.accept());
                    let events = client.bridge.transport_opened();
                    client.events.extend(events);
                },
                TransportCommand::Open => {
                    let events = client.bridge.transport_failed("connection refused");
                    client.events.extend(events);
                },
                TransportCommand::Close { .. } => {
                    client.inbox.clear();
                    if let Some(connection) = client.connection.take() {
                        deliveries.extend(self.relay.close(connection));
                    }
                },
            }
        }

        while let Some(frame) = client.inbox.pop_front() {
            progressed = true;
            let events = client.bridge.handle_frame(frame);
            client.events.extend(events);
        }

        self.route(deliveries);
        progressed
    }

    fn route(&mut self, deliveries: Vec<Delivery>) {
        for delivery in deliveries {
            let target = self
                .clients
                .iter_mut()
                .find(|c| c.connection == Some(delivery.to) && c.reachable);
            if let Some(client) = target {
                client.inbox.push_back(delivery.frame);
            }
        }
    }
}
