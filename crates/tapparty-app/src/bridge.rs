//! Protocol-to-UI translation layer.
//!
//! The [`Bridge`] wraps the Sans-IO [`tapparty_client::Client`] and adapts it
//! to the UI lifecycle.
//!
//! # Responsibilities
//!
//! - Converts [`crate::Intent`]s into client events.
//! - Accumulates outgoing [`Frame`]s and [`TransportCommand`]s for the driver
//!   to execute in the next I/O cycle.
//! - Converts client actions into [`crate::GameEvent`]s and hands each one to
//!   the registered [`GameObserver`].
//! - Logs and drops intents the client refuses, except for input the player
//!   must correct (bad room code, empty name), which surfaces as a room
//!   error.

use tapparty_client::{Client, ClientAction, ClientConfig, ClientError, ClientEvent};
use tapparty_core::Environment;
use tapparty_proto::Frame;
use tracing::{debug, warn};

use crate::{GameEvent, GameObserver, Intent};

/// Transport work requested by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCommand {
    /// Open a connection to the relay.
    Open,
    /// Close the current connection.
    Close {
        /// Why
        reason: String,
    },
}

/// Bridge between the UI and client protocol logic.
///
/// Generic over Environment to support both production and simulation.
pub struct Bridge<E: Environment> {
    client: Client<E>,
    outgoing: Vec<Frame>,
    transport: Vec<TransportCommand>,
    observer: Option<Box<dyn GameObserver>>,
}

impl<E: Environment> Bridge<E> {
    /// Create a bridge around a fresh client.
    ///
    /// # Errors
    ///
    /// - `ClientError::Session` if the session config is invalid
    pub fn new(env: E, config: ClientConfig) -> Result<Self, ClientError> {
        let client = Client::new(env, config)?;
        Ok(Self { client, outgoing: Vec::new(), transport: Vec::new(), observer: None })
    }

    /// The wrapped client, for read-only inspection.
    pub fn client(&self) -> &Client<E> {
        &self.client
    }

    /// Register the observer. Replaces any previous one.
    pub fn set_observer(&mut self, observer: impl GameObserver + 'static) {
        if self.observer.replace(Box::new(observer)).is_some() {
            debug!("observer replaced");
        }
    }

    /// Remove the observer. Events are still returned to the caller.
    pub fn clear_observer(&mut self) {
        self.observer = None;
    }

    /// Process a user intent.
    pub fn process_intent(&mut self, intent: Intent) -> Vec<GameEvent> {
        let event = match intent {
            Intent::CreateRoom { room_code, name, skin_id } => {
                let room_code =
                    room_code.unwrap_or_else(|| self.client.generate_room_code().to_string());
                ClientEvent::CreateRoom { room_code, name, skin_id }
            },
            Intent::JoinRoom { room_code, name, skin_id } => {
                ClientEvent::JoinRoom { room_code, name, skin_id }
            },
            Intent::UpdatePlayerInfo { new_name, new_skin_id } => {
                ClientEvent::UpdatePlayerInfo { new_name, new_skin_id }
            },
            Intent::StartGame => ClientEvent::StartGame,
            Intent::Tap => ClientEvent::Tap,
            Intent::UpdateGameState { game_ended } => ClientEvent::UpdateGameState { game_ended },
            Intent::LeaveRoom => ClientEvent::LeaveRoom,
            Intent::Quit => ClientEvent::Disconnect,
        };

        self.dispatch(event)
    }

    /// Start connecting without a room request.
    pub fn connect(&mut self) -> Vec<GameEvent> {
        self.dispatch(ClientEvent::Connect)
    }

    /// The driver opened the transport.
    pub fn transport_opened(&mut self) -> Vec<GameEvent> {
        self.dispatch(ClientEvent::TransportOpened)
    }

    /// The driver could not open the transport.
    pub fn transport_failed(&mut self, reason: impl Into<String>) -> Vec<GameEvent> {
        self.dispatch(ClientEvent::TransportFailed { reason: reason.into() })
    }

    /// The transport closed underneath us.
    pub fn transport_closed(&mut self, reason: impl Into<String>) -> Vec<GameEvent> {
        self.dispatch(ClientEvent::TransportClosed { reason: reason.into() })
    }

    /// Handle a frame from the relay.
    pub fn handle_frame(&mut self, frame: Frame) -> Vec<GameEvent> {
        self.dispatch(ClientEvent::FrameReceived(frame))
    }

    /// Process a time tick.
    pub fn handle_tick(&mut self, now: E::Instant) -> Vec<GameEvent> {
        self.dispatch(ClientEvent::Tick { now })
    }

    /// Take pending outgoing frames.
    pub fn take_outgoing(&mut self) -> Vec<Frame> {
        std::mem::take(&mut self.outgoing)
    }

    /// Take pending transport commands.
    pub fn take_transport_commands(&mut self) -> Vec<TransportCommand> {
        std::mem::take(&mut self.transport)
    }

    fn dispatch(&mut self, event: ClientEvent<E::Instant>) -> Vec<GameEvent> {
        let result = self.client.handle(event);
        let events = self.handle_client_result(result);

        if let Some(observer) = self.observer.as_mut() {
            for event in &events {
                observer.on_event(event);
            }
        }

        events
    }

    fn handle_client_result(
        &mut self,
        result: Result<Vec<ClientAction>, ClientError>,
    ) -> Vec<GameEvent> {
        match result {
            Ok(actions) => self.process_client_actions(actions),
            Err(
                e @ (ClientError::InvalidRoomCode(_)
                | ClientError::InvalidName { .. }
                | ClientError::AlreadyInRoom { .. }
                | ClientError::JoinPending { .. }),
            ) => {
                warn!(error = %e, "request rejected locally");
                vec![GameEvent::RoomError { message: e.to_string() }]
            },
            Err(e) if e.is_precondition() => {
                warn!(error = %e, "dropping intent");
                Vec::new()
            },
            Err(e) => {
                warn!(error = %e, "client error");
                Vec::new()
            },
        }
    }

    fn process_client_actions(&mut self, actions: Vec<ClientAction>) -> Vec<GameEvent> {
        let mut events = Vec::new();

        for action in actions {
            match action {
                ClientAction::Send(frame) => self.outgoing.push(frame),
                ClientAction::OpenTransport => self.transport.push(TransportCommand::Open),
                ClientAction::CloseTransport { reason } => {
                    self.transport.push(TransportCommand::Close { reason });
                },
                other => events.extend(GameEvent::from_action(other)),
            }
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use std::{
        future::Future,
        pin::Pin,
        sync::{Arc, Mutex},
        task::{Context, Poll},
        time::{Duration, Instant},
    };

    use tapparty_proto::{
        Opcode, Payload,
        payloads::{room::PlayerJoined, session::HelloReply},
    };

    use super::*;

    struct ImmediateFuture;

    impl Future for ImmediateFuture {
        type Output = ();
        fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
            Poll::Ready(())
        }
    }

    #[derive(Clone)]
    struct TestEnv;

    impl Environment for TestEnv {
        type Instant = Instant;

        #[allow(clippy::disallowed_methods)]
        fn now(&self) -> Instant {
            Instant::now()
        }

        fn sleep(&self, _duration: Duration) -> impl Future<Output = ()> + Send {
            ImmediateFuture
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            for (i, byte) in buffer.iter_mut().enumerate() {
                *byte = (i * 7) as u8;
            }
        }
    }

    struct Recorder {
        tag: &'static str,
        seen: Arc<Mutex<Vec<(&'static str, String)>>>,
    }

    impl GameObserver for Recorder {
        fn on_player_joined(&mut self, _connection_id: u64, name: &str, _skin_id: u32, _ready: bool) {
            self.seen.lock().unwrap().push((self.tag, name.to_string()));
        }
    }

    fn hosting_bridge() -> Bridge<TestEnv> {
        let mut bridge = Bridge::new(TestEnv, ClientConfig::default()).unwrap();
        bridge.process_intent(Intent::CreateRoom {
            room_code: None,
            name: "host".to_string(),
            skin_id: 1,
        });
        assert_eq!(bridge.take_transport_commands(), vec![TransportCommand::Open]);

        bridge.transport_opened();
        let hello = bridge.take_outgoing();
        assert_eq!(hello[0].opcode(), Some(Opcode::Hello));

        let events = bridge.handle_frame(
            Payload::HelloReply(HelloReply { connection_id: 1 }).into_frame().unwrap(),
        );
        assert!(events.contains(&GameEvent::Connected { connection_id: 1 }));
        assert!(matches!(events.last(), Some(GameEvent::RoomCreated { .. })));
        assert_eq!(bridge.take_outgoing()[0].opcode(), Some(Opcode::CreateRoom));
        bridge
    }

    fn joined(id: u64, name: &str) -> Frame {
        Payload::PlayerJoined(PlayerJoined {
            player_id: id,
            name: name.to_string(),
            skin_id: 0,
            ready: false,
        })
        .into_frame()
        .unwrap()
    }

    #[test]
    fn second_observer_replaces_first() {
        let mut bridge = hosting_bridge();
        let seen = Arc::new(Mutex::new(Vec::new()));

        bridge.set_observer(Recorder { tag: "first", seen: Arc::clone(&seen) });
        bridge.set_observer(Recorder { tag: "second", seen: Arc::clone(&seen) });

        bridge.handle_frame(joined(2, "bea"));
        bridge.handle_frame(joined(3, "cal"));

        assert_eq!(*seen.lock().unwrap(), vec![
            ("second", "bea".to_string()),
            ("second", "cal".to_string())
        ]);
    }

    #[test]
    fn bad_room_code_surfaces_as_room_error() {
        let mut bridge = Bridge::new(TestEnv, ClientConfig::default()).unwrap();

        let events = bridge.process_intent(Intent::JoinRoom {
            room_code: "NOPE!".to_string(),
            name: "bea".to_string(),
            skin_id: 0,
        });

        assert!(matches!(&events[..], [GameEvent::RoomError { .. }]));
        assert!(bridge.take_transport_commands().is_empty());
    }

    #[test]
    fn second_join_while_waiting_surfaces_as_room_error() {
        let mut bridge = Bridge::new(TestEnv, ClientConfig::default()).unwrap();
        bridge.connect();
        bridge.transport_opened();
        bridge.handle_frame(
            Payload::HelloReply(HelloReply { connection_id: 4 }).into_frame().unwrap(),
        );
        bridge.take_outgoing();

        let join = |code: &str| Intent::JoinRoom {
            room_code: code.to_string(),
            name: "bea".to_string(),
            skin_id: 0,
        };
        assert!(bridge.process_intent(join("BCDF")).is_empty());
        assert_eq!(bridge.take_outgoing()[0].opcode(), Some(Opcode::JoinRoom));

        let events = bridge.process_intent(join("GHJK"));
        assert!(matches!(&events[..], [GameEvent::RoomError { message }] if message.contains("BCDF")));
        assert!(bridge.take_outgoing().is_empty());
    }

    #[test]
    fn precondition_failures_are_dropped_quietly() {
        let mut bridge = Bridge::new(TestEnv, ClientConfig::default()).unwrap();

        assert!(bridge.process_intent(Intent::Tap).is_empty());
        assert!(bridge.process_intent(Intent::StartGame).is_empty());
        assert!(
            bridge
                .process_intent(Intent::UpdatePlayerInfo {
                    new_name: "x".to_string(),
                    new_skin_id: 0
                })
                .is_empty()
        );
        assert!(bridge.take_outgoing().is_empty());
    }

    #[test]
    fn generated_room_code_is_sent() {
        let bridge = hosting_bridge();
        assert!(bridge.client().room_code().is_some());
        assert!(bridge.client().is_host());
    }

    #[test]
    fn quit_sends_leave_and_goodbye() {
        let mut bridge = hosting_bridge();

        bridge.process_intent(Intent::Quit);

        let opcodes: Vec<_> = bridge.take_outgoing().iter().filter_map(Frame::opcode).collect();
        assert_eq!(opcodes, vec![Opcode::LeaveRoom, Opcode::Goodbye]);
        assert!(matches!(
            bridge.take_transport_commands().as_slice(),
            [TransportCommand::Close { .. }]
        ));
    }
}
