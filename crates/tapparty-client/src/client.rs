//! Client state machine.
//!
//! The `Client` combines the transport [`Session`], room membership and the
//! round coordinator. It is the only place relay frames are interpreted, and
//! the roster is only mutated from here.
//!
//! # Routing
//!
//! - Session opcodes (handshake, ping, goodbye, fatal errors) go to the
//!   session.
//! - Room and round opcodes are accepted only once the handshake completed;
//!   earlier frames are logged and dropped.
//! - Non-fatal relay errors (`NOT_IN_ROOM`, `NOT_HOST`) are surfaced like a
//!   room rejection.

use std::time::Duration;

use tapparty_core::{Environment, Session, SessionAction, SessionConfig, SessionState};
use tapparty_proto::{
    Frame, Opcode, Payload, RoomCode,
    payloads::{
        room::{
            CreateRoom, JoinRoom, JoinSuccess, MAX_NAME_LEN, PlayerInfoUpdate, PlayerJoined,
            UpdatePlayerInfo,
        },
        round::GameState,
    },
};
use tracing::{debug, info, warn};

use crate::{
    error::ClientError,
    event::{ClientAction, ClientEvent},
    room::{Role, Room, RoomPhase},
    roster::{Player, Roster},
    round::{DEFAULT_ROUND_DURATION, RoundPhase},
};

/// Client configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Transport session settings
    pub session: SessionConfig,
    /// Round length (host side)
    pub round_duration: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { session: SessionConfig::default(), round_duration: DEFAULT_ROUND_DURATION }
    }
}

/// Our own display attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    /// Display name
    pub name: String,
    /// Skin
    pub skin_id: u32,
}

/// Create or join waiting for a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Request {
    Create { code: RoomCode, profile: Profile },
    Join { code: RoomCode, profile: Profile },
}

/// Trim a display name and cap it at [`MAX_NAME_LEN`] characters.
///
/// # Errors
///
/// - `ClientError::InvalidName` if nothing is left after trimming
pub fn normalize_name(raw: &str) -> Result<String, ClientError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ClientError::InvalidName { reason: "name is empty" });
    }
    Ok(trimmed.chars().take(MAX_NAME_LEN).collect())
}

/// Tap Party client.
///
/// Sans-IO: feed [`ClientEvent`]s into [`Client::handle`] and execute the
/// returned [`ClientAction`]s.
pub struct Client<E: Environment> {
    env: E,
    config: ClientConfig,
    session: Session<E::Instant>,
    profile: Option<Profile>,
    room: Option<Room<E::Instant>>,
    /// Create/join queued until the session connects. Newest wins.
    queued: Option<Request>,
    /// Join sent, waiting for `JoinSuccess` or `RoomError`.
    awaiting_join: Option<(RoomCode, Profile)>,
}

impl<E: Environment> Client<E> {
    /// Create a disconnected client.
    ///
    /// # Errors
    ///
    /// - `ClientError::Session` if the session config is invalid
    pub fn new(env: E, config: ClientConfig) -> Result<Self, ClientError> {
        let client_id = format!("{:016x}", env.random_u64());
        let session = Session::new(config.session.clone(), client_id)?;

        Ok(Self {
            env,
            config,
            session,
            profile: None,
            room: None,
            queued: None,
            awaiting_join: None,
        })
    }

    /// Environment handle.
    pub fn env(&self) -> &E {
        &self.env
    }

    /// Active configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Transport session state.
    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    /// Whether the relay handshake completed.
    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    /// Our connection ID. `None` unless connected.
    pub fn connection_id(&self) -> Option<u64> {
        self.session.connection_id()
    }

    /// Stable client identifier sent in `Hello` and `JoinRoom`.
    pub fn client_id(&self) -> &str {
        self.session.client_id()
    }

    /// Our display attributes, once a create or join supplied them.
    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    /// Current room.
    pub fn room(&self) -> Option<&Room<E::Instant>> {
        self.room.as_ref()
    }

    /// Current room code.
    pub fn room_code(&self) -> Option<RoomCode> {
        self.room.as_ref().map(|r| r.code)
    }

    /// Roster of the current room.
    pub fn roster(&self) -> Option<&Roster> {
        self.room.as_ref().map(|r| &r.roster)
    }

    /// Room phase. `None` outside a room.
    pub fn room_phase(&self) -> Option<RoomPhase> {
        self.room.as_ref().map(Room::phase)
    }

    /// Round phase. `Idle` outside a room.
    pub fn round_phase(&self) -> RoundPhase {
        self.room.as_ref().map_or(RoundPhase::Idle, |r| r.round.phase())
    }

    /// Whether we host the current room.
    pub fn is_host(&self) -> bool {
        self.room.as_ref().is_some_and(Room::is_host)
    }

    /// Time left in the running round.
    pub fn remaining(&self, now: E::Instant) -> Option<Duration> {
        self.room.as_ref().and_then(|r| r.round.remaining(now))
    }

    /// Whether a create/join is waiting for the connection or the relay.
    pub fn has_pending_request(&self) -> bool {
        self.queued.is_some() || self.awaiting_join.is_some()
    }

    /// Draw a fresh room code from the environment's entropy.
    pub fn generate_room_code(&self) -> RoomCode {
        RoomCode::generate(|buf| self.env.random_bytes(buf))
    }

    /// Process an event and return resulting actions.
    ///
    /// # Errors
    ///
    /// Precondition violations (see [`ClientError::is_precondition`]) leave
    /// state untouched. Protocol errors mean the relay sent something
    /// undecodable; the frame is dropped.
    pub fn handle(
        &mut self,
        event: ClientEvent<E::Instant>,
    ) -> Result<Vec<ClientAction>, ClientError> {
        match event {
            ClientEvent::Connect => {
                let actions = self.session.connect(self.env.now());
                self.absorb(actions)
            },
            ClientEvent::Disconnect => self.disconnect(),
            ClientEvent::TransportOpened => {
                let actions = self.session.transport_opened(self.env.now())?;
                self.absorb(actions)
            },
            ClientEvent::TransportFailed { reason } => {
                let actions = self.session.transport_failed(self.env.now(), reason);
                self.absorb(actions)
            },
            ClientEvent::TransportClosed { reason } => {
                let actions = self.session.transport_closed(self.env.now(), reason);
                self.absorb(actions)
            },
            ClientEvent::FrameReceived(frame) => self.handle_frame(&frame),
            ClientEvent::Tick { now } => self.handle_tick(now),
            ClientEvent::CreateRoom { room_code, name, skin_id } => {
                self.create_room(&room_code, &name, skin_id)
            },
            ClientEvent::JoinRoom { room_code, name, skin_id } => {
                self.join_room(&room_code, &name, skin_id)
            },
            ClientEvent::UpdatePlayerInfo { new_name, new_skin_id } => {
                self.update_player_info(&new_name, new_skin_id)
            },
            ClientEvent::StartGame => self.start_game(),
            ClientEvent::Tap => self.tap(),
            ClientEvent::UpdateGameState { game_ended } => self.update_game_state(game_ended),
            ClientEvent::LeaveRoom => self.leave_room(),
        }
    }

    /// Drop room, roster, round and pending requests. Keeps the connection.
    fn reset(&mut self) {
        self.room = None;
        self.queued = None;
        self.awaiting_join = None;
    }

    fn create_room(
        &mut self,
        raw_code: &str,
        name: &str,
        skin_id: u32,
    ) -> Result<Vec<ClientAction>, ClientError> {
        self.ensure_not_in_room()?;
        let code = RoomCode::parse(raw_code)?;
        let profile = Profile { name: normalize_name(name)?, skin_id };

        self.profile = Some(profile.clone());
        self.submit(Request::Create { code, profile })
    }

    fn join_room(
        &mut self,
        raw_code: &str,
        name: &str,
        skin_id: u32,
    ) -> Result<Vec<ClientAction>, ClientError> {
        self.ensure_not_in_room()?;
        let code = RoomCode::parse(raw_code)?;
        let profile = Profile { name: normalize_name(name)?, skin_id };

        self.profile = Some(profile.clone());
        self.submit(Request::Join { code, profile })
    }

    /// A sent join must be answered (or left) before another create or
    /// join, otherwise the relay's replies cannot be told apart.
    fn ensure_not_in_room(&self) -> Result<(), ClientError> {
        if let Some(room) = &self.room {
            return Err(ClientError::AlreadyInRoom { room_code: room.code.to_string() });
        }
        if let Some((code, _)) = &self.awaiting_join {
            return Err(ClientError::JoinPending { room_code: code.to_string() });
        }
        Ok(())
    }

    /// Send now if connected, otherwise queue and connect.
    fn submit(&mut self, request: Request) -> Result<Vec<ClientAction>, ClientError> {
        if self.session.is_connected() {
            return self.send_request(request);
        }

        if let Some(previous) = self.queued.replace(request) {
            debug!(?previous, "replacing queued room request");
        }
        info!(state = ?self.session.state(), "room request queued until connected");

        let actions = self.session.connect(self.env.now());
        self.absorb(actions)
    }

    fn send_request(&mut self, request: Request) -> Result<Vec<ClientAction>, ClientError> {
        match request {
            Request::Create { code, profile } => {
                let connection_id = self
                    .session
                    .connection_id()
                    .ok_or(ClientError::NotConnected { operation: "create a room" })?;

                let frame = Payload::CreateRoom(CreateRoom {
                    room_code: code.to_string(),
                    host_name: profile.name.clone(),
                    host_skin: profile.skin_id,
                })
                .into_frame()?;

                let mut room = Room::new(code, Role::Host, self.config.round_duration);
                room.roster.insert(Player::new(connection_id, profile.name, profile.skin_id).host())?;
                self.room = Some(room);

                info!(%code, connection_id, "room created");
                Ok(vec![ClientAction::Send(frame), ClientAction::RoomCreated {
                    room_code: code.to_string(),
                }])
            },
            Request::Join { code, profile } => {
                let frame = self.join_frame(code, &profile)?;
                self.awaiting_join = Some((code, profile));

                info!(%code, "join requested");
                Ok(vec![ClientAction::Send(frame)])
            },
        }
    }

    fn join_frame(&self, code: RoomCode, profile: &Profile) -> Result<Frame, ClientError> {
        Ok(Payload::JoinRoom(JoinRoom {
            room_code: code.to_string(),
            name: profile.name.clone(),
            skin_id: profile.skin_id,
            client_id: self.session.client_id().to_string(),
        })
        .into_frame()?)
    }

    fn update_player_info(
        &mut self,
        new_name: &str,
        new_skin_id: u32,
    ) -> Result<Vec<ClientAction>, ClientError> {
        if !self.session.is_connected() {
            return Err(ClientError::NotConnected { operation: "update player info" });
        }
        if self.room.is_none() {
            return Err(ClientError::NotInRoom);
        }

        let new_name = normalize_name(new_name)?;
        let old_name = self.profile.as_ref().map(|p| p.name.clone()).unwrap_or_default();

        let frame = Payload::UpdatePlayerInfo(UpdatePlayerInfo {
            old_name,
            new_nickname: new_name.clone(),
            new_skin_id,
        })
        .into_frame()?;

        self.profile = Some(Profile { name: new_name, skin_id: new_skin_id });
        Ok(vec![ClientAction::Send(frame)])
    }

    fn start_game(&mut self) -> Result<Vec<ClientAction>, ClientError> {
        const OPERATION: &str = "start the game";

        let connected = self.session.is_connected();
        let room = self.room.as_mut().ok_or(ClientError::NotInRoom)?;
        if !room.is_host() {
            return Err(ClientError::NotHost { operation: OPERATION });
        }
        if !room.round.can_start() {
            return Err(ClientError::WrongPhase { operation: OPERATION, phase: room.round.phase() });
        }
        if !connected {
            return Err(ClientError::NotConnected { operation: OPERATION });
        }

        let frame = Payload::GameStart.into_frame()?;
        let now = self.env.now();

        room.roster.reset_taps();
        room.round.start(now, true);

        info!(code = %room.code, duration = ?room.round.duration(), "round started");
        Ok(vec![ClientAction::Send(frame), ClientAction::GameStarting])
    }

    fn tap(&mut self) -> Result<Vec<ClientAction>, ClientError> {
        let room = self.room.as_ref().ok_or(ClientError::NotInRoom)?;
        if !room.round.is_running() {
            return Err(ClientError::WrongPhase { operation: "tap", phase: room.round.phase() });
        }
        if !self.session.is_connected() {
            return Err(ClientError::NotConnected { operation: "tap" });
        }

        // Counted when the relay echoes the TapEvent back.
        Ok(vec![ClientAction::Send(Payload::PlayerTap.into_frame()?)])
    }

    fn update_game_state(&mut self, game_ended: bool) -> Result<Vec<ClientAction>, ClientError> {
        const OPERATION: &str = "update game state";

        let connected = self.session.is_connected();
        let room = self.room.as_mut().ok_or(ClientError::NotInRoom)?;
        if !room.is_host() {
            return Err(ClientError::NotHost { operation: OPERATION });
        }
        if !connected {
            return Err(ClientError::NotConnected { operation: OPERATION });
        }

        if !game_ended {
            let frame = Payload::UpdateGameState(GameState { game_ended: false }).into_frame()?;
            return Ok(vec![ClientAction::Send(frame)]);
        }

        if !room.round.end() {
            return Err(ClientError::WrongPhase { operation: "end the round", phase: room.round.phase() });
        }
        info!("host ended the round early");
        self.announce_round_end()
    }

    /// Host side, after the round moved to `Ended`: tell the relay and
    /// report the result locally.
    fn announce_round_end(&self) -> Result<Vec<ClientAction>, ClientError> {
        let mut actions = Vec::with_capacity(3);

        if self.session.is_connected() {
            let frame = Payload::UpdateGameState(GameState { game_ended: true }).into_frame()?;
            actions.push(ClientAction::Send(frame));
        } else {
            warn!(state = ?self.session.state(), "round ended while disconnected, peers not told");
        }

        let winner = self.room.as_ref().and_then(|r| r.roster.winner());
        info!(?winner, "round ended");

        actions.push(ClientAction::GameStateUpdate { game_ended: true });
        actions.push(ClientAction::RoundEnded { winner });
        Ok(actions)
    }

    fn leave_room(&mut self) -> Result<Vec<ClientAction>, ClientError> {
        if self.room.is_none() && !self.has_pending_request() {
            return Err(ClientError::NotInRoom);
        }

        let mut actions = Vec::new();
        let announced = self.room.is_some() || self.awaiting_join.is_some();
        if announced && self.session.is_connected() {
            actions.push(ClientAction::Send(Payload::LeaveRoom.into_frame()?));
        }

        info!(code = ?self.room_code(), "leaving room");
        self.reset();
        Ok(actions)
    }

    fn disconnect(&mut self) -> Result<Vec<ClientAction>, ClientError> {
        let mut actions = Vec::new();
        if self.room.is_some() && self.session.is_connected() {
            actions.push(ClientAction::Send(Payload::LeaveRoom.into_frame()?));
        }

        self.reset();
        let session_actions = self.session.disconnect();
        actions.extend(self.absorb(session_actions)?);
        Ok(actions)
    }

    fn handle_tick(&mut self, now: E::Instant) -> Result<Vec<ClientAction>, ClientError> {
        let session_actions = self.session.tick(now);
        let mut actions = self.absorb(session_actions)?;

        if let Some(room) = self.room.as_mut()
            && room.is_host()
            && room.round.tick(now)
        {
            actions.extend(self.announce_round_end()?);
        }

        Ok(actions)
    }

    fn handle_frame(&mut self, frame: &Frame) -> Result<Vec<ClientAction>, ClientError> {
        let Some(opcode) = frame.opcode() else {
            warn!(opcode = frame.header.opcode(), "dropping frame with unknown opcode");
            return Ok(Vec::new());
        };

        if opcode == Opcode::Error
            && let Payload::Error(error) = Payload::from_frame(frame)?
            && !error.is_fatal()
        {
            warn!(code = error.code, message = %error.message, "relay refused request");
            return Ok(vec![ClientAction::RoomError { message: error.message }]);
        }

        if opcode.is_session() {
            let actions = self.session.handle_frame(frame, self.env.now())?;
            return self.absorb(actions);
        }

        if !self.session.is_connected() {
            warn!(?opcode, state = ?self.session.state(), "dropping room frame before handshake");
            return Ok(Vec::new());
        }

        debug!(?opcode, "relay frame");
        match Payload::from_frame(frame)? {
            Payload::JoinSuccess(success) => self.on_join_success(success),
            Payload::RoomError(error) => Ok(self.on_room_error(error.message)),
            Payload::PlayerJoined(joined) => self.on_player_joined(joined),
            Payload::PlayerLeft(left) => Ok(self.on_player_left(left.name)),
            Payload::PlayerInfoUpdate(update) => Ok(self.on_player_info_update(update)),
            Payload::RoomClosed => Ok(self.on_room_closed()),
            Payload::GameStarting => Ok(self.on_game_starting()),
            Payload::TapEvent(tap) => Ok(self.on_tap_event(tap.player_id)),
            Payload::GameStateUpdate(state) => Ok(self.on_game_state_update(state.game_ended)),
            other => {
                warn!(opcode = ?other.opcode(), "unexpected frame from relay");
                Ok(Vec::new())
            },
        }
    }

    fn on_join_success(&mut self, success: JoinSuccess) -> Result<Vec<ClientAction>, ClientError> {
        let Some((code, _)) = &self.awaiting_join else {
            warn!(room = %success.room_code, "unsolicited join success");
            return Ok(Vec::new());
        };
        let code = *code;
        if success.room_code != code.as_str() {
            warn!(awaiting = %code, confirmed = %success.room_code, "ignoring join for another room");
            return Ok(Vec::new());
        }
        self.awaiting_join = None;

        let mut roster = Roster::new();
        for entry in success.players {
            let mut player = Player::new(entry.player_id, entry.name, entry.skin_id);
            player.is_host = entry.is_host;
            player.ready = entry.ready;
            roster.insert(player)?;
        }
        let players = roster.players().to_vec();

        // A rejoin starts over too: the relay only admits players between
        // rounds and the roster it sent carries no taps.
        let mut room = Room::new(code, Role::Guest, self.config.round_duration);
        room.roster = roster;
        self.room = Some(room);

        info!(%code, players = players.len(), "joined room");
        Ok(vec![ClientAction::JoinSuccess { room_code: code.to_string(), players }])
    }

    fn on_room_error(&mut self, message: String) -> Vec<ClientAction> {
        warn!(%message, "room request rejected");

        match self.awaiting_join.take() {
            // Rejoin after a reconnect refused: the room is gone.
            Some((code, _)) if self.room.as_ref().is_some_and(|r| r.code == code) => {
                self.room = None;
                return vec![ClientAction::RoomError { message }, ClientAction::RoomClosed];
            },
            Some(_) => {},
            None => {
                if let Some(room) = &self.room
                    && room.is_host()
                    && room.phase() == RoomPhase::Lobby
                    && room.roster.len() <= 1
                {
                    // Relay refused our create.
                    self.room = None;
                }
            },
        }

        vec![ClientAction::RoomError { message }]
    }

    fn on_player_joined(&mut self, joined: PlayerJoined) -> Result<Vec<ClientAction>, ClientError> {
        let Some(room) = self.room.as_mut() else {
            debug!(name = %joined.name, "player joined outside a room");
            return Ok(Vec::new());
        };

        let mut player = Player::new(joined.player_id, joined.name.clone(), joined.skin_id);
        player.ready = joined.ready;
        room.roster.insert(player)?;

        debug!(name = %joined.name, connection_id = joined.player_id, "player joined");
        Ok(vec![ClientAction::PlayerJoined {
            connection_id: joined.player_id,
            name: joined.name,
            skin_id: joined.skin_id,
            ready: joined.ready,
        }])
    }

    fn on_player_left(&mut self, name: String) -> Vec<ClientAction> {
        let Some(room) = self.room.as_mut() else {
            debug!(%name, "player left outside a room");
            return Vec::new();
        };

        if room.roster.remove_by_name(&name).is_none() {
            warn!(%name, "unknown player left");
        }
        vec![ClientAction::PlayerLeft { name }]
    }

    fn on_player_info_update(&mut self, update: PlayerInfoUpdate) -> Vec<ClientAction> {
        let Some(room) = self.room.as_mut() else {
            return Vec::new();
        };

        if !room.roster.rename(&update.old_name, &update.new_name, update.new_skin) {
            warn!(old_name = %update.old_name, "info update for unknown player");
        }
        vec![ClientAction::PlayerInfoUpdated {
            old_name: update.old_name,
            new_name: update.new_name,
            new_skin: update.new_skin,
        }]
    }

    fn on_room_closed(&mut self) -> Vec<ClientAction> {
        if self.room.is_none() && self.awaiting_join.is_none() {
            debug!("room closed, but not in a room");
            return Vec::new();
        }

        info!(code = ?self.room_code(), "room closed by relay");
        self.reset();
        vec![ClientAction::RoomClosed]
    }

    fn on_game_starting(&mut self) -> Vec<ClientAction> {
        let now = self.env.now();
        let Some(room) = self.room.as_mut() else {
            return Vec::new();
        };
        if room.is_host() || !room.round.can_start() {
            debug!(phase = ?room.round.phase(), "ignoring game starting");
            return Vec::new();
        }

        room.roster.reset_taps();
        room.round.start(now, false);

        info!(code = %room.code, "round started");
        vec![ClientAction::GameStarting]
    }

    fn on_tap_event(&mut self, player_id: u64) -> Vec<ClientAction> {
        let Some(room) = self.room.as_mut() else {
            return Vec::new();
        };
        if !room.round.is_running() {
            debug!(player_id, phase = ?room.round.phase(), "dropping tap outside round");
            return Vec::new();
        }

        match room.roster.record_tap(player_id) {
            Some(tap_count) => vec![ClientAction::TapEvent { connection_id: player_id, tap_count }],
            None => {
                warn!(player_id, "dropping tap from unknown player");
                Vec::new()
            },
        }
    }

    fn on_game_state_update(&mut self, game_ended: bool) -> Vec<ClientAction> {
        let Some(room) = self.room.as_mut() else {
            return Vec::new();
        };

        if !game_ended {
            return vec![ClientAction::GameStateUpdate { game_ended: false }];
        }
        if !room.round.end() {
            debug!(phase = ?room.round.phase(), "ignoring repeated game end");
            return Vec::new();
        }

        let winner = room.roster.winner();
        info!(?winner, "round ended");
        vec![ClientAction::GameStateUpdate { game_ended: true }, ClientAction::RoundEnded {
            winner,
        }]
    }

    /// Translate session actions, reacting to lifecycle changes.
    fn absorb(&mut self, actions: Vec<SessionAction>) -> Result<Vec<ClientAction>, ClientError> {
        let mut out = Vec::with_capacity(actions.len());

        for action in actions {
            match action {
                SessionAction::OpenTransport => out.push(ClientAction::OpenTransport),
                SessionAction::SendFrame(frame) => out.push(ClientAction::Send(frame)),
                SessionAction::CloseTransport { reason } => {
                    out.push(ClientAction::CloseTransport { reason });
                },
                SessionAction::Connected { connection_id } => {
                    out.push(ClientAction::Connected { connection_id });
                    out.extend(self.rejoin(connection_id)?);
                    if let Some(request) = self.queued.take() {
                        out.extend(self.send_request(request)?);
                    }
                },
                SessionAction::ConnectFailed { reason } => {
                    if let Some(request) = self.queued.take() {
                        warn!(?request, "dropping queued room request");
                        out.push(ClientAction::RoomError {
                            message: format!("could not reach the relay: {reason}"),
                        });
                    }
                    out.push(ClientAction::ConnectFailed { reason });
                },
                SessionAction::Reconnecting { attempt } => {
                    out.push(ClientAction::Reconnecting { attempt });
                },
                SessionAction::ConnectionLost { reason } => {
                    let in_room = self.room.is_some() || self.awaiting_join.is_some();
                    self.reset();
                    out.push(ClientAction::ConnectionLost { reason });
                    if in_room {
                        out.push(ClientAction::RoomClosed);
                    }
                },
            }
        }

        Ok(out)
    }

    /// After a reconnect, announce our membership again under the new
    /// connection ID.
    fn rejoin(&mut self, connection_id: u64) -> Result<Vec<ClientAction>, ClientError> {
        let Some(profile) = self.profile.clone() else {
            return Ok(Vec::new());
        };
        let Some(room) = self.room.as_mut() else {
            // A join still in flight when the link dropped goes out again.
            let Some((code, pending)) = self.awaiting_join.clone() else {
                return Ok(Vec::new());
            };
            info!(%code, connection_id, "resending join after reconnect");
            return Ok(vec![ClientAction::Send(self.join_frame(code, &pending)?)]);
        };

        let code = room.code;
        match room.role {
            Role::Host => {
                // The relay closed the old room with our connection.
                let mut reopened = Room::new(code, Role::Host, self.config.round_duration);
                reopened
                    .roster
                    .insert(Player::new(connection_id, profile.name.clone(), profile.skin_id).host())?;
                *room = reopened;

                let frame = Payload::CreateRoom(CreateRoom {
                    room_code: code.to_string(),
                    host_name: profile.name,
                    host_skin: profile.skin_id,
                })
                .into_frame()?;

                info!(%code, connection_id, "re-creating room after reconnect");
                Ok(vec![ClientAction::Send(frame), ClientAction::RoomCreated {
                    room_code: code.to_string(),
                }])
            },
            Role::Guest => {
                let frame = self.join_frame(code, &profile)?;
                self.awaiting_join = Some((code, profile));

                info!(%code, connection_id, "rejoining room after reconnect");
                Ok(vec![ClientAction::Send(frame)])
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use std::{future::Future, time::Instant};

    use tapparty_proto::payloads::{
        room::{PlayerLeft, RosterEntry},
        round::TapEvent,
        session::{ErrorPayload, HelloReply},
    };

    use super::*;

    #[derive(Clone)]
    struct TestEnv {
        t0: Instant,
    }

    impl Environment for TestEnv {
        type Instant = Instant;

        fn now(&self) -> Instant {
            self.t0
        }

        fn sleep(&self, _duration: Duration) -> impl Future<Output = ()> + Send {
            async {}
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            for (i, byte) in buffer.iter_mut().enumerate() {
                *byte = i as u8;
            }
        }
    }

    fn client() -> (Client<TestEnv>, Instant) {
        let t0 = Instant::now();
        (Client::new(TestEnv { t0 }, ClientConfig::default()).unwrap(), t0)
    }

    fn frame(payload: Payload) -> ClientEvent<Instant> {
        ClientEvent::FrameReceived(payload.into_frame().unwrap())
    }

    fn connect(client: &mut Client<TestEnv>, connection_id: u64) -> Vec<ClientAction> {
        let mut actions = client.handle(ClientEvent::Connect).unwrap();
        actions.extend(client.handle(ClientEvent::TransportOpened).unwrap());
        actions.extend(
            client.handle(frame(Payload::HelloReply(HelloReply { connection_id }))).unwrap(),
        );
        actions
    }

    fn sent_opcodes(actions: &[ClientAction]) -> Vec<Opcode> {
        actions
            .iter()
            .filter_map(|a| match a {
                ClientAction::Send(frame) => frame.opcode(),
                _ => None,
            })
            .collect()
    }

    fn hosting(connection_id: u64) -> (Client<TestEnv>, Instant) {
        hosting_with(connection_id, ClientConfig::default())
    }

    fn hosting_with(connection_id: u64, config: ClientConfig) -> (Client<TestEnv>, Instant) {
        let t0 = Instant::now();
        let mut client = Client::new(TestEnv { t0 }, config).unwrap();
        connect(&mut client, connection_id);
        client
            .handle(ClientEvent::CreateRoom {
                room_code: "bcdf".to_string(),
                name: "host".to_string(),
                skin_id: 1,
            })
            .unwrap();
        (client, t0)
    }

    fn joined(connection_id: u64) -> (Client<TestEnv>, Instant) {
        let (mut client, t0) = client();
        connect(&mut client, connection_id);
        client
            .handle(ClientEvent::JoinRoom {
                room_code: "BCDF".to_string(),
                name: "guest".to_string(),
                skin_id: 2,
            })
            .unwrap();
        client
            .handle(frame(Payload::JoinSuccess(JoinSuccess {
                room_code: "BCDF".to_string(),
                players: vec![
                    RosterEntry {
                        player_id: 1,
                        name: "host".to_string(),
                        skin_id: 1,
                        ready: true,
                        is_host: true,
                    },
                    RosterEntry {
                        player_id: connection_id,
                        name: "guest".to_string(),
                        skin_id: 2,
                        ready: false,
                        is_host: false,
                    },
                ],
            })))
            .unwrap();
        (client, t0)
    }

    #[test]
    fn create_while_disconnected_queues_until_connected() {
        let (mut client, _) = client();

        let actions = client
            .handle(ClientEvent::CreateRoom {
                room_code: "BCDF".to_string(),
                name: "  host  ".to_string(),
                skin_id: 3,
            })
            .unwrap();
        assert_eq!(actions, vec![ClientAction::OpenTransport]);
        assert!(client.has_pending_request());
        assert!(client.room().is_none());

        let actions = client.handle(ClientEvent::TransportOpened).unwrap();
        assert_eq!(sent_opcodes(&actions), vec![Opcode::Hello]);

        let actions =
            client.handle(frame(Payload::HelloReply(HelloReply { connection_id: 9 }))).unwrap();
        assert_eq!(actions[0], ClientAction::Connected { connection_id: 9 });
        assert_eq!(sent_opcodes(&actions), vec![Opcode::CreateRoom]);
        assert!(actions.contains(&ClientAction::RoomCreated { room_code: "BCDF".to_string() }));

        let roster = client.roster().unwrap();
        assert_eq!(roster.len(), 1);
        assert_eq!(roster.host().unwrap().connection_id, 9);
        assert_eq!(roster.host().unwrap().name, "host");
        assert!(!client.has_pending_request());
    }

    #[test]
    fn newer_request_replaces_queued_one() {
        let (mut client, _) = client();

        client
            .handle(ClientEvent::CreateRoom {
                room_code: "BCDF".to_string(),
                name: "a".to_string(),
                skin_id: 0,
            })
            .unwrap();
        let actions = client
            .handle(ClientEvent::JoinRoom {
                room_code: "GHJK".to_string(),
                name: "a".to_string(),
                skin_id: 0,
            })
            .unwrap();
        assert!(actions.is_empty(), "already connecting");

        client.handle(ClientEvent::TransportOpened).unwrap();
        let actions =
            client.handle(frame(Payload::HelloReply(HelloReply { connection_id: 1 }))).unwrap();
        assert_eq!(sent_opcodes(&actions), vec![Opcode::JoinRoom]);
        assert!(client.room().is_none());
    }

    #[test]
    fn connect_failure_drops_queued_request() {
        let config = ClientConfig {
            session: SessionConfig { connect_attempts: 1, ..SessionConfig::default() },
            ..ClientConfig::default()
        };
        let mut client = Client::new(TestEnv { t0: Instant::now() }, config).unwrap();

        client
            .handle(ClientEvent::JoinRoom {
                room_code: "BCDF".to_string(),
                name: "a".to_string(),
                skin_id: 0,
            })
            .unwrap();
        let actions =
            client.handle(ClientEvent::TransportFailed { reason: "refused".to_string() }).unwrap();

        assert!(matches!(&actions[0], ClientAction::RoomError { message } if message.contains("refused")));
        assert!(matches!(actions[1], ClientAction::ConnectFailed { .. }));
        assert!(!client.has_pending_request());
    }

    #[test]
    fn bad_input_rejected_before_connecting() {
        let (mut client, _) = client();

        let result = client.handle(ClientEvent::JoinRoom {
            room_code: "BCO".to_string(),
            name: "a".to_string(),
            skin_id: 0,
        });
        assert!(matches!(result, Err(ClientError::InvalidRoomCode(_))));

        let result = client.handle(ClientEvent::JoinRoom {
            room_code: "BCDF".to_string(),
            name: "   ".to_string(),
            skin_id: 0,
        });
        assert!(matches!(result, Err(ClientError::InvalidName { .. })));
        assert_eq!(client.session_state(), SessionState::Disconnected);
    }

    #[test]
    fn long_names_truncated() {
        let name = normalize_name("  abcdefghijklmnopqrstuvwxyz ").unwrap();
        assert_eq!(name, "abcdefghijklmnopqrst");
        assert_eq!(normalize_name("ééééééééééééééééééééé").unwrap().chars().count(), 20);
    }

    #[test]
    fn room_frames_before_handshake_dropped() {
        let (mut client, _) = client();
        client.handle(ClientEvent::Connect).unwrap();

        let actions = client.handle(frame(Payload::RoomClosed)).unwrap();
        assert!(actions.is_empty());
    }

    #[test]
    fn guest_cannot_start_or_end_round() {
        let (mut client, _) = joined(5);

        assert_eq!(
            client.handle(ClientEvent::StartGame),
            Err(ClientError::NotHost { operation: "start the game" })
        );
        assert!(matches!(
            client.handle(ClientEvent::UpdateGameState { game_ended: true }),
            Err(ClientError::NotHost { .. })
        ));
    }

    #[test]
    fn tap_outside_round_rejected() {
        let (mut client, _) = hosting(1);
        assert!(matches!(client.handle(ClientEvent::Tap), Err(ClientError::WrongPhase { .. })));
    }

    #[test]
    fn update_player_info_requires_connection() {
        let (mut client, _) = client();
        assert_eq!(
            client.handle(ClientEvent::UpdatePlayerInfo {
                new_name: "x".to_string(),
                new_skin_id: 0
            }),
            Err(ClientError::NotConnected { operation: "update player info" })
        );
    }

    #[test]
    fn update_player_info_sends_old_name() {
        let (mut client, _) = joined(5);

        let actions = client
            .handle(ClientEvent::UpdatePlayerInfo { new_name: "gus".to_string(), new_skin_id: 7 })
            .unwrap();
        let [ClientAction::Send(sent)] = actions.as_slice() else {
            panic!("expected one frame, got {actions:?}");
        };
        let Payload::UpdatePlayerInfo(update) = Payload::from_frame(sent).unwrap() else {
            panic!("expected update payload");
        };
        assert_eq!(update.old_name, "guest");
        assert_eq!(update.new_nickname, "gus");
        assert_eq!(client.profile().unwrap().name, "gus");
    }

    fn round_ends(actions: &[ClientAction]) -> usize {
        actions.iter().filter(|a| matches!(a, ClientAction::RoundEnded { .. })).count()
    }

    fn seat(player_id: u64, name: &str, is_host: bool) -> RosterEntry {
        RosterEntry { player_id, name: name.to_string(), skin_id: 0, ready: false, is_host }
    }

    #[test]
    fn host_round_flow() {
        // Clock is frozen at t0, so keep the round inside the heartbeat window.
        let config =
            ClientConfig { round_duration: Duration::from_secs(30), ..ClientConfig::default() };
        let (mut client, t0) = hosting_with(1, config);
        client
            .handle(frame(Payload::PlayerJoined(PlayerJoined {
                player_id: 2,
                name: "bea".to_string(),
                skin_id: 4,
                ready: false,
            })))
            .unwrap();

        let actions = client.handle(ClientEvent::StartGame).unwrap();
        assert_eq!(sent_opcodes(&actions), vec![Opcode::GameStart]);
        assert!(actions.contains(&ClientAction::GameStarting));
        assert_eq!(client.room_phase(), Some(RoomPhase::InRound));

        for id in [2, 2, 1] {
            client.handle(frame(Payload::TapEvent(TapEvent { player_id: id }))).unwrap();
        }

        let actions = client.handle(ClientEvent::Tick { now: t0 + Duration::from_secs(29) }).unwrap();
        assert_eq!(sent_opcodes(&actions), vec![Opcode::Ping]);
        assert_eq!(round_ends(&actions), 0);

        let actions = client.handle(ClientEvent::Tick { now: t0 + Duration::from_secs(30) }).unwrap();
        assert_eq!(sent_opcodes(&actions), vec![Opcode::UpdateGameState]);
        let Some(ClientAction::RoundEnded { winner: Some(winner) }) = actions.last() else {
            panic!("expected round end, got {actions:?}");
        };
        assert_eq!(winner.name, "bea");
        assert_eq!(winner.taps, 2);

        // Relay echo of our own end signal changes nothing.
        let echo = client
            .handle(frame(Payload::GameStateUpdate(GameState { game_ended: true })))
            .unwrap();
        assert!(echo.is_empty());
    }

    #[test]
    fn repeated_tap_event_counts_twice() {
        let (mut client, _) = joined(5);
        client.handle(frame(Payload::GameStarting)).unwrap();

        let tap = frame(Payload::TapEvent(TapEvent { player_id: 1 }));
        assert_eq!(client.handle(tap.clone()).unwrap(), vec![ClientAction::TapEvent {
            connection_id: 1,
            tap_count: 1
        }]);
        assert_eq!(client.handle(tap).unwrap(), vec![ClientAction::TapEvent {
            connection_id: 1,
            tap_count: 2
        }]);
        assert_eq!(client.roster().unwrap().get(1).unwrap().tap_count, 2);
    }

    #[test]
    fn repeated_game_end_reports_once() {
        let (mut client, _) = joined(5);
        client.handle(frame(Payload::GameStarting)).unwrap();
        client.handle(frame(Payload::TapEvent(TapEvent { player_id: 5 }))).unwrap();

        let end = frame(Payload::GameStateUpdate(GameState { game_ended: true }));
        let mut ended = 0;
        for _ in 0..3 {
            ended += round_ends(&client.handle(end.clone()).unwrap());
        }
        assert_eq!(ended, 1);
        assert_eq!(client.room_phase(), Some(RoomPhase::Ended));

        // Late taps do not reopen the result.
        let late = client.handle(frame(Payload::TapEvent(TapEvent { player_id: 1 }))).unwrap();
        assert!(late.is_empty());
        assert_eq!(client.roster().unwrap().winner().unwrap().name, "guest");
    }

    #[test]
    fn second_join_refused_while_first_is_unanswered() {
        let (mut client, _) = client();
        connect(&mut client, 5);
        let join = |code: &str| ClientEvent::JoinRoom {
            room_code: code.to_string(),
            name: "gus".to_string(),
            skin_id: 0,
        };

        assert_eq!(sent_opcodes(&client.handle(join("BCDF")).unwrap()), vec![Opcode::JoinRoom]);
        assert_eq!(
            client.handle(join("GHJK")),
            Err(ClientError::JoinPending { room_code: "BCDF".to_string() })
        );
        assert!(matches!(
            client.handle(ClientEvent::CreateRoom {
                room_code: "GHJK".to_string(),
                name: "gus".to_string(),
                skin_id: 0,
            }),
            Err(ClientError::JoinPending { .. })
        ));

        // A success for some other room leaves the pending join alone.
        let stray = client
            .handle(frame(Payload::JoinSuccess(JoinSuccess {
                room_code: "GHJK".to_string(),
                players: vec![seat(7, "vic", true), seat(5, "gus", false)],
            })))
            .unwrap();
        assert!(stray.is_empty());
        assert!(client.room().is_none());
        assert!(client.has_pending_request());

        let actions = client
            .handle(frame(Payload::JoinSuccess(JoinSuccess {
                room_code: "BCDF".to_string(),
                players: vec![seat(1, "ann", true), seat(5, "gus", false)],
            })))
            .unwrap();
        assert!(matches!(&actions[..], [ClientAction::JoinSuccess { room_code, .. }] if room_code == "BCDF"));
        assert_eq!(client.room_code(), RoomCode::parse("BCDF").ok());
        assert_eq!(client.roster().unwrap().host().unwrap().connection_id, 1);

        client.handle(frame(Payload::GameStarting)).unwrap();
        let tap = client.handle(frame(Payload::TapEvent(TapEvent { player_id: 1 }))).unwrap();
        assert_eq!(tap, vec![ClientAction::TapEvent { connection_id: 1, tap_count: 1 }]);
    }

    #[test]
    fn leaving_cancels_a_pending_join() {
        let (mut client, _) = client();
        connect(&mut client, 5);
        client
            .handle(ClientEvent::JoinRoom {
                room_code: "BCDF".to_string(),
                name: "gus".to_string(),
                skin_id: 0,
            })
            .unwrap();

        let actions = client.handle(ClientEvent::LeaveRoom).unwrap();
        assert_eq!(sent_opcodes(&actions), vec![Opcode::LeaveRoom]);

        let actions = client
            .handle(ClientEvent::JoinRoom {
                room_code: "GHJK".to_string(),
                name: "gus".to_string(),
                skin_id: 0,
            })
            .unwrap();
        assert_eq!(sent_opcodes(&actions), vec![Opcode::JoinRoom]);

        // The answer to the abandoned join is not taken for the new one.
        let stale = client
            .handle(frame(Payload::JoinSuccess(JoinSuccess {
                room_code: "BCDF".to_string(),
                players: vec![seat(1, "ann", true)],
            })))
            .unwrap();
        assert!(stale.is_empty());
        assert!(client.room().is_none());
    }

    #[test]
    fn pending_join_resent_after_reconnect() {
        let (mut client, t0) = client();
        connect(&mut client, 5);
        client
            .handle(ClientEvent::JoinRoom {
                room_code: "BCDF".to_string(),
                name: "gus".to_string(),
                skin_id: 0,
            })
            .unwrap();

        let actions =
            client.handle(ClientEvent::TransportClosed { reason: "reset".to_string() }).unwrap();
        assert!(actions.contains(&ClientAction::Reconnecting { attempt: 1 }));
        assert!(client.has_pending_request());

        let actions = client.handle(ClientEvent::Tick { now: t0 + Duration::from_secs(2) }).unwrap();
        assert_eq!(actions, vec![ClientAction::OpenTransport]);
        client.handle(ClientEvent::TransportOpened).unwrap();
        let actions =
            client.handle(frame(Payload::HelloReply(HelloReply { connection_id: 6 }))).unwrap();
        assert_eq!(sent_opcodes(&actions), vec![Opcode::JoinRoom]);

        client
            .handle(frame(Payload::JoinSuccess(JoinSuccess {
                room_code: "BCDF".to_string(),
                players: vec![seat(1, "ann", true), seat(6, "gus", false)],
            })))
            .unwrap();
        assert_eq!(client.roster().unwrap().len(), 2);
    }

    #[test]
    fn non_fatal_relay_error_surfaces_as_room_error() {
        let (mut client, _) = joined(5);

        let actions = client.handle(frame(Payload::Error(ErrorPayload::not_host()))).unwrap();
        assert!(matches!(&actions[..], [ClientAction::RoomError { .. }]));
        assert!(client.is_connected());
        assert!(client.room().is_some());
    }

    #[test]
    fn room_error_keeps_guest_in_pre_join_state() {
        let (mut client, _) = client();
        connect(&mut client, 5);
        client
            .handle(ClientEvent::JoinRoom {
                room_code: "BCDF".to_string(),
                name: "a".to_string(),
                skin_id: 0,
            })
            .unwrap();

        let actions = client
            .handle(frame(Payload::RoomError(tapparty_proto::payloads::room::RoomError {
                message: "Room is full".to_string(),
            })))
            .unwrap();
        assert_eq!(actions, vec![ClientAction::RoomError { message: "Room is full".to_string() }]);
        assert!(client.room().is_none());
        assert!(!client.has_pending_request());
    }

    #[test]
    fn room_closed_resets_and_ignores_later_roster_events() {
        let (mut client, _) = joined(5);

        assert_eq!(client.handle(frame(Payload::RoomClosed)).unwrap(), vec![ClientAction::RoomClosed]);
        assert!(client.roster().is_none());

        let late = client
            .handle(frame(Payload::PlayerLeft(PlayerLeft { name: "host".to_string() })))
            .unwrap();
        assert!(late.is_empty());
        assert!(client.handle(frame(Payload::RoomClosed)).unwrap().is_empty());
    }

    #[test]
    fn leave_room_tells_relay_and_resets() {
        let (mut client, _) = joined(5);

        let actions = client.handle(ClientEvent::LeaveRoom).unwrap();
        assert_eq!(sent_opcodes(&actions), vec![Opcode::LeaveRoom]);
        assert!(client.room().is_none());
        assert_eq!(client.handle(ClientEvent::LeaveRoom), Err(ClientError::NotInRoom));
    }

    #[test]
    fn generated_codes_are_valid() {
        let (client, _) = client();
        let code = client.generate_room_code();
        assert_eq!(RoomCode::parse(code.as_str()), Ok(code));
    }
}
