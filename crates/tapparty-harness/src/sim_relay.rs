//! In-memory relay.
//!
//! `SimRelay` reproduces the relay's routing rules without any I/O: tests
//! hand it a frame from a connection and get back the frames each connection
//! should receive, in order.
//!
//! # Rules
//!
//! - A connection must send `Hello` before anything else.
//! - Room codes are unique among open rooms; the creator becomes host.
//! - Joiners receive `JoinSuccess` with the full roster (themselves last);
//!   everyone else receives `PlayerJoined`.
//! - Taps and info updates are echoed to every member including the sender.
//! - `GameStarting` and `GameStateUpdate` go to every member except the host
//!   that sent them.
//! - When the host leaves or drops, the room closes for everyone.

use std::collections::HashMap;

use tapparty_proto::{
    Frame, Payload, RoomCode,
    payloads::{
        room::{
            CreateRoom, JoinRoom, JoinSuccess, PlayerInfoUpdate, PlayerJoined, PlayerLeft,
            RoomError, RosterEntry, UpdatePlayerInfo,
        },
        round::{GameState, TapEvent},
        session::{ErrorPayload, HelloReply},
    },
};
use tracing::{debug, warn};

/// Room capacity.
pub const MAX_PLAYERS: usize = 8;

/// A frame addressed to one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Receiving connection
    pub to: u64,
    /// Frame to deliver
    pub frame: Frame,
}

#[derive(Debug, Default)]
struct Connection {
    client_id: Option<String>,
    room: Option<RoomCode>,
    name: String,
    skin_id: u32,
}

#[derive(Debug)]
struct RelayRoom {
    host: u64,
    members: Vec<u64>,
    in_round: bool,
}

/// In-memory relay.
#[derive(Debug)]
pub struct SimRelay {
    next_connection_id: u64,
    connections: HashMap<u64, Connection>,
    rooms: HashMap<RoomCode, RelayRoom>,
    max_players: usize,
}

impl Default for SimRelay {
    fn default() -> Self {
        Self::new()
    }
}

impl SimRelay {
    /// Relay with the default room capacity.
    pub fn new() -> Self {
        Self::with_max_players(MAX_PLAYERS)
    }

    /// Relay with a custom room capacity.
    pub fn with_max_players(max_players: usize) -> Self {
        Self {
            next_connection_id: 1,
            connections: HashMap::new(),
            rooms: HashMap::new(),
            max_players,
        }
    }

    /// Accept a transport connection. Returns its connection ID.
    pub fn accept(&mut self) -> u64 {
        let id = self.next_connection_id;
        self.next_connection_id += 1;
        self.connections.insert(id, Connection::default());
        debug!(connection_id = id, "relay accepted connection");
        id
    }

    /// Whether `connection_id` is open.
    pub fn is_open(&self, connection_id: u64) -> bool {
        self.connections.contains_key(&connection_id)
    }

    /// Number of open rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Members of `code` in join order.
    pub fn members(&self, code: RoomCode) -> Option<&[u64]> {
        self.rooms.get(&code).map(|r| r.members.as_slice())
    }

    /// Host of `code`.
    pub fn host(&self, code: RoomCode) -> Option<u64> {
        self.rooms.get(&code).map(|r| r.host)
    }

    /// Transport closed. Removes the connection from its room.
    pub fn close(&mut self, connection_id: u64) -> Vec<Delivery> {
        let deliveries = self.leave_room(connection_id);
        if self.connections.remove(&connection_id).is_some() {
            debug!(connection_id, "relay closed connection");
        }
        deliveries
    }

    /// Route a frame sent by `from`.
    pub fn handle(&mut self, from: u64, frame: &Frame) -> Vec<Delivery> {
        let Some(conn) = self.connections.get_mut(&from) else {
            warn!(connection_id = from, "frame from unknown connection");
            return Vec::new();
        };

        let payload = match Payload::from_frame(frame) {
            Ok(payload) => payload,
            Err(e) => return reply(from, Payload::Error(ErrorPayload::invalid_frame(e.to_string()))),
        };

        if conn.client_id.is_none() && !matches!(payload, Payload::Hello(_)) {
            return reply(from, Payload::Error(ErrorPayload::not_authenticated()));
        }

        match payload {
            Payload::Hello(hello) => {
                conn.client_id = Some(hello.client_id);
                reply(from, Payload::HelloReply(HelloReply { connection_id: from }))
            },
            Payload::Ping => reply(from, Payload::Pong),
            Payload::Pong => Vec::new(),
            Payload::Goodbye(_) => self.close(from),
            Payload::CreateRoom(create) => self.create_room(from, create),
            Payload::JoinRoom(join) => self.join_room(from, join),
            Payload::UpdatePlayerInfo(update) => self.update_player_info(from, update),
            Payload::LeaveRoom => self.leave_room(from),
            Payload::GameStart => self.game_start(from),
            Payload::PlayerTap => self.player_tap(from),
            Payload::UpdateGameState(state) => self.update_game_state(from, state),
            other => {
                let message = format!("unexpected {:?} from client", other.opcode());
                reply(from, Payload::Error(ErrorPayload::invalid_frame(message)))
            },
        }
    }

    fn create_room(&mut self, from: u64, create: CreateRoom) -> Vec<Delivery> {
        let Ok(code) = RoomCode::parse(&create.room_code) else {
            return room_error(from, "Invalid room code");
        };
        if self.rooms.contains_key(&code) {
            return room_error(from, "Room code already in use");
        }

        let deliveries = self.leave_room(from);
        if let Some(conn) = self.connections.get_mut(&from) {
            conn.room = Some(code);
            conn.name = create.host_name;
            conn.skin_id = create.host_skin;
        }
        self.rooms.insert(code, RelayRoom { host: from, members: vec![from], in_round: false });

        debug!(%code, host = from, "relay opened room");
        deliveries
    }

    fn join_room(&mut self, from: u64, join: JoinRoom) -> Vec<Delivery> {
        let Some(code) = RoomCode::parse(&join.room_code).ok().filter(|c| self.rooms.contains_key(c))
        else {
            return room_error(from, "Room not found");
        };

        if let Some(room) = self.rooms.get(&code) {
            if room.members.len() >= self.max_players {
                return room_error(from, "Room is full");
            }
            if room.in_round {
                return room_error(from, "Game already in progress");
            }
            let taken = room
                .members
                .iter()
                .any(|m| *m != from && self.connections.get(m).is_some_and(|c| c.name == join.name));
            if taken {
                return room_error(from, "Name already taken");
            }
        }

        let mut deliveries = self.leave_room(from);
        if let Some(conn) = self.connections.get_mut(&from) {
            conn.room = Some(code);
            conn.name.clone_from(&join.name);
            conn.skin_id = join.skin_id;
        }

        let Some(room) = self.rooms.get_mut(&code) else {
            return deliveries;
        };
        room.members.push(from);

        let players = room
            .members
            .iter()
            .filter_map(|id| {
                self.connections.get(id).map(|c| RosterEntry {
                    player_id: *id,
                    name: c.name.clone(),
                    skin_id: c.skin_id,
                    ready: *id == room.host,
                    is_host: *id == room.host,
                })
            })
            .collect();

        deliveries.extend(reply(
            from,
            Payload::JoinSuccess(JoinSuccess { room_code: code.to_string(), players }),
        ));

        let joined = Payload::PlayerJoined(PlayerJoined {
            player_id: from,
            name: join.name,
            skin_id: join.skin_id,
            ready: false,
        });
        deliveries.extend(broadcast(&room.members, Some(from), &joined));

        debug!(%code, connection_id = from, members = room.members.len(), "relay admitted player");
        deliveries
    }

    fn update_player_info(&mut self, from: u64, update: UpdatePlayerInfo) -> Vec<Delivery> {
        let Some(code) = self.connections.get(&from).and_then(|c| c.room) else {
            return reply(from, Payload::Error(ErrorPayload::not_in_room()));
        };
        let Some(members) = self.rooms.get(&code).map(|room| room.members.clone()) else {
            return Vec::new();
        };

        let taken = members.iter().any(|m| {
            *m != from && self.connections.get(m).is_some_and(|c| c.name == update.new_nickname)
        });
        if taken {
            return room_error(from, "Name already taken");
        }

        let Some(conn) = self.connections.get_mut(&from) else {
            return Vec::new();
        };
        let old_name = std::mem::replace(&mut conn.name, update.new_nickname.clone());
        conn.skin_id = update.new_skin_id;

        let payload = Payload::PlayerInfoUpdate(PlayerInfoUpdate {
            old_name,
            new_name: update.new_nickname,
            new_skin: update.new_skin_id,
        });
        broadcast(&members, None, &payload)
    }

    fn game_start(&mut self, from: u64) -> Vec<Delivery> {
        let room = match self.hosted_room_mut(from) {
            Ok(room) => room,
            Err(deliveries) => return deliveries,
        };

        room.in_round = true;
        broadcast(&room.members, Some(from), &Payload::GameStarting)
    }

    fn player_tap(&mut self, from: u64) -> Vec<Delivery> {
        let Some(code) = self.connections.get(&from).and_then(|c| c.room) else {
            return reply(from, Payload::Error(ErrorPayload::not_in_room()));
        };
        let Some(room) = self.rooms.get(&code) else {
            return Vec::new();
        };

        broadcast(&room.members, None, &Payload::TapEvent(TapEvent { player_id: from }))
    }

    fn update_game_state(&mut self, from: u64, state: GameState) -> Vec<Delivery> {
        let room = match self.hosted_room_mut(from) {
            Ok(room) => room,
            Err(deliveries) => return deliveries,
        };

        if state.game_ended {
            room.in_round = false;
        }
        broadcast(&room.members, Some(from), &Payload::GameStateUpdate(state))
    }

    /// Remove `from` from its room, notifying the rest.
    fn leave_room(&mut self, from: u64) -> Vec<Delivery> {
        let Some(conn) = self.connections.get_mut(&from) else {
            return Vec::new();
        };
        let Some(code) = conn.room.take() else {
            return Vec::new();
        };
        let name = conn.name.clone();

        let Some(room) = self.rooms.get_mut(&code) else {
            return Vec::new();
        };
        room.members.retain(|m| *m != from);

        if room.host == from {
            let members = std::mem::take(&mut room.members);
            self.rooms.remove(&code);
            for member in &members {
                if let Some(conn) = self.connections.get_mut(member) {
                    conn.room = None;
                }
            }

            debug!(%code, "relay closed room, host left");
            return broadcast(&members, None, &Payload::RoomClosed);
        }

        debug!(%code, connection_id = from, "relay removed player");
        broadcast(&room.members, None, &Payload::PlayerLeft(PlayerLeft { name }))
    }

    fn hosted_room_mut(&mut self, from: u64) -> Result<&mut RelayRoom, Vec<Delivery>> {
        let Some(code) = self.connections.get(&from).and_then(|c| c.room) else {
            return Err(reply(from, Payload::Error(ErrorPayload::not_in_room())));
        };
        match self.rooms.get_mut(&code) {
            Some(room) if room.host == from => Ok(room),
            Some(_) => Err(reply(from, Payload::Error(ErrorPayload::not_host()))),
            None => Err(reply(from, Payload::Error(ErrorPayload::not_in_room()))),
        }
    }
}

fn reply(to: u64, payload: Payload) -> Vec<Delivery> {
    broadcast(&[to], None, &payload)
}

fn room_error(to: u64, message: &str) -> Vec<Delivery> {
    reply(to, Payload::RoomError(RoomError { message: message.to_string() }))
}

fn broadcast(members: &[u64], except: Option<u64>, payload: &Payload) -> Vec<Delivery> {
    let frame = match payload.clone().into_frame() {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "relay failed to encode frame");
            return Vec::new();
        },
    };

    members
        .iter()
        .filter(|m| Some(**m) != except)
        .map(|m| Delivery { to: *m, frame: frame.clone() })
        .collect()
}

#[cfg(test)]
mod tests {
    use tapparty_proto::{Opcode, payloads::session::Hello};

    use super::*;

    fn frame(payload: Payload) -> Frame {
        payload.into_frame().unwrap()
    }

    fn hello(relay: &mut SimRelay) -> u64 {
        let id = relay.accept();
        let out = relay.handle(
            id,
            &frame(Payload::Hello(Hello { version: 1, client_id: format!("c{id}") })),
        );
        assert_eq!(out.len(), 1);
        id
    }

    fn opcodes(deliveries: &[Delivery]) -> Vec<(u64, Opcode)> {
        deliveries.iter().filter_map(|d| d.frame.opcode().map(|o| (d.to, o))).collect()
    }

    fn create(relay: &mut SimRelay, host: u64, code: &str) -> Vec<Delivery> {
        relay.handle(
            host,
            &frame(Payload::CreateRoom(CreateRoom {
                room_code: code.to_string(),
                host_name: "host".to_string(),
                host_skin: 0,
            })),
        )
    }

    fn join(relay: &mut SimRelay, id: u64, code: &str, name: &str) -> Vec<Delivery> {
        relay.handle(
            id,
            &frame(Payload::JoinRoom(JoinRoom {
                room_code: code.to_string(),
                name: name.to_string(),
                skin_id: 1,
                client_id: format!("c{id}"),
            })),
        )
    }

    #[test]
    fn frames_before_hello_rejected() {
        let mut relay = SimRelay::new();
        let id = relay.accept();

        let out = relay.handle(id, &frame(Payload::PlayerTap));
        let Payload::Error(error) = Payload::from_frame(&out[0].frame).unwrap() else {
            panic!("expected error");
        };
        assert_eq!(error, ErrorPayload::not_authenticated());
    }

    #[test]
    fn join_fans_out() {
        let mut relay = SimRelay::new();
        let host = hello(&mut relay);
        let guest = hello(&mut relay);

        assert!(create(&mut relay, host, "BCDF").is_empty());
        let out = join(&mut relay, guest, "bcdf", "bea");

        assert_eq!(opcodes(&out), vec![(guest, Opcode::JoinSuccess), (host, Opcode::PlayerJoined)]);
        let Payload::JoinSuccess(success) = Payload::from_frame(&out[0].frame).unwrap() else {
            panic!("expected join success");
        };
        assert_eq!(success.players.len(), 2);
        assert!(success.players[0].is_host);
        assert_eq!(success.players[1].name, "bea");
    }

    #[test]
    fn rejections_are_verbatim_room_errors() {
        let mut relay = SimRelay::with_max_players(2);
        let host = hello(&mut relay);
        let a = hello(&mut relay);
        let b = hello(&mut relay);

        let out = join(&mut relay, a, "BCDF", "a");
        assert_eq!(
            Payload::from_frame(&out[0].frame).unwrap(),
            Payload::RoomError(RoomError { message: "Room not found".to_string() })
        );

        create(&mut relay, host, "BCDF");
        assert_eq!(
            Payload::from_frame(&create(&mut relay, a, "BCDF")[0].frame).unwrap(),
            Payload::RoomError(RoomError { message: "Room code already in use".to_string() })
        );

        join(&mut relay, a, "BCDF", "a");
        let out = join(&mut relay, b, "BCDF", "b");
        assert_eq!(
            Payload::from_frame(&out[0].frame).unwrap(),
            Payload::RoomError(RoomError { message: "Room is full".to_string() })
        );
    }

    #[test]
    fn taps_echo_to_everyone() {
        let mut relay = SimRelay::new();
        let host = hello(&mut relay);
        let guest = hello(&mut relay);
        create(&mut relay, host, "BCDF");
        join(&mut relay, guest, "BCDF", "bea");

        let out = relay.handle(guest, &frame(Payload::PlayerTap));
        assert_eq!(opcodes(&out), vec![(host, Opcode::TapEvent), (guest, Opcode::TapEvent)]);
    }

    #[test]
    fn only_host_starts_round() {
        let mut relay = SimRelay::new();
        let host = hello(&mut relay);
        let guest = hello(&mut relay);
        create(&mut relay, host, "BCDF");
        join(&mut relay, guest, "BCDF", "bea");

        let out = relay.handle(guest, &frame(Payload::GameStart));
        assert_eq!(
            Payload::from_frame(&out[0].frame).unwrap(),
            Payload::Error(ErrorPayload::not_host())
        );

        let out = relay.handle(host, &frame(Payload::GameStart));
        assert_eq!(opcodes(&out), vec![(guest, Opcode::GameStarting)]);
    }

    #[test]
    fn host_drop_closes_room() {
        let mut relay = SimRelay::new();
        let host = hello(&mut relay);
        let guest = hello(&mut relay);
        create(&mut relay, host, "BCDF");
        join(&mut relay, guest, "BCDF", "bea");

        let out = relay.close(host);
        assert_eq!(opcodes(&out), vec![(guest, Opcode::RoomClosed)]);
        assert_eq!(relay.room_count(), 0);
        assert!(!relay.is_open(host));

        // Guest is free to host the same code now.
        assert!(create(&mut relay, guest, "BCDF").is_empty());
    }

    #[test]
    fn guest_leave_notifies_rest() {
        let mut relay = SimRelay::new();
        let host = hello(&mut relay);
        let guest = hello(&mut relay);
        create(&mut relay, host, "BCDF");
        join(&mut relay, guest, "BCDF", "bea");

        let out = relay.handle(guest, &frame(Payload::LeaveRoom));
        assert_eq!(
            Payload::from_frame(&out[0].frame).unwrap(),
            Payload::PlayerLeft(PlayerLeft { name: "bea".to_string() })
        );
        assert_eq!(relay.members(RoomCode::parse("BCDF").unwrap()), Some(&[host][..]));
    }
}
