//! Observable state snapshots for invariant checking.
//!
//! Invariants operate on snapshots rather than live clients so every check
//! sees the same instant.

use std::collections::BTreeMap;

use tapparty_client::{Player, RoundPhase};
use tapparty_proto::RoomCode;

/// Snapshot of the entire system state.
#[derive(Debug, Clone, Default)]
pub struct SystemSnapshot {
    /// Per-client state snapshots.
    pub clients: Vec<ClientSnapshot>,
}

impl SystemSnapshot {
    /// Create an empty snapshot (no clients).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a snapshot from multiple clients.
    pub fn from_clients(clients: Vec<ClientSnapshot>) -> Self {
        Self { clients }
    }

    /// Settled members grouped by room code.
    ///
    /// Clients that are cut off, disconnected or still waiting for a join
    /// confirmation are left out: their view is allowed to lag.
    pub fn rooms(&self) -> BTreeMap<RoomCode, Vec<&ClientSnapshot>> {
        let mut rooms: BTreeMap<RoomCode, Vec<&ClientSnapshot>> = BTreeMap::new();
        for client in &self.clients {
            if let Some(code) = client.room_code
                && client.is_settled()
            {
                rooms.entry(code).or_default().push(client);
            }
        }
        rooms
    }
}

/// Snapshot of a single client's observable state.
#[derive(Debug, Clone)]
pub struct ClientSnapshot {
    /// Index in the simulated network.
    pub index: usize,
    /// Whether the client's link is up.
    pub reachable: bool,
    /// Relay connection ID, once the handshake completed.
    pub connection_id: Option<u64>,
    /// Current room.
    pub room_code: Option<RoomCode>,
    /// Whether a room request is outstanding.
    pub awaiting_join: bool,
    /// Whether the client hosts its room.
    pub is_host: bool,
    /// Round state.
    pub round_phase: RoundPhase,
    /// Roster in join order.
    pub roster: Vec<PlayerSnapshot>,
}

impl ClientSnapshot {
    /// Snapshot of an idle client.
    pub fn new(index: usize) -> Self {
        Self {
            index,
            reachable: true,
            connection_id: None,
            room_code: None,
            awaiting_join: false,
            is_host: false,
            round_phase: RoundPhase::Idle,
            roster: Vec::new(),
        }
    }

    /// Place the client in a room with the given roster.
    #[must_use]
    pub fn in_room(mut self, connection_id: u64, code: RoomCode, roster: Vec<PlayerSnapshot>) -> Self {
        self.connection_id = Some(connection_id);
        self.room_code = Some(code);
        self.roster = roster;
        self
    }

    /// Whether this client's view should already match its room.
    pub fn is_settled(&self) -> bool {
        self.reachable && self.connection_id.is_some() && !self.awaiting_join
    }
}

/// Snapshot of one roster entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSnapshot {
    /// Connection ID.
    pub connection_id: u64,
    /// Display name.
    pub name: String,
    /// Skin.
    pub skin_id: u32,
    /// Taps this round.
    pub tap_count: u32,
    /// Host flag.
    pub is_host: bool,
}

impl PlayerSnapshot {
    /// Entry with zero taps.
    pub fn new(connection_id: u64, name: &str, is_host: bool) -> Self {
        Self { connection_id, name: name.to_string(), skin_id: 0, tap_count: 0, is_host }
    }

    /// Set the tap count.
    #[must_use]
    pub fn with_taps(mut self, tap_count: u32) -> Self {
        self.tap_count = tap_count;
        self
    }
}

impl From<&Player> for PlayerSnapshot {
    fn from(player: &Player) -> Self {
        Self {
            connection_id: player.connection_id,
            name: player.name.clone(),
            skin_id: player.skin_id,
            tap_count: player.tap_count,
            is_host: player.is_host,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsettled_clients_are_left_out_of_rooms() {
        let code = RoomCode::parse("ABCD").unwrap();
        let settled = ClientSnapshot::new(0).in_room(1, code, Vec::new());
        let mut cut_off = ClientSnapshot::new(1).in_room(2, code, Vec::new());
        cut_off.reachable = false;

        let snapshot = SystemSnapshot::from_clients(vec![settled, cut_off]);
        let rooms = snapshot.rooms();

        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[&code].len(), 1);
        assert_eq!(rooms[&code][0].index, 0);
    }
}
