//! Room roster.
//!
//! Players in join order. Join order is display order, and display order
//! breaks winner ties, so the roster is a `Vec` rather than a map.

use crate::error::ClientError;

/// One player in a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// Connection ID assigned by the relay.
    pub connection_id: u64,
    /// Display name (at most 20 characters).
    pub name: String,
    /// Skin.
    pub skin_id: u32,
    /// Taps counted this round.
    pub tap_count: u32,
    /// Whether this player hosts the room.
    pub is_host: bool,
    /// Ready flag as reported by the relay.
    pub ready: bool,
}

impl Player {
    /// New player with zero taps.
    pub fn new(connection_id: u64, name: impl Into<String>, skin_id: u32) -> Self {
        Self { connection_id, name: name.into(), skin_id, tap_count: 0, is_host: false, ready: false }
    }

    /// Mark as host.
    #[must_use]
    pub fn host(mut self) -> Self {
        self.is_host = true;
        self
    }
}

/// Round winner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Winner {
    /// Connection ID of the winner.
    pub connection_id: u64,
    /// Display name of the winner.
    pub name: String,
    /// Winning tap count.
    pub taps: u32,
}

/// Insertion-ordered player list.
///
/// # Invariants
///
/// - At most one player has `is_host` set.
/// - Connection IDs are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    players: Vec<Player>,
}

impl Roster {
    /// Empty roster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of players.
    #[must_use]
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Whether the roster is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Players in join order.
    #[must_use]
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    /// Look up by connection ID.
    #[must_use]
    pub fn get(&self, connection_id: u64) -> Option<&Player> {
        self.players.iter().find(|p| p.connection_id == connection_id)
    }

    /// The host, if present.
    #[must_use]
    pub fn host(&self) -> Option<&Player> {
        self.players.iter().find(|p| p.is_host)
    }

    /// Add a player at the end, or refresh an existing entry with the same
    /// connection ID in place.
    ///
    /// # Errors
    ///
    /// - `ClientError::HostConflict` if `player` claims host while another
    ///   player already is host
    pub fn insert(&mut self, player: Player) -> Result<(), ClientError> {
        if player.is_host
            && let Some(host) = self.host()
            && host.connection_id != player.connection_id
        {
            return Err(ClientError::HostConflict { existing: host.connection_id });
        }

        match self.players.iter_mut().find(|p| p.connection_id == player.connection_id) {
            Some(existing) => *existing = player,
            None => self.players.push(player),
        }
        Ok(())
    }

    /// Remove the first player with this name.
    pub fn remove_by_name(&mut self, name: &str) -> Option<Player> {
        let index = self.players.iter().position(|p| p.name == name)?;
        Some(self.players.remove(index))
    }

    /// Apply a name/skin change. Returns `false` if no player had `old_name`.
    pub fn rename(&mut self, old_name: &str, new_name: &str, new_skin: u32) -> bool {
        match self.players.iter_mut().find(|p| p.name == old_name) {
            Some(player) => {
                player.name = new_name.to_string();
                player.skin_id = new_skin;
                true
            },
            None => false,
        }
    }

    /// Count one tap for a player. Returns the new count, `None` if the
    /// player is unknown.
    pub fn record_tap(&mut self, connection_id: u64) -> Option<u32> {
        let player = self.players.iter_mut().find(|p| p.connection_id == connection_id)?;
        player.tap_count = player.tap_count.saturating_add(1);
        Some(player.tap_count)
    }

    /// Zero every tap count.
    pub fn reset_taps(&mut self) {
        for player in &mut self.players {
            player.tap_count = 0;
        }
    }

    /// Highest tap count wins; ties go to whoever joined first.
    #[must_use]
    pub fn winner(&self) -> Option<Winner> {
        let mut best: Option<&Player> = None;
        for player in &self.players {
            if best.is_none_or(|b| player.tap_count > b.tap_count) {
                best = Some(player);
            }
        }

        best.map(|p| Winner { connection_id: p.connection_id, name: p.name.clone(), taps: p.tap_count })
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn roster_with_taps(taps: &[(&str, u32)]) -> Roster {
        let mut roster = Roster::new();
        for (id, (name, count)) in taps.iter().enumerate() {
            let mut player = Player::new(id as u64 + 1, *name, 0);
            player.tap_count = *count;
            roster.insert(player).unwrap();
        }
        roster
    }

    #[test]
    fn winner_ties_go_to_roster_order() {
        let roster = roster_with_taps(&[("A", 3), ("B", 5), ("C", 5)]);
        let winner = roster.winner().unwrap();
        assert_eq!(winner.name, "B");
        assert_eq!(winner.taps, 5);
    }

    #[test]
    fn winner_of_empty_roster_is_none() {
        assert_eq!(Roster::new().winner(), None);
    }

    #[test]
    fn all_zero_taps_first_player_wins() {
        let roster = roster_with_taps(&[("A", 0), ("B", 0)]);
        assert_eq!(roster.winner().unwrap().name, "A");
    }

    #[test]
    fn second_host_rejected() {
        let mut roster = Roster::new();
        roster.insert(Player::new(1, "host", 0).host()).unwrap();

        let result = roster.insert(Player::new(2, "usurper", 0).host());
        assert_eq!(result, Err(ClientError::HostConflict { existing: 1 }));
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn reinsert_refreshes_in_place() {
        let mut roster = Roster::new();
        roster.insert(Player::new(1, "a", 0)).unwrap();
        roster.insert(Player::new(2, "b", 0)).unwrap();
        roster.insert(Player::new(1, "a2", 4)).unwrap();

        let names: Vec<_> = roster.players().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["a2", "b"]);
    }

    #[test]
    fn rename_and_remove_by_name() {
        let mut roster = roster_with_taps(&[("a", 0), ("b", 0)]);

        assert!(roster.rename("a", "alice", 3));
        assert!(!roster.rename("zed", "z", 0));
        assert_eq!(roster.get(1).unwrap().skin_id, 3);

        assert_eq!(roster.remove_by_name("alice").unwrap().connection_id, 1);
        assert!(roster.remove_by_name("alice").is_none());
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn taps_for_unknown_player_ignored() {
        let mut roster = roster_with_taps(&[("a", 0)]);
        assert_eq!(roster.record_tap(1), Some(1));
        assert_eq!(roster.record_tap(1), Some(2));
        assert_eq!(roster.record_tap(99), None);

        roster.reset_taps();
        assert_eq!(roster.get(1).unwrap().tap_count, 0);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Join(u64, bool),
        Leave(u64),
        Tap(u64),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u64..6, any::<bool>()).prop_map(|(id, host)| Op::Join(id, host)),
            (0u64..6).prop_map(Op::Leave),
            (0u64..6).prop_map(Op::Tap),
        ]
    }

    proptest! {
        #[test]
        fn roster_invariants_hold(ops in prop::collection::vec(op(), 0..64)) {
            let mut roster = Roster::new();

            for op in ops {
                let before: Vec<_> = roster.players().iter().map(|p| (p.connection_id, p.tap_count)).collect();
                match op {
                    Op::Join(id, host) => {
                        let mut player = Player::new(id, format!("p{id}"), 0);
                        player.is_host = host;
                        let _ = roster.insert(player);
                    },
                    Op::Leave(id) => {
                        roster.remove_by_name(&format!("p{id}"));
                    },
                    Op::Tap(id) => {
                        roster.record_tap(id);
                    },
                }

                prop_assert!(roster.players().iter().filter(|p| p.is_host).count() <= 1);

                let mut ids: Vec<_> = roster.players().iter().map(|p| p.connection_id).collect();
                ids.sort_unstable();
                ids.dedup();
                prop_assert_eq!(ids.len(), roster.len());

                for (id, taps) in before {
                    if let Some(player) = roster.get(id) {
                        // Rejoin replaces the entry; otherwise counts never drop.
                        prop_assert!(player.tap_count >= taps || player.tap_count == 0);
                    }
                }
            }
        }
    }
}
