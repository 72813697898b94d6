//! Standard invariant checks.

use std::collections::HashSet;

use tapparty_client::RoundPhase;

use super::{Invariant, InvariantResult, PlayerSnapshot, SystemSnapshot, Violation};

/// Every roster has exactly one host, and a hosting client lists itself as
/// that host.
pub struct SingleHost;

impl Invariant for SingleHost {
    fn name(&self) -> &'static str {
        "single_host"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            if client.room_code.is_none() {
                continue;
            }

            let hosts: Vec<_> = client.roster.iter().filter(|p| p.is_host).collect();
            if hosts.len() != 1 {
                return Err(Violation::new(
                    self.name(),
                    format!("client {}: {} hosts in roster", client.index, hosts.len()),
                ));
            }

            if client.is_host
                && client.is_settled()
                && Some(hosts[0].connection_id) != client.connection_id
            {
                return Err(Violation::new(
                    self.name(),
                    format!(
                        "client {}: hosts as {:?} but roster host is {}",
                        client.index, client.connection_id, hosts[0].connection_id
                    ),
                ));
            }
        }
        Ok(())
    }
}

/// No roster lists a connection ID or a name twice.
pub struct UniquePlayers;

impl Invariant for UniquePlayers {
    fn name(&self) -> &'static str {
        "unique_players"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            let mut ids = HashSet::new();
            let mut names = HashSet::new();
            for player in &client.roster {
                if !ids.insert(player.connection_id) || !names.insert(player.name.as_str()) {
                    return Err(Violation::new(
                        self.name(),
                        format!(
                            "client {}: duplicate player {} ({})",
                            client.index, player.connection_id, player.name
                        ),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Settled members of a room see the same players in the same order.
pub struct RosterAgreement;

impl Invariant for RosterAgreement {
    fn name(&self) -> &'static str {
        "roster_agreement"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let identity = |p: &PlayerSnapshot| (p.connection_id, p.name.clone(), p.skin_id, p.is_host);

        for (code, members) in state.rooms() {
            let Some((first, rest)) = members.split_first() else {
                continue;
            };
            let expected: Vec<_> = first.roster.iter().map(identity).collect();

            for member in rest {
                let seen: Vec<_> = member.roster.iter().map(identity).collect();
                if seen != expected {
                    return Err(Violation::new(
                        self.name(),
                        format!(
                            "room {code}: client {} sees {:?}, client {} sees {:?}",
                            first.index, expected, member.index, seen
                        ),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Settled members of a room agree on whether a round is running, and
/// members in the same round agree on every tap count.
///
/// A player who joined after the last round ended has seen none of its
/// taps, so an idle member is only compared against running ones.
pub struct TapAgreement;

impl Invariant for TapAgreement {
    fn name(&self) -> &'static str {
        "tap_agreement"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for (code, members) in state.rooms() {
            for (i, a) in members.iter().enumerate() {
                for b in &members[i + 1..] {
                    let running = [a.round_phase, b.round_phase].contains(&RoundPhase::Running);
                    if running && a.round_phase != b.round_phase {
                        return Err(Violation::new(
                            self.name(),
                            format!(
                                "room {code}: client {} is {:?}, client {} is {:?}",
                                a.index, a.round_phase, b.index, b.round_phase
                            ),
                        ));
                    }

                    if a.round_phase != b.round_phase || a.round_phase == RoundPhase::Idle {
                        continue;
                    }

                    for player in &b.roster {
                        let reference = a.roster.iter().find(|p| p.connection_id == player.connection_id);
                        if let Some(reference) = reference
                            && reference.tap_count != player.tap_count
                        {
                            return Err(Violation::new(
                                self.name(),
                                format!(
                                    "room {code}: {} has {} taps on client {}, {} on client {}",
                                    player.name,
                                    reference.tap_count,
                                    a.index,
                                    player.tap_count,
                                    b.index
                                ),
                            ));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
