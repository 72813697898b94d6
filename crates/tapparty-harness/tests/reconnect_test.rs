//! Link failures: heartbeat timeouts, resets and reconnects.

use std::time::Duration;

use tapparty_app::{GameEvent, Intent};
use tapparty_client::SessionState;
use tapparty_harness::{InvariantRegistry, SimNetwork};

fn party() -> SimNetwork {
    let mut network = SimNetwork::new(5);
    network.add_client().unwrap();
    network.add_client().unwrap();
    network.intent(0, Intent::CreateRoom {
        room_code: Some("MNPQ".to_string()),
        name: "ann".to_string(),
        skin_id: 0,
    });
    network.intent(1, Intent::JoinRoom {
        room_code: "MNPQ".to_string(),
        name: "bea".to_string(),
        skin_id: 0,
    });
    network.take_events(0);
    network.take_events(1);
    network
}

fn reconnects(events: &[GameEvent]) -> Vec<u32> {
    events
        .iter()
        .filter_map(|e| match e {
            GameEvent::Reconnecting { attempt } => Some(*attempt),
            _ => None,
        })
        .collect()
}

#[test]
fn heartbeat_keeps_quiet_link_alive() {
    let mut network = party();

    network.advance(Duration::from_secs(300));

    assert!(reconnects(network.events(0)).is_empty());
    assert!(reconnects(network.events(1)).is_empty());
    assert_eq!(network.client(1).roster().unwrap().len(), 2);
}

#[test]
fn silent_link_times_out_then_rejoins() {
    let mut network = party();
    let old_id = network.client(1).connection_id().unwrap();

    network.set_reachable(1, false);
    network.advance(Duration::from_millis(59_900));
    assert!(reconnects(network.events(1)).is_empty());

    network.advance(Duration::from_millis(100));
    assert_eq!(reconnects(network.events(1)), vec![1]);
    assert_eq!(network.client(1).session_state(), SessionState::Reconnecting);
    assert!(network.events(0).contains(&GameEvent::PlayerLeft { name: "bea".to_string() }));

    network.set_reachable(1, true);
    network.advance(Duration::from_secs(2));

    let events = network.take_events(1);
    assert_eq!(reconnects(&events), vec![1]);
    let new_id = network.client(1).connection_id().unwrap();
    assert_ne!(new_id, old_id);
    assert!(events.iter().any(|e| matches!(e, GameEvent::JoinSuccess { .. })));
    assert_eq!(network.client(1).room_code().unwrap().as_str(), "MNPQ");

    let joined: Vec<_> = network
        .events(0)
        .iter()
        .filter(|e| matches!(e, GameEvent::PlayerJoined { .. }))
        .collect();
    assert_eq!(joined.len(), 1);

    InvariantRegistry::standard().assert_all(&network.snapshot(), "after rejoin");
}

#[test]
fn refused_reconnects_give_up() {
    let mut network = party();

    network.set_reachable(1, false);
    network.advance(Duration::from_secs(60));
    // Five attempts, two seconds apart.
    network.advance(Duration::from_secs(12));

    let events = network.events(1);
    assert_eq!(reconnects(events), vec![1, 2, 3, 4, 5]);
    assert!(events.iter().any(|e| matches!(e, GameEvent::ConnectionLost { .. })));
    assert!(events.contains(&GameEvent::RoomClosed));
    assert!(network.client(1).room().is_none());
    assert_eq!(network.client(1).session_state(), SessionState::Disconnected);
}

#[test]
fn host_reset_reopens_room_empty() {
    let mut network = party();

    network.drop_connection(0);
    assert!(network.events(1).contains(&GameEvent::RoomClosed));
    assert!(network.client(1).room().is_none());

    network.advance(Duration::from_secs(2));
    let host = network.client(0);
    assert!(host.is_host());
    assert_eq!(host.roster().unwrap().len(), 1);
    assert_eq!(host.roster().unwrap().host().unwrap().connection_id, host.connection_id().unwrap());
    assert_eq!(network.relay().room_count(), 1);

    network.intent(1, Intent::JoinRoom {
        room_code: "MNPQ".to_string(),
        name: "bea".to_string(),
        skin_id: 0,
    });
    assert_eq!(network.client(0).roster().unwrap().len(), 2);
    InvariantRegistry::standard().assert_all(&network.snapshot(), "after host reconnect");
}

#[test]
fn guest_rejoin_refused_mid_round_closes_room() {
    let mut network = party();
    network.intent(0, Intent::StartGame);

    network.drop_connection(1);
    network.advance(Duration::from_secs(2));

    let events = network.events(1);
    assert!(events.contains(&GameEvent::RoomError { message: "Game already in progress".to_string() }));
    assert!(events.contains(&GameEvent::RoomClosed));
    assert!(network.client(1).room().is_none());
    assert!(network.client(1).is_connected());
}

#[test]
fn quit_says_goodbye() {
    let mut network = party();

    network.intent(1, Intent::Quit);

    assert!(network.events(0).contains(&GameEvent::PlayerLeft { name: "bea".to_string() }));
    assert_eq!(network.client(1).session_state(), SessionState::Disconnected);
    assert_eq!(network.relay().members(tapparty_proto::RoomCode::parse("MNPQ").unwrap()).map(<[u64]>::len), Some(1));
}
