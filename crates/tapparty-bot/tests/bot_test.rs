//! The bot's observer and driver glue, without a relay.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use tapparty_app::{Driver, GameEvent, GameObserver, Intent};
use tapparty_bot::{BotObserver, DriverError, Plan, Script, Seat, SharedScript, SystemEnv, WsDriver};
use tapparty_proto::{Frame, Opcode};

fn shared(seat: Seat) -> SharedScript {
    Arc::new(Mutex::new(Script::new(Plan {
        seat,
        name: "bot".to_string(),
        skin_id: 0,
        tap_interval: Duration::from_millis(10),
    })))
}

#[tokio::test]
async fn driver_polls_the_script() {
    let env = SystemEnv::new();
    let script = shared(Seat::Guest { room_code: "BCDF".to_string() });
    let mut driver = WsDriver::new("ws://127.0.0.1:1", env, Arc::clone(&script));
    let mut observer = BotObserver::new(env, Arc::clone(&script));

    assert!(matches!(driver.poll_intent().await.unwrap(), Some(Intent::JoinRoom { .. })));
    assert_eq!(driver.poll_intent().await.unwrap(), None);

    observer.on_event(&GameEvent::GameStarting);
    assert_eq!(driver.poll_intent().await.unwrap(), Some(Intent::Tap));

    observer.on_event(&GameEvent::RoomClosed);
    assert_eq!(driver.poll_intent().await.unwrap(), Some(Intent::Quit));
    assert!(script.lock().unwrap().is_finished());
}

#[tokio::test]
async fn closed_driver_refuses_frames() {
    let env = SystemEnv::new();
    let mut driver = WsDriver::new("ws://127.0.0.1:1", env, shared(Seat::Guest {
        room_code: "BCDF".to_string(),
    }));

    assert!(driver.recv_frame().await.unwrap().is_none());
    assert!(matches!(
        driver.send_frame(Frame::empty(Opcode::Ping)).await,
        Err(DriverError::NotConnected)
    ));
    driver.close_transport();
}

#[tokio::test]
async fn unreachable_relay_fails_to_open() {
    let env = SystemEnv::new();
    let mut driver = WsDriver::new("ws://127.0.0.1:1", env, shared(Seat::Host {
        room_code: None,
        players: 1,
    }));

    assert!(matches!(driver.open_transport().await, Err(DriverError::Transport(_))));
}
