//! Fuzz target for the transport Session state machine
//!
//! # Strategy
//!
//! - Lifecycle: connect, transport open/fail/close, disconnect in any order
//! - Frames: handshake replies, pings, pongs and unknown opcodes at any time
//! - Time: irregular jumps up to a minute, so every timer gets to fire
//!
//! # Invariants
//!
//! - Never panics; unexpected input is an error, not a crash
//! - `connection_id` is set exactly while `Connected`
//! - The attempt counter never exceeds `connect_attempts`
//! - `Disconnected` schedules nothing: ticks produce no actions

#![no_main]

use std::time::Duration;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tapparty_core::{Session, SessionConfig, SessionState};
use tapparty_proto::{
    Frame, FrameHeader, Opcode, Payload,
    payloads::session::HelloReply,
};

#[derive(Debug, Clone, Arbitrary)]
enum SessionOp {
    Connect,
    TransportOpened,
    TransportFailed,
    TransportClosed,
    HelloReply { connection_id: u64 },
    Ping,
    Pong,
    Unknown { opcode: u16, payload: Vec<u8> },
    Advance { millis: u16 },
    Disconnect,
}

fuzz_target!(|ops: Vec<SessionOp>| {
    let config = SessionConfig::default();
    let max_attempts = config.connect_attempts;
    let Ok(mut session) = Session::<Duration>::new(config, "fuzz") else {
        return;
    };
    let mut now = Duration::ZERO;

    for op in ops {
        match op {
            SessionOp::Connect => {
                session.connect(now);
            },
            SessionOp::TransportOpened => {
                let _ = session.transport_opened(now);
            },
            SessionOp::TransportFailed => {
                session.transport_failed(now, "refused");
            },
            SessionOp::TransportClosed => {
                session.transport_closed(now, "reset");
            },
            SessionOp::HelloReply { connection_id } => {
                if let Ok(frame) = Payload::HelloReply(HelloReply { connection_id }).into_frame() {
                    let _ = session.handle_frame(&frame, now);
                }
            },
            SessionOp::Ping => {
                let _ = session.handle_frame(&Frame::empty(Opcode::Ping), now);
            },
            SessionOp::Pong => {
                let _ = session.handle_frame(&Frame::empty(Opcode::Pong), now);
            },
            SessionOp::Unknown { opcode, payload } => {
                let mut bytes = FrameHeader::MAGIC.to_be_bytes().to_vec();
                bytes.extend_from_slice(&[FrameHeader::VERSION, 0]);
                bytes.extend_from_slice(&opcode.to_be_bytes());
                bytes.extend_from_slice(&(payload.len() as u32).to_be_bytes());
                bytes.extend_from_slice(&payload);
                if let Ok(frame) = Frame::decode(&bytes) {
                    let _ = session.handle_frame(&frame, now);
                }
            },
            SessionOp::Advance { millis } => {
                now += Duration::from_millis(u64::from(millis));
                let idle = session.state() == SessionState::Disconnected;
                let actions = session.tick(now);
                if idle {
                    assert!(actions.is_empty());
                }
            },
            SessionOp::Disconnect => {
                session.disconnect();
            },
        }

        assert_eq!(
            session.connection_id().is_some(),
            session.state() == SessionState::Connected,
            "connection id out of step with {:?}",
            session.state()
        );
        assert!(session.attempt() <= max_attempts);
    }
});
