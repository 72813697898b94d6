//! Fuzz target for Payload::decode
//!
//! Feeds arbitrary bytes as the payload of every opcode:
//! - Malformed CBOR
//! - Type confusion (wrong payload shape for the opcode)
//! - Oversized names and rosters
//!
//! The decoder should NEVER panic. Anything it accepts must survive a
//! re-encode.

#![no_main]

use libfuzzer_sys::fuzz_target;
use tapparty_proto::{Opcode, Payload};

fuzz_target!(|data: &[u8]| {
    for opcode in Opcode::ALL {
        let Ok(payload) = Payload::decode(opcode, data) else {
            continue;
        };

        assert_eq!(payload.opcode(), opcode);
        let frame = payload.clone().into_frame().expect("decoded payload re-encodes");
        assert_eq!(Payload::from_frame(&frame).expect("round trip"), payload);
    }
});
