//! Fuzz target for Frame::decode
//!
//! Arbitrary bytes must never panic the frame parser. Every invalid input
//! returns an error; every accepted frame re-encodes to the bytes it was
//! decoded from.

#![no_main]

use libfuzzer_sys::fuzz_target;
use tapparty_proto::{Frame, FrameHeader};

fuzz_target!(|data: &[u8]| {
    let Ok(frame) = Frame::decode(data) else {
        return;
    };

    let len = FrameHeader::SIZE + frame.payload.len();
    let encoded = frame.to_vec().expect("decoded frame re-encodes");
    assert_eq!(encoded, data[..len]);
});
