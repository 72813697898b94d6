//! Property-based tests for decoding untrusted wire bytes.
//!
//! The relay and every peer feed raw WebSocket messages into `Frame::decode`
//! and `Payload::from_frame`. These must reject garbage with an error and
//! never panic.

use proptest::prelude::*;
use tapparty_proto::{
    Frame, FrameHeader, Opcode, Payload, ProtocolError,
    payloads::room::{JoinRoom, PlayerInfoUpdate, PlayerJoined},
};

fn arbitrary_opcode() -> impl Strategy<Value = Opcode> {
    proptest::sample::select(Opcode::ALL.to_vec())
}

fn arbitrary_room_payload() -> impl Strategy<Value = Payload> {
    prop_oneof![
        ("[A-Z]{4}", ".{0,20}", any::<u32>(), "[a-f0-9]{8}").prop_map(
            |(room_code, name, skin_id, client_id)| {
                Payload::JoinRoom(JoinRoom { room_code, name, skin_id, client_id })
            }
        ),
        (any::<u64>(), ".{0,20}", any::<u32>(), any::<bool>()).prop_map(
            |(player_id, name, skin_id, ready)| {
                Payload::PlayerJoined(PlayerJoined { player_id, name, skin_id, ready })
            }
        ),
        (".{0,20}", ".{0,20}", any::<u32>()).prop_map(|(old_name, new_name, new_skin)| {
            Payload::PlayerInfoUpdate(PlayerInfoUpdate { old_name, new_name, new_skin })
        }),
    ]
}

#[test]
fn prop_decode_arbitrary_bytes_never_panics() {
    proptest!(|(bytes in prop::collection::vec(any::<u8>(), 0..256))| {
        let _ = Frame::decode(&bytes);
    });
}

#[test]
fn prop_payload_decode_arbitrary_bytes_never_panics() {
    proptest!(|(opcode in arbitrary_opcode(), bytes in prop::collection::vec(any::<u8>(), 0..256))| {
        let _ = Payload::decode(opcode, &bytes);
    });
}

#[test]
fn prop_room_payload_survives_the_wire() {
    proptest!(|(payload in arbitrary_room_payload())| {
        let wire = payload.clone().into_frame().expect("should frame").to_vec().expect("should encode");

        let frame = Frame::decode(&wire).expect("should decode frame");
        let parsed = Payload::from_frame(&frame).expect("should decode payload");

        prop_assert_eq!(parsed, payload);
    });
}

#[test]
fn prop_header_with_valid_prefix_reports_truncation() {
    proptest!(|(opcode in arbitrary_opcode(), claimed in 1u32..1024, have in 0usize..1024)| {
        prop_assume!((have as u32) < claimed);

        let mut wire = FrameHeader::new(opcode).to_bytes().to_vec();
        wire[8..12].copy_from_slice(&claimed.to_be_bytes());
        wire.extend(std::iter::repeat_n(0u8, have));

        prop_assert_eq!(
            Frame::decode(&wire),
            Err(ProtocolError::FrameTruncated { expected: claimed as usize, actual: have })
        );
    });
}

#[test]
fn oversized_claim_rejected_before_reading_payload() {
    let mut wire = FrameHeader::new(Opcode::JoinRoom).to_bytes().to_vec();
    wire[8..12].copy_from_slice(&(FrameHeader::MAX_PAYLOAD_SIZE + 1).to_be_bytes());

    assert!(matches!(Frame::decode(&wire), Err(ProtocolError::PayloadTooLarge { .. })));
}
