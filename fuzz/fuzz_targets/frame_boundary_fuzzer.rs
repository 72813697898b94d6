//! Fuzz target for frame header boundary conditions
//!
//! # Strategy
//!
//! - Magic bytes: valid, off-by-one, all-zeros, all-ones, random
//! - Payload size: zero, small, at-max, just-over-max, u32::MAX
//! - Version: valid (0x01), zero, max, random
//! - Opcode: any u16, known or not
//!
//! # Invariants
//!
//! - `payload_size > MAX_PAYLOAD_SIZE` MUST return `PayloadTooLarge`
//! - Invalid magic bytes MUST return `InvalidMagic`
//! - Unknown opcodes decode; the client decides what to do with them
//! - Encoded size MUST equal `FrameHeader::SIZE` + payload size

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tapparty_proto::{Frame, FrameHeader, Opcode, errors::ProtocolError};

#[derive(Debug, Clone, Arbitrary)]
struct BoundaryFrame {
    magic: MagicBytes,
    version: VersionBytes,
    opcode: u16,
    payload_size: PayloadSize,
}

#[derive(Debug, Clone, Arbitrary)]
enum MagicBytes {
    Valid,
    OffByOne(u8),
    AllZeros,
    AllOnes,
    Random([u8; 4]),
}

#[derive(Debug, Clone, Arbitrary)]
enum VersionBytes {
    Valid,
    Zero,
    Max,
    Random(u8),
}

#[derive(Debug, Clone, Arbitrary)]
enum PayloadSize {
    Zero,
    Small(u8),
    AtMaxBoundary,
    JustOverMax,
    MaxU32,
    Random(u32),
}

fuzz_target!(|boundary: BoundaryFrame| {
    let magic = FrameHeader::MAGIC.to_be_bytes();
    let payload_size = match boundary.payload_size {
        PayloadSize::Zero => 0,
        PayloadSize::Small(s) => u32::from(s),
        PayloadSize::AtMaxBoundary => FrameHeader::MAX_PAYLOAD_SIZE,
        PayloadSize::JustOverMax => FrameHeader::MAX_PAYLOAD_SIZE + 1,
        PayloadSize::MaxU32 => u32::MAX,
        PayloadSize::Random(r) => r,
    };

    let actual_payload = payload_size.min(FrameHeader::MAX_PAYLOAD_SIZE + 16) as usize;
    let mut buffer = vec![0u8; FrameHeader::SIZE + actual_payload];

    match boundary.magic {
        MagicBytes::Valid => buffer[0..4].copy_from_slice(&magic),
        MagicBytes::OffByOne(offset) => {
            buffer[0..4].copy_from_slice(&magic);
            let idx = (offset % 4) as usize;
            buffer[idx] = buffer[idx].wrapping_add(1);
        },
        MagicBytes::AllZeros => buffer[0..4].fill(0),
        MagicBytes::AllOnes => buffer[0..4].fill(0xFF),
        MagicBytes::Random(bytes) => buffer[0..4].copy_from_slice(&bytes),
    }

    buffer[4] = match boundary.version {
        VersionBytes::Valid => FrameHeader::VERSION,
        VersionBytes::Zero => 0,
        VersionBytes::Max => u8::MAX,
        VersionBytes::Random(v) => v,
    };
    buffer[6..8].copy_from_slice(&boundary.opcode.to_be_bytes());
    buffer[8..12].copy_from_slice(&payload_size.to_be_bytes());

    match Frame::decode(&buffer) {
        Ok(frame) => {
            assert_eq!(buffer[0..4], magic);
            assert_eq!(buffer[4], FrameHeader::VERSION);
            assert!(payload_size <= FrameHeader::MAX_PAYLOAD_SIZE);
            assert_eq!(frame.payload.len(), payload_size as usize);
            assert_eq!(frame.header.opcode(), boundary.opcode);
            assert_eq!(frame.encoded_len(), FrameHeader::SIZE + frame.payload.len());
        },
        Err(ProtocolError::InvalidMagic(_)) => assert_ne!(buffer[0..4], magic),
        Err(ProtocolError::PayloadTooLarge { .. }) => {
            assert!(payload_size > FrameHeader::MAX_PAYLOAD_SIZE);
        },
        Err(_) => {},
    }

    if let Some(opcode) = Opcode::from_u16(boundary.opcode) {
        let payload = vec![0xAA; actual_payload.min(1000)];
        let frame = Frame::new(FrameHeader::new(opcode), payload);

        let encoded = frame.to_vec().expect("small frame encodes");
        assert_eq!(encoded.len(), FrameHeader::SIZE + frame.payload.len());

        let decoded = Frame::decode(&encoded).expect("encoded frame decodes");
        assert_eq!(decoded, frame);
    }
});
