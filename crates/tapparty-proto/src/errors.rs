//! Protocol errors.
//!
//! Raised while parsing headers, decoding frames, or (de)serializing CBOR
//! payloads. None of these are fatal to a client: a bad frame is logged and
//! dropped by the layer above.

use thiserror::Error;

/// Errors produced by framing and payload codecs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Buffer is shorter than the header or the size the header claims.
    #[error("frame too short: expected {expected} bytes, got {actual}")]
    FrameTooShort {
        /// Bytes required.
        expected: usize,
        /// Bytes available.
        actual: usize,
    },

    /// Buffer holds fewer payload bytes than the header claims.
    #[error("frame truncated: expected {expected} payload bytes, got {actual}")]
    FrameTruncated {
        /// Payload bytes claimed by the header.
        expected: usize,
        /// Payload bytes available.
        actual: usize,
    },

    /// Header magic does not match [`crate::FrameHeader::MAGIC`].
    #[error("invalid magic: {0:#010x}")]
    InvalidMagic(u32),

    /// Header version is not supported.
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// Payload exceeds [`crate::FrameHeader::MAX_PAYLOAD_SIZE`].
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge {
        /// Actual payload size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Opcode is not part of the protocol.
    #[error("unknown opcode: {0:#06x}")]
    UnknownOpcode(u16),

    /// CBOR serialization failed.
    #[error("CBOR encode failed: {0}")]
    CborEncode(String),

    /// CBOR deserialization failed.
    #[error("CBOR decode failed: {0}")]
    CborDecode(String),
}

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
