//! Tap Party wire protocol.
//!
//! Every message exchanged with the relay is a [`Frame`]: a fixed 12-byte
//! binary header followed by a CBOR-encoded payload. The header carries the
//! [`Opcode`] so the relay can route frames without deserializing payloads;
//! clients turn frames into typed [`Payload`] values.
//!
//! # Components
//!
//! - [`FrameHeader`]: fixed-size header (magic, version, opcode, size)
//! - [`Frame`]: header + raw payload bytes
//! - [`Payload`]: typed message enum, one variant per opcode
//! - [`RoomCode`]: validated 4-letter room code

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod errors;
mod frame;
mod header;
mod opcode;
pub mod payloads;
pub mod room_code;

pub use errors::{ProtocolError, Result};
pub use frame::Frame;
pub use header::FrameHeader;
pub use opcode::Opcode;
pub use payloads::Payload;
pub use room_code::{RoomCode, RoomCodeError};
