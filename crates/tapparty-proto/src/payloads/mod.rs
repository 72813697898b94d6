//! CBOR-encoded protocol messages.
//!
//! Frame headers are raw binary, payloads are CBOR: self-describing, compact,
//! no code generation. The `Payload` enum covers session control (Hello, Ping,
//! etc.), room membership, and round traffic.
//!
//! # Invariants
//!
//! Each payload variant maps to exactly one opcode (enforced by match
//! exhaustiveness). Encoding then decoding with the same opcode yields an
//! equal value.

pub mod room;
pub mod round;
pub mod session;

use bytes::BufMut;
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    Frame, FrameHeader, Opcode,
    errors::{ProtocolError, Result},
};

/// All possible frame payloads.
///
/// The payload type is determined by the opcode in the frame header, so only
/// the inner struct is serialized (no variant tag in CBOR).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    // Session
    /// Client handshake
    Hello(session::Hello),
    /// Relay handshake reply
    HelloReply(session::HelloReply),
    /// Liveness probe
    Ping,
    /// Liveness reply
    Pong,
    /// Graceful close
    Goodbye(session::Goodbye),
    /// Session error
    Error(session::ErrorPayload),

    // Room
    /// Open a room
    CreateRoom(room::CreateRoom),
    /// Join a room
    JoinRoom(room::JoinRoom),
    /// Join admitted
    JoinSuccess(room::JoinSuccess),
    /// Create or join rejected
    RoomError(room::RoomError),
    /// Player joined
    PlayerJoined(room::PlayerJoined),
    /// Player left
    PlayerLeft(room::PlayerLeft),
    /// Change own name/skin
    UpdatePlayerInfo(room::UpdatePlayerInfo),
    /// Name/skin change broadcast
    PlayerInfoUpdate(room::PlayerInfoUpdate),
    /// Leave the current room
    LeaveRoom,
    /// Room was closed by the relay
    RoomClosed,

    // Round
    /// Host starts the round
    GameStart,
    /// Round is starting
    GameStarting,
    /// Local tap
    PlayerTap,
    /// Tap broadcast
    TapEvent(round::TapEvent),
    /// Host round state
    UpdateGameState(round::GameState),
    /// Round state broadcast
    GameStateUpdate(round::GameState),
}

impl Payload {
    /// Opcode corresponding to this payload type.
    #[must_use]
    pub const fn opcode(&self) -> Opcode {
        match self {
            Self::Hello(_) => Opcode::Hello,
            Self::HelloReply(_) => Opcode::HelloReply,
            Self::Ping => Opcode::Ping,
            Self::Pong => Opcode::Pong,
            Self::Goodbye(_) => Opcode::Goodbye,
            Self::Error(_) => Opcode::Error,
            Self::CreateRoom(_) => Opcode::CreateRoom,
            Self::JoinRoom(_) => Opcode::JoinRoom,
            Self::JoinSuccess(_) => Opcode::JoinSuccess,
            Self::RoomError(_) => Opcode::RoomError,
            Self::PlayerJoined(_) => Opcode::PlayerJoined,
            Self::PlayerLeft(_) => Opcode::PlayerLeft,
            Self::UpdatePlayerInfo(_) => Opcode::UpdatePlayerInfo,
            Self::PlayerInfoUpdate(_) => Opcode::PlayerInfoUpdate,
            Self::LeaveRoom => Opcode::LeaveRoom,
            Self::RoomClosed => Opcode::RoomClosed,
            Self::GameStart => Opcode::GameStart,
            Self::GameStarting => Opcode::GameStarting,
            Self::PlayerTap => Opcode::PlayerTap,
            Self::TapEvent(_) => Opcode::TapEvent,
            Self::UpdateGameState(_) => Opcode::UpdateGameState,
            Self::GameStateUpdate(_) => Opcode::GameStateUpdate,
        }
    }

    /// Encode payload to buffer.
    ///
    /// Serializes only the inner struct, not the variant tag. Zero-field
    /// messages write nothing.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::CborEncode` if serialization fails
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        let mut writer = dst.writer();

        match self {
            Self::Hello(inner) => encode_cbor(inner, &mut writer),
            Self::HelloReply(inner) => encode_cbor(inner, &mut writer),
            Self::Goodbye(inner) => encode_cbor(inner, &mut writer),
            Self::Error(inner) => encode_cbor(inner, &mut writer),
            Self::CreateRoom(inner) => encode_cbor(inner, &mut writer),
            Self::JoinRoom(inner) => encode_cbor(inner, &mut writer),
            Self::JoinSuccess(inner) => encode_cbor(inner, &mut writer),
            Self::RoomError(inner) => encode_cbor(inner, &mut writer),
            Self::PlayerJoined(inner) => encode_cbor(inner, &mut writer),
            Self::PlayerLeft(inner) => encode_cbor(inner, &mut writer),
            Self::UpdatePlayerInfo(inner) => encode_cbor(inner, &mut writer),
            Self::PlayerInfoUpdate(inner) => encode_cbor(inner, &mut writer),
            Self::TapEvent(inner) => encode_cbor(inner, &mut writer),
            Self::UpdateGameState(inner) | Self::GameStateUpdate(inner) => {
                encode_cbor(inner, &mut writer)
            },
            Self::Ping
            | Self::Pong
            | Self::LeaveRoom
            | Self::RoomClosed
            | Self::GameStart
            | Self::GameStarting
            | Self::PlayerTap => Ok(()),
        }
    }

    /// Decode payload bytes for the given opcode.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::PayloadTooLarge` if bytes exceed the limit
    /// - `ProtocolError::CborDecode` if deserialization fails
    pub fn decode(opcode: Opcode, bytes: &[u8]) -> Result<Self> {
        if bytes.len() > FrameHeader::MAX_PAYLOAD_SIZE as usize {
            return Err(ProtocolError::PayloadTooLarge {
                size: bytes.len(),
                max: FrameHeader::MAX_PAYLOAD_SIZE as usize,
            });
        }

        let payload = match opcode {
            Opcode::Hello => Self::Hello(decode_cbor(bytes)?),
            Opcode::HelloReply => Self::HelloReply(decode_cbor(bytes)?),
            Opcode::Ping => Self::Ping,
            Opcode::Pong => Self::Pong,
            Opcode::Goodbye => Self::Goodbye(decode_cbor(bytes)?),
            Opcode::Error => Self::Error(decode_cbor(bytes)?),
            Opcode::CreateRoom => Self::CreateRoom(decode_cbor(bytes)?),
            Opcode::JoinRoom => Self::JoinRoom(decode_cbor(bytes)?),
            Opcode::JoinSuccess => Self::JoinSuccess(decode_cbor(bytes)?),
            Opcode::RoomError => Self::RoomError(decode_cbor(bytes)?),
            Opcode::PlayerJoined => Self::PlayerJoined(decode_cbor(bytes)?),
            Opcode::PlayerLeft => Self::PlayerLeft(decode_cbor(bytes)?),
            Opcode::UpdatePlayerInfo => Self::UpdatePlayerInfo(decode_cbor(bytes)?),
            Opcode::PlayerInfoUpdate => Self::PlayerInfoUpdate(decode_cbor(bytes)?),
            Opcode::LeaveRoom => Self::LeaveRoom,
            Opcode::RoomClosed => Self::RoomClosed,
            Opcode::GameStart => Self::GameStart,
            Opcode::GameStarting => Self::GameStarting,
            Opcode::PlayerTap => Self::PlayerTap,
            Opcode::TapEvent => Self::TapEvent(decode_cbor(bytes)?),
            Opcode::UpdateGameState => Self::UpdateGameState(decode_cbor(bytes)?),
            Opcode::GameStateUpdate => Self::GameStateUpdate(decode_cbor(bytes)?),
        };

        Ok(payload)
    }

    /// Convert payload into a transport frame.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::CborEncode` if serialization fails
    pub fn into_frame(self) -> Result<Frame> {
        let mut buf = Vec::new();
        self.encode(&mut buf)?;
        Ok(Frame::new(FrameHeader::new(self.opcode()), buf))
    }

    /// Parse payload from a transport frame.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::UnknownOpcode` if the header opcode is not recognized
    /// - `ProtocolError::CborDecode` if deserialization fails
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        let opcode = frame
            .header
            .opcode_enum()
            .ok_or_else(|| ProtocolError::UnknownOpcode(frame.header.opcode()))?;
        Self::decode(opcode, &frame.payload)
    }
}

fn encode_cbor<T: Serialize, W: std::io::Write>(value: &T, writer: W) -> Result<()> {
    ciborium::ser::into_writer(value, writer).map_err(|e| ProtocolError::CborEncode(e.to_string()))
}

fn decode_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    ciborium::de::from_reader(bytes).map_err(|e| ProtocolError::CborDecode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn through_frame(payload: &Payload) -> Payload {
        let frame = payload.clone().into_frame().expect("should create frame");
        assert_eq!(frame.opcode(), Some(payload.opcode()));
        Payload::from_frame(&frame).expect("should parse payload")
    }

    #[test]
    fn empty_payloads_have_no_bytes() {
        for payload in [
            Payload::Ping,
            Payload::Pong,
            Payload::LeaveRoom,
            Payload::RoomClosed,
            Payload::GameStart,
            Payload::GameStarting,
            Payload::PlayerTap,
        ] {
            let frame = payload.clone().into_frame().unwrap();
            assert!(frame.payload.is_empty());
            assert!(payload.opcode().is_empty_payload());
            assert_eq!(through_frame(&payload), payload);
        }
    }

    #[test]
    fn join_success_keeps_roster_order() {
        let payload = Payload::JoinSuccess(room::JoinSuccess {
            room_code: "BCDF".to_string(),
            players: vec![
                room::RosterEntry {
                    player_id: 7,
                    name: "host".to_string(),
                    skin_id: 2,
                    ready: true,
                    is_host: true,
                },
                room::RosterEntry {
                    player_id: 3,
                    name: "bea".to_string(),
                    skin_id: 5,
                    ready: false,
                    is_host: false,
                },
            ],
        });

        assert_eq!(through_frame(&payload), payload);
    }

    #[test]
    fn tap_event_carries_player() {
        let payload = Payload::TapEvent(round::TapEvent { player_id: u64::MAX });
        assert_eq!(through_frame(&payload), payload);
    }

    #[test]
    fn mismatched_payload_rejected() {
        let frame = Payload::PlayerLeft(room::PlayerLeft { name: "x".to_string() })
            .into_frame()
            .unwrap();

        let result = Payload::decode(Opcode::JoinSuccess, &frame.payload);
        assert!(matches!(result, Err(ProtocolError::CborDecode(_))));
    }

    #[test]
    fn unknown_opcode_rejected() {
        let mut frame = Payload::Ping.into_frame().unwrap();
        frame.header.opcode = 0x7777u16.to_be_bytes();

        assert_eq!(Payload::from_frame(&frame), Err(ProtocolError::UnknownOpcode(0x7777)));
    }

    #[test]
    fn garbage_cbor_rejected() {
        let result = Payload::decode(Opcode::HelloReply, &[0xFF, 0x00, 0x13]);
        assert!(matches!(result, Err(ProtocolError::CborDecode(_))));
    }
}
