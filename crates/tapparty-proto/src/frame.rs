//! Frame type combining header and payload.
//!
//! A `Frame` is the transport-layer packet: a 12-byte header followed by the
//! already-encoded payload bytes. It is a pure data holder; see
//! [`crate::Payload::into_frame`] and [`crate::Payload::from_frame`] for the
//! typed view.

use bytes::{BufMut, Bytes};

use crate::{
    FrameHeader, Opcode,
    errors::{ProtocolError, Result},
};

/// Complete protocol frame.
///
/// Layout on the wire: `[FrameHeader: 12 bytes] + [payload: variable]`.
///
/// # Invariants
///
/// - `payload.len()` matches `header.payload_size()`. [`Frame::new`] sets the
///   size field, [`Frame::decode`] verifies it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame header.
    pub header: FrameHeader,

    /// Raw payload bytes (CBOR, or empty).
    pub payload: Bytes,
}

impl Frame {
    /// Create a frame, setting the header's payload size from `payload`.
    ///
    /// Does not enforce [`FrameHeader::MAX_PAYLOAD_SIZE`]; oversized frames
    /// are rejected by [`Frame::encode`].
    #[must_use]
    pub fn new(mut header: FrameHeader, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        let size = u32::try_from(payload.len()).unwrap_or(u32::MAX);
        header.payload_size = size.to_be_bytes();
        Self { header, payload }
    }

    /// Frame with an empty payload.
    #[must_use]
    pub fn empty(opcode: Opcode) -> Self {
        Self::new(FrameHeader::new(opcode), Bytes::new())
    }

    /// Opcode as enum. `None` if unrecognized.
    #[must_use]
    pub fn opcode(&self) -> Option<Opcode> {
        self.header.opcode_enum()
    }

    /// Total encoded length (header + payload).
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        FrameHeader::SIZE + self.payload.len()
    }

    /// Encode frame into buffer.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::PayloadTooLarge` if the payload exceeds the limit
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        if self.payload.len() > FrameHeader::MAX_PAYLOAD_SIZE as usize {
            return Err(ProtocolError::PayloadTooLarge {
                size: self.payload.len(),
                max: FrameHeader::MAX_PAYLOAD_SIZE as usize,
            });
        }

        dst.put_slice(&self.header.to_bytes());
        dst.put_slice(&self.payload);

        Ok(())
    }

    /// Encode into a fresh buffer.
    ///
    /// # Errors
    ///
    /// Same as [`Frame::encode`].
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode(&mut buf)?;
        Ok(buf)
    }

    /// Decode a frame from wire bytes. Trailing bytes are ignored.
    ///
    /// Does not deserialize the payload.
    ///
    /// # Errors
    ///
    /// - Any header error from [`FrameHeader::from_bytes`]
    /// - `ProtocolError::FrameTruncated` if fewer payload bytes than claimed
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let header = FrameHeader::from_bytes(bytes)?;

        let payload_size = header.payload_size() as usize;
        let total_size = FrameHeader::SIZE + payload_size;

        let Some(payload) = bytes.get(FrameHeader::SIZE..total_size) else {
            return Err(ProtocolError::FrameTruncated {
                expected: payload_size,
                actual: bytes.len().saturating_sub(FrameHeader::SIZE),
            });
        };

        Ok(Self { header: *header, payload: Bytes::copy_from_slice(payload) })
    }
}
