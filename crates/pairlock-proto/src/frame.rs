//! Frame encoding.
//!
//! ```text
//! 0        2         3      4                8
//! ┌────────┬─────────┬──────┬────────────────┬──────────────┐
//! │ magic  │ version │ kind │ payload length │ CBOR payload │
//! └────────┴─────────┴──────┴────────────────┴──────────────┘
//! ```
//!
//! All integers are big endian. Decoding is incremental: [`decode`] returns
//! `Ok(None)` until a whole frame is buffered, which suits stream transports
//! that read in arbitrary chunks.

use bytes::{Buf, BufMut, BytesMut};

use crate::{Message, MessageKind, ProtocolError, Result};

/// Largest payload accepted by [`decode`].
pub const MAX_PAYLOAD_SIZE: usize = 64 * 1024;

/// Fixed frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    kind: MessageKind,
    payload_len: u32,
}

impl FrameHeader {
    /// Frame magic, ASCII "PL".
    pub const MAGIC: u16 = 0x504C;
    /// Current wire version.
    pub const VERSION: u8 = 1;
    /// Encoded header size in bytes.
    pub const SIZE: usize = 8;

    /// Create a header for a payload of `payload_len` bytes.
    pub fn new(kind: MessageKind, payload_len: usize) -> Result<Self> {
        if payload_len > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge { size: payload_len, max: MAX_PAYLOAD_SIZE });
        }
        Ok(Self { kind, payload_len: payload_len as u32 })
    }

    /// Kind of the framed message.
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Payload size in bytes.
    pub fn payload_size(&self) -> usize {
        self.payload_len as usize
    }

    /// Serialize the header.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..2].copy_from_slice(&Self::MAGIC.to_be_bytes());
        bytes[2] = Self::VERSION;
        bytes[3] = self.kind.to_u8();
        bytes[4..8].copy_from_slice(&self.payload_len.to_be_bytes());
        bytes
    }

    /// Parse and validate a header.
    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Result<Self> {
        let magic = u16::from_be_bytes([bytes[0], bytes[1]]);
        if magic != Self::MAGIC {
            return Err(ProtocolError::InvalidMagic(magic));
        }
        if bytes[2] != Self::VERSION {
            return Err(ProtocolError::UnsupportedVersion(bytes[2]));
        }
        let kind = MessageKind::from_u8(bytes[3]).ok_or(ProtocolError::UnknownKind(bytes[3]))?;
        let payload_len = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        Self::new(kind, payload_len as usize)
    }
}

/// Append the frame for `message` to `dst`.
pub fn encode(message: &Message, dst: &mut BytesMut) -> Result<()> {
    let mut payload = Vec::new();
    ciborium::into_writer(message, &mut payload)
        .map_err(|e| ProtocolError::Encode(e.to_string()))?;

    let header = FrameHeader::new(message.kind(), payload.len())?;
    dst.reserve(FrameHeader::SIZE + payload.len());
    dst.put_slice(&header.to_bytes());
    dst.put_slice(&payload);
    Ok(())
}

/// Take one frame off the front of `src`.
///
/// Returns `Ok(None)` and leaves `src` untouched if the frame is incomplete.
/// Only a successfully decoded frame is consumed. Any error leaves `src`
/// untouched as well; the stream is unusable after that and the caller
/// should drop it.
pub fn decode(src: &mut BytesMut) -> Result<Option<Message>> {
    if src.len() < FrameHeader::SIZE {
        return Ok(None);
    }

    let mut raw = [0u8; FrameHeader::SIZE];
    raw.copy_from_slice(&src[..FrameHeader::SIZE]);
    let header = FrameHeader::from_bytes(&raw)?;

    let total = FrameHeader::SIZE + header.payload_size();
    if src.len() < total {
        src.reserve(total - src.len());
        return Ok(None);
    }

    let message: Message = ciborium::from_reader(&src[FrameHeader::SIZE..total])
        .map_err(|e| ProtocolError::Decode(e.to_string()))?;

    if message.kind() != header.kind() {
        return Err(ProtocolError::KindMismatch { header: header.kind(), payload: message.kind() });
    }

    src.advance(total);
    Ok(Some(message))
}
