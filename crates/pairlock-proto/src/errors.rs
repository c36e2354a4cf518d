//! Codec errors.

use thiserror::Error;

/// Result alias for codec operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while encoding or decoding frames.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Header does not start with [`crate::FrameHeader::MAGIC`].
    #[error("invalid frame magic: {0:#06x}")]
    InvalidMagic(u16),

    /// Header carries a version this codec does not speak.
    #[error("unsupported frame version: {0}")]
    UnsupportedVersion(u8),

    /// Header carries a kind code with no [`crate::MessageKind`].
    #[error("unknown message kind code: {0}")]
    UnknownKind(u8),

    /// Declared payload exceeds [`crate::frame::MAX_PAYLOAD_SIZE`].
    #[error("payload of {size} bytes exceeds limit of {max}")]
    PayloadTooLarge {
        /// Declared payload size
        size: usize,
        /// Maximum accepted size
        max: usize,
    },

    /// Header kind and payload kind disagree.
    #[error("header kind {header:?} does not match payload kind {payload:?}")]
    KindMismatch {
        /// Kind in the frame header
        header: crate::MessageKind,
        /// Kind of the decoded payload
        payload: crate::MessageKind,
    },

    /// CBOR encoding failed.
    #[error("CBOR encode failed: {0}")]
    Encode(String),

    /// CBOR decoding failed.
    #[error("CBOR decode failed: {0}")]
    Decode(String),
}
