//! Wire format for the Pairlock protocol.
//!
//! Participants exchange six kinds of messages on two logical channels:
//! Ricart–Agrawala mutual exclusion (`Request`, `Reply`) and the responder
//! pairing handshake (`PairRequest`, `PairAccept`, `PairDeny`, `PairEnd`).
//!
//! On the wire every message is a frame: a fixed 8-byte header followed by a
//! CBOR payload. The header repeats the message kind so a receiver can
//! classify a frame without decoding its payload.
//!
//! # Security
//!
//! Payloads are capped at [`frame::MAX_PAYLOAD_SIZE`]. The decoder rejects
//! unknown versions and kinds, and a header kind that disagrees with the
//! payload.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod errors;
pub mod frame;
pub mod kind;
pub mod message;

pub use errors::{ProtocolError, Result};
pub use frame::FrameHeader;
pub use kind::MessageKind;
pub use message::{Body, Message, ParticipantId};
