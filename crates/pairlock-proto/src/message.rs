//! Protocol messages.
//!
//! A [`Message`] is an addressed [`Body`]. Mutual-exclusion bodies carry the
//! sender's Lamport clock; pairing bodies carry nothing beyond the sender ID
//! already in the envelope.

use serde::{Deserialize, Serialize};

use crate::MessageKind;

/// Identity of a participant, unique across requesters and responders.
pub type ParticipantId = u32;

/// Message payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Body {
    /// Ask for the critical section. `clock` is the requester's stamp clock.
    Request {
        /// Clock value of the sender's request stamp
        clock: u64,
    },
    /// Grant the critical section to the addressee.
    Reply {
        /// Sender's clock at the time of the reply
        clock: u64,
    },
    /// Ask a responder to pair with the sender.
    PairRequest,
    /// Responder accepts the pairing.
    PairAccept,
    /// Responder is busy.
    PairDeny,
    /// Requester ends the pairing.
    PairEnd,
}

impl Body {
    /// Kind of this body.
    pub const fn kind(&self) -> MessageKind {
        match self {
            Self::Request { .. } => MessageKind::Request,
            Self::Reply { .. } => MessageKind::Reply,
            Self::PairRequest => MessageKind::PairRequest,
            Self::PairAccept => MessageKind::PairAccept,
            Self::PairDeny => MessageKind::PairDeny,
            Self::PairEnd => MessageKind::PairEnd,
        }
    }

    /// Clock carried by mutual-exclusion bodies.
    pub const fn clock(&self) -> Option<u64> {
        match self {
            Self::Request { clock } | Self::Reply { clock } => Some(*clock),
            _ => None,
        }
    }
}

/// Addressed protocol message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Sender
    pub from: ParticipantId,
    /// Addressee
    pub to: ParticipantId,
    /// Payload
    pub body: Body,
}

impl Message {
    /// Create a message.
    pub const fn new(from: ParticipantId, to: ParticipantId, body: Body) -> Self {
        Self { from, to, body }
    }

    /// Kind of the payload.
    pub const fn kind(&self) -> MessageKind {
        self.body.kind()
    }
}
