//! Message kind codes.
//!
//! Code 3 is reserved. It once carried a release notification that the
//! protocol does not need.

use serde::{Deserialize, Serialize};

/// Logical channel a message travels on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MessageKind {
    /// Critical-section request carrying the requester's stamp clock
    Request,
    /// Permission to enter the critical section
    Reply,
    /// Ask a responder to pair
    PairRequest,
    /// Responder agreed to pair
    PairAccept,
    /// Responder is already paired
    PairDeny,
    /// Requester releases the responder
    PairEnd,
}

impl MessageKind {
    /// All kinds, in code order.
    pub const ALL: [Self; 6] = [
        Self::Request,
        Self::Reply,
        Self::PairRequest,
        Self::PairAccept,
        Self::PairDeny,
        Self::PairEnd,
    ];

    /// Wire code.
    pub const fn to_u8(self) -> u8 {
        match self {
            Self::Request => 1,
            Self::Reply => 2,
            Self::PairRequest => 4,
            Self::PairAccept => 5,
            Self::PairDeny => 6,
            Self::PairEnd => 7,
        }
    }

    /// Parse a wire code.
    pub const fn from_u8(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Request),
            2 => Some(Self::Reply),
            4 => Some(Self::PairRequest),
            5 => Some(Self::PairAccept),
            6 => Some(Self::PairDeny),
            7 => Some(Self::PairEnd),
            _ => None,
        }
    }

    /// Whether this kind belongs to the mutual-exclusion channel.
    pub const fn is_mutex(self) -> bool {
        matches!(self, Self::Request | Self::Reply)
    }

    /// Whether this kind belongs to the pairing handshake.
    pub const fn is_pairing(self) -> bool {
        !self.is_mutex()
    }
}
