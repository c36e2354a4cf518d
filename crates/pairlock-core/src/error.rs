//! Error types for the protocol state machines.

use pairlock_proto::{MessageKind, ParticipantId};
use thiserror::Error;

use crate::{requester::MutexState, responder::Occupancy};

/// Invalid group configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GroupError {
    /// At least one requester is required.
    #[error("group needs at least one requester")]
    NoRequesters,

    /// Requester group does not fit in the participant count.
    #[error("{requesters} requesters do not fit in {participants} participants")]
    TooManyRequesters {
        /// Requested requester group size
        requesters: u32,
        /// Total participants
        participants: u32,
    },

    /// ID outside `[0, participants)`.
    #[error("participant {id} is outside a group of {participants}")]
    UnknownParticipant {
        /// Offending ID
        id: ParticipantId,
        /// Total participants
        participants: u32,
    },

    /// ID is valid but has the wrong role for the operation.
    #[error("participant {id} is not a {expected}")]
    WrongRole {
        /// Offending ID
        id: ParticipantId,
        /// Role the operation needs
        expected: &'static str,
    },
}

/// Errors returned by [`crate::requester::Requester`].
///
/// Message-handling errors mean the inbound message was rejected and the
/// state machine is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequesterError {
    /// Operation not allowed in the current state.
    #[error("cannot {operation} while {state:?}")]
    InvalidState {
        /// Current state
        state: MutexState,
        /// Attempted operation
        operation: &'static str,
    },

    /// Message claims to come from this requester.
    #[error("rejected {kind:?} sent by self")]
    SelfMessage {
        /// Kind of the rejected message
        kind: MessageKind,
    },

    /// Message addressed to someone else.
    #[error("message for participant {to} delivered to {local}")]
    Misrouted {
        /// Addressee in the message
        to: ParticipantId,
        /// This requester
        local: ParticipantId,
    },

    /// Mutual-exclusion message from a participant outside the requester
    /// group.
    #[error("participant {0} is not a requester")]
    NotARequester(ParticipantId),

    /// Second REPLY from the same peer for one request.
    #[error("duplicate reply from {0}")]
    DuplicateReply(ParticipantId),

    /// Advancing the clock past this value would overflow.
    #[error("clock cannot advance past {0}")]
    ClockOverflow(u64),

    /// Message kind not expected in the current state.
    #[error("unexpected {kind:?} from {from} while {state:?}")]
    UnexpectedMessage {
        /// Kind of the rejected message
        kind: MessageKind,
        /// Sender
        from: ParticipantId,
        /// Current state
        state: MutexState,
    },

    /// Pairing operation out of order.
    #[error("pairing: {0}")]
    Pairing(#[from] PairingError),
}

/// Pairing coordinator misuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PairingError {
    /// A pairing scan is already running for this occupancy.
    #[error("pairing already started")]
    AlreadyStarted,

    /// No pairing scan has been started.
    #[error("pairing not started")]
    NotStarted,

    /// Response from a responder that was not asked.
    #[error("response from {from}, awaiting {awaiting:?}")]
    UnexpectedResponder {
        /// Sender of the response
        from: ParticipantId,
        /// Responder the coordinator is waiting on
        awaiting: Option<ParticipantId>,
    },

    /// `end` without an accepted pairing.
    #[error("no active pairing to end")]
    NotPaired,

    /// Release attempted before the scan finished.
    #[error("pairing still in progress")]
    InProgress,
}

/// Errors returned by [`crate::responder::Responder`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResponderError {
    /// Message addressed to someone else.
    #[error("message for participant {to} delivered to {local}")]
    Misrouted {
        /// Addressee in the message
        to: ParticipantId,
        /// This responder
        local: ParticipantId,
    },

    /// Sender is not in the requester group.
    #[error("participant {0} is not a requester")]
    NotARequester(ParticipantId),

    /// `PairEnd` that does not match the current partner.
    #[error("pair end from {from} while {occupancy:?}")]
    UnexpectedEnd {
        /// Sender
        from: ParticipantId,
        /// Current occupancy
        occupancy: Occupancy,
    },

    /// Kind a responder never handles.
    #[error("responder cannot handle {kind:?} from {from}")]
    UnexpectedMessage {
        /// Kind of the rejected message
        kind: MessageKind,
        /// Sender
        from: ParticipantId,
    },
}
