//! Run events.
//!
//! Milestones reported by the runtimes. They are emitted before the
//! corresponding messages are sent, so a consumer reading one channel sees
//! them in causal order: a requester's `Exited` always precedes the `Entered`
//! of the peer it unblocked.

use pairlock_core::clock::RequestStamp;
use pairlock_proto::ParticipantId;
use tokio::sync::mpsc;

/// Observable milestone of a participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    /// Request broadcast.
    Requested {
        /// Requester
        requester: ParticipantId,
        /// Stamp of the request
        stamp: RequestStamp,
    },
    /// Reply to a peer held back.
    Deferred {
        /// Requester
        requester: ParticipantId,
        /// Peer whose request was deferred
        peer: ParticipantId,
    },
    /// Critical section entered.
    Entered {
        /// Requester
        requester: ParticipantId,
        /// Stamp that was granted
        stamp: RequestStamp,
    },
    /// Responder accepted the requester.
    Paired {
        /// Requester
        requester: ParticipantId,
        /// Accepting responder
        responder: ParticipantId,
    },
    /// Pairing scan found nobody.
    Unpaired {
        /// Requester
        requester: ParticipantId,
    },
    /// Critical section released.
    Exited {
        /// Requester
        requester: ParticipantId,
        /// Deferred peers that were answered
        replied: Vec<ParticipantId>,
    },
    /// Responder took a partner.
    Accepted {
        /// Responder
        responder: ParticipantId,
        /// New partner
        partner: ParticipantId,
    },
    /// Responder turned a requester away.
    Denied {
        /// Responder
        responder: ParticipantId,
        /// Requester that was denied
        requester: ParticipantId,
    },
    /// Responder slot released.
    Freed {
        /// Responder
        responder: ParticipantId,
        /// Former partner
        partner: ParticipantId,
    },
    /// Requester reached its cycle limit.
    CyclesCompleted {
        /// Requester
        requester: ParticipantId,
        /// Cycles run
        cycles: u64,
    },
}

/// Optional destination for [`RunEvent`]s.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<RunEvent>>,
}

impl EventSink {
    /// Sink that drops everything.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Sink feeding a new channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<RunEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Report `event`. Never blocks; a closed receiver is ignored.
    pub fn emit(&self, event: RunEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
