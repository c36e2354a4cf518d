//! Pairing coordinator.
//!
//! Runs while a requester holds the critical section. Responders are tried
//! one at a time in ID order; the coordinator stops at the first
//! `PairAccept` or when it runs out of candidates. Each scan produces at most
//! one pairing.
//!
//! ```text
//! ┌──────┐ start ┌──────────────┐ PairAccept ┌────────┐ end ┌──────────┐
//! │ Idle │──────>│ Awaiting(r)  │───────────>│ Paired │────>│ Complete │
//! └──────┘       └──────────────┘            └────────┘     └──────────┘
//!                  │  ↑      │ no candidates left                ↑
//!                  └──┘      └───────────────────────────────────┘
//!                PairDeny
//! ```
//!
//! The [`PairingRecord`] outlives the coordinator: it belongs to the
//! requester and persists across critical-section visits, so a responder
//! that already paired with this requester is never asked again.

use std::collections::{BTreeMap, VecDeque};

use pairlock_proto::{Body, Message, ParticipantId};

use crate::error::PairingError;

/// What to remember about a denied responder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PairingPolicy {
    /// Only successful pairings are recorded; denied responders are tried
    /// again on later visits.
    #[default]
    RetryDenied,
    /// Denials are recorded too, so every responder is asked at most once.
    RecordDenied,
}

/// Outcome of a recorded attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Responder accepted
    Accepted,
    /// Responder denied
    Denied,
}

/// Responders this requester has already attempted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairingRecord {
    attempts: BTreeMap<ParticipantId, AttemptOutcome>,
}

impl PairingRecord {
    /// Empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `responder` must be skipped.
    pub fn is_attempted(&self, responder: ParticipantId) -> bool {
        self.attempts.contains_key(&responder)
    }

    /// Responders this requester has paired with.
    pub fn paired(&self) -> impl Iterator<Item = ParticipantId> + '_ {
        self.attempts
            .iter()
            .filter(|(_, outcome)| **outcome == AttemptOutcome::Accepted)
            .map(|(id, _)| *id)
    }

    fn record(&mut self, responder: ParticipantId, outcome: AttemptOutcome) {
        self.attempts.insert(responder, outcome);
    }
}

/// Coordinator progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingStatus {
    /// Not started
    Idle,
    /// `PairRequest` sent, waiting on this responder
    Awaiting(ParticipantId),
    /// Responder accepted; `end` releases it
    Paired(ParticipantId),
    /// Scan finished, with the responder that was paired, if any
    Complete(Option<ParticipantId>),
}

/// Next thing the driver has to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingStep {
    /// Send this `PairRequest` and wait for the responder's answer.
    Request(Message),
    /// Responder accepted. Hold the pairing, then call `end`.
    Paired(ParticipantId),
    /// Nobody accepted. The scan is complete.
    Exhausted,
}

/// Single scan over the responder pool.
#[derive(Debug, Clone)]
pub struct PairingCoordinator {
    local: ParticipantId,
    policy: PairingPolicy,
    candidates: VecDeque<ParticipantId>,
    status: PairingStatus,
}

impl PairingCoordinator {
    /// Coordinator for `local` over `responders`, skipping those in
    /// `record`.
    pub fn new(
        local: ParticipantId,
        responders: impl IntoIterator<Item = ParticipantId>,
        record: &PairingRecord,
        policy: PairingPolicy,
    ) -> Self {
        let candidates = responders.into_iter().filter(|r| !record.is_attempted(*r)).collect();
        Self { local, policy, candidates, status: PairingStatus::Idle }
    }

    /// Current status.
    pub fn status(&self) -> PairingStatus {
        self.status
    }

    /// Whether the scan is over.
    pub fn is_complete(&self) -> bool {
        matches!(self.status, PairingStatus::Complete(_))
    }

    /// Ask the first candidate.
    pub fn start(&mut self) -> Result<PairingStep, PairingError> {
        if self.status != PairingStatus::Idle {
            return Err(PairingError::AlreadyStarted);
        }
        Ok(self.advance())
    }

    /// Apply a `PairAccept` or `PairDeny` from the awaited responder.
    ///
    /// Any other body is treated as a denial.
    pub fn handle_response(
        &mut self,
        message: &Message,
        record: &mut PairingRecord,
    ) -> Result<PairingStep, PairingError> {
        let awaiting = match self.status {
            PairingStatus::Awaiting(responder) => responder,
            PairingStatus::Idle => return Err(PairingError::NotStarted),
            PairingStatus::Paired(_) | PairingStatus::Complete(_) => {
                return Err(PairingError::UnexpectedResponder {
                    from: message.from,
                    awaiting: None,
                });
            },
        };
        if message.from != awaiting {
            return Err(PairingError::UnexpectedResponder {
                from: message.from,
                awaiting: Some(awaiting),
            });
        }

        if message.body == Body::PairAccept {
            record.record(awaiting, AttemptOutcome::Accepted);
            self.status = PairingStatus::Paired(awaiting);
            return Ok(PairingStep::Paired(awaiting));
        }

        if self.policy == PairingPolicy::RecordDenied {
            record.record(awaiting, AttemptOutcome::Denied);
        }
        Ok(self.advance())
    }

    /// Release the paired responder.
    ///
    /// Returns the `PairEnd` to send.
    pub fn end(&mut self) -> Result<Message, PairingError> {
        let PairingStatus::Paired(responder) = self.status else {
            return Err(PairingError::NotPaired);
        };
        self.status = PairingStatus::Complete(Some(responder));
        Ok(Message::new(self.local, responder, Body::PairEnd))
    }

    fn advance(&mut self) -> PairingStep {
        match self.candidates.pop_front() {
            Some(responder) => {
                self.status = PairingStatus::Awaiting(responder);
                PairingStep::Request(Message::new(self.local, responder, Body::PairRequest))
            },
            None => {
                self.status = PairingStatus::Complete(None);
                PairingStep::Exhausted
            },
        }
    }
}
