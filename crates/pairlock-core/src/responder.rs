//! Responder state machine.
//!
//! A responder is a single pairable slot. It has no priority logic and knows
//! nothing about other responders.
//!
//! ```text
//!               PairRequest(r) / PairAccept
//! ┌──────┐ ─────────────────────────────────> ┌───────────┐
//! │ Free │                                    │ Paired(r) │ ── PairRequest(x) / PairDeny
//! └──────┘ <───────────────────────────────── └───────────┘
//!                      PairEnd(r)
//! ```

use pairlock_proto::{Body, Message, ParticipantId};
use tracing::debug;

use crate::{
    error::{GroupError, ResponderError},
    group::{GroupConfig, Role},
};

/// Responder slot state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Occupancy {
    /// Available
    Free,
    /// Bound to `partner` until it sends `PairEnd`
    Paired {
        /// Requester holding the slot
        partner: ParticipantId,
    },
}

/// Actions returned by the responder state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponderAction {
    /// Send this message.
    Send(Message),
    /// Slot taken by `partner`.
    Paired {
        /// New partner
        partner: ParticipantId,
    },
    /// Slot released by `partner`.
    Freed {
        /// Former partner
        partner: ParticipantId,
    },
}

/// One responder's protocol state.
#[derive(Debug, Clone)]
pub struct Responder {
    id: ParticipantId,
    group: GroupConfig,
    occupancy: Occupancy,
    pairings: u64,
}

impl Responder {
    /// Responder `id` in `group`.
    pub fn new(id: ParticipantId, group: GroupConfig) -> Result<Self, GroupError> {
        group.expect_role(id, Role::Responder)?;
        Ok(Self { id, group, occupancy: Occupancy::Free, pairings: 0 })
    }

    /// This responder's ID.
    pub fn id(&self) -> ParticipantId {
        self.id
    }

    /// Current partner, if paired.
    pub fn partner(&self) -> Option<ParticipantId> {
        match self.occupancy {
            Occupancy::Free => None,
            Occupancy::Paired { partner } => Some(partner),
        }
    }

    /// Pairings accepted so far.
    pub fn pairings(&self) -> u64 {
        self.pairings
    }

    /// Process one inbound message.
    pub fn handle_message(
        &mut self,
        message: &Message,
    ) -> Result<Vec<ResponderAction>, ResponderError> {
        if message.to != self.id {
            return Err(ResponderError::Misrouted { to: message.to, local: self.id });
        }
        let from = message.from;
        if !message.kind().is_pairing() {
            return Err(ResponderError::UnexpectedMessage { kind: message.kind(), from });
        }
        if !self.group.is_requester(from) {
            return Err(ResponderError::NotARequester(from));
        }

        match (message.body, self.occupancy) {
            (Body::PairRequest, Occupancy::Free) => {
                self.occupancy = Occupancy::Paired { partner: from };
                self.pairings += 1;
                debug!(responder = self.id, partner = from, "paired");
                Ok(vec![
                    ResponderAction::Send(Message::new(self.id, from, Body::PairAccept)),
                    ResponderAction::Paired { partner: from },
                ])
            },
            (Body::PairRequest, Occupancy::Paired { partner }) => {
                debug!(responder = self.id, requester = from, partner, "busy, denying");
                Ok(vec![ResponderAction::Send(Message::new(self.id, from, Body::PairDeny))])
            },
            (Body::PairEnd, Occupancy::Paired { partner }) if partner == from => {
                self.occupancy = Occupancy::Free;
                debug!(responder = self.id, partner, "pairing ended");
                Ok(vec![ResponderAction::Freed { partner }])
            },
            (Body::PairEnd, occupancy) => {
                Err(ResponderError::UnexpectedEnd { from, occupancy })
            },
            (body, _) => Err(ResponderError::UnexpectedMessage { kind: body.kind(), from }),
        }
    }
}
