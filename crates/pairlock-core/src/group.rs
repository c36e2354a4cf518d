//! Static group layout.
//!
//! Participants `[0, requesters)` compete for the critical section;
//! participants `[requesters, participants)` are responders. The layout is
//! fixed for the lifetime of a run.

use std::ops::Range;

use pairlock_proto::ParticipantId;

use crate::error::GroupError;

/// Role of a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Competes for the critical section
    Requester,
    /// Offers a single pairable slot
    Responder,
}

/// Validated group layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupConfig {
    participants: u32,
    requesters: u32,
}

impl GroupConfig {
    /// Layout with `requesters` requesters out of `participants`.
    pub fn new(participants: u32, requesters: u32) -> Result<Self, GroupError> {
        if requesters == 0 {
            return Err(GroupError::NoRequesters);
        }
        if requesters > participants {
            return Err(GroupError::TooManyRequesters { requesters, participants });
        }
        Ok(Self { participants, requesters })
    }

    /// Half requesters (rounded down), half responders.
    pub fn split_evenly(participants: u32) -> Result<Self, GroupError> {
        Self::new(participants, participants / 2)
    }

    /// Total participant count.
    pub fn participants(&self) -> u32 {
        self.participants
    }

    /// Requester group size.
    pub fn requester_count(&self) -> u32 {
        self.requesters
    }

    /// Responder group size.
    pub fn responder_count(&self) -> u32 {
        self.participants - self.requesters
    }

    /// Requester IDs.
    pub fn requesters(&self) -> Range<ParticipantId> {
        0..self.requesters
    }

    /// Responder IDs, in scan order.
    pub fn responders(&self) -> Range<ParticipantId> {
        self.requesters..self.participants
    }

    /// Every other requester.
    pub fn peers_of(&self, id: ParticipantId) -> impl Iterator<Item = ParticipantId> + use<> {
        self.requesters().filter(move |&peer| peer != id)
    }

    /// Role of `id`.
    pub fn role(&self, id: ParticipantId) -> Result<Role, GroupError> {
        if id < self.requesters {
            Ok(Role::Requester)
        } else if id < self.participants {
            Ok(Role::Responder)
        } else {
            Err(GroupError::UnknownParticipant { id, participants: self.participants })
        }
    }

    /// Whether `id` is a requester.
    pub fn is_requester(&self, id: ParticipantId) -> bool {
        matches!(self.role(id), Ok(Role::Requester))
    }

    /// Fail unless `id` has `role`.
    pub fn expect_role(&self, id: ParticipantId, role: Role) -> Result<(), GroupError> {
        if self.role(id)? == role {
            Ok(())
        } else {
            let expected = match role {
                Role::Requester => "requester",
                Role::Responder => "responder",
            };
            Err(GroupError::WrongRole { id, expected })
        }
    }
}
