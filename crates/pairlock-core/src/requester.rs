//! Requester state machine (Ricart–Agrawala).
//!
//! # Architecture: Action-Based State Machine
//!
//! Methods never perform I/O. Each returns the [`RequesterAction`]s the
//! driver must carry out, in order. The driver feeds every inbound message
//! to [`Requester::handle_message`] regardless of kind, which keeps a single
//! dispatch point for replies, peer requests and pairing responses.
//!
//! # State Machine
//!
//! ```text
//!            request()                  last Reply
//! ┌──────────┐  broadcast  ┌────────┐  (A-1 total)  ┌──────┐
//! │ Released │────────────>│ Wanted │──────────────>│ Held │
//! └──────────┘             └────────┘               └──────┘
//!      ↑                                               │
//!      └─────────── release(): flush deferred ─────────┘
//! ```
//!
//! # Deferral rule
//!
//! An inbound `Request(c)` from `p` is observed on the clock first. Then:
//!
//! - **Released**: reply immediately.
//! - **Wanted**: defer if our stamp precedes `(c, p)`, otherwise reply.
//! - **Held**: defer.
//!
//! Deferred peers get their `Reply` when the section is released, exactly
//! once each.

use std::collections::BTreeSet;

use pairlock_proto::{Body, Message, MessageKind, ParticipantId};
use tracing::debug;

use crate::{
    clock::{LamportClock, RequestStamp},
    coordinator::{PairingCoordinator, PairingPolicy, PairingRecord, PairingStatus, PairingStep},
    error::{GroupError, PairingError, RequesterError},
    group::{GroupConfig, Role},
};

/// Mutual-exclusion state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutexState {
    /// Not interested in the critical section
    Released,
    /// Request broadcast, collecting replies
    Wanted,
    /// Inside the critical section
    Held,
}

/// Actions returned by the requester state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequesterAction {
    /// Send this message.
    Send(Message),
    /// `peer`'s request was queued until release.
    Deferred {
        /// Peer whose reply is withheld
        peer: ParticipantId,
    },
    /// All replies are in; the critical section is ours.
    EnterCriticalSection {
        /// Stamp of the request that was granted
        stamp: RequestStamp,
    },
    /// A responder accepted. Hold the pairing, then call
    /// [`Requester::end_pairing`].
    Paired {
        /// Accepting responder
        responder: ParticipantId,
    },
    /// The pairing scan for this visit is over.
    PairingComplete {
        /// Responder that was paired, if any
        responder: Option<ParticipantId>,
    },
}

/// One requester's protocol state.
#[derive(Debug, Clone)]
pub struct Requester {
    id: ParticipantId,
    group: GroupConfig,
    policy: PairingPolicy,
    clock: LamportClock,
    state: MutexState,
    stamp: Option<RequestStamp>,
    replies: BTreeSet<ParticipantId>,
    deferred: Vec<ParticipantId>,
    record: PairingRecord,
    pairing: Option<PairingCoordinator>,
}

impl Requester {
    /// Requester `id` in `group`, clock at zero.
    pub fn new(id: ParticipantId, group: GroupConfig) -> Result<Self, GroupError> {
        group.expect_role(id, Role::Requester)?;
        Ok(Self {
            id,
            group,
            policy: PairingPolicy::default(),
            clock: LamportClock::new(),
            state: MutexState::Released,
            stamp: None,
            replies: BTreeSet::new(),
            deferred: Vec::new(),
            record: PairingRecord::new(),
            pairing: None,
        })
    }

    /// Start from a given clock.
    #[must_use]
    pub fn with_clock(mut self, clock: LamportClock) -> Self {
        self.clock = clock;
        self
    }

    /// Use `policy` for denied responders.
    #[must_use]
    pub fn with_policy(mut self, policy: PairingPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// This requester's ID.
    pub fn id(&self) -> ParticipantId {
        self.id
    }

    /// Current state.
    pub fn state(&self) -> MutexState {
        self.state
    }

    /// Current clock value.
    pub fn clock(&self) -> u64 {
        self.clock.now()
    }

    /// Stamp of the live request.
    pub fn stamp(&self) -> Option<RequestStamp> {
        self.stamp
    }

    /// Peers waiting for our reply, in arrival order.
    pub fn deferred(&self) -> &[ParticipantId] {
        &self.deferred
    }

    /// Replies needed to enter the critical section.
    pub fn replies_needed(&self) -> usize {
        self.group.requester_count() as usize - 1
    }

    /// Responders attempted so far.
    pub fn pairing_record(&self) -> &PairingRecord {
        &self.record
    }

    /// Progress of this visit's pairing scan.
    pub fn pairing_status(&self) -> PairingStatus {
        self.pairing.as_ref().map_or(PairingStatus::Idle, PairingCoordinator::status)
    }

    /// Ask for the critical section.
    ///
    /// Ticks the clock, records the stamp and broadcasts `Request` to every
    /// other requester. Enters immediately when there are no peers.
    pub fn request(&mut self) -> Result<Vec<RequesterAction>, RequesterError> {
        if self.state != MutexState::Released {
            return Err(RequesterError::InvalidState { state: self.state, operation: "request" });
        }

        let clock = self.clock.tick().ok_or(RequesterError::ClockOverflow(self.clock.now()))?;
        let stamp = RequestStamp::new(clock, self.id);
        self.stamp = Some(stamp);
        self.state = MutexState::Wanted;
        self.replies.clear();
        debug!(requester = self.id, %stamp, "requesting critical section");

        let mut actions: Vec<_> = self
            .group
            .peers_of(self.id)
            .map(|peer| RequesterAction::Send(Message::new(self.id, peer, Body::Request { clock })))
            .collect();
        self.try_enter(&mut actions);
        Ok(actions)
    }

    /// Process one inbound message.
    ///
    /// On error the message is rejected and the state is unchanged.
    pub fn handle_message(
        &mut self,
        message: &Message,
    ) -> Result<Vec<RequesterAction>, RequesterError> {
        if message.to != self.id {
            return Err(RequesterError::Misrouted { to: message.to, local: self.id });
        }
        if message.from == self.id {
            return Err(RequesterError::SelfMessage { kind: message.kind() });
        }
        if message.kind().is_mutex() && !self.group.is_requester(message.from) {
            return Err(RequesterError::NotARequester(message.from));
        }

        match message.body {
            Body::Request { clock } => self.handle_request(message.from, clock),
            Body::Reply { clock } => self.handle_reply(message.from, clock),
            Body::PairAccept | Body::PairDeny => self.handle_pairing_response(message),
            Body::PairRequest | Body::PairEnd => Err(RequesterError::UnexpectedMessage {
                kind: message.kind(),
                from: message.from,
                state: self.state,
            }),
        }
    }

    /// Start this visit's pairing scan.
    pub fn begin_pairing(&mut self) -> Result<Vec<RequesterAction>, RequesterError> {
        if self.state != MutexState::Held {
            return Err(RequesterError::InvalidState {
                state: self.state,
                operation: "begin pairing",
            });
        }
        if self.pairing.is_some() {
            return Err(PairingError::AlreadyStarted.into());
        }

        let mut coordinator =
            PairingCoordinator::new(self.id, self.group.responders(), &self.record, self.policy);
        let step = coordinator.start()?;
        self.pairing = Some(coordinator);
        Ok(Self::pairing_actions(step))
    }

    /// Release the paired responder.
    pub fn end_pairing(&mut self) -> Result<Vec<RequesterAction>, RequesterError> {
        let coordinator = self.pairing.as_mut().ok_or(PairingError::NotStarted)?;
        let end = coordinator.end()?;
        debug!(requester = self.id, responder = end.to, "ending pairing");
        Ok(vec![
            RequesterAction::Send(end),
            RequesterAction::PairingComplete { responder: Some(end.to) },
        ])
    }

    /// Leave the critical section and reply to every deferred peer.
    pub fn release(&mut self) -> Result<Vec<RequesterAction>, RequesterError> {
        if self.state != MutexState::Held {
            return Err(RequesterError::InvalidState { state: self.state, operation: "release" });
        }
        if self.pairing.as_ref().is_some_and(|p| !p.is_complete()) {
            return Err(PairingError::InProgress.into());
        }

        self.state = MutexState::Released;
        self.stamp = None;
        self.replies.clear();
        self.pairing = None;

        let clock = self.clock.now();
        let id = self.id;
        debug!(requester = id, deferred = ?self.deferred, "releasing critical section");
        Ok(self
            .deferred
            .drain(..)
            .map(|peer| RequesterAction::Send(Message::new(id, peer, Body::Reply { clock })))
            .collect())
    }

    fn handle_request(
        &mut self,
        from: ParticipantId,
        clock: u64,
    ) -> Result<Vec<RequesterAction>, RequesterError> {
        self.observe(clock)?;
        let incoming = RequestStamp::new(clock, from);
        let defer = match self.state {
            MutexState::Released => false,
            MutexState::Wanted => self.stamp.is_some_and(|own| own.precedes(&incoming)),
            MutexState::Held => true,
        };

        if defer {
            debug!(requester = self.id, peer = from, %incoming, "deferring reply");
            self.deferred.push(from);
            return Ok(vec![RequesterAction::Deferred { peer: from }]);
        }

        let reply = Message::new(self.id, from, Body::Reply { clock: self.clock.now() });
        Ok(vec![RequesterAction::Send(reply)])
    }

    fn handle_reply(
        &mut self,
        from: ParticipantId,
        clock: u64,
    ) -> Result<Vec<RequesterAction>, RequesterError> {
        // Stray and duplicate replies are dropped before the clock sees them,
        // so a rejected message never changes state.
        if self.state != MutexState::Wanted {
            return Err(RequesterError::UnexpectedMessage {
                kind: MessageKind::Reply,
                from,
                state: self.state,
            });
        }
        if self.replies.contains(&from) {
            return Err(RequesterError::DuplicateReply(from));
        }

        self.observe(clock)?;
        self.replies.insert(from);

        let mut actions = Vec::new();
        self.try_enter(&mut actions);
        Ok(actions)
    }

    fn handle_pairing_response(
        &mut self,
        message: &Message,
    ) -> Result<Vec<RequesterAction>, RequesterError> {
        let Some(coordinator) = self.pairing.as_mut() else {
            return Err(RequesterError::UnexpectedMessage {
                kind: message.kind(),
                from: message.from,
                state: self.state,
            });
        };
        let step = coordinator.handle_response(message, &mut self.record)?;
        Ok(Self::pairing_actions(step))
    }

    fn observe(&mut self, remote: u64) -> Result<(), RequesterError> {
        match self.clock.observe(remote) {
            Some(_) => Ok(()),
            None => Err(RequesterError::ClockOverflow(remote.max(self.clock.now()))),
        }
    }

    fn try_enter(&mut self, actions: &mut Vec<RequesterAction>) {
        if self.state != MutexState::Wanted || self.replies.len() < self.replies_needed() {
            return;
        }
        if let Some(stamp) = self.stamp {
            self.state = MutexState::Held;
            debug!(requester = self.id, %stamp, "entered critical section");
            actions.push(RequesterAction::EnterCriticalSection { stamp });
        }
    }

    fn pairing_actions(step: PairingStep) -> Vec<RequesterAction> {
        match step {
            PairingStep::Request(message) => vec![RequesterAction::Send(message)],
            PairingStep::Paired(responder) => vec![RequesterAction::Paired { responder }],
            PairingStep::Exhausted => vec![RequesterAction::PairingComplete { responder: None }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(participants: u32, requesters: u32) -> GroupConfig {
        GroupConfig::new(participants, requesters).unwrap()
    }

    fn request(from: ParticipantId, to: ParticipantId, clock: u64) -> Message {
        Message::new(from, to, Body::Request { clock })
    }

    fn reply(from: ParticipantId, to: ParticipantId, clock: u64) -> Message {
        Message::new(from, to, Body::Reply { clock })
    }

    fn sent(actions: &[RequesterAction]) -> Vec<Message> {
        actions
            .iter()
            .filter_map(|a| match a {
                RequesterAction::Send(m) => Some(*m),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn request_broadcasts_to_peers() {
        let mut r = Requester::new(1, group(5, 3)).unwrap();
        let actions = r.request().unwrap();

        assert_eq!(r.state(), MutexState::Wanted);
        assert_eq!(r.stamp(), Some(RequestStamp::new(1, 1)));
        assert_eq!(sent(&actions), vec![request(1, 0, 1), request(1, 2, 1)]);
    }

    #[test]
    fn lone_requester_enters_immediately() {
        let mut r = Requester::new(0, group(3, 1)).unwrap();
        let actions = r.request().unwrap();

        assert_eq!(r.state(), MutexState::Held);
        assert_eq!(actions, vec![RequesterAction::EnterCriticalSection {
            stamp: RequestStamp::new(1, 0)
        }]);
    }

    #[test]
    fn enters_after_all_replies() {
        let mut r = Requester::new(0, group(3, 3)).unwrap();
        r.request().unwrap();

        assert!(r.handle_message(&reply(1, 0, 4)).unwrap().is_empty());
        assert_eq!(r.state(), MutexState::Wanted);
        assert_eq!(r.replies.len(), 1);

        let actions = r.handle_message(&reply(2, 0, 2)).unwrap();
        assert_eq!(r.state(), MutexState::Held);
        assert!(matches!(actions[..], [RequesterAction::EnterCriticalSection { .. }]));
        assert_eq!(r.clock(), 6, "clock observed both replies");
    }

    #[test]
    fn wanted_defers_lower_priority_and_answers_higher() {
        let mut r = Requester::new(1, group(3, 3)).unwrap().with_clock(LamportClock::starting_at(4));
        r.request().unwrap();

        // (7, 0) loses against our (5, 1)
        let actions = r.handle_message(&request(0, 1, 7)).unwrap();
        assert_eq!(actions, vec![RequesterAction::Deferred { peer: 0 }]);

        // (3, 2) beats (5, 1)
        let actions = r.handle_message(&request(2, 1, 3)).unwrap();
        assert_eq!(sent(&actions), vec![reply(1, 2, 9)]);
        assert_eq!(r.deferred(), &[0]);
    }

    #[test]
    fn equal_clocks_defer_to_lower_id() {
        let mut r0 = Requester::new(0, group(2, 2)).unwrap();
        let mut r1 = Requester::new(1, group(2, 2)).unwrap();
        r0.request().unwrap();
        r1.request().unwrap();

        assert_eq!(r0.handle_message(&request(1, 0, 1)).unwrap(), vec![
            RequesterAction::Deferred { peer: 1 }
        ]);
        assert_eq!(sent(&r1.handle_message(&request(0, 1, 1)).unwrap()), vec![reply(1, 0, 2)]);
    }

    #[test]
    fn released_replies_and_held_defers() {
        let mut r = Requester::new(0, group(2, 2)).unwrap();
        assert_eq!(sent(&r.handle_message(&request(1, 0, 10)).unwrap()), vec![reply(0, 1, 11)]);

        r.request().unwrap();
        r.handle_message(&reply(1, 0, 12)).unwrap();
        assert_eq!(r.state(), MutexState::Held);

        // Even a smaller stamp waits while we hold the section
        let actions = r.handle_message(&request(1, 0, 1)).unwrap();
        assert_eq!(actions, vec![RequesterAction::Deferred { peer: 1 }]);
    }

    #[test]
    fn observing_a_request_advances_the_clock() {
        let mut r = Requester::new(0, group(2, 2)).unwrap();
        r.handle_message(&request(1, 0, 41)).unwrap();
        assert!(r.clock() >= 42);
    }

    #[test]
    fn release_flushes_deferred_once() {
        let mut r = Requester::new(0, group(4, 4)).unwrap();
        r.request().unwrap();
        r.handle_message(&request(3, 0, 5)).unwrap();
        r.handle_message(&request(2, 0, 5)).unwrap();
        for peer in 1..4 {
            if r.state() == MutexState::Wanted {
                r.handle_message(&reply(peer, 0, 6)).unwrap();
            }
        }
        assert_eq!(r.state(), MutexState::Held);

        let actions = r.release().unwrap();
        let clock = r.clock();
        assert_eq!(sent(&actions), vec![reply(0, 3, clock), reply(0, 2, clock)]);
        assert!(r.deferred().is_empty());
        assert_eq!(r.state(), MutexState::Released);
        assert_eq!(r.stamp(), None);
        assert_eq!(r.replies.len(), 0);
    }

    #[test]
    fn rejects_self_and_misrouted_messages() {
        let mut r = Requester::new(0, group(2, 2)).unwrap();
        assert_eq!(
            r.handle_message(&request(0, 0, 3)),
            Err(RequesterError::SelfMessage { kind: MessageKind::Request })
        );
        assert_eq!(
            r.handle_message(&request(0, 1, 3)),
            Err(RequesterError::Misrouted { to: 1, local: 0 })
        );
        assert_eq!(r.clock(), 0, "rejected messages leave the clock alone");
    }

    #[test]
    fn rejects_stray_replies() {
        let mut r = Requester::new(0, group(3, 3)).unwrap();
        assert!(matches!(
            r.handle_message(&reply(1, 0, 1)),
            Err(RequesterError::UnexpectedMessage { state: MutexState::Released, .. })
        ));

        r.request().unwrap();
        r.handle_message(&reply(1, 0, 1)).unwrap();
        assert_eq!(r.handle_message(&reply(1, 0, 1)), Err(RequesterError::DuplicateReply(1)));
    }

    #[test]
    fn saturating_clock_is_rejected_without_side_effects() {
        let mut r = Requester::new(0, group(2, 2)).unwrap();
        assert_eq!(
            r.handle_message(&request(1, 0, u64::MAX)),
            Err(RequesterError::ClockOverflow(u64::MAX))
        );
        assert_eq!(r.clock(), 0);
        assert!(r.deferred().is_empty());

        r.request().unwrap();
        assert_eq!(
            r.handle_message(&reply(1, 0, u64::MAX)),
            Err(RequesterError::ClockOverflow(u64::MAX))
        );
        assert_eq!(r.clock(), 1);
        assert_eq!(r.replies.len(), 0);
        assert_eq!(r.state(), MutexState::Wanted);

        // The peer's next well-formed reply still lets us in
        r.handle_message(&reply(1, 0, 3)).unwrap();
        assert_eq!(r.state(), MutexState::Held);
    }

    #[test]
    fn request_fails_once_the_clock_is_exhausted() {
        let mut r = Requester::new(0, group(2, 2))
            .unwrap()
            .with_clock(LamportClock::starting_at(u64::MAX));
        assert_eq!(r.request(), Err(RequesterError::ClockOverflow(u64::MAX)));
        assert_eq!(r.state(), MutexState::Released);
        assert_eq!(r.stamp(), None);
    }

    #[test]
    fn rejects_mutex_traffic_from_responders() {
        let mut r = Requester::new(0, group(4, 2)).unwrap();
        assert_eq!(r.handle_message(&request(3, 0, 1)), Err(RequesterError::NotARequester(3)));
        assert_eq!(r.handle_message(&reply(2, 0, 1)), Err(RequesterError::NotARequester(2)));
        assert_eq!(r.clock(), 0);
    }

    #[test]
    fn operations_require_the_right_state() {
        let mut r = Requester::new(0, group(2, 2)).unwrap();
        assert!(matches!(r.release(), Err(RequesterError::InvalidState { .. })));
        assert!(matches!(r.begin_pairing(), Err(RequesterError::InvalidState { .. })));
        r.request().unwrap();
        assert!(matches!(r.request(), Err(RequesterError::InvalidState { .. })));
    }

    #[test]
    fn responder_cannot_be_a_requester() {
        assert!(Requester::new(3, group(4, 2)).is_err());
    }

    #[test]
    fn pairing_runs_inside_the_section() {
        let mut r = Requester::new(0, group(3, 1)).unwrap();
        r.request().unwrap();

        let actions = r.begin_pairing().unwrap();
        assert_eq!(sent(&actions), vec![Message::new(0, 1, Body::PairRequest)]);
        assert_eq!(r.pairing_status(), PairingStatus::Awaiting(1));
        assert_eq!(r.release(), Err(RequesterError::Pairing(PairingError::InProgress)));

        let actions = r.handle_message(&Message::new(1, 0, Body::PairAccept)).unwrap();
        assert_eq!(actions, vec![RequesterAction::Paired { responder: 1 }]);

        let actions = r.end_pairing().unwrap();
        assert_eq!(actions, vec![
            RequesterAction::Send(Message::new(0, 1, Body::PairEnd)),
            RequesterAction::PairingComplete { responder: Some(1) },
        ]);
        r.release().unwrap();
        assert_eq!(r.pairing_status(), PairingStatus::Idle);
    }

    #[test]
    fn later_visit_skips_paired_responder() {
        let mut r = Requester::new(0, group(4, 2)).unwrap();
        r.request().unwrap();
        r.handle_message(&reply(1, 0, 1)).unwrap();
        r.begin_pairing().unwrap();
        r.handle_message(&Message::new(2, 0, Body::PairAccept)).unwrap();
        r.end_pairing().unwrap();
        r.release().unwrap();

        r.request().unwrap();
        r.handle_message(&reply(1, 0, 5)).unwrap();
        let actions = r.begin_pairing().unwrap();
        assert_eq!(sent(&actions), vec![Message::new(0, 3, Body::PairRequest)]);
        assert_eq!(r.pairing_record().paired().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn pairing_responses_outside_a_scan_are_rejected() {
        let mut r = Requester::new(0, group(3, 1)).unwrap();
        assert!(matches!(
            r.handle_message(&Message::new(1, 0, Body::PairAccept)),
            Err(RequesterError::UnexpectedMessage { kind: MessageKind::PairAccept, .. })
        ));
        assert!(matches!(
            r.handle_message(&Message::new(1, 0, Body::PairRequest)),
            Err(RequesterError::UnexpectedMessage { .. })
        ));
    }
}
