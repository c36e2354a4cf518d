//! World state for scenario execution.
//!
//! The World owns every participant's state machine and one FIFO queue per
//! ordered (sender, receiver) pair. Nothing happens unless the World is told
//! to take a step, so runs are fully deterministic for a given seed and
//! script.
//!
//! Every action the state machines produce is recorded as a [`RunEvent`],
//! the same vocabulary the async runtimes report, so oracles work on both.

use std::collections::{BTreeMap, VecDeque};

use pairlock_app::RunEvent;
use pairlock_core::{
    clock::LamportClock,
    coordinator::{PairingPolicy, PairingStatus},
    group::GroupConfig,
    requester::{MutexState, Requester, RequesterAction},
    responder::{Responder, ResponderAction},
};
use pairlock_proto::{Body, Message, ParticipantId};
use rand::Rng;

/// A local operation the scheduler can take on a requester.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LocalStep {
    Request,
    BeginPairing,
    EndPairing,
    Release,
}

/// One schedulable move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Move {
    Local(ParticipantId, LocalStep),
    Deliver(ParticipantId, ParticipantId),
}

/// World state containing all participants and in-flight messages.
pub struct World {
    group: GroupConfig,
    policy: PairingPolicy,
    requesters: BTreeMap<ParticipantId, Requester>,
    responders: BTreeMap<ParticipantId, Responder>,
    channels: BTreeMap<(ParticipantId, ParticipantId), VecDeque<Message>>,
    events: Vec<RunEvent>,
    cycles: BTreeMap<ParticipantId, u64>,
    target_cycles: u64,
    delivered: u64,
}

impl World {
    /// World for `group` where each requester runs `target_cycles` cycles.
    pub fn new(
        group: GroupConfig,
        policy: PairingPolicy,
        target_cycles: u64,
    ) -> Result<Self, String> {
        let mut requesters = BTreeMap::new();
        for id in group.requesters() {
            let requester = Requester::new(id, group).map_err(|e| e.to_string())?;
            requesters.insert(id, requester.with_policy(policy));
        }
        let mut responders = BTreeMap::new();
        for id in group.responders() {
            responders.insert(id, Responder::new(id, group).map_err(|e| e.to_string())?);
        }

        Ok(Self {
            group,
            policy,
            requesters,
            responders,
            channels: BTreeMap::new(),
            events: Vec::new(),
            cycles: BTreeMap::new(),
            target_cycles,
            delivered: 0,
        })
    }

    /// Start requester `id` with its clock at `value`.
    ///
    /// Only allowed before the requester has done anything.
    pub fn set_clock(&mut self, id: ParticipantId, value: u64) -> Result<(), String> {
        let requester = self.requester(id).ok_or_else(|| format!("{id} is not a requester"))?;
        if requester.state() != MutexState::Released || requester.clock() != 0 {
            return Err(format!("requester {id} already started"));
        }

        let fresh = Requester::new(id, self.group)
            .map_err(|e| e.to_string())?
            .with_clock(LamportClock::starting_at(value))
            .with_policy(self.policy);
        self.requesters.insert(id, fresh);
        Ok(())
    }

    /// Group layout.
    pub fn group(&self) -> GroupConfig {
        self.group
    }

    /// Requester state machine.
    pub fn requester(&self, id: ParticipantId) -> Option<&Requester> {
        self.requesters.get(&id)
    }

    /// Responder state machine.
    pub fn responder(&self, id: ParticipantId) -> Option<&Responder> {
        self.responders.get(&id)
    }

    /// Everything recorded so far, in order.
    pub fn events(&self) -> &[RunEvent] {
        &self.events
    }

    /// Cycles completed by requester `id`.
    pub fn cycles(&self, id: ParticipantId) -> u64 {
        self.cycles.get(&id).copied().unwrap_or(0)
    }

    /// Cycles each requester is scheduled to run.
    pub fn target_cycles(&self) -> u64 {
        self.target_cycles
    }

    /// Messages queued from `from` to `to`, oldest first.
    pub fn pending(&self, from: ParticipantId, to: ParticipantId) -> impl Iterator<Item = &Message> {
        self.channels.get(&(from, to)).into_iter().flatten()
    }

    /// Messages queued anywhere.
    pub fn in_flight(&self) -> usize {
        self.channels.values().map(VecDeque::len).sum()
    }

    /// Messages delivered so far.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Requester IDs in order of critical-section entry.
    pub fn entry_order(&self) -> Vec<ParticipantId> {
        self.events
            .iter()
            .filter_map(|event| match event {
                RunEvent::Entered { requester, .. } => Some(*requester),
                _ => None,
            })
            .collect()
    }

    /// Have `id` request the critical section.
    pub fn request(&mut self, id: ParticipantId) -> Result<(), String> {
        let requester = self.requester_mut(id)?;
        let actions = requester.request().map_err(|e| format!("{id} request: {e}"))?;
        if let Some(stamp) = requester.stamp() {
            self.events.push(RunEvent::Requested { requester: id, stamp });
        }
        self.apply_requester(id, actions);
        Ok(())
    }

    /// Have `id` start its pairing scan.
    pub fn begin_pairing(&mut self, id: ParticipantId) -> Result<(), String> {
        let actions = self
            .requester_mut(id)?
            .begin_pairing()
            .map_err(|e| format!("{id} begin pairing: {e}"))?;
        self.apply_requester(id, actions);
        Ok(())
    }

    /// Have `id` release its paired responder.
    pub fn end_pairing(&mut self, id: ParticipantId) -> Result<(), String> {
        let actions =
            self.requester_mut(id)?.end_pairing().map_err(|e| format!("{id} end pairing: {e}"))?;
        self.apply_requester(id, actions);
        Ok(())
    }

    /// Have `id` leave the critical section.
    pub fn release(&mut self, id: ParticipantId) -> Result<(), String> {
        let actions =
            self.requester_mut(id)?.release().map_err(|e| format!("{id} release: {e}"))?;
        let replied = actions
            .iter()
            .filter_map(|action| match action {
                RequesterAction::Send(message) => Some(message.to),
                _ => None,
            })
            .collect();
        self.events.push(RunEvent::Exited { requester: id, replied });
        self.apply_requester(id, actions);

        let cycles = self.cycles.entry(id).or_insert(0);
        *cycles += 1;
        if *cycles == self.target_cycles {
            let cycles = *cycles;
            self.events.push(RunEvent::CyclesCompleted { requester: id, cycles });
        }
        Ok(())
    }

    /// Deliver the oldest message from `from` to `to`.
    ///
    /// Returns `false` when that queue is empty. A rejected message fails the
    /// run: a correct group never produces one.
    pub fn deliver(&mut self, from: ParticipantId, to: ParticipantId) -> Result<bool, String> {
        let Some(message) = self.channels.get_mut(&(from, to)).and_then(VecDeque::pop_front)
        else {
            return Ok(false);
        };
        self.delivered += 1;

        if let Some(requester) = self.requesters.get_mut(&to) {
            let actions = requester
                .handle_message(&message)
                .map_err(|e| format!("requester {to} rejected {message:?}: {e}"))?;
            self.apply_requester(to, actions);
        } else if let Some(responder) = self.responders.get_mut(&to) {
            let actions = responder
                .handle_message(&message)
                .map_err(|e| format!("responder {to} rejected {message:?}: {e}"))?;
            self.apply_responder(to, actions);
        } else {
            return Err(format!("message to unknown participant {to}"));
        }
        Ok(true)
    }

    /// Deliver until every queue is empty, lowest queue first.
    pub fn deliver_all(&mut self) -> Result<u64, String> {
        let before = self.delivered;
        loop {
            let next =
                self.channels.iter().find(|(_, queue)| !queue.is_empty()).map(|(&pair, _)| pair);
            let Some((from, to)) = next else {
                break;
            };
            self.deliver(from, to)?;
        }
        Ok(self.delivered - before)
    }

    /// Take one randomly chosen enabled move.
    ///
    /// Returns `false` when nothing is enabled.
    pub fn step(&mut self, rng: &mut impl Rng) -> Result<bool, String> {
        let moves = self.enabled_moves();
        if moves.is_empty() {
            return Ok(false);
        }

        match moves[rng.gen_range(0..moves.len())] {
            Move::Deliver(from, to) => {
                self.deliver(from, to)?;
            },
            Move::Local(id, LocalStep::Request) => self.request(id)?,
            Move::Local(id, LocalStep::BeginPairing) => self.begin_pairing(id)?,
            Move::Local(id, LocalStep::EndPairing) => self.end_pairing(id)?,
            Move::Local(id, LocalStep::Release) => self.release(id)?,
        }
        Ok(true)
    }

    /// Step until nothing is enabled.
    pub fn run(&mut self, rng: &mut impl Rng, max_steps: usize) -> Result<usize, String> {
        for taken in 0..max_steps {
            if !self.step(rng)? {
                return Ok(taken);
            }
        }
        Err(format!("still running after {max_steps} steps"))
    }

    fn enabled_moves(&self) -> Vec<Move> {
        let mut moves = Vec::new();

        for (&id, requester) in &self.requesters {
            let step = match (requester.state(), requester.pairing_status()) {
                (MutexState::Released, _) if self.cycles(id) < self.target_cycles => {
                    Some(LocalStep::Request)
                },
                (MutexState::Held, PairingStatus::Idle) => Some(LocalStep::BeginPairing),
                (MutexState::Held, PairingStatus::Paired(_)) => Some(LocalStep::EndPairing),
                (MutexState::Held, PairingStatus::Complete(_)) => Some(LocalStep::Release),
                _ => None,
            };
            if let Some(step) = step {
                moves.push(Move::Local(id, step));
            }
        }

        for (&(from, to), queue) in &self.channels {
            if !queue.is_empty() {
                moves.push(Move::Deliver(from, to));
            }
        }
        moves
    }

    fn requester_mut(&mut self, id: ParticipantId) -> Result<&mut Requester, String> {
        self.requesters.get_mut(&id).ok_or_else(|| format!("{id} is not a requester"))
    }

    fn enqueue(&mut self, message: Message) {
        self.channels.entry((message.from, message.to)).or_default().push_back(message);
    }

    fn apply_requester(&mut self, id: ParticipantId, actions: Vec<RequesterAction>) {
        for action in actions {
            match action {
                RequesterAction::Send(message) => self.enqueue(message),
                RequesterAction::Deferred { peer } => {
                    self.events.push(RunEvent::Deferred { requester: id, peer });
                },
                RequesterAction::EnterCriticalSection { stamp } => {
                    self.events.push(RunEvent::Entered { requester: id, stamp });
                },
                RequesterAction::Paired { responder } => {
                    self.events.push(RunEvent::Paired { requester: id, responder });
                },
                RequesterAction::PairingComplete { responder: None } => {
                    self.events.push(RunEvent::Unpaired { requester: id });
                },
                RequesterAction::PairingComplete { responder: Some(_) } => {},
            }
        }
    }

    fn apply_responder(&mut self, id: ParticipantId, actions: Vec<ResponderAction>) {
        for action in actions {
            match action {
                ResponderAction::Send(message) => {
                    if message.body == Body::PairDeny {
                        self.events.push(RunEvent::Denied { responder: id, requester: message.to });
                    }
                    self.enqueue(message);
                },
                ResponderAction::Paired { partner } => {
                    self.events.push(RunEvent::Accepted { responder: id, partner });
                },
                ResponderAction::Freed { partner } => {
                    self.events.push(RunEvent::Freed { responder: id, partner });
                },
            }
        }
    }
}
