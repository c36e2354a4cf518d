//! Participant runtimes.
//!
//! Each runtime owns one state machine and one transport endpoint and runs as
//! a single sequential task. All inbound traffic goes through one dispatch
//! point: the requester never blocks on a particular kind, so it can defer or
//! answer peer requests while it waits for replies, waits on a responder, or
//! sleeps through a dwell.

use std::time::Duration;

use pairlock_core::{
    coordinator::PairingStatus,
    env::Environment,
    group::GroupConfig,
    mailbox::MessageFilter,
    requester::{MutexState, Requester, RequesterAction},
    responder::{Responder, ResponderAction},
    transport::Transport,
};
use pairlock_proto::{Body, Message};
use tracing::{debug, info, warn};

use crate::{EventSink, RunEvent, RuntimeConfig, RuntimeError};

/// Drives a [`Requester`] through request/hold/release cycles.
pub struct RequesterRuntime<E, T> {
    requester: Requester,
    env: E,
    transport: T,
    config: RuntimeConfig,
    events: EventSink,
    cycles: u64,
}

impl<E: Environment, T: Transport> RequesterRuntime<E, T> {
    /// Runtime for the requester behind `transport`.
    pub fn new(
        group: GroupConfig,
        env: E,
        transport: T,
        config: RuntimeConfig,
    ) -> Result<Self, RuntimeError> {
        let requester =
            Requester::new(transport.local_id(), group)?.with_policy(config.pairing_policy);
        Ok(Self { requester, env, transport, config, events: EventSink::disabled(), cycles: 0 })
    }

    /// Report milestones to `events`.
    #[must_use]
    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    /// Cycle until the configured limit, then keep answering peers.
    ///
    /// Only returns on error.
    pub async fn run(mut self) -> Result<(), RuntimeError> {
        let id = self.requester.id();
        info!(requester = id, "requester started");

        while self.config.max_cycles.is_none_or(|max| self.cycles < max) {
            self.cycle().await?;
        }

        info!(requester = id, cycles = self.cycles, "cycle limit reached, serving peers");
        self.events.emit(RunEvent::CyclesCompleted { requester: id, cycles: self.cycles });
        loop {
            self.step().await?;
        }
    }

    /// One full RELEASED → WANTED → HELD → RELEASED cycle.
    pub async fn cycle(&mut self) -> Result<(), RuntimeError> {
        let id = self.requester.id();
        let (min, max) = self.config.think_time;
        let think = self.env.random_duration(min, max);
        self.serve_for(think).await?;

        let started = self.env.now();
        let actions = self.requester.request()?;
        if let Some(stamp) = self.requester.stamp() {
            info!(requester = id, %stamp, "requesting critical section");
            self.events.emit(RunEvent::Requested { requester: id, stamp });
        }
        self.execute(actions).await?;

        while self.requester.state() != MutexState::Held {
            self.step().await?;
        }
        info!(
            requester = id,
            waited = ?self.env.now().saturating_duration_since(started),
            "entered critical section"
        );

        self.pair().await?;

        let (min, max) = self.config.hold_time;
        let hold = self.env.random_duration(min, max);
        self.serve_for(hold).await?;

        let actions = self.requester.release()?;
        let replied = actions
            .iter()
            .filter_map(|action| match action {
                RequesterAction::Send(message) => Some(message.to),
                _ => None,
            })
            .collect::<Vec<_>>();
        info!(requester = id, ?replied, "left critical section");
        self.events.emit(RunEvent::Exited { requester: id, replied });
        self.execute(actions).await?;
        self.cycles += 1;

        self.drain_ready().await
    }

    /// Run this visit's pairing scan to completion.
    async fn pair(&mut self) -> Result<(), RuntimeError> {
        let actions = self.requester.begin_pairing()?;
        self.execute(actions).await?;

        loop {
            match self.requester.pairing_status() {
                PairingStatus::Awaiting(_) => self.step().await?,
                PairingStatus::Paired(_) => {
                    self.serve_for(self.config.pair_dwell).await?;
                    let actions = self.requester.end_pairing()?;
                    self.execute(actions).await?;
                },
                PairingStatus::Idle | PairingStatus::Complete(_) => return Ok(()),
            }
        }
    }

    /// Wait for one message and dispatch it.
    async fn step(&mut self) -> Result<(), RuntimeError> {
        let message = self.transport.receive(MessageFilter::ANY).await?;
        self.dispatch(message).await
    }

    /// Dispatch inbound messages until `duration` has passed.
    async fn serve_for(&mut self, duration: Duration) -> Result<(), RuntimeError> {
        let env = self.env.clone();
        let sleep = env.sleep(duration);
        tokio::pin!(sleep);

        loop {
            let received = tokio::select! {
                biased;
                () = &mut sleep => None,
                message = self.transport.receive(MessageFilter::ANY) => Some(message?),
            };
            match received {
                Some(message) => self.dispatch(message).await?,
                None => return Ok(()),
            }
        }
    }

    /// Dispatch whatever has already arrived, without waiting.
    async fn drain_ready(&mut self) -> Result<(), RuntimeError> {
        while let Some((from, kind)) = self.transport.probe() {
            let filter = MessageFilter::from_source(from).and_kind(kind);
            let Some(message) = self.transport.try_receive(filter) else {
                break;
            };
            self.dispatch(message).await?;
        }
        Ok(())
    }

    async fn dispatch(&mut self, message: Message) -> Result<(), RuntimeError> {
        match self.requester.handle_message(&message) {
            Ok(actions) => self.execute(actions).await,
            Err(error) => {
                warn!(
                    requester = self.requester.id(),
                    from = message.from,
                    kind = ?message.kind(),
                    clock = ?message.body.clock(),
                    %error,
                    "rejected message"
                );
                Ok(())
            },
        }
    }

    async fn execute(&mut self, actions: Vec<RequesterAction>) -> Result<(), RuntimeError> {
        let id = self.requester.id();
        for action in &actions {
            match action {
                RequesterAction::Send(_) => {},
                RequesterAction::Deferred { peer } => {
                    debug!(requester = id, peer, "deferred reply");
                    self.events.emit(RunEvent::Deferred { requester: id, peer: *peer });
                },
                RequesterAction::EnterCriticalSection { stamp } => {
                    self.events.emit(RunEvent::Entered { requester: id, stamp: *stamp });
                },
                RequesterAction::Paired { responder } => {
                    info!(requester = id, responder, "paired");
                    self.events.emit(RunEvent::Paired { requester: id, responder: *responder });
                },
                RequesterAction::PairingComplete { responder: None } => {
                    info!(requester = id, "no responder available");
                    self.events.emit(RunEvent::Unpaired { requester: id });
                },
                RequesterAction::PairingComplete { responder: Some(_) } => {},
            }
        }

        for action in actions {
            if let RequesterAction::Send(message) = action {
                self.transport.send(message).await?;
            }
        }
        Ok(())
    }
}

/// Drives a [`Responder`], answering pairing handshakes forever.
pub struct ResponderRuntime<T> {
    responder: Responder,
    transport: T,
    events: EventSink,
}

impl<T: Transport> ResponderRuntime<T> {
    /// Runtime for the responder behind `transport`.
    pub fn new(group: GroupConfig, transport: T) -> Result<Self, RuntimeError> {
        let responder = Responder::new(transport.local_id(), group)?;
        Ok(Self { responder, transport, events: EventSink::disabled() })
    }

    /// Report milestones to `events`.
    #[must_use]
    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    /// Serve until the transport fails.
    pub async fn run(mut self) -> Result<(), RuntimeError> {
        info!(responder = self.responder.id(), "responder started");
        loop {
            self.step().await?;
        }
    }

    /// Wait for one message and handle it.
    pub async fn step(&mut self) -> Result<(), RuntimeError> {
        let id = self.responder.id();
        let message = self.transport.receive(MessageFilter::ANY).await?;

        let actions = match self.responder.handle_message(&message) {
            Ok(actions) => actions,
            Err(error) => {
                warn!(
                    responder = id,
                    from = message.from,
                    kind = ?message.kind(),
                    %error,
                    "rejected message"
                );
                return Ok(());
            },
        };

        for action in &actions {
            match action {
                ResponderAction::Paired { partner } => {
                    info!(responder = id, partner, total = self.responder.pairings(), "paired");
                    self.events.emit(RunEvent::Accepted { responder: id, partner: *partner });
                },
                ResponderAction::Freed { partner } => {
                    info!(responder = id, partner, "pairing ended");
                    self.events.emit(RunEvent::Freed { responder: id, partner: *partner });
                },
                ResponderAction::Send(reply) if reply.body == Body::PairDeny => {
                    self.events.emit(RunEvent::Denied { responder: id, requester: reply.to });
                },
                ResponderAction::Send(_) => {},
            }
        }

        for action in actions {
            if let ResponderAction::Send(reply) = action {
                self.transport.send(reply).await?;
            }
        }
        Ok(())
    }
}
