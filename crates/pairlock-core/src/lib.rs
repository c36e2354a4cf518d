//! Pairlock protocol core logic
//!
//! Pure state machine logic for Ricart–Agrawala mutual exclusion among
//! requesters and the pairing handshake with responders, decoupled from I/O.
//!
//! # Architecture
//!
//! Every participant owns one state machine. State transitions return
//! declarative actions (messages to send, milestones reached) instead of
//! performing them; a runtime or test harness interprets the actions. Time,
//! randomness and the network stay outside, supplied through the
//! [`env::Environment`] and [`transport::Transport`] traits.
//!
//! The same state machines therefore run unchanged in the async runtime, in
//! turmoil simulations, and in the synchronous scenario harness where every
//! delivery order can be scripted.
//!
//! # Components
//!
//! - [`clock`]: Lamport clock and request stamps
//! - [`group`]: Requester/responder layout
//! - [`requester`]: Ricart–Agrawala state machine
//! - [`coordinator`]: Pairing scan run inside the critical section
//! - [`responder`]: Single-slot responder
//! - [`mailbox`]: Selective receive buffer
//! - [`mod@env`]: Environment abstraction (time, RNG)
//! - [`transport`]: Transport abstraction
//! - [`error`]: Error types

pub mod clock;
pub mod coordinator;
pub mod env;
pub mod error;
pub mod group;
pub mod mailbox;
pub mod requester;
pub mod responder;
pub mod transport;
