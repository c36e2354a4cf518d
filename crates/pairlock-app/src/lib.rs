//! Application layer for Pairlock
//!
//! Async drivers that run the pure state machines from `pairlock-core`
//! against a [`Transport`](pairlock_core::transport::Transport) and an
//! [`Environment`](pairlock_core::env::Environment). The same code runs in
//! the node binary over [`LocalNetwork`] and in turmoil simulations.
//!
//! # Components
//!
//! - [`RequesterRuntime`]: request, hold, pair, release, forever
//! - [`ResponderRuntime`]: answer pairing handshakes, forever
//! - [`RuntimeConfig`]: timings, cycle limit, pairing policy
//! - [`RunEvent`]: observable milestones for harnesses and the CLI
//! - [`LocalNetwork`]: in-process channel transport

mod config;
mod error;
mod event;
mod local;
mod runtime;

pub use config::RuntimeConfig;
pub use error::RuntimeError;
pub use event::{EventSink, RunEvent};
pub use local::{LocalNetwork, LocalTransport};
pub use runtime::{RequesterRuntime, ResponderRuntime};
