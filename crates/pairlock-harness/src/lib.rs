//! Deterministic simulation harness for Pairlock.
//!
//! Two levels of testing:
//!
//! - [`scenario`]: a synchronous [`World`](scenario::World) owning every
//!   state machine, with seeded delivery order and mandatory oracles.
//! - [`SimEnv`] and [`SimTransport`]: turmoil implementations of the
//!   `Environment` and `Transport` traits, so the async runtimes run
//!   unchanged over a simulated network.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod scenario;
pub mod sim_env;
pub mod sim_transport;

pub use sim_env::SimEnv;
pub use sim_transport::SimTransport;
