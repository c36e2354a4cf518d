//! Scenario testing with mandatory oracles.
//!
//! A scenario describes a group (participants, requesters, cycles, pairing
//! policy, starting clocks) and optionally a scripted prefix. The
//! [`World`] then delivers messages and takes local steps in an order drawn
//! from a seeded RNG until every requester has finished its cycles.
//!
//! A [`Scenario`] cannot run without an oracle: `.oracle()` turns it into a
//! [`RunnableScenario`], which is the only type with `run()`.
//!
//! ```
//! use pairlock_harness::scenario::{Scenario, oracle};
//!
//! Scenario::new("two requesters, one responder")
//!     .participants(3)
//!     .requesters(2)
//!     .cycles(2)
//!     .oracle(oracle::all_of(vec![oracle::mutual_exclusion(), oracle::all_cycles_completed()]))
//!     .run()
//!     .expect("scenario should pass");
//! ```

mod builder;
pub mod oracle;
mod world;

pub use builder::{RunnableScenario, Scenario, SetupFn};
pub use world::World;

/// Verification run against the final [`World`].
pub type OracleFn = Box<dyn Fn(&World) -> Result<(), String>>;
