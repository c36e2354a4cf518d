//! Scenario builder API.
//!
//! Provides a declarative API for constructing scenario tests that enforce
//! the Oracle Pattern.

use std::collections::BTreeMap;

use pairlock_core::{coordinator::PairingPolicy, group::GroupConfig};
use pairlock_proto::ParticipantId;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::scenario::{OracleFn, World};

/// Scripted prefix run before the scheduler takes over.
pub type SetupFn = Box<dyn FnOnce(&mut World) -> Result<(), String>>;

const DEFAULT_MAX_STEPS: usize = 1_000_000;

/// Scenario builder.
///
/// Describe the group and optionally script its opening moves. Must call
/// `.oracle()` to get a [`RunnableScenario`] that can be executed.
pub struct Scenario {
    name: String,
    participants: u32,
    requesters: Option<u32>,
    cycles: u64,
    policy: PairingPolicy,
    seed: u64,
    clocks: BTreeMap<ParticipantId, u64>,
    setup: Option<SetupFn>,
    max_steps: usize,
}

impl Scenario {
    /// Two participants, one cycle, default policy, seed zero.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            participants: 2,
            requesters: None,
            cycles: 1,
            policy: PairingPolicy::default(),
            seed: 0,
            clocks: BTreeMap::new(),
            setup: None,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    /// Total participants.
    pub fn participants(mut self, participants: u32) -> Self {
        self.participants = participants;
        self
    }

    /// Requester count. Defaults to half the participants.
    pub fn requesters(mut self, requesters: u32) -> Self {
        self.requesters = Some(requesters);
        self
    }

    /// Critical-section visits per requester.
    pub fn cycles(mut self, cycles: u64) -> Self {
        self.cycles = cycles;
        self
    }

    /// Pairing policy for every requester.
    pub fn policy(mut self, policy: PairingPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Seed for the delivery schedule.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Start requester `id` with its clock at `value`.
    pub fn clock(mut self, id: ParticipantId, value: u64) -> Self {
        self.clocks.insert(id, value);
        self
    }

    /// Script the opening moves.
    pub fn setup(mut self, setup: impl FnOnce(&mut World) -> Result<(), String> + 'static) -> Self {
        self.setup = Some(Box::new(setup));
        self
    }

    /// Give up after this many scheduler steps.
    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Set the oracle function and return a runnable scenario.
    ///
    /// The oracle is mandatory - you cannot run a scenario without
    /// verification.
    pub fn oracle(self, oracle: OracleFn) -> RunnableScenario {
        RunnableScenario { scenario: self, oracle }
    }
}

/// A scenario with an oracle function that can be executed.
pub struct RunnableScenario {
    scenario: Scenario,
    oracle: OracleFn,
}

impl RunnableScenario {
    /// Execute the scenario.
    ///
    /// 1. Build the world and apply starting clocks
    /// 2. Run the setup script, if any
    /// 3. Take seeded random steps until nothing is enabled
    /// 4. Run the oracle against the final world
    pub fn run(self) -> Result<(), String> {
        let Scenario {
            name,
            participants,
            requesters,
            cycles,
            policy,
            seed,
            clocks,
            setup,
            max_steps,
        } = self.scenario;
        let fail = |stage: &str, error: String| format!("Scenario '{name}': {stage}: {error}");

        let group = match requesters {
            Some(requesters) => GroupConfig::new(participants, requesters),
            None => GroupConfig::split_evenly(participants),
        }
        .map_err(|e| fail("group", e.to_string()))?;

        let mut world = World::new(group, policy, cycles).map_err(|e| fail("world", e))?;
        for (id, value) in clocks {
            world.set_clock(id, value).map_err(|e| fail("clock", e))?;
        }
        if let Some(setup) = setup {
            setup(&mut world).map_err(|e| fail("setup", e))?;
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let steps = world.run(&mut rng, max_steps).map_err(|e| fail("run", e))?;
        debug!(scenario = %name, steps, delivered = world.delivered(), "scenario finished");

        (self.oracle)(&world).map_err(|e| fail("oracle", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::oracle;

    #[test]
    fn scenario_requires_oracle() {
        // This should compile - oracle provided
        let _scenario = Scenario::new("test").oracle(Box::new(|_world| Ok(())));

        // This should NOT compile - no oracle
        // let scenario = Scenario::new("test");
        // scenario.run(); // ERROR: no method `run` on type `Scenario`
    }

    #[test]
    fn oracle_failure_is_reported_with_name() {
        let err = Scenario::new("doomed")
            .oracle(Box::new(|_world| Err("nope".to_string())))
            .run()
            .unwrap_err();
        assert_eq!(err, "Scenario 'doomed': oracle: nope");
    }

    #[test]
    fn invalid_group_is_rejected() {
        let err = Scenario::new("empty")
            .participants(1)
            .oracle(oracle::standard())
            .run()
            .unwrap_err();
        assert!(err.starts_with("Scenario 'empty': group:"));
    }

    #[test]
    fn setup_errors_abort_the_run() {
        let err = Scenario::new("bad script")
            .participants(4)
            .setup(|world| world.release(0))
            .oracle(oracle::standard())
            .run()
            .unwrap_err();
        assert!(err.contains("setup"));
    }
}
