//! Runtime configuration.

use std::time::Duration;

use pairlock_core::coordinator::PairingPolicy;

/// Timings and limits for a participant runtime.
///
/// Delays are opaque to the protocol; they only shape how often requesters
/// contend. Defaults are second-scale so a run can be followed in the logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Idle time before each request, drawn uniformly from this range
    pub think_time: (Duration, Duration),
    /// Time spent in the critical section after pairing, drawn uniformly
    pub hold_time: (Duration, Duration),
    /// How long an accepted pairing is held before `PairEnd`
    pub pair_dwell: Duration,
    /// Stop requesting after this many cycles; keep serving peers afterwards
    pub max_cycles: Option<u64>,
    /// What to remember about denied responders
    pub pairing_policy: PairingPolicy,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            think_time: (Duration::from_secs(1), Duration::from_secs(3)),
            hold_time: (Duration::from_secs(1), Duration::from_secs(3)),
            pair_dwell: Duration::from_secs(1),
            max_cycles: None,
            pairing_policy: PairingPolicy::RetryDenied,
        }
    }
}

impl RuntimeConfig {
    /// Millisecond-scale timings for tests and simulations.
    pub fn fast() -> Self {
        Self {
            think_time: (Duration::from_millis(1), Duration::from_millis(20)),
            hold_time: (Duration::from_millis(1), Duration::from_millis(10)),
            pair_dwell: Duration::from_millis(5),
            ..Self::default()
        }
    }

    /// Limit the number of request cycles.
    #[must_use]
    pub fn with_max_cycles(mut self, cycles: u64) -> Self {
        self.max_cycles = Some(cycles);
        self
    }

    /// Set the pairing policy.
    #[must_use]
    pub fn with_pairing_policy(mut self, policy: PairingPolicy) -> Self {
        self.pairing_policy = policy;
        self
    }
}
