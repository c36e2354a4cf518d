//! Environment abstraction.
//!
//! Time and randomness are the only ambient effects the runtime needs. Keeping
//! them behind a trait lets simulations run on virtual time with a seeded RNG
//! while production uses the system clock.

use std::{
    future::Future,
    time::{Duration, Instant},
};

/// Source of time and randomness.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Current time.
    fn now(&self) -> Instant;

    /// Wait for `duration`.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;

    /// Fill `buffer` with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Random `u64`.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_le_bytes(bytes)
    }

    /// Uniform duration in `[min, max]` at millisecond granularity.
    fn random_duration(&self, min: Duration, max: Duration) -> Duration {
        if max <= min {
            return min;
        }
        let span = (max - min).as_millis() as u64;
        min + Duration::from_millis(self.random_u64() % (span + 1))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicU8, Ordering},
    };

    use super::*;

    #[derive(Clone)]
    struct CountingEnv {
        origin: Instant,
        next: Arc<AtomicU8>,
    }

    impl Environment for CountingEnv {
        fn now(&self) -> Instant {
            self.origin
        }

        fn sleep(&self, _duration: Duration) -> impl Future<Output = ()> + Send {
            async {}
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            for byte in buffer {
                *byte = self.next.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn env() -> CountingEnv {
        #[allow(clippy::disallowed_methods)]
        let origin = Instant::now();
        CountingEnv { origin, next: Arc::new(AtomicU8::new(0)) }
    }

    #[test]
    fn random_duration_stays_in_range() {
        let env = env();
        let min = Duration::from_millis(100);
        let max = Duration::from_millis(250);
        for _ in 0..64 {
            let d = env.random_duration(min, max);
            assert!(d >= min && d <= max, "{d:?} out of range");
        }
    }

    #[test]
    fn degenerate_range_returns_min() {
        let env = env();
        let d = Duration::from_secs(1);
        assert_eq!(env.random_duration(d, d), d);
        assert_eq!(env.random_duration(d, Duration::ZERO), d);
    }
}
