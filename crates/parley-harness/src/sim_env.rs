//! Simulated environment: virtual clock and seeded RNG.
//!
//! Clones share the same clock and RNG, so a broker and the test driving it
//! observe identical time.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use parley_core::Environment;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Unix milliseconds the virtual wall clock starts at (2024-01-01T00:00:00Z).
const SIM_EPOCH_MILLIS: u64 = 1_704_067_200_000;

#[derive(Debug)]
struct SimState {
    base: Instant,
    elapsed: Duration,
    rng: ChaCha8Rng,
}

/// Deterministic [`Environment`] for simulation.
///
/// Time only moves when [`SimEnv::advance`] is called (or a `sleep` future
/// completes, which advances by the slept duration).
#[derive(Debug, Clone)]
pub struct SimEnv {
    state: Arc<Mutex<SimState>>,
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl SimEnv {
    /// Create an environment with seed 0.
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// Create an environment with a specific RNG seed.
    #[allow(clippy::disallowed_methods)]
    pub fn with_seed(seed: u64) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(seed);
        let state = SimState { base: Instant::now(), elapsed: Duration::ZERO, rng };
        Self { state: Arc::new(Mutex::new(state)) }
    }

    /// Move virtual time forward.
    pub fn advance(&self, duration: Duration) {
        self.lock().elapsed += duration;
    }

    /// Virtual time elapsed since creation.
    pub fn elapsed(&self) -> Duration {
        self.lock().elapsed
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Environment for SimEnv {
    fn now(&self) -> Instant {
        let state = self.lock();
        state.base + state.elapsed
    }

    fn wall_clock_millis(&self) -> u64 {
        let elapsed = u64::try_from(self.lock().elapsed.as_millis()).unwrap_or(u64::MAX);
        SIM_EPOCH_MILLIS.saturating_add(elapsed)
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        let env = self.clone();
        async move { env.advance(duration) }
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        self.lock().rng.fill_bytes(buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_clock() {
        let env = SimEnv::new();
        let clone = env.clone();
        let start = env.now();

        clone.advance(Duration::from_millis(1_500));

        assert_eq!(env.now() - start, Duration::from_millis(1_500));
        assert_eq!(env.wall_clock_millis(), SIM_EPOCH_MILLIS + 1_500);
    }

    #[test]
    fn same_seed_same_randomness() {
        let a = SimEnv::with_seed(42);
        let b = SimEnv::with_seed(42);
        let c = SimEnv::with_seed(43);

        assert_eq!(a.random_u64(), b.random_u64());
        assert_ne!(a.random_u64(), c.random_u64());
    }
}
