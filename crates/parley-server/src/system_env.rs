//! Production environment backed by the operating system.
//!
//! Monotonic time comes from `std::time::Instant`, timestamps from the system
//! clock, sleeps from Tokio, and randomness from the OS RNG via `getrandom`.
//! None of it is reproducible; deterministic tests use the harness
//! environment instead.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parley_core::Environment;

/// Production environment using system time and the OS RNG.
///
/// Random bytes seed the dispatcher's message-ID instance prefix, so two
/// broker processes never hand out colliding IDs.
///
/// # Panics
///
/// `random_bytes` panics if the OS RNG fails. That indicates a broken host and
/// there is no meaningful fallback.
#[derive(Debug, Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    #[allow(clippy::disallowed_methods)]
    fn now(&self) -> Instant {
        Instant::now()
    }

    #[allow(clippy::disallowed_methods)]
    fn wall_clock_millis(&self) -> u64 {
        // A clock set before 1970 reports the epoch rather than failing
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or_default()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).expect("invariant: OS RNG is available");
    }
}
