//! Environment abstraction for deterministic testing.
//!
//! Decouples broker logic from system resources (time, randomness). Enables
//! deterministic simulation (virtual clock, seeded RNG) and production use
//! with real system resources.

use std::time::{Duration, Instant};

/// Abstract environment providing time, randomness, and async sleep.
///
/// # Invariants
///
/// Implementations MUST guarantee:
///
/// - `now()` never goes backwards
/// - `wall_clock_millis()` is Unix time in milliseconds; it is only used for
///   user-visible timestamps, never for ordering
pub trait Environment: Clone + Send + Sync + 'static {
    /// Current monotonic time.
    fn now(&self) -> Instant;

    /// Current wall-clock time as Unix milliseconds.
    fn wall_clock_millis(&self) -> u64;

    /// Sleeps for the specified duration.
    ///
    /// This is the ONLY async method in the trait. It is used by runtimes to
    /// arm timers requested by the broker, never by broker logic itself.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fills the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }
}
