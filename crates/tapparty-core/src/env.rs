//! Environment abstraction for deterministic testing.
//!
//! Decouples protocol logic from system resources (time, randomness). The
//! production driver uses the system clock and OS entropy; the simulation
//! harness uses a virtual clock and a seeded RNG.

use std::time::Duration;

use crate::timer::TimePoint;

/// Abstract environment providing time, randomness, and async sleep.
///
/// Implementations MUST guarantee:
///
/// - `now()` never goes backwards
/// - Given the same seed, a simulated environment yields the same random
///   sequence
pub trait Environment: Clone + Send + Sync + 'static {
    /// Instant type used by this environment.
    ///
    /// Production uses `std::time::Instant`, simulation uses a virtual
    /// instant that only advances when the test says so.
    type Instant: TimePoint;

    /// Current time (monotonic).
    fn now(&self) -> Self::Instant;

    /// Sleep for the given duration.
    ///
    /// Only driver code awaits this; protocol logic never does.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fill `buffer` with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Random `u64`, for client identifiers.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }
}
