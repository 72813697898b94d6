//! Simulated environment: virtual clock and seeded randomness.
//!
//! Time only moves when a test calls [`SimEnv::advance`] (or a driver awaits
//! [`Environment::sleep`]), so timer-driven behavior such as heartbeats and
//! round expiry is reproducible to the millisecond. Clones share the same
//! clock and RNG.

#![allow(clippy::disallowed_types, reason = "Synchronous locking operations only")]

use std::{
    future::Future,
    ops::{Add, Sub},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tapparty_core::Environment;

/// Point on the virtual clock: time since the simulation started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SimInstant(Duration);

impl Add<Duration> for SimInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self {
        Self(self.0 + rhs)
    }
}

impl Sub for SimInstant {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Duration {
        self.0.saturating_sub(rhs.0)
    }
}

/// Deterministic environment for simulation.
#[derive(Clone)]
pub struct SimEnv {
    clock: Arc<Mutex<Duration>>,
    rng: Arc<Mutex<ChaCha8Rng>>,
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl SimEnv {
    /// Environment seeded with 0.
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// Environment with the given RNG seed.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            clock: Arc::new(Mutex::new(Duration::ZERO)),
            rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))),
        }
    }

    /// Move the virtual clock forward.
    pub fn advance(&self, by: Duration) {
        *lock(&self.clock) += by;
    }

    /// Time since the simulation started.
    pub fn elapsed(&self) -> Duration {
        *lock(&self.clock)
    }
}

impl Environment for SimEnv {
    type Instant = SimInstant;

    fn now(&self) -> SimInstant {
        SimInstant(self.elapsed())
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        self.advance(duration);
        std::future::ready(())
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        lock(&self.rng).fill_bytes(buffer);
    }
}

/// The clock and RNG stay usable after a panicking test thread.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_only_moves_when_advanced() {
        let env = SimEnv::new();
        let t0 = env.now();
        assert_eq!(env.now(), t0);

        env.advance(Duration::from_millis(1500));
        assert_eq!(env.now() - t0, Duration::from_millis(1500));
    }

    #[test]
    fn clones_share_clock() {
        let env = SimEnv::new();
        let other = env.clone();
        other.advance(Duration::from_secs(3));
        assert_eq!(env.elapsed(), Duration::from_secs(3));
    }

    #[test]
    fn same_seed_same_bytes() {
        let (a, b) = (SimEnv::with_seed(7), SimEnv::with_seed(7));
        let (mut x, mut y) = ([0u8; 16], [0u8; 16]);
        a.random_bytes(&mut x);
        b.random_bytes(&mut y);
        assert_eq!(x, y);

        let c = SimEnv::with_seed(8);
        c.random_bytes(&mut y);
        assert_ne!(x, y);
    }

    #[test]
    fn earlier_minus_later_saturates() {
        let early = SimInstant::default();
        let late = early + Duration::from_secs(1);
        assert_eq!(early - late, Duration::ZERO);
    }
}
