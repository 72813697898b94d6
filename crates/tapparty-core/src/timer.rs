//! One-shot deadlines.
//!
//! State machines never sleep. They arm a [`Timer`] with a deadline and
//! check it from `tick(now)`; a timer fires at most once per arming.

use std::{
    fmt::Debug,
    ops::{Add, Sub},
    time::Duration,
};

/// Instant-like type usable as a deadline.
///
/// Implemented for `std::time::Instant` and any virtual instant with the same
/// arithmetic.
pub trait TimePoint:
    Copy + Ord + Debug + Send + Sync + Add<Duration, Output = Self> + Sub<Output = Duration>
{
}

impl<T> TimePoint for T where
    T: Copy + Ord + Debug + Send + Sync + Add<Duration, Output = T> + Sub<Output = Duration>
{
}

/// Cancellable one-shot deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timer<I> {
    deadline: Option<I>,
}

impl<I> Default for Timer<I> {
    fn default() -> Self {
        Self { deadline: None }
    }
}

impl<I: TimePoint> Timer<I> {
    /// Disarmed timer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm to fire `after` from `now`, replacing any previous deadline.
    pub fn arm(&mut self, now: I, after: Duration) {
        self.deadline = Some(now + after);
    }

    /// Disarm. No-op if not armed.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Fire if the deadline has passed. Returns `true` exactly once per
    /// arming; the timer is disarmed when it fires.
    pub fn fire_if_due(&mut self, now: I) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            },
            _ => false,
        }
    }
}
