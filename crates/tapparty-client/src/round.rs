//! Round coordinator.
//!
//! ```text
//! ┌──────┐ start ┌──────────┐       ┌─────────┐ timer/gameEnded ┌───────┐
//! │ Idle │──────>│ Starting │──────>│ Running │────────────────>│ Ended │
//! └──────┘       └──────────┘       └─────────┘                 └───────┘
//!    ↑                 ↑                                             │
//!    │ reset           └──────────────── host restarts ──────────────┘
//! ```
//!
//! `Starting` is passed through synchronously: the host moves to `Running`
//! when it sends the start signal, peers when they receive it. Only the host
//! owns the end-of-round timer.

use std::time::Duration;

use tapparty_core::{TimePoint, Timer};

/// Default round length.
pub const DEFAULT_ROUND_DURATION: Duration = Duration::from_secs(60);

/// Round phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    /// No round yet, or reset
    Idle,
    /// Start signal sent or received
    Starting,
    /// Taps are being counted
    Running,
    /// Round over, results available
    Ended,
}

/// State of the current round.
#[derive(Debug, Clone)]
pub struct Round<I> {
    phase: RoundPhase,
    duration: Duration,
    started_at: Option<I>,
    /// Armed only on the host.
    timer: Timer<I>,
}

impl<I: TimePoint> Round<I> {
    /// Idle round of the given length.
    #[must_use]
    pub fn new(duration: Duration) -> Self {
        Self { phase: RoundPhase::Idle, duration, started_at: None, timer: Timer::new() }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    /// Whether taps are being counted.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.phase == RoundPhase::Running
    }

    /// Configured round length.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Whether a new round may start from here.
    #[must_use]
    pub fn can_start(&self) -> bool {
        matches!(self.phase, RoundPhase::Idle | RoundPhase::Ended)
    }

    /// Enter `Starting`. Returns `false` (and changes nothing) unless idle
    /// or ended.
    fn begin(&mut self) -> bool {
        if !self.can_start() {
            return false;
        }
        self.phase = RoundPhase::Starting;
        self.started_at = None;
        self.timer.cancel();
        true
    }

    /// `Starting → Running` at `now`.
    ///
    /// `owns_timer` is true on the host, whose local expiry ends the round.
    /// Returns `false` unless starting.
    fn run(&mut self, now: I, owns_timer: bool) -> bool {
        if self.phase != RoundPhase::Starting {
            return false;
        }
        self.phase = RoundPhase::Running;
        self.started_at = Some(now);
        if owns_timer {
            self.timer.arm(now, self.duration);
        }
        true
    }

    /// Start a round at `now`, passing through `Starting`. Returns `false`
    /// (and changes nothing) unless idle or ended.
    pub fn start(&mut self, now: I, owns_timer: bool) -> bool {
        self.begin() && self.run(now, owns_timer)
    }

    /// Host timer check. Returns `true` once, when the round ends by expiry.
    pub fn tick(&mut self, now: I) -> bool {
        self.timer.fire_if_due(now) && self.end()
    }

    /// End the round. Returns `true` only on the `Running` to `Ended`
    /// transition, so repeated end signals are no-ops.
    pub fn end(&mut self) -> bool {
        if self.phase != RoundPhase::Running {
            return false;
        }
        self.phase = RoundPhase::Ended;
        self.timer.cancel();
        true
    }

    /// Time left in a running round.
    #[must_use]
    pub fn remaining(&self, now: I) -> Option<Duration> {
        if self.phase != RoundPhase::Running {
            return None;
        }
        let started_at = self.started_at?;
        let elapsed = if now > started_at { now - started_at } else { Duration::ZERO };
        Some(self.duration.saturating_sub(elapsed))
    }

    /// Back to `Idle`, cancelling the timer.
    pub fn reset(&mut self) {
        self.phase = RoundPhase::Idle;
        self.started_at = None;
        self.timer.cancel();
    }
}
