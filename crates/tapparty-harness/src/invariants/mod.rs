//! Invariant checking for deterministic simulation testing.
//!
//! Invariants are properties that must hold whenever the network is quiet.
//! Unlike example-based tests that check specific scenarios, they are run
//! after every step of a generated scenario.
//!
//! # Architecture
//!
//! [`SimNetwork::snapshot`](crate::SimNetwork::snapshot) extracts the
//! observable state of every client into a [`SystemSnapshot`], then
//! registered [`Invariant`] checks run against it.
//!
//! # Usage
//!
//! ```ignore
//! let registry = InvariantRegistry::standard();
//! registry.assert_all(&network.snapshot(), "after join");
//! ```

mod checks;
mod snapshot;

pub use checks::{RosterAgreement, SingleHost, TapAgreement, UniquePlayers};
pub use snapshot::{ClientSnapshot, PlayerSnapshot, SystemSnapshot};

/// Outcome of one check.
pub type InvariantResult = Result<(), Violation>;

/// A broken invariant and what was seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Check that failed.
    pub invariant: &'static str,
    /// What was observed.
    pub message: String,
}

impl Violation {
    /// Violation of `invariant`.
    pub fn new(invariant: &'static str, message: impl Into<String>) -> Self {
        Self { invariant, message: message.into() }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// A property of the whole network, checked against a snapshot.
pub trait Invariant: Send + Sync {
    /// Short name used in reports.
    fn name(&self) -> &'static str;

    /// `Ok(())` if the property holds for `state`.
    fn check(&self, state: &SystemSnapshot) -> InvariantResult;
}

/// Ordered set of checks run together.
#[derive(Default)]
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl InvariantRegistry {
    /// Registry with no checks.
    pub fn new() -> Self {
        Self::default()
    }

    /// The room checks every scenario runs:
    ///
    /// - [`SingleHost`]: every roster has exactly one host
    /// - [`UniquePlayers`]: no duplicate connection IDs or names
    /// - [`RosterAgreement`]: members of a room see the same roster
    /// - [`TapAgreement`]: members of a room agree on round phase and taps
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(SingleHost);
        registry.add(UniquePlayers);
        registry.add(RosterAgreement);
        registry.add(TapAgreement);
        registry
    }

    /// Register another check. Checks run in registration order.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Names of the registered checks, in order.
    pub fn names(&self) -> Vec<&'static str> {
        self.invariants.iter().map(|inv| inv.name()).collect()
    }

    /// Run every check. Collects all violations rather than stopping at the
    /// first.
    pub fn check_all(&self, state: &SystemSnapshot) -> Result<(), Vec<Violation>> {
        let violations: Vec<Violation> =
            self.invariants.iter().filter_map(|inv| inv.check(state).err()).collect();

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Run every check and panic with all violations, labelled by `context`.
    #[allow(clippy::panic)]
    pub fn assert_all(&self, state: &SystemSnapshot, context: &str) {
        if let Err(violations) = self.check_all(state) {
            let report: Vec<String> = violations.iter().map(ToString::to_string).collect();
            panic!("{} invariant(s) broken {context}:\n  {}", report.len(), report.join("\n  "));
        }
    }

    /// Number of registered checks.
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// Whether no checks are registered.
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}
