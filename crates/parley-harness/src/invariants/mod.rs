//! Invariant checking for deterministic simulation testing.
//!
//! Invariants are properties that must always hold during broker execution.
//! Unlike example-based tests that check specific scenarios, invariants
//! verify behavioral properties across all possible event sequences.
//!
//! # Usage
//!
//! ```ignore
//! let registry = InvariantRegistry::standard();
//! let snapshot = sim.snapshot();
//! registry.assert_all(&snapshot, "after disconnect");
//! ```

mod checks;
mod snapshot;

pub use checks::{
    MembershipSymmetry, OnlineIffConnected, PersonalRoomOwnership, StatusMonotonicity,
};
pub use snapshot::{RoomSnapshot, SessionSnapshot, SystemSnapshot};

/// Invariant check result.
pub type InvariantResult = Result<(), Violation>;

/// Invariant violation with context.
#[derive(Debug, Clone)]
pub struct Violation {
    /// Name of the violated invariant.
    pub invariant: &'static str,
    /// Description of what went wrong.
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// An invariant that can be checked against broker state.
pub trait Invariant: Send + Sync {
    /// Invariant name for error reporting.
    fn name(&self) -> &'static str;

    /// Check the invariant against a snapshot.
    fn check(&self, state: &SystemSnapshot) -> InvariantResult;
}

/// Registry of invariants to check.
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl Default for InvariantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { invariants: Vec::new() }
    }

    /// Create a registry with the standard broker invariants.
    ///
    /// Includes:
    /// - [`OnlineIffConnected`]: online flag matches live connections
    /// - [`MembershipSymmetry`]: room and user membership views agree
    /// - [`PersonalRoomOwnership`]: personal rooms hold only their owner
    /// - [`StatusMonotonicity`]: observed statuses never go backwards
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(OnlineIffConnected);
        registry.add(MembershipSymmetry);
        registry.add(PersonalRoomOwnership);
        registry.add(StatusMonotonicity);
        registry
    }

    /// Add an invariant to the registry.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Check all invariants against the given state.
    ///
    /// Returns `Ok(())` if all invariants hold, or all violations found.
    pub fn check_all(&self, state: &SystemSnapshot) -> Result<(), Vec<Violation>> {
        let violations: Vec<_> =
            self.invariants.iter().filter_map(|inv| inv.check(state).err()).collect();

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Check all invariants, panicking with every violation found.
    #[allow(clippy::panic, reason = "test harness surfaces violations as test failures")]
    pub fn assert_all(&self, state: &SystemSnapshot, context: &str) {
        if let Err(violations) = self.check_all(state) {
            let messages: Vec<_> = violations.iter().map(|v| v.to_string()).collect();
            panic!("Invariant violation {context}:\n  {}", messages.join("\n  "));
        }
    }

    /// Number of registered invariants.
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}
