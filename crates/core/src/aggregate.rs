//! Aggregate root trait for versioned, independently mutable domain rows.

use crate::error::{DomainError, DomainResult};

/// Aggregate root marker + minimal interface.
///
/// Books and accounts are aggregate roots: each one is the unit of
/// consistency for its own mutable fields, and every committed change bumps
/// its version by one.
pub trait AggregateRoot {
    /// Strongly-typed aggregate identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the aggregate identifier.
    fn id(&self) -> &Self::Id;

    /// Monotonically increasing version of the aggregate's state.
    ///
    /// Freshly created rows start at 1.
    fn version(&self) -> u64;
}

/// Optimistic concurrency expectation for an aggregate.
///
/// Every write names the version it was derived from; there is no
/// unconditional variant.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Require the aggregate to be at an exact version.
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Exact(v) => v == actual,
        }
    }

    /// `what` names the row in the error message, e.g. `book 0190...`.
    pub fn check(self, what: &str, actual: u64) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "{what}: expected {self:?}, found {actual}"
            )))
        }
    }
}
