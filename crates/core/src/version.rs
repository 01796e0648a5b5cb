//! Optimistic concurrency primitives for single-row read-modify-write units.

use crate::error::{DomainError, DomainResult};

/// A record whose committed state carries a monotonically increasing version.
///
/// Every successful commit of the record bumps the version by exactly one, so
/// all committed updates of one record form a total order.
pub trait Versioned {
    /// Strongly-typed record key.
    type Key: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the record key.
    fn key(&self) -> Self::Key;

    /// Version of the committed state this value was read at.
    fn version(&self) -> u64;
}

/// Optimistic concurrency expectation for a single record.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking (used for first-write paths such as catalog adds).
    Any,
    /// Require the record to still be at an exact version.
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }

    pub fn check(self, actual: u64) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "optimistic concurrency check failed (expected: {self:?}, actual: {actual})"
            )))
        }
    }
}
