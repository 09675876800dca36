//! Aggregate root trait for event-sourced domain models.

use crate::error::{DomainError, DomainResult};

/// Minimal interface every aggregate root exposes.
///
/// Kept deliberately small: stock items, orders, machines and runs each
/// choose their own state representation, and nothing here drags in
/// persistence or messaging concerns.
pub trait AggregateRoot {
    /// Strongly-typed aggregate identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;

    /// Version of the in-memory state.
    ///
    /// Counts applied events, so after rehydrating a stream it equals the
    /// stream's last sequence number.
    fn version(&self) -> u64;
}

/// What version the caller believes the aggregate is at.
///
/// The store compares this against the stream head when appending; a
/// mismatch means someone else committed first and the command must be
/// re-decided against the fresher state.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Append regardless of the current version.
    Any,
    /// Append only if the stream is exactly at this version.
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

/// Pure decide/evolve split for an event-sourced aggregate.
///
/// `handle` looks at current state and a command and returns the events
/// that record the decision; it never mutates. `apply` folds one event
/// into state and is the only place state changes. Neither performs IO,
/// which is what makes command handling replayable and unit-testable.
pub trait Aggregate: AggregateRoot {
    type Command: Clone + core::fmt::Debug;
    type Event: Clone + core::fmt::Debug;
    type Error: core::fmt::Debug;

    /// Fold a single event into state, bumping `version()` by one.
    fn apply(&mut self, event: &Self::Event);

    /// Decide which events a command produces against current state.
    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;
}
