//! Aggregate root trait.

/// Aggregate root marker + minimal interface.
///
/// The aggregate root is the single consistency boundary: every mutation of
/// the objects it owns goes through it, and each committed mutation bumps
/// `version()`. A rejected command must leave the version unchanged.
pub trait AggregateRoot {
    /// Strongly-typed aggregate identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the aggregate identifier.
    fn id(&self) -> &Self::Id;

    /// Monotonically increasing version of the aggregate's state.
    ///
    /// Derived views (balances, subtree sums) can use it as a cache key.
    fn version(&self) -> u64;
}
