//! Entity trait: an identity that also orders the entity inside a registry.

/// Entity marker + minimal interface.
///
/// The key is both the identity and the sort key used by
/// [`SortedCollection`](crate::collection::SortedCollection). It must not
/// change while the entity is stored in a collection.
pub trait Entity {
    /// Strongly-typed, totally ordered key.
    type Key: Ord + Clone + core::fmt::Debug;

    /// Returns the entity key.
    fn key(&self) -> &Self::Key;
}
