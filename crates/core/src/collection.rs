//! Key-sorted collection and k-way merge over sorted streams.

use core::cmp::Ordering;
use core::ops::{Bound, RangeBounds};
use std::collections::BinaryHeap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::entity::Entity;

/// A vector kept sorted by [`Entity::key`], with unique keys.
///
/// Lookups are binary searches; inserts and removals shift the tail. This
/// fits registries that are read far more often than they are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SortedCollection<T> {
    items: Vec<T>,
}

impl<T> Default for SortedCollection<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Entity> SortedCollection<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn position(&self, key: &T::Key) -> Result<usize, usize> {
        self.items.binary_search_by(|item| item.key().cmp(key))
    }

    pub fn contains_key(&self, key: &T::Key) -> bool {
        self.position(key).is_ok()
    }

    pub fn find(&self, key: &T::Key) -> Option<&T> {
        self.position(key).ok().map(|idx| &self.items[idx])
    }

    /// Mutable access to a stored item.
    ///
    /// The caller must not change the item's key.
    pub fn find_mut(&mut self, key: &T::Key) -> Option<&mut T> {
        match self.position(key) {
            Ok(idx) => Some(&mut self.items[idx]),
            Err(_) => None,
        }
    }

    /// Inserts `item` at its sorted position and returns that position.
    ///
    /// An item with an equal key is never replaced; the rejected item is
    /// handed back instead.
    pub fn try_insert(&mut self, item: T) -> Result<usize, T> {
        match self.position(item.key()) {
            Ok(_) => Err(item),
            Err(idx) => {
                self.items.insert(idx, item);
                Ok(idx)
            }
        }
    }

    pub fn remove(&mut self, key: &T::Key) -> Option<T> {
        self.position(key).ok().map(|idx| self.items.remove(idx))
    }

    pub fn iter(&self) -> core::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn first(&self) -> Option<&T> {
        self.items.first()
    }

    pub fn last(&self) -> Option<&T> {
        self.items.last()
    }

    /// The sorted run of items whose keys fall inside `range`.
    pub fn range<R: RangeBounds<T::Key>>(&self, range: R) -> &[T] {
        let start = match range.start_bound() {
            Bound::Included(k) => self.items.partition_point(|i| i.key() < k),
            Bound::Excluded(k) => self.items.partition_point(|i| i.key() <= k),
            Bound::Unbounded => 0,
        };
        let end = match range.end_bound() {
            Bound::Included(k) => self.items.partition_point(|i| i.key() <= k),
            Bound::Excluded(k) => self.items.partition_point(|i| i.key() < k),
            Bound::Unbounded => self.items.len(),
        };
        if start >= end {
            &[]
        } else {
            &self.items[start..end]
        }
    }
}

/// Collects into key order. Later items with an already seen key are dropped.
impl<T: Entity> FromIterator<T> for SortedCollection<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut items: Vec<T> = iter.into_iter().collect();
        items.sort_by(|a, b| a.key().cmp(b.key()));
        items.dedup_by(|later, earlier| later.key() == earlier.key());
        Self { items }
    }
}

impl<'a, T: Entity> IntoIterator for &'a SortedCollection<T> {
    type Item = &'a T;
    type IntoIter = core::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<'de, T> Deserialize<'de> for SortedCollection<T>
where
    T: Entity + Deserialize<'de>,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let items = Vec::<T>::deserialize(deserializer)?;
        Ok(items.into_iter().collect())
    }
}

/// Boxed sorted stream fed into [`MergeByKey`].
pub type SortedStream<'a, T> = Box<dyn Iterator<Item = &'a T> + 'a>;

struct Head<'a, T: Entity> {
    item: &'a T,
    source: usize,
    descending: bool,
}

impl<T: Entity> PartialEq for Head<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T: Entity> Eq for Head<'_, T> {}

impl<T: Entity> PartialOrd for Head<'_, T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// BinaryHeap pops the greatest element: the next item to emit must compare greatest.
impl<T: Entity> Ord for Head<'_, T> {
    fn cmp(&self, other: &Self) -> Ordering {
        let by_key = self.item.key().cmp(other.item.key());
        let by_key = if self.descending { by_key } else { by_key.reverse() };
        by_key.then_with(|| other.source.cmp(&self.source))
    }
}

/// Heap-based k-way merge of streams that are each sorted by key.
///
/// Ascending merges expect ascending sources; descending merges expect
/// descending sources. Equal keys come out in source order.
pub struct MergeByKey<'a, T: Entity> {
    sources: Vec<SortedStream<'a, T>>,
    heap: BinaryHeap<Head<'a, T>>,
    descending: bool,
}

impl<'a, T: Entity> MergeByKey<'a, T> {
    pub fn new<I>(sources: I, descending: bool) -> Self
    where
        I: IntoIterator<Item = SortedStream<'a, T>>,
    {
        let mut sources: Vec<SortedStream<'a, T>> = sources.into_iter().collect();
        let mut heap = BinaryHeap::with_capacity(sources.len());
        for (source, stream) in sources.iter_mut().enumerate() {
            if let Some(item) = stream.next() {
                heap.push(Head {
                    item,
                    source,
                    descending,
                });
            }
        }
        Self {
            sources,
            heap,
            descending,
        }
    }
}

impl<'a, T: Entity> Iterator for MergeByKey<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        let head = self.heap.pop()?;
        if let Some(item) = self.sources[head.source].next() {
            self.heap.push(Head {
                item,
                source: head.source,
                descending: self.descending,
            });
        }
        Some(head.item)
    }
}
