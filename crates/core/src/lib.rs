//! `bookkeep-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! errors, identifiers, injected id/date sources, the key-sorted collection and
//! exact currency arithmetic.

pub mod aggregate;
pub mod collection;
pub mod currency;
pub mod entity;
pub mod error;
pub mod id;
pub mod money;
pub mod source;

pub use aggregate::AggregateRoot;
pub use collection::{MergeByKey, SortedCollection, SortedStream};
pub use currency::{AmountFormat, Currency, CurrencySpec, GroupingRule, resolve_subunit};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{Guid, PostId, Sid};
pub use money::Money;
pub use source::{
    CountingGuidSource, DateResolver, GuidSource, MonotonicSequence, ProcessSequence,
    SequenceSource, SystemDateResolver, UuidV7Source,
};
