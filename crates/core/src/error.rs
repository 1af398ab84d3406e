//! Domain error model.

use thiserror::Error;

/// Result type used across the bookkeeping engine.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every variant is local and deterministic: the request was wrong, nothing
/// transient happened. Operations validate before they mutate, so receiving
/// one of these means no state changed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    // currency arithmetic
    #[error("precision error: {0}")]
    Precision(String),

    #[error("unsupported ratio of subunits to unit: {ratio}")]
    UnsupportedRatio { ratio: u64 },

    #[error("allocation error: {0}")]
    Allocation(String),

    #[error("currency mismatch: {left} vs {right}")]
    CurrencyMismatch { left: String, right: String },

    // entry field misuse
    #[error("unknown field '{field}'")]
    UnknownField { field: String },

    #[error("field '{field}' does not hold {expected}")]
    FieldKind { field: String, expected: &'static str },

    #[error("account side cannot be determined for field '{field}'")]
    AmbiguousSide { field: String },

    #[error("account cannot be determined for field '{field}'")]
    AmbiguousAccount { field: String },

    // ledger validation
    #[error("entry {sid} is not balanced (debit {debit}, credit {credit})")]
    Unbalanced { sid: u64, debit: i128, credit: i128 },

    #[error("entry {sid} is zeroed")]
    ZeroedEntry { sid: u64 },

    #[error("account '{tag}' is not registered in this ledger")]
    UnknownAccount { tag: String },

    #[error("journal '{tag}' is not registered in this ledger")]
    UnknownJournal { tag: String },

    #[error("entry {sid} not found in journal '{journal}'")]
    EntryNotFound { journal: String, sid: u64 },

    #[error("entry {sid} is already stored in journal '{journal}'")]
    DuplicateEntry { journal: String, sid: u64 },

    #[error("post id {post} is already registered")]
    DuplicatePostId { post: u64 },

    #[error("'{tag}' belongs to ledger '{ledger}'")]
    ForeignLedger { tag: String, ledger: String },

    #[error("tag '{tag}' is already in use")]
    DuplicateTag { tag: String },

    // tree mutation
    #[error("cannot move node '{node}' under its own descendant '{parent}'")]
    CycleError { node: String, parent: String },

    #[error("{0} is not empty")]
    NotEmpty(String),

    #[error("the root node cannot be moved or deleted")]
    RootProtected,

    #[error("unknown tree node {0}")]
    UnknownNode(usize),

    // lifecycle misuse
    #[error("entry {sid} is already canceled or is itself a cancellation")]
    AlreadyCanceled { sid: u64 },

    #[error("entry {sid} is already posted")]
    AlreadyPosted { sid: u64 },

    // generic
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn precision(msg: impl Into<String>) -> Self {
        Self::Precision(msg.into())
    }

    pub fn allocation(msg: impl Into<String>) -> Self {
        Self::Allocation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn not_empty(what: impl Into<String>) -> Self {
        Self::NotEmpty(what.into())
    }
}
