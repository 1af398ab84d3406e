//! Double-entry bookkeeping engine.
//!
//! Pure domain logic only: no IO, no persistence concerns. The [`Ledger`]
//! owns accounts and journals and is the only way an entry gets posted.

pub mod account;
pub mod cancel;
pub mod config;
pub mod entry;
pub mod journal;
pub mod ledger;
pub mod marker;
pub mod posting;
pub mod tag;
pub mod tree;

pub use account::{Account, AccountRecord, AccountView, Side};
pub use cancel::{CancelMethod, CancelOutcome};
pub use config::LedgerConfig;
pub use entry::{
    CancellationLink, EntryKey, EntryState, EntryTemplate, Field, FieldSlot, FieldTemplate,
    JournalEntry, RecordLocation, SUMMARY_FIELD,
};
pub use journal::{EntryFilter, Journal};
pub use ledger::{Ledger, Post, Records};
pub use marker::{Marker, MarkerGroup, MarkerSet};
pub use posting::AggregatedPost;
pub use tag::{AccountTag, JournalTag, LedgerBinding, LedgerTag};
pub use tree::{AccountTree, Node, NodeId, NodeQuery, Subtree};
