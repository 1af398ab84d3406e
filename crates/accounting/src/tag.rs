//! Human-chosen tags that key accounts, journals and ledgers.

use serde::{Deserialize, Serialize};

use bookkeep_core::Guid;

/// Tag of an account (unique within a ledger), e.g. `110`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountTag(String);

/// Tag of a journal (unique within a ledger), e.g. `SJ`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JournalTag(String);

/// Tag of a ledger, e.g. `GL`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LedgerTag(String);

macro_rules! impl_tag_newtype {
    ($t:ty) => {
        impl $t {
            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $t {
            fn from(value: &str) -> Self {
                Self(value.trim().to_string())
            }
        }

        impl From<String> for $t {
            fn from(value: String) -> Self {
                Self::from(value.as_str())
            }
        }

        impl AsRef<str> for $t {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $t {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $t {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }
    };
}

impl_tag_newtype!(AccountTag);
impl_tag_newtype!(JournalTag);
impl_tag_newtype!(LedgerTag);

/// Which ledger an account or journal is registered in.
///
/// Tags need not be unique across ledgers, so ownership is decided by `id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedgerBinding {
    id: Guid,
    tag: LedgerTag,
}

impl LedgerBinding {
    pub(crate) fn new(id: Guid, tag: LedgerTag) -> Self {
        Self { id, tag }
    }

    pub fn id(&self) -> Guid {
        self.id
    }

    pub fn tag(&self) -> &LedgerTag {
        &self.tag
    }
}
