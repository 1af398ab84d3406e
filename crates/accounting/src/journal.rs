//! Journals: named, chronologically ordered streams of entries.

use core::ops::Bound;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use bookkeep_core::{DomainError, DomainResult, Entity, Guid, Sid, SortedCollection, SortedStream};

use crate::entry::{EntryKey, EntryTemplate, JournalEntry};
use crate::tag::{JournalTag, LedgerBinding, LedgerTag};

/// Selection of entries for journal and ledger queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryFilter {
    pub posted: bool,
    pub unposted: bool,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub reverse: bool,
    pub journal: Option<JournalTag>,
}

impl Default for EntryFilter {
    fn default() -> Self {
        Self {
            posted: true,
            unposted: true,
            date_from: None,
            date_to: None,
            reverse: false,
            journal: None,
        }
    }
}

impl EntryFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn posted() -> Self {
        Self {
            unposted: false,
            ..Self::default()
        }
    }

    pub fn unposted() -> Self {
        Self {
            posted: false,
            ..Self::default()
        }
    }

    /// Inclusive on both ends.
    pub fn between(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.date_from = Some(from);
        self.date_to = Some(to);
        self
    }

    pub fn since(mut self, from: NaiveDate) -> Self {
        self.date_from = Some(from);
        self
    }

    pub fn until(mut self, to: NaiveDate) -> Self {
        self.date_to = Some(to);
        self
    }

    pub fn reversed(mut self) -> Self {
        self.reverse = true;
        self
    }

    pub fn in_journal(mut self, journal: impl Into<JournalTag>) -> Self {
        self.journal = Some(journal.into());
        self
    }

    pub fn accepts(&self, entry: &JournalEntry) -> bool {
        let state_ok = if entry.is_posted() {
            self.posted
        } else {
            self.unposted
        };
        state_ok
            && self.date_from.is_none_or(|from| entry.date() >= from)
            && self.date_to.is_none_or(|to| entry.date() <= to)
    }

    fn key_range(&self) -> (Bound<EntryKey>, Bound<EntryKey>) {
        let lower = match self.date_from {
            Some(from) => Bound::Included(EntryKey::start_of(from)),
            None => Bound::Unbounded,
        };
        let upper = match self.date_to.and_then(|to| to.succ_opt()) {
            Some(next) => Bound::Excluded(EntryKey::start_of(next)),
            None => Bound::Unbounded,
        };
        (lower, upper)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Journal {
    tag: JournalTag,
    name: String,
    ledger: Option<LedgerBinding>,
    template: EntryTemplate,
    entries: SortedCollection<JournalEntry>,
}

impl Entity for Journal {
    type Key = JournalTag;

    fn key(&self) -> &JournalTag {
        &self.tag
    }
}

impl Journal {
    pub fn new(tag: impl Into<JournalTag>, name: impl Into<String>, template: EntryTemplate) -> Self {
        Self {
            tag: tag.into(),
            name: name.into(),
            ledger: None,
            template,
            entries: SortedCollection::new(),
        }
    }

    /// Journal whose entries hold one open list of records.
    pub fn general(tag: impl Into<JournalTag>, name: impl Into<String>) -> Self {
        Self::new(tag, name, EntryTemplate::general())
    }

    pub fn tag(&self) -> &JournalTag {
        &self.tag
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ledger(&self) -> Option<&LedgerTag> {
        self.ledger.as_ref().map(LedgerBinding::tag)
    }

    pub fn binding(&self) -> Option<&LedgerBinding> {
        self.ledger.as_ref()
    }

    pub fn template(&self) -> &EntryTemplate {
        &self.template
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// A draft shaped by this journal's template.
    pub fn new_entry(&self, sid: Sid, guid: Guid, date: NaiveDate) -> JournalEntry {
        JournalEntry::from_template(self.tag.clone(), &self.template, sid, guid, date)
    }

    /// Entries selected by `filter`, in (date, time, sid) order.
    ///
    /// Each call starts a fresh pass over the store.
    pub fn entries<'a>(&'a self, filter: &EntryFilter) -> SortedStream<'a, JournalEntry> {
        let slice = self.entries.range(filter.key_range());
        let reverse = filter.reverse;
        let filter = filter.clone();
        let keep = move |entry: &&JournalEntry| filter.accepts(entry);
        if reverse {
            Box::new(slice.iter().rev().filter(keep))
        } else {
            Box::new(slice.iter().filter(keep))
        }
    }

    pub fn get_by_sid(&self, sid: Sid) -> Option<&JournalEntry> {
        self.entries.iter().find(|e| e.sid() == sid)
    }

    pub fn get_by_guid(&self, guid: Guid) -> Option<&JournalEntry> {
        self.entries.iter().find(|e| e.guid() == guid)
    }

    pub fn contains(&self, sid: Sid) -> bool {
        self.get_by_sid(sid).is_some()
    }

    pub(crate) fn bind(&mut self, ledger: Option<LedgerBinding>) {
        self.ledger = ledger;
    }

    pub(crate) fn insert(&mut self, entry: JournalEntry) -> DomainResult<()> {
        let sid = entry.sid();
        if self.contains(sid) {
            return Err(self.duplicate(sid));
        }
        self.entries
            .try_insert(entry)
            .map(|_| ())
            .map_err(|_| self.duplicate(sid))
    }

    pub(crate) fn take(&mut self, sid: Sid) -> Option<JournalEntry> {
        let key = *self.get_by_sid(sid)?.key();
        self.entries.remove(&key)
    }

    /// Stores `entry`, replacing the stored entry with the same sid.
    pub(crate) fn upsert(&mut self, entry: JournalEntry) -> DomainResult<()> {
        let sid = entry.sid();
        let previous = self.take(sid);
        if self.entries.try_insert(entry).is_err() {
            if let Some(previous) = previous {
                // `take` freed this key, so the old entry always fits back
                self.entries.try_insert(previous).ok();
            }
            return Err(self.duplicate(sid));
        }
        Ok(())
    }

    /// Mutable access for changes that keep the entry's key.
    pub(crate) fn entry_mut(&mut self, sid: Sid) -> Option<&mut JournalEntry> {
        let key = *self.get_by_sid(sid)?.key();
        self.entries.find_mut(&key)
    }

    fn duplicate(&self, sid: Sid) -> DomainError {
        DomainError::DuplicateEntry {
            journal: self.tag.to_string(),
            sid: sid.get(),
        }
    }
}
