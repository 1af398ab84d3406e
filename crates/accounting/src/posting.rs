//! Posting: validation, single-entry, bulk and aggregated posting.
//!
//! Every operation here validates the full request before touching the
//! ledger. Journal stores, the post registry and the caller's copies are
//! updated only after every check has passed.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use bookkeep_core::{DomainError, DomainResult, Money, PostId, Sid};

use crate::account::Side;
use crate::entry::{EntryState, JournalEntry};
use crate::ledger::{Ledger, Post};
use crate::tag::{AccountTag, JournalTag};

/// Result of [`Ledger::post_aggregated`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedPost {
    pub post: PostId,
    pub summary: Sid,
}

impl Ledger {
    /// Every check posting `entry` would perform, without posting it.
    pub fn validate_entry(&self, entry: &JournalEntry) -> DomainResult<()> {
        let sid = entry.sid();
        if entry.is_posted() {
            return Err(DomainError::AlreadyPosted { sid: sid.get() });
        }

        let journal = self.journal_ref(entry.journal())?;
        if let Some(stored) = journal.get_by_sid(sid) {
            if stored.is_posted() {
                return Err(DomainError::AlreadyPosted { sid: sid.get() });
            }
            if stored.guid() != entry.guid() {
                return Err(DomainError::DuplicateEntry {
                    journal: journal.tag().to_string(),
                    sid: sid.get(),
                });
            }
        }

        if !entry.is_balanced() {
            return Err(DomainError::Unbalanced {
                sid: sid.get(),
                debit: entry.debit_total(),
                credit: entry.credit_total(),
            });
        }
        if entry.is_zeroed() {
            return Err(DomainError::ZeroedEntry { sid: sid.get() });
        }

        for record in entry.records() {
            if record.entry() != sid {
                return Err(DomainError::validation(format!(
                    "record on {} belongs to j/e {}, not {}",
                    record.account(),
                    record.entry(),
                    sid
                )));
            }
            if record.is_posted() {
                return Err(DomainError::AlreadyPosted { sid: sid.get() });
            }
            if record.raw_amount() == 0 {
                continue;
            }
            self.account_ref(record.account())?
                .currency()
                .check_raw(record.raw_amount())?;
        }
        Ok(())
    }

    pub fn is_ready_to_post(&self, entry: &JournalEntry) -> bool {
        self.validate_entry(entry).is_ok()
    }

    /// Draws the next post id, refusing ids already in the registry.
    pub(crate) fn next_post_id(&mut self, taken: &BTreeSet<PostId>) -> DomainResult<PostId> {
        let id = PostId::new(self.sequence.next_sid());
        if taken.contains(&id) || self.post(id).is_some() {
            return Err(DomainError::DuplicatePostId { post: id.get() });
        }
        Ok(id)
    }

    pub(crate) fn register_post(&mut self, post: Post) -> DomainResult<()> {
        let id = post.id();
        self.posts_mut()
            .try_insert(post)
            .map(|_| ())
            .map_err(|_| DomainError::DuplicatePostId { post: id.get() })
    }

    /// Stores a draft in its journal.
    pub fn put_into_journal(&mut self, entry: JournalEntry) -> DomainResult<Sid> {
        let sid = entry.sid();
        if entry.is_posted() {
            return Err(DomainError::AlreadyPosted { sid: sid.get() });
        }
        let tag = entry.journal().clone();
        self.journal_mut(&tag)?.insert(entry)?;
        self.bump();
        tracing::debug!(journal = %tag, sid = %sid, "draft stored");
        Ok(sid)
    }

    /// Takes a draft back out of its journal.
    pub fn remove_from_journal(&mut self, journal: &str, sid: Sid) -> DomainResult<JournalEntry> {
        let tag = JournalTag::from(journal);
        let stored = self
            .journal_ref(&tag)?
            .get_by_sid(sid)
            .ok_or_else(|| entry_not_found(&tag, sid))?;
        if stored.is_posted() {
            return Err(DomainError::AlreadyPosted { sid: sid.get() });
        }
        let entry = self
            .journal_mut(&tag)?
            .take(sid)
            .ok_or_else(|| entry_not_found(&tag, sid))?;
        self.bump();
        tracing::debug!(journal = %tag, sid = %sid, "draft removed");
        Ok(entry)
    }

    /// Posts `entry` under a fresh post id.
    ///
    /// On success the journal holds the posted entry exactly once (whether or
    /// not the draft was stored before) and `entry` is updated to match it.
    pub fn post_entry(&mut self, entry: &mut JournalEntry) -> DomainResult<PostId> {
        self.validate_entry(entry)?;
        let post = self.next_post_id(&BTreeSet::new())?;

        let mut posted = entry.clone();
        posted.stamp(EntryState::Posted { post });
        let tag = posted.journal().clone();
        let sid = posted.sid();
        self.journal_mut(&tag)?.upsert(posted.clone())?;
        self.register_post(Post::new(post, tag.clone(), vec![sid], None))?;

        *entry = posted;
        self.bump();
        tracing::info!(journal = %tag, sid = %sid, post = %post, "entry posted");
        Ok(post)
    }

    /// Posts a draft already stored in `journal`.
    pub fn post_draft(&mut self, journal: &str, sid: Sid) -> DomainResult<PostId> {
        let tag = JournalTag::from(journal);
        let mut entry = self
            .journal_ref(&tag)?
            .get_by_sid(sid)
            .cloned()
            .ok_or_else(|| entry_not_found(&tag, sid))?;
        self.post_entry(&mut entry)
    }

    /// Posts several entries individually under one shared post id.
    ///
    /// Each entry keeps its own records and no summary is built. A sid
    /// listed more than once is posted once.
    pub fn post_bulk_entries(
        &mut self,
        journal: &str,
        entries: &mut [JournalEntry],
    ) -> DomainResult<PostId> {
        let tag = JournalTag::from(journal);
        self.journal_ref(&tag)?;
        let sources = self.distinct_sources(&tag, entries)?;
        let post = self.next_post_id(&BTreeSet::new())?;

        let posted: Vec<JournalEntry> = sources
            .into_iter()
            .map(|entry| {
                let mut posted = entry.clone();
                posted.stamp(EntryState::Posted { post });
                posted
            })
            .collect();

        let store = self.journal_mut(&tag)?;
        for entry in &posted {
            store.upsert(entry.clone())?;
        }
        let members: Vec<Sid> = posted.iter().map(JournalEntry::sid).collect();
        self.register_post(Post::new(post, tag.clone(), members, None))?;

        write_back(entries, &posted);
        self.bump();
        tracing::info!(journal = %tag, post = %post, entries = posted.len(), "bulk posting");
        Ok(post)
    }

    /// [`post_bulk_entries`](Self::post_bulk_entries) over drafts stored in
    /// `journal`.
    pub fn post_bulk(&mut self, journal: &str, sids: &[Sid]) -> DomainResult<PostId> {
        let mut entries = self.stored_drafts(journal, sids)?;
        self.post_bulk_entries(journal, &mut entries)
    }

    /// Collapses several drafts into one posting.
    ///
    /// Legs of all `entries` are merged by (side, account) into a summary
    /// entry dated `date`. The summary is posted; the sources are stored as
    /// [`EntryState::Summarized`] under the same post id, and their amounts
    /// reach balances only through the summary. Repeats of a sid are merged
    /// once.
    pub fn post_aggregated(
        &mut self,
        journal: &str,
        entries: &mut [JournalEntry],
        date: NaiveDate,
        description: &str,
    ) -> DomainResult<AggregatedPost> {
        let tag = JournalTag::from(journal);
        self.journal_ref(&tag)?;
        let sources = self.distinct_sources(&tag, entries)?;

        let mut legs: BTreeMap<(Side, AccountTag), Money> = BTreeMap::new();
        for entry in &sources {
            for record in entry.records().filter(|r| r.raw_amount() != 0) {
                let currency = self.account_ref(record.account())?.currency();
                let amount = Money::new(record.raw_amount(), currency.clone())?;
                let key = (record.side(), record.account().clone());
                let merged = match legs.remove(&key) {
                    Some(sum) => sum.checked_add(&amount)?,
                    None => amount,
                };
                legs.insert(key, merged);
            }
        }

        let (sid, guid) = self.next_identity();
        let mut summary = JournalEntry::summary(
            tag.clone(),
            sid,
            guid,
            date,
            description,
            legs.into_iter()
                .filter(|(_, sum)| !sum.is_zero())
                .map(|((side, account), sum)| (side, account, sum.raw()))
                .collect(),
        );
        self.validate_entry(&summary)?;
        let post = self.next_post_id(&BTreeSet::new())?;

        let stamped: Vec<JournalEntry> = sources
            .into_iter()
            .map(|entry| {
                let mut source = entry.clone();
                source.stamp(EntryState::Summarized { post, summary: sid });
                source
            })
            .collect();
        summary.stamp(EntryState::Posted { post });

        let journal = self.journal_mut(&tag)?;
        for source in &stamped {
            journal.upsert(source.clone())?;
        }
        journal.upsert(summary)?;
        let mut members: Vec<Sid> = stamped.iter().map(JournalEntry::sid).collect();
        members.push(sid);
        self.register_post(Post::new(post, tag.clone(), members, Some(sid)))?;

        write_back(entries, &stamped);
        self.bump();
        tracing::info!(
            journal = %tag,
            summary = %sid,
            post = %post,
            sources = stamped.len(),
            "aggregated posting"
        );
        Ok(AggregatedPost { post, summary: sid })
    }

    /// [`post_aggregated`](Self::post_aggregated) over drafts stored in
    /// `journal`.
    pub fn post_aggregated_drafts(
        &mut self,
        journal: &str,
        sids: &[Sid],
        date: NaiveDate,
        description: &str,
    ) -> DomainResult<AggregatedPost> {
        let mut entries = self.stored_drafts(journal, sids)?;
        self.post_aggregated(journal, &mut entries, date, description)
    }

    fn stored_drafts(&self, journal: &str, sids: &[Sid]) -> DomainResult<Vec<JournalEntry>> {
        let tag = JournalTag::from(journal);
        let stored = self.journal_ref(&tag)?;
        sids.iter()
            .map(|sid| {
                stored
                    .get_by_sid(*sid)
                    .cloned()
                    .ok_or_else(|| entry_not_found(&tag, *sid))
            })
            .collect()
    }

    /// Validated sources of a multi-entry posting, first copy of each sid.
    fn distinct_sources<'e>(
        &self,
        tag: &JournalTag,
        entries: &'e [JournalEntry],
    ) -> DomainResult<Vec<&'e JournalEntry>> {
        if entries.is_empty() {
            return Err(DomainError::validation("nothing to post"));
        }
        let mut seen = BTreeSet::new();
        let mut sources = Vec::with_capacity(entries.len());
        for entry in entries {
            if entry.journal() != tag {
                return Err(DomainError::validation(format!(
                    "j/e {} belongs to journal '{}', not '{}'",
                    entry.sid(),
                    entry.journal(),
                    tag
                )));
            }
            if seen.insert(entry.sid()) {
                self.validate_entry(entry)?;
                sources.push(entry);
            }
        }
        Ok(sources)
    }
}

/// Copies committed entries back over the caller's, repeats included.
fn write_back(entries: &mut [JournalEntry], committed: &[JournalEntry]) {
    for entry in entries.iter_mut() {
        if let Some(done) = committed.iter().find(|c| c.sid() == entry.sid()) {
            *entry = done.clone();
        }
    }
}

pub(crate) fn entry_not_found(journal: &JournalTag, sid: Sid) -> DomainError {
    DomainError::EntryNotFound {
        journal: journal.to_string(),
        sid: sid.get(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Account;
    use crate::entry::EntryTemplate;
    use crate::journal::{EntryFilter, Journal};
    use bookkeep_core::{AggregateRoot, CountingGuidSource, Currency, MonotonicSequence};

    fn pln() -> Currency {
        Currency::new("PLN", "985", 100, "Polish zloty").unwrap()
    }

    fn mru() -> Currency {
        Currency::new("MRU", "929", 5, "Ouguiya").unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 3, d).unwrap()
    }

    fn test_ledger() -> Ledger {
        let mut ledger = Ledger::with_sources(
            "GL",
            "General Ledger",
            MonotonicSequence::new(),
            CountingGuidSource::default(),
        );
        for (tag, name) in [("110", "Cash"), ("400", "Sales"), ("270", "Tax Payables")] {
            ledger
                .register_account(Account::new(tag, name, pln()).unwrap())
                .unwrap();
        }
        ledger
            .register_account(Account::new("115", "Cash MRU", mru()).unwrap())
            .unwrap();
        ledger
            .register_journal(Journal::general("GJ", "General Journal"))
            .unwrap();
        ledger
            .register_journal(Journal::new(
                "SJ",
                "Sales Journal",
                EntryTemplate::new()
                    .fixed("Cash", Some("110"), Some(Side::Debit))
                    .fixed("Sale", Some("400"), Some(Side::Credit))
                    .fixed("Tax", Some("270"), Some(Side::Credit)),
            ))
            .unwrap();
        ledger
    }

    fn cash_sale(ledger: &mut Ledger, d: u32, cash: i64) -> JournalEntry {
        let mut entry = ledger.new_entry("SJ", day(d)).unwrap();
        entry.debit("Cash", cash, None).unwrap();
        entry.credit("Sale", cash, None).unwrap();
        entry
    }

    #[test]
    fn posting_stamps_every_record_once() {
        let mut ledger = test_ledger();
        let mut entry = ledger.new_entry("SJ", day(1)).unwrap();
        entry.debit("Cash", 1000, None).unwrap();
        entry.credit("Sale", 900, None).unwrap();
        entry.credit("Tax", 100, None).unwrap();
        assert!(ledger.is_ready_to_post(&entry));

        let post = ledger.post_entry(&mut entry).unwrap();
        assert!(entry.records().all(|r| r.post() == Some(post)));
        assert_eq!(ledger.journal("SJ").unwrap().len(), 1);
        assert_eq!(ledger.post(post).unwrap().entries(), &[entry.sid()]);
        assert_eq!(ledger.account("110").unwrap().balance(), 1000);
        assert_eq!(ledger.account("400").unwrap().balance(), -900);
    }

    #[test]
    fn stored_draft_is_replaced_not_duplicated() {
        let mut ledger = test_ledger();
        let entry = cash_sale(&mut ledger, 1, 300);
        let sid = ledger.put_into_journal(entry).unwrap();
        assert_eq!(ledger.account("110").unwrap().balance(), 0);

        ledger.post_draft("SJ", sid).unwrap();
        let journal = ledger.journal("SJ").unwrap();
        assert_eq!(journal.len(), 1);
        assert!(journal.get_by_sid(sid).unwrap().is_posted());
        assert!(matches!(
            ledger.post_draft("SJ", sid),
            Err(DomainError::AlreadyPosted { .. })
        ));
    }

    #[test]
    fn rejected_posting_changes_nothing() {
        let mut ledger = test_ledger();
        let mut entry = ledger.new_entry("SJ", day(1)).unwrap();
        entry.debit("Cash", 1000, None).unwrap();
        entry.credit("Sale", 900, None).unwrap();
        let version = ledger.version();

        assert_eq!(
            ledger.post_entry(&mut entry),
            Err(DomainError::Unbalanced {
                sid: entry.sid().get(),
                debit: 1000,
                credit: 900
            })
        );
        assert_eq!(ledger.version(), version);
        assert!(ledger.journal("SJ").unwrap().is_empty());
        assert_eq!(ledger.posts().count(), 0);
        assert!(!entry.is_posted());
    }

    #[test]
    fn zeroed_and_unknown_accounts_are_rejected() {
        let mut ledger = test_ledger();
        let mut empty = ledger.new_entry("GJ", day(1)).unwrap();
        assert!(matches!(
            ledger.post_entry(&mut empty),
            Err(DomainError::ZeroedEntry { .. })
        ));

        let mut stray = ledger.new_entry("GJ", day(1)).unwrap();
        stray.debit("Account", 10, Some("999")).unwrap();
        stray.credit("Account", 10, Some("110")).unwrap();
        assert_eq!(
            ledger.post_entry(&mut stray),
            Err(DomainError::UnknownAccount { tag: "999".into() })
        );
    }

    #[test]
    fn posting_checks_currency_precision() {
        let mut ledger = test_ledger();
        let mut entry = ledger.new_entry("GJ", day(1)).unwrap();
        entry.debit("Account", 45435, Some("115")).unwrap();
        entry.credit("Account", 45435, Some("115")).unwrap();
        assert!(matches!(
            ledger.post_entry(&mut entry),
            Err(DomainError::Precision(_))
        ));
    }

    #[test]
    fn draft_can_be_removed_but_posted_cannot() {
        let mut ledger = test_ledger();
        let draft = cash_sale(&mut ledger, 1, 10);
        let sid = ledger.put_into_journal(draft.clone()).unwrap();
        assert!(matches!(
            ledger.put_into_journal(draft),
            Err(DomainError::DuplicateEntry { .. })
        ));
        assert_eq!(ledger.remove_from_journal("SJ", sid).unwrap().sid(), sid);

        let mut entry = cash_sale(&mut ledger, 2, 10);
        ledger.post_entry(&mut entry).unwrap();
        assert!(matches!(
            ledger.remove_from_journal("SJ", entry.sid()),
            Err(DomainError::AlreadyPosted { .. })
        ));
    }

    #[test]
    fn aggregated_posting_merges_legs() {
        let mut ledger = test_ledger();
        let mut sources = vec![cash_sale(&mut ledger, 1, 100), cash_sale(&mut ledger, 2, 50)];

        let result = ledger
            .post_aggregated("SJ", &mut sources, day(3), "Summary")
            .unwrap();

        let summary = ledger.find_entry(result.summary).unwrap();
        let cash: Vec<_> = summary
            .records()
            .filter(|r| r.account() == "110")
            .map(|r| (r.side(), r.raw_amount()))
            .collect();
        assert_eq!(cash, vec![(Side::Debit, 150)]);
        assert_eq!(summary.description(), "Summary");

        for source in &sources {
            assert_eq!(source.post(), Some(result.post));
            assert!(source.records().all(|r| r.post() == Some(result.post)));
        }
        assert_eq!(ledger.entries_for_post(result.post).count(), 3);
        assert_eq!(ledger.account("110").unwrap().balance(), 150);
        assert_eq!(
            ledger
                .journal("SJ")
                .unwrap()
                .entries(&EntryFilter::posted())
                .count(),
            3
        );
    }

    #[test]
    fn aggregation_merges_a_repeated_source_once() {
        let mut ledger = test_ledger();
        let e1 = cash_sale(&mut ledger, 1, 100);
        let e2 = cash_sale(&mut ledger, 2, 50);
        let (s1, s2) = (e1.sid(), e2.sid());
        let mut sources = vec![e1.clone(), e2, e1.clone(), e1];

        let result = ledger
            .post_aggregated("SJ", &mut sources, day(3), "Summary")
            .unwrap();

        let summary = ledger.find_entry(result.summary).unwrap();
        let legs: Vec<_> = summary
            .records()
            .map(|r| (r.side(), r.account().to_string(), r.raw_amount()))
            .collect();
        assert_eq!(
            legs,
            vec![
                (Side::Debit, "110".to_string(), 150),
                (Side::Credit, "400".to_string(), 150)
            ]
        );
        assert_eq!(ledger.post(result.post).unwrap().entries(), &[s1, s2, result.summary]);
        assert!(sources.iter().all(|e| e.post() == Some(result.post)));
        assert_eq!(ledger.journal("SJ").unwrap().len(), 3);
    }

    #[test]
    fn bulk_posting_shares_one_post_id_without_a_summary() {
        let mut ledger = test_ledger();
        let a = cash_sale(&mut ledger, 1, 70);
        let b = cash_sale(&mut ledger, 2, 30);
        let (a, b) = (
            ledger.put_into_journal(a).unwrap(),
            ledger.put_into_journal(b).unwrap(),
        );

        let post = ledger.post_bulk("SJ", &[a, b, a]).unwrap();

        let registered = ledger.post(post).unwrap();
        assert_eq!(registered.entries(), &[a, b]);
        assert_eq!(registered.summary(), None);
        let journal = ledger.journal("SJ").unwrap();
        assert_eq!(journal.len(), 2);
        for sid in [a, b] {
            let entry = journal.get_by_sid(sid).unwrap();
            assert_eq!(entry.state(), EntryState::Posted { post });
            assert!(entry.records().all(|r| r.post() == Some(post)));
        }
        assert_eq!(ledger.account("110").unwrap().debit(), 100);
        assert_eq!(ledger.entries_for_post(post).count(), 2);
    }

    #[test]
    fn bulk_posting_is_all_or_nothing() {
        let mut ledger = test_ledger();
        let good = cash_sale(&mut ledger, 1, 10);
        let mut bad = ledger.new_entry("SJ", day(1)).unwrap();
        bad.debit("Cash", 10, None).unwrap();
        let version = ledger.version();

        let mut entries = vec![good, bad];
        assert!(matches!(
            ledger.post_bulk_entries("SJ", &mut entries),
            Err(DomainError::Unbalanced { .. })
        ));
        assert_eq!(ledger.version(), version);
        assert!(ledger.journal("SJ").unwrap().is_empty());
        assert_eq!(ledger.posts().count(), 0);
        assert!(entries.iter().all(|e| !e.is_posted()));
        assert!(matches!(
            ledger.post_bulk_entries("SJ", &mut []),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn aggregation_rejects_posted_sources() {
        let mut ledger = test_ledger();
        let mut done = cash_sale(&mut ledger, 1, 100);
        ledger.post_entry(&mut done).unwrap();
        let version = ledger.version();

        let mut sources = vec![cash_sale(&mut ledger, 2, 10), done];
        assert!(matches!(
            ledger.post_aggregated("SJ", &mut sources, day(3), "Summary"),
            Err(DomainError::AlreadyPosted { .. })
        ));
        assert_eq!(ledger.version(), version);
        assert!(!sources[0].is_posted());
    }

    #[test]
    fn aggregating_stored_drafts() {
        let mut ledger = test_ledger();
        let a = cash_sale(&mut ledger, 1, 70);
        let b = cash_sale(&mut ledger, 1, 30);
        let a = ledger.put_into_journal(a).unwrap();
        let b = ledger.put_into_journal(b).unwrap();

        let result = ledger
            .post_aggregated_drafts("SJ", &[a, b], day(2), "Day 1")
            .unwrap();
        let post = ledger.post(result.post).unwrap();
        assert_eq!(post.entries(), &[a, b, result.summary]);
        assert_eq!(post.summary(), Some(result.summary));
        assert_eq!(ledger.journal("SJ").unwrap().len(), 3);
        assert_eq!(ledger.account("400").unwrap().credit(), 100);
    }
}
