//! Cancellation of journal entries.

use core::str::FromStr;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use bookkeep_core::{DomainError, DomainResult, PostId, Sid};

use crate::entry::{EntryState, JournalEntry};
use crate::ledger::{Ledger, Post};
use crate::posting::entry_not_found;
use crate::tag::JournalTag;

/// How a posted entry is canceled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CancelMethod {
    /// Delete the entry. Drafts only.
    Remove,
    /// Post a counter-entry with every side flipped.
    Reverse,
    /// Post a counter-entry with every amount negated.
    Storno,
}

impl core::fmt::Display for CancelMethod {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            CancelMethod::Remove => "REMOVE",
            CancelMethod::Reverse => "REVERSE",
            CancelMethod::Storno => "STORNO",
        })
    }
}

impl FromStr for CancelMethod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "remove" => Ok(CancelMethod::Remove),
            "reverse" => Ok(CancelMethod::Reverse),
            "storno" => Ok(CancelMethod::Storno),
            other => Err(DomainError::validation(format!(
                "unknown cancel method '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancelOutcome {
    /// The draft was deleted from its journal.
    Removed(Sid),
    /// A posted counter-entry now cancels `original`.
    Countered {
        original: Sid,
        counter: Sid,
        post: PostId,
    },
}

enum Plan {
    Remove(Sid),
    Counter {
        original: Sid,
        counter: JournalEntry,
        post: PostId,
    },
}

impl Ledger {
    /// Cancels entries of `journal` as one transaction.
    ///
    /// Drafts are removed whatever the method. Posted entries get a posted
    /// counter-entry and an explicit link both ways; `Remove` on a posted
    /// entry is refused. Either every target is canceled or none is.
    pub fn bulk_cancel(
        &mut self,
        journal: &str,
        sids: &[Sid],
        method: CancelMethod,
    ) -> DomainResult<Vec<CancelOutcome>> {
        let tag = JournalTag::from(journal);

        let mut seen = BTreeSet::new();
        let mut targets = Vec::new();
        {
            let stored = self.journal_ref(&tag)?;
            for &sid in sids {
                if !seen.insert(sid) {
                    continue;
                }
                let entry = stored
                    .get_by_sid(sid)
                    .ok_or_else(|| entry_not_found(&tag, sid))?;
                if entry.cancellation().is_some() {
                    return Err(DomainError::AlreadyCanceled { sid: sid.get() });
                }
                if entry.is_summarized() {
                    return Err(DomainError::validation(format!(
                        "j/e {sid} is part of an aggregated posting; cancel its summary instead"
                    )));
                }
                if entry.is_posted() && method == CancelMethod::Remove {
                    return Err(DomainError::AlreadyPosted { sid: sid.get() });
                }
                targets.push(entry.clone());
            }
        }

        let mut taken = BTreeSet::new();
        let mut plans = Vec::with_capacity(targets.len());
        for original in &targets {
            if !original.is_posted() {
                plans.push(Plan::Remove(original.sid()));
                continue;
            }
            let (sid, guid) = self.next_identity();
            let mut counter = original.counter_entry(sid, guid, method == CancelMethod::Storno);
            counter.describe(format!("{method} entry -> {}", original.description()));
            self.validate_entry(&counter)?;
            let post = self.next_post_id(&taken)?;
            taken.insert(post);
            plans.push(Plan::Counter {
                original: original.sid(),
                counter,
                post,
            });
        }

        let mut outcomes = Vec::with_capacity(plans.len());
        let mut posts = Vec::new();
        let store = self.journal_mut(&tag)?;
        for plan in plans {
            match plan {
                Plan::Remove(sid) => {
                    store.take(sid);
                    outcomes.push(CancelOutcome::Removed(sid));
                }
                Plan::Counter {
                    original,
                    mut counter,
                    post,
                } => {
                    let counter_sid = counter.sid();
                    if let Some(entry) = store.entry_mut(original) {
                        entry.mark_canceled_by(counter_sid);
                    }
                    counter.stamp(EntryState::Posted { post });
                    store.upsert(counter)?;
                    posts.push(Post::new(post, tag.clone(), vec![counter_sid], None));
                    outcomes.push(CancelOutcome::Countered {
                        original,
                        counter: counter_sid,
                        post,
                    });
                }
            }
        }
        for post in posts {
            self.register_post(post)?;
        }

        self.bump();
        tracing::info!(
            journal = %tag,
            method = %method,
            canceled = outcomes.len(),
            "entries canceled"
        );
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{Account, Side};
    use crate::entry::CancellationLink;
    use crate::journal::Journal;
    use bookkeep_core::{AggregateRoot, CountingGuidSource, Currency, MonotonicSequence};
    use chrono::NaiveDate;

    fn test_ledger() -> Ledger {
        let pln = Currency::new("PLN", "985", 100, "Polish zloty").unwrap();
        let mut ledger = Ledger::with_sources(
            "GL",
            "General Ledger",
            MonotonicSequence::new(),
            CountingGuidSource::default(),
        );
        for (tag, name) in [("110", "Cash"), ("400", "Sales")] {
            ledger
                .register_account(Account::new(tag, name, pln.clone()).unwrap())
                .unwrap();
        }
        ledger
            .register_journal(Journal::general("GJ", "General Journal"))
            .unwrap();
        ledger
    }

    fn sale(ledger: &mut Ledger, amount: i64) -> JournalEntry {
        let date = NaiveDate::from_ymd_opt(2023, 4, 1).unwrap();
        let mut entry = ledger.new_entry("GJ", date).unwrap();
        entry.set_description("Cash sale").unwrap();
        entry.debit("Account", amount, Some("110")).unwrap();
        entry.credit("Account", amount, Some("400")).unwrap();
        entry
    }

    fn posted_sale(ledger: &mut Ledger, amount: i64) -> Sid {
        let mut entry = sale(ledger, amount);
        ledger.post_entry(&mut entry).unwrap();
        entry.sid()
    }

    #[test]
    fn method_parses_and_displays() {
        assert_eq!("storno".parse::<CancelMethod>().unwrap(), CancelMethod::Storno);
        assert_eq!(" Reverse ".parse::<CancelMethod>().unwrap(), CancelMethod::Reverse);
        assert!("undo".parse::<CancelMethod>().is_err());
        assert_eq!(CancelMethod::Remove.to_string(), "REMOVE");
    }

    #[test]
    fn storno_negates_amounts_and_links_both_ways() {
        let mut ledger = test_ledger();
        let sid = posted_sale(&mut ledger, 500);

        let outcomes = ledger
            .bulk_cancel("GJ", &[sid], CancelMethod::Storno)
            .unwrap();
        let CancelOutcome::Countered { counter, post, .. } = outcomes[0] else {
            panic!("expected a counter-entry, got {outcomes:?}");
        };

        let counter_entry = ledger.find_entry(counter).unwrap();
        let cash = counter_entry
            .records()
            .find(|r| r.account() == "110")
            .unwrap();
        assert_eq!((cash.side(), cash.raw_amount()), (Side::Debit, -500));
        assert_eq!(counter_entry.post(), Some(post));
        assert_eq!(counter_entry.description(), "STORNO entry -> Cash sale");
        assert_eq!(counter_entry.cancellation(), Some(CancellationLink::Cancels(sid)));

        let original = ledger.find_entry(sid).unwrap();
        assert_eq!(original.cancellation(), Some(CancellationLink::CanceledBy(counter)));
        assert!(original.reference().unwrap().starts_with("Canceled by j/e"));
        assert_eq!(ledger.account("110").unwrap().balance(), 0);
        assert_eq!(ledger.account("110").unwrap().debit(), 0);

        assert_eq!(
            ledger.bulk_cancel("GJ", &[sid], CancelMethod::Storno),
            Err(DomainError::AlreadyCanceled { sid: sid.get() })
        );
        assert!(matches!(
            ledger.bulk_cancel("GJ", &[counter], CancelMethod::Reverse),
            Err(DomainError::AlreadyCanceled { .. })
        ));
    }

    #[test]
    fn reverse_flips_sides() {
        let mut ledger = test_ledger();
        let sid = posted_sale(&mut ledger, 250);
        let outcomes = ledger
            .bulk_cancel("GJ", &[sid], CancelMethod::Reverse)
            .unwrap();
        let CancelOutcome::Countered { counter, .. } = outcomes[0] else {
            panic!("expected a counter-entry");
        };
        let cash = ledger
            .find_entry(counter)
            .unwrap()
            .records()
            .find(|r| r.account() == "110")
            .unwrap()
            .clone();
        assert_eq!((cash.side(), cash.raw_amount()), (Side::Credit, 250));
        let account = ledger.account("110").unwrap();
        assert_eq!((account.debit(), account.credit(), account.balance()), (250, 250, 0));
    }

    #[test]
    fn drafts_are_removed_under_any_method() {
        let mut ledger = test_ledger();
        let draft = sale(&mut ledger, 10);
        let draft = ledger.put_into_journal(draft).unwrap();
        let posted = posted_sale(&mut ledger, 20);

        let outcomes = ledger
            .bulk_cancel("GJ", &[draft, posted, draft], CancelMethod::Storno)
            .unwrap();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0], CancelOutcome::Removed(draft));
        assert!(matches!(outcomes[1], CancelOutcome::Countered { original, .. } if original == posted));
        assert!(!ledger.journal("GJ").unwrap().contains(draft));
    }

    #[test]
    fn failed_bulk_cancel_is_all_or_nothing() {
        let mut ledger = test_ledger();
        let draft = sale(&mut ledger, 10);
        let draft = ledger.put_into_journal(draft).unwrap();
        let posted = posted_sale(&mut ledger, 20);
        let version = ledger.version();
        let posts = ledger.posts().count();

        assert!(matches!(
            ledger.bulk_cancel("GJ", &[draft, posted], CancelMethod::Remove),
            Err(DomainError::AlreadyPosted { .. })
        ));
        assert!(matches!(
            ledger.bulk_cancel("GJ", &[posted, Sid::new(999)], CancelMethod::Storno),
            Err(DomainError::EntryNotFound { sid: 999, .. })
        ));
        assert_eq!(ledger.version(), version);
        assert_eq!(ledger.posts().count(), posts);
        assert!(ledger.journal("GJ").unwrap().contains(draft));
        assert!(ledger.find_entry(posted).unwrap().cancellation().is_none());
    }

    #[test]
    fn summarized_sources_cannot_be_canceled_directly() {
        let mut ledger = test_ledger();
        let mut sources = vec![sale(&mut ledger, 5), sale(&mut ledger, 7)];
        let date = NaiveDate::from_ymd_opt(2023, 4, 2).unwrap();
        let result = ledger
            .post_aggregated("GJ", &mut sources, date, "Summary")
            .unwrap();

        assert!(matches!(
            ledger.bulk_cancel("GJ", &[sources[0].sid()], CancelMethod::Storno),
            Err(DomainError::Validation(_))
        ));
        ledger
            .bulk_cancel("GJ", &[result.summary], CancelMethod::Storno)
            .unwrap();
        assert_eq!(ledger.account("400").unwrap().balance(), 0);
    }
}
