use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use bookkeep_core::{
    AggregateRoot, DateResolver, DomainError, DomainResult, Entity, Guid, GuidSource, MergeByKey,
    MonotonicSequence, PostId, SequenceSource, Sid, SortedCollection, UuidV7Source,
};

use crate::account::{Account, AccountRecord, AccountView};
use crate::config::LedgerConfig;
use crate::entry::JournalEntry;
use crate::journal::{EntryFilter, Journal};
use crate::tag::{AccountTag, JournalTag, LedgerBinding, LedgerTag};

/// Lazily evaluated stream of posting legs.
pub type Records<'a> = Box<dyn Iterator<Item = &'a AccountRecord> + 'a>;

/// Registry record of one posting operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    id: PostId,
    journal: JournalTag,
    entries: Vec<Sid>,
    summary: Option<Sid>,
}

impl Post {
    pub(crate) fn new(id: PostId, journal: JournalTag, entries: Vec<Sid>, summary: Option<Sid>) -> Self {
        Self {
            id,
            journal,
            entries,
            summary,
        }
    }

    pub fn id(&self) -> PostId {
        self.id
    }

    pub fn journal(&self) -> &JournalTag {
        &self.journal
    }

    /// Every entry stamped with this post id.
    pub fn entries(&self) -> &[Sid] {
        &self.entries
    }

    /// The summary entry, for aggregated postings.
    pub fn summary(&self) -> Option<Sid> {
        self.summary
    }
}

impl Entity for Post {
    type Key = PostId;

    fn key(&self) -> &PostId {
        &self.id
    }
}

/// Aggregate root: the general ledger.
///
/// Owns accounts and journals, and is the only place post ids come from.
/// Every mutation validates first and commits second, so a rejected call
/// leaves the ledger (and its version) untouched.
#[derive(Debug)]
pub struct Ledger {
    id: Guid,
    tag: LedgerTag,
    name: String,
    version: u64,
    posts: SortedCollection<Post>,
    accounts: SortedCollection<Account>,
    journals: SortedCollection<Journal>,
    pub(crate) sequence: Box<dyn SequenceSource>,
    pub(crate) guids: Box<dyn GuidSource>,
}

impl AggregateRoot for Ledger {
    type Id = Guid;

    fn id(&self) -> &Guid {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Ledger {
    pub fn new(tag: impl Into<LedgerTag>, name: impl Into<String>) -> Self {
        Self::with_sources(tag, name, MonotonicSequence::new(), UuidV7Source)
    }

    pub fn with_sources(
        tag: impl Into<LedgerTag>,
        name: impl Into<String>,
        sequence: impl SequenceSource + 'static,
        guids: impl GuidSource + 'static,
    ) -> Self {
        Self {
            id: Guid::new(),
            tag: tag.into(),
            name: name.into(),
            version: 0,
            posts: SortedCollection::new(),
            accounts: SortedCollection::new(),
            journals: SortedCollection::new(),
            sequence: Box::new(sequence),
            guids: Box::new(guids),
        }
    }

    /// Ledger with its general journal registered.
    pub fn from_config(config: &LedgerConfig) -> DomainResult<Self> {
        config.validate()?;
        let mut ledger = Self::with_sources(
            config.ledger_tag.as_str(),
            config.ledger_name.as_str(),
            MonotonicSequence::starting_at(config.first_sid),
            UuidV7Source,
        );
        ledger.register_journal(Journal::general(
            config.general_journal_tag.as_str(),
            config.general_journal_name.as_str(),
        ))?;
        Ok(ledger)
    }

    pub fn tag(&self) -> &LedgerTag {
        &self.tag
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn binding(&self) -> LedgerBinding {
        LedgerBinding::new(self.id, self.tag.clone())
    }

    pub(crate) fn bump(&mut self) {
        self.version += 1;
    }

    pub(crate) fn posts_mut(&mut self) -> &mut SortedCollection<Post> {
        &mut self.posts
    }

    // -- registration ------------------------------------------------------

    pub fn register_account(&mut self, mut account: Account) -> DomainResult<()> {
        self.ensure_unbound(account.tag().as_str(), account.binding())?;
        let tag = account.tag().clone();
        account.bind(Some(self.binding()));
        self.accounts
            .try_insert(account)
            .map_err(|_| DomainError::DuplicateTag {
                tag: tag.to_string(),
            })?;
        self.bump();
        tracing::info!(ledger = %self.tag, account = %tag, "account registered");
        Ok(())
    }

    pub fn register_journal(&mut self, mut journal: Journal) -> DomainResult<()> {
        self.ensure_unbound(journal.tag().as_str(), journal.binding())?;
        let tag = journal.tag().clone();
        journal.bind(Some(self.binding()));
        self.journals
            .try_insert(journal)
            .map_err(|_| DomainError::DuplicateTag {
                tag: tag.to_string(),
            })?;
        self.bump();
        tracing::info!(ledger = %self.tag, journal = %tag, "journal registered");
        Ok(())
    }

    fn ensure_unbound(&self, tag: &str, owner: Option<&LedgerBinding>) -> DomainResult<()> {
        match owner {
            Some(owner) if owner.id() != self.id => Err(DomainError::ForeignLedger {
                tag: tag.to_string(),
                ledger: owner.tag().to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Removes an account no entry refers to.
    pub fn unregister_account(&mut self, tag: &str) -> DomainResult<Account> {
        let tag = AccountTag::from(tag);
        self.account_ref(&tag)?;
        let in_use = self
            .journal_entries(&EntryFilter::all())
            .flat_map(|e| e.records())
            .any(|r| r.account() == &tag);
        if in_use {
            return Err(DomainError::not_empty(format!("account '{tag}'")));
        }
        let mut account = self
            .accounts
            .remove(&tag)
            .ok_or_else(|| unknown_account(&tag))?;
        account.bind(None);
        self.bump();
        tracing::info!(ledger = %self.tag, account = %tag, "account unregistered");
        Ok(account)
    }

    /// Removes a journal holding no entries.
    pub fn unregister_journal(&mut self, tag: &str) -> DomainResult<Journal> {
        let tag = JournalTag::from(tag);
        if !self.journal_ref(&tag)?.is_empty() {
            return Err(DomainError::not_empty(format!("journal '{tag}'")));
        }
        let mut journal = self
            .journals
            .remove(&tag)
            .ok_or_else(|| unknown_journal(&tag))?;
        journal.bind(None);
        self.bump();
        tracing::info!(ledger = %self.tag, journal = %tag, "journal unregistered");
        Ok(journal)
    }

    pub fn rename_account(&mut self, tag: &str, name: impl Into<String>) -> DomainResult<()> {
        let tag = AccountTag::from(tag);
        let account = self
            .accounts
            .find_mut(&tag)
            .ok_or_else(|| unknown_account(&tag))?;
        account.rename(name.into());
        self.bump();
        Ok(())
    }

    // -- lookups -----------------------------------------------------------

    pub(crate) fn account_ref(&self, tag: &AccountTag) -> DomainResult<&Account> {
        self.accounts.find(tag).ok_or_else(|| unknown_account(tag))
    }

    pub(crate) fn journal_ref(&self, tag: &JournalTag) -> DomainResult<&Journal> {
        self.journals.find(tag).ok_or_else(|| unknown_journal(tag))
    }

    pub(crate) fn journal_mut(&mut self, tag: &JournalTag) -> DomainResult<&mut Journal> {
        self.journals.find_mut(tag).ok_or_else(|| unknown_journal(tag))
    }

    pub fn account(&self, tag: &str) -> Option<AccountView<'_>> {
        self.accounts
            .find(&AccountTag::from(tag))
            .map(|account| AccountView::new(account, self))
    }

    pub fn accounts(&self) -> impl Iterator<Item = AccountView<'_>> {
        self.accounts.iter().map(|account| AccountView::new(account, self))
    }

    pub fn journal(&self, tag: &str) -> Option<&Journal> {
        self.journals.find(&JournalTag::from(tag))
    }

    pub fn journals(&self) -> impl Iterator<Item = &Journal> {
        self.journals.iter()
    }

    pub fn post(&self, id: PostId) -> Option<&Post> {
        self.posts.find(&id)
    }

    pub fn posts(&self) -> impl Iterator<Item = &Post> {
        self.posts.iter()
    }

    pub fn find_entry(&self, sid: Sid) -> Option<&JournalEntry> {
        self.journals.iter().find_map(|j| j.get_by_sid(sid))
    }

    pub fn find_entry_by_guid(&self, guid: bookkeep_core::Guid) -> Option<&JournalEntry> {
        self.journals.iter().find_map(|j| j.get_by_guid(guid))
    }

    // -- queries -----------------------------------------------------------

    /// Entries of every journal (or of `filter.journal`) merged into one
    /// (date, time, sid) ordered stream.
    pub fn journal_entries<'a>(&'a self, filter: &EntryFilter) -> MergeByKey<'a, JournalEntry> {
        let sources = self
            .journals
            .iter()
            .filter(|j| filter.journal.as_ref().is_none_or(|tag| tag == j.tag()))
            .map(|j| j.entries(filter))
            .collect::<Vec<_>>();
        MergeByKey::new(sources, filter.reverse)
    }

    /// Records of the selected entries.
    ///
    /// Entries folded into an aggregated posting are skipped: their amounts
    /// are carried by the summary entry. With `filter.unposted` off, zero
    /// records left unposted inside posted entries are skipped too.
    pub fn account_records<'a>(&'a self, filter: &EntryFilter) -> Records<'a> {
        let (posted, unposted) = (filter.posted, filter.unposted);
        Box::new(
            self.journal_entries(filter)
                .filter(|e| !e.is_summarized())
                .flat_map(|e| e.records())
                .filter(move |r| if r.is_posted() { posted } else { unposted }),
        )
    }

    /// Entries stamped with post id `id`, summary last.
    pub fn entries_for_post(&self, id: PostId) -> impl Iterator<Item = &JournalEntry> {
        self.post(id)
            .into_iter()
            .flat_map(move |post| {
                post.entries()
                    .iter()
                    .filter_map(move |sid| self.journal(post.journal().as_str())?.get_by_sid(*sid))
            })
    }

    // -- entry construction ------------------------------------------------

    pub(crate) fn next_identity(&mut self) -> (Sid, bookkeep_core::Guid) {
        (Sid::new(self.sequence.next_sid()), self.guids.next_guid())
    }

    /// A detached draft dated `date`, shaped by the journal's template.
    pub fn new_entry(&mut self, journal: &str, date: NaiveDate) -> DomainResult<JournalEntry> {
        let tag = JournalTag::from(journal);
        self.journal_ref(&tag)?;
        let (sid, guid) = self.next_identity();
        let journal = self.journal_ref(&tag)?;
        Ok(journal.new_entry(sid, guid, date))
    }

    /// Like [`new_entry`](Self::new_entry), dated by a phrase such as `today`.
    pub fn new_entry_on(
        &mut self,
        journal: &str,
        resolver: &dyn DateResolver,
        phrase: &str,
    ) -> DomainResult<JournalEntry> {
        let at = resolver.resolve(phrase)?;
        let mut entry = self.new_entry(journal, at.date())?;
        entry.set_time(at.time())?;
        Ok(entry)
    }

    /// Draft copy of `entry` with a fresh sid and guid.
    pub fn copy_entry(&mut self, entry: &JournalEntry) -> JournalEntry {
        let (sid, guid) = self.next_identity();
        entry.copy_with(sid, guid)
    }
}

pub(crate) fn unknown_account(tag: &AccountTag) -> DomainError {
    DomainError::UnknownAccount {
        tag: tag.to_string(),
    }
}

pub(crate) fn unknown_journal(tag: &JournalTag) -> DomainError {
    DomainError::UnknownJournal {
        tag: tag.to_string(),
    }
}
