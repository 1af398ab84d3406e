//! Journal entries: field model, balance checks and lifecycle state.
//!
//! An entry is built from its journal's [`EntryTemplate`], filled while it is
//! a draft, and frozen once the ledger posts it. Only the ledger moves an
//! entry out of [`EntryState::Draft`].

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use bookkeep_core::{DomainError, DomainResult, Entity, Guid, PostId, Sid};

use crate::account::{AccountRecord, Side};
use crate::tag::{AccountTag, JournalTag};

/// Field name holding the merged legs of an aggregated posting.
pub const SUMMARY_FIELD: &str = "Aggregated";

/// Chronological key of an entry inside a journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntryKey {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub sid: Sid,
}

impl EntryKey {
    /// Sorts before every entry dated `date`.
    pub fn start_of(date: NaiveDate) -> Self {
        Self {
            date,
            time: NaiveTime::default(),
            sid: Sid::new(0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EntryState {
    Draft,
    Posted { post: PostId },
    /// Folded into the aggregated posting whose summary entry is `summary`.
    Summarized { post: PostId, summary: Sid },
}

impl EntryState {
    pub fn post(&self) -> Option<PostId> {
        match self {
            EntryState::Draft => None,
            EntryState::Posted { post } | EntryState::Summarized { post, .. } => Some(*post),
        }
    }
}

/// Explicit link between a canceled entry and its counter-entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancellationLink {
    CanceledBy(Sid),
    Cancels(Sid),
}

/// Shape of one field in a journal's entry template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldTemplate {
    Info,
    Fixed {
        account: Option<AccountTag>,
        side: Option<Side>,
    },
    Open,
}

/// Ordered field layout new entries of a journal start from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EntryTemplate {
    fields: Vec<(String, FieldTemplate)>,
}

impl EntryTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    /// A single open list named `Account`.
    pub fn general() -> Self {
        Self::new().open("Account")
    }

    fn with(mut self, name: &str, field: FieldTemplate) -> Self {
        match self.fields.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = field,
            None => self.fields.push((name.to_string(), field)),
        }
        self
    }

    pub fn info(self, name: &str) -> Self {
        self.with(name, FieldTemplate::Info)
    }

    pub fn fixed(self, name: &str, account: Option<&str>, side: Option<Side>) -> Self {
        self.with(
            name,
            FieldTemplate::Fixed {
                account: account.map(AccountTag::from),
                side,
            },
        )
    }

    pub fn open(self, name: &str) -> Self {
        self.with(name, FieldTemplate::Open)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldTemplate)> {
        self.fields.iter().map(|(n, f)| (n.as_str(), f))
    }
}

/// Content of one entry field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldSlot {
    Info {
        value: Option<Value>,
    },
    /// At most one record, with template defaults for account and side.
    Fixed {
        account: Option<AccountTag>,
        side: Option<Side>,
        record: Option<AccountRecord>,
    },
    Open {
        records: Vec<AccountRecord>,
    },
}

impl FieldSlot {
    fn from_template(template: &FieldTemplate) -> Self {
        match template {
            FieldTemplate::Info => FieldSlot::Info { value: None },
            FieldTemplate::Fixed { account, side } => FieldSlot::Fixed {
                account: account.clone(),
                side: *side,
                record: None,
            },
            FieldTemplate::Open => FieldSlot::Open {
                records: Vec::new(),
            },
        }
    }

    pub fn records(&self) -> core::slice::Iter<'_, AccountRecord> {
        match self {
            FieldSlot::Info { .. } => Default::default(),
            FieldSlot::Fixed { record, .. } => record.as_slice().iter(),
            FieldSlot::Open { records } => records.iter(),
        }
    }

    fn records_mut(&mut self) -> core::slice::IterMut<'_, AccountRecord> {
        match self {
            FieldSlot::Info { .. } => Default::default(),
            FieldSlot::Fixed { record, .. } => record.as_mut_slice().iter_mut(),
            FieldSlot::Open { records } => records.iter_mut(),
        }
    }

    pub fn info(&self) -> Option<&Value> {
        match self {
            FieldSlot::Info { value } => value.as_ref(),
            _ => None,
        }
    }

    fn clear(&mut self) {
        match self {
            FieldSlot::Info { value } => *value = None,
            FieldSlot::Fixed { record, .. } => *record = None,
            FieldSlot::Open { records } => records.clear(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub slot: FieldSlot,
}

/// Where a record sits inside its entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLocation {
    pub field: String,
    /// 1-based position within the field.
    pub position: usize,
    pub count: usize,
}

impl core::fmt::Display for RecordLocation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.count > 1 {
            write!(f, "{} ({} of {})", self.field, self.position, self.count)
        } else {
            f.write_str(&self.field)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    key: EntryKey,
    guid: Guid,
    journal: JournalTag,
    description: String,
    reference: Option<String>,
    state: EntryState,
    cancellation: Option<CancellationLink>,
    fields: Vec<Field>,
}

impl Entity for JournalEntry {
    type Key = EntryKey;

    fn key(&self) -> &EntryKey {
        &self.key
    }
}

impl JournalEntry {
    pub fn from_template(
        journal: JournalTag,
        template: &EntryTemplate,
        sid: Sid,
        guid: Guid,
        date: NaiveDate,
    ) -> Self {
        Self {
            key: EntryKey {
                date,
                time: NaiveTime::default(),
                sid,
            },
            guid,
            journal,
            description: String::new(),
            reference: None,
            state: EntryState::Draft,
            cancellation: None,
            fields: template
                .fields()
                .map(|(name, field)| Field {
                    name: name.to_string(),
                    slot: FieldSlot::from_template(field),
                })
                .collect(),
        }
    }

    pub(crate) fn summary(
        journal: JournalTag,
        sid: Sid,
        guid: Guid,
        date: NaiveDate,
        description: &str,
        legs: Vec<(Side, AccountTag, i64)>,
    ) -> Self {
        let mut entry =
            Self::from_template(journal, &EntryTemplate::new().open(SUMMARY_FIELD), sid, guid, date);
        entry.description = description.to_string();
        if let Some(field) = entry.fields.first_mut() {
            field.slot = FieldSlot::Open {
                records: legs
                    .into_iter()
                    .map(|(side, account, raw)| AccountRecord::draft(account, raw, side, sid))
                    .collect(),
            };
        }
        entry
    }

    pub fn sid(&self) -> Sid {
        self.key.sid
    }

    pub fn guid(&self) -> Guid {
        self.guid
    }

    pub fn date(&self) -> NaiveDate {
        self.key.date
    }

    pub fn time(&self) -> NaiveTime {
        self.key.time
    }

    pub fn journal(&self) -> &JournalTag {
        &self.journal
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    pub fn state(&self) -> EntryState {
        self.state
    }

    pub fn post(&self) -> Option<PostId> {
        self.state.post()
    }

    pub fn is_posted(&self) -> bool {
        self.state != EntryState::Draft
    }

    /// True for entries whose amounts are carried by an aggregated summary.
    pub fn is_summarized(&self) -> bool {
        matches!(self.state, EntryState::Summarized { .. })
    }

    pub fn cancellation(&self) -> Option<CancellationLink> {
        self.cancellation
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSlot> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.slot)
    }

    fn ensure_draft(&self) -> DomainResult<()> {
        if self.is_posted() {
            return Err(DomainError::AlreadyPosted {
                sid: self.sid().get(),
            });
        }
        Ok(())
    }

    fn slot_mut(&mut self, name: &str) -> DomainResult<&mut FieldSlot> {
        self.ensure_draft()?;
        self.fields
            .iter_mut()
            .find(|f| f.name == name)
            .map(|f| &mut f.slot)
            .ok_or_else(|| DomainError::UnknownField {
                field: name.to_string(),
            })
    }

    pub fn set_date(&mut self, date: NaiveDate) -> DomainResult<()> {
        self.ensure_draft()?;
        self.key.date = date;
        Ok(())
    }

    pub fn set_time(&mut self, time: NaiveTime) -> DomainResult<()> {
        self.ensure_draft()?;
        self.key.time = time;
        Ok(())
    }

    pub fn set_description(&mut self, description: impl Into<String>) -> DomainResult<()> {
        self.ensure_draft()?;
        self.description = description.into();
        Ok(())
    }

    pub fn set_reference(&mut self, reference: Option<String>) -> DomainResult<()> {
        self.ensure_draft()?;
        self.reference = reference;
        Ok(())
    }

    pub fn add_info(&mut self, field: &str, value: impl Into<Value>) -> DomainResult<()> {
        match self.slot_mut(field)? {
            FieldSlot::Info { value: slot } => {
                *slot = Some(value.into());
                Ok(())
            }
            _ => Err(DomainError::FieldKind {
                field: field.to_string(),
                expected: "an info value",
            }),
        }
    }

    pub fn debit(&mut self, field: &str, raw_amount: i64, account: Option<&str>) -> DomainResult<()> {
        self.add_record(field, raw_amount, account, Some(Side::Debit))
    }

    pub fn credit(&mut self, field: &str, raw_amount: i64, account: Option<&str>) -> DomainResult<()> {
        self.add_record(field, raw_amount, account, Some(Side::Credit))
    }

    /// Writes a record into `field`.
    ///
    /// A fixed slot is overwritten and falls back to its template account and
    /// side; an open list is appended to and needs both from the caller.
    pub fn add_record(
        &mut self,
        field: &str,
        raw_amount: i64,
        account: Option<&str>,
        side: Option<Side>,
    ) -> DomainResult<()> {
        let sid = self.sid();
        let ambiguous_account = || DomainError::AmbiguousAccount {
            field: field.to_string(),
        };
        let ambiguous_side = || DomainError::AmbiguousSide {
            field: field.to_string(),
        };

        match self.slot_mut(field)? {
            FieldSlot::Info { .. } => Err(DomainError::FieldKind {
                field: field.to_string(),
                expected: "account records",
            }),
            FieldSlot::Fixed {
                account: default_account,
                side: default_side,
                record,
            } => {
                let account = account
                    .map(AccountTag::from)
                    .or_else(|| default_account.clone())
                    .ok_or_else(ambiguous_account)?;
                let side = side.or(*default_side).ok_or_else(ambiguous_side)?;
                *record = Some(AccountRecord::draft(account, raw_amount, side, sid));
                Ok(())
            }
            FieldSlot::Open { records } => {
                let account = account.map(AccountTag::from).ok_or_else(ambiguous_account)?;
                let side = side.ok_or_else(ambiguous_side)?;
                records.push(AccountRecord::draft(account, raw_amount, side, sid));
                Ok(())
            }
        }
    }

    pub fn clear_field(&mut self, field: &str) -> DomainResult<()> {
        self.slot_mut(field)?.clear();
        Ok(())
    }

    pub fn records(&self) -> impl Iterator<Item = &AccountRecord> {
        self.fields.iter().flat_map(|f| f.slot.records())
    }

    fn records_mut(&mut self) -> impl Iterator<Item = &mut AccountRecord> {
        self.fields.iter_mut().flat_map(|f| f.slot.records_mut())
    }

    fn side_total(&self, side: Side) -> i128 {
        self.records()
            .filter(|r| r.side() == side)
            .map(|r| r.raw_amount() as i128)
            .sum()
    }

    pub fn debit_total(&self) -> i128 {
        self.side_total(Side::Debit)
    }

    pub fn credit_total(&self) -> i128 {
        self.side_total(Side::Credit)
    }

    pub fn is_balanced(&self) -> bool {
        self.debit_total() == self.credit_total()
    }

    pub fn is_zeroed(&self) -> bool {
        self.debit_total() == 0 && self.credit_total() == 0
    }

    /// Field and position of `record` inside this entry.
    pub fn locate(&self, record: &AccountRecord) -> Option<RecordLocation> {
        self.fields.iter().find_map(|field| {
            let count = field.slot.records().len();
            field
                .slot
                .records()
                .position(|r| r == record)
                .map(|idx| RecordLocation {
                    field: field.name.clone(),
                    position: idx + 1,
                    count,
                })
        })
    }

    /// A draft with the same date, time, description and fields, but a new
    /// identity, no reference and freshly drafted records.
    pub fn copy_with(&self, sid: Sid, guid: Guid) -> Self {
        let mut copy = Self {
            key: EntryKey { sid, ..self.key },
            guid,
            journal: self.journal.clone(),
            description: self.description.clone(),
            reference: None,
            state: EntryState::Draft,
            cancellation: None,
            fields: self.fields.clone(),
        };
        copy.map_records(|r| r.redrafted(sid));
        copy
    }

    pub(crate) fn map_records(&mut self, f: impl Fn(&AccountRecord) -> AccountRecord) {
        for record in self.records_mut() {
            *record = f(record);
        }
    }

    /// Moves the entry out of draft; non-zero records receive the post id.
    pub(crate) fn stamp(&mut self, state: EntryState) {
        if let Some(post) = state.post() {
            self.map_records(|r| {
                if r.raw_amount() != 0 {
                    r.posted(post)
                } else {
                    r.clone()
                }
            });
        }
        self.state = state;
    }

    pub(crate) fn counter_entry(&self, sid: Sid, guid: Guid, storno: bool) -> Self {
        let mut counter = self.copy_with(sid, guid);
        if storno {
            counter.map_records(AccountRecord::negated);
        } else {
            counter.map_records(AccountRecord::flipped);
        }
        counter.reference = Some(format!("Cancels j/e {}", self.sid()));
        counter.cancellation = Some(CancellationLink::Cancels(self.sid()));
        counter
    }

    pub(crate) fn describe(&mut self, description: String) {
        self.description = description;
    }

    pub(crate) fn mark_canceled_by(&mut self, counter: Sid) {
        self.reference = Some(match self.reference.take() {
            Some(old) => format!("Canceled by j/e {counter} / {old}"),
            None => format!("Canceled by j/e {counter}"),
        });
        self.cancellation = Some(CancellationLink::CanceledBy(counter));
    }

    pub fn status_label(&self) -> &'static str {
        if self.is_posted() {
            "POSTED"
        } else if self.is_balanced() {
            "NOT POSTED"
        } else {
            "UNBALANCED"
        }
    }
}

impl core::fmt::Display for JournalEntry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "SID:{}  {} {}  {:<10} {}",
            self.sid(),
            self.date(),
            self.time(),
            self.status_label(),
            self.description
        )?;
        if let Some(reference) = &self.reference {
            write!(f, "  [{reference}]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, 5).unwrap()
    }

    fn sales_template() -> EntryTemplate {
        EntryTemplate::new()
            .info("Customer")
            .fixed("Cash", Some("110"), Some(Side::Debit))
            .fixed("Sale", Some("400"), Some(Side::Credit))
            .fixed("Tax", Some("270"), Some(Side::Credit))
            .open("Other")
    }

    fn sale(sid: u64) -> JournalEntry {
        JournalEntry::from_template("SJ".into(), &sales_template(), Sid::new(sid), Guid::new(), date())
    }

    #[test]
    fn fixed_slots_use_template_defaults() {
        let mut entry = sale(1);
        entry.add_record("Cash", 1000, None, None).unwrap();
        entry.add_record("Sale", 900, None, None).unwrap();
        entry.add_record("Tax", 100, None, None).unwrap();
        assert!(entry.is_balanced());
        assert!(!entry.is_zeroed());
        assert_eq!(entry.records().count(), 3);
        assert_eq!(entry.status_label(), "NOT POSTED");

        entry.debit("Cash", 1200, None).unwrap();
        assert_eq!(entry.records().count(), 3);
        assert_eq!(entry.status_label(), "UNBALANCED");
    }

    #[test]
    fn open_lists_need_account_and_side() {
        let mut entry = sale(1);
        assert_eq!(
            entry.add_record("Other", 10, None, Some(Side::Debit)),
            Err(DomainError::AmbiguousAccount {
                field: "Other".into()
            })
        );
        assert_eq!(
            entry.add_record("Other", 10, Some("130"), None),
            Err(DomainError::AmbiguousSide {
                field: "Other".into()
            })
        );
        entry.debit("Other", 10, Some("130")).unwrap();
        entry.credit("Other", 10, Some("200")).unwrap();
        assert_eq!(entry.records().count(), 2);
        assert!(entry.is_balanced());
    }

    #[test]
    fn field_misuse_is_reported() {
        let mut entry = sale(1);
        assert!(matches!(
            entry.debit("Nope", 1, Some("110")),
            Err(DomainError::UnknownField { .. })
        ));
        assert!(matches!(
            entry.debit("Customer", 1, Some("110")),
            Err(DomainError::FieldKind { .. })
        ));
        assert!(matches!(
            entry.add_info("Cash", "x"),
            Err(DomainError::FieldKind { .. })
        ));
        entry.add_info("Customer", json!({"name": "ACME"})).unwrap();
        assert_eq!(
            entry.field("Customer").and_then(FieldSlot::info),
            Some(&json!({"name": "ACME"}))
        );
    }

    #[test]
    fn empty_entry_is_zeroed_and_balanced() {
        let entry = sale(1);
        assert!(entry.is_balanced());
        assert!(entry.is_zeroed());
    }

    #[test]
    fn stamping_freezes_the_entry() {
        let mut entry = sale(1);
        entry.debit("Cash", 100, None).unwrap();
        entry.credit("Sale", 100, None).unwrap();
        entry.credit("Tax", 0, None).unwrap();
        entry.stamp(EntryState::Posted {
            post: PostId::new(5),
        });

        let posts: Vec<_> = entry.records().map(AccountRecord::post).collect();
        assert_eq!(posts, vec![Some(PostId::new(5)), Some(PostId::new(5)), None]);
        assert_eq!(
            entry.set_description("late edit"),
            Err(DomainError::AlreadyPosted { sid: 1 })
        );
        assert!(entry.debit("Cash", 1, None).is_err());
        assert_eq!(entry.status_label(), "POSTED");
    }

    #[test]
    fn copy_gets_fresh_identity_and_drafts() {
        let mut entry = sale(1);
        entry.set_description("Sale of goods").unwrap();
        entry.set_reference(Some("INV/1".into())).unwrap();
        entry.debit("Cash", 100, None).unwrap();
        entry.credit("Sale", 100, None).unwrap();
        entry.stamp(EntryState::Posted {
            post: PostId::new(2),
        });

        let copy = entry.copy_with(Sid::new(9), Guid::new());
        assert_eq!(copy.sid(), Sid::new(9));
        assert_ne!(copy.guid(), entry.guid());
        assert_eq!(copy.date(), entry.date());
        assert_eq!(copy.description(), "Sale of goods");
        assert_eq!(copy.reference(), None);
        assert!(!copy.is_posted());
        assert!(copy.records().all(|r| r.entry() == Sid::new(9) && !r.is_posted()));
    }

    #[test]
    fn counter_entries_link_back() {
        let mut entry = sale(1);
        entry.debit("Cash", 500, None).unwrap();
        entry.credit("Sale", 500, None).unwrap();

        let storno = entry.counter_entry(Sid::new(2), Guid::new(), true);
        let cash = storno.field("Cash").unwrap().records().next().unwrap();
        assert_eq!((cash.raw_amount(), cash.side()), (-500, Side::Debit));
        assert_eq!(storno.cancellation(), Some(CancellationLink::Cancels(Sid::new(1))));
        assert_eq!(storno.reference(), Some("Cancels j/e 0001"));
        assert!(storno.is_balanced());

        let reverse = entry.counter_entry(Sid::new(3), Guid::new(), false);
        let cash = reverse.field("Cash").unwrap().records().next().unwrap();
        assert_eq!((cash.raw_amount(), cash.side()), (500, Side::Credit));
        assert!(reverse.is_balanced());

        entry.set_reference(Some("INV/7".into())).unwrap();
        entry.mark_canceled_by(Sid::new(2));
        assert_eq!(entry.reference(), Some("Canceled by j/e 0002 / INV/7"));
    }

    #[test]
    fn locate_reports_field_and_position() {
        let mut entry = sale(1);
        entry.debit("Other", 1, Some("130")).unwrap();
        entry.debit("Other", 2, Some("131")).unwrap();
        let second = entry.records().nth(1).unwrap().clone();
        let location = entry.locate(&second).unwrap();
        assert_eq!(location.to_string(), "Other (2 of 2)");
    }

    #[test]
    fn template_replaces_duplicate_field_names() {
        let template = EntryTemplate::new().open("A").info("A");
        assert_eq!(template.fields().count(), 1);
        assert_eq!(template.fields().next().unwrap().1, &FieldTemplate::Info);
    }
}
