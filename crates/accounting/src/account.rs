//! Accounts, posting legs and the ledger-backed account view.

use core::ops::Deref;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use bookkeep_core::{Currency, DomainError, DomainResult, Entity, Money, PostId, Sid};

use crate::journal::EntryFilter;
use crate::ledger::{Ledger, Records};
use crate::tag::{AccountTag, LedgerBinding, LedgerTag};

/// Side of a posting leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Debit,
    Credit,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Debit => Side::Credit,
            Side::Credit => Side::Debit,
        }
    }
}

impl core::fmt::Display for Side {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Side::Debit => "Dr",
            Side::Credit => "Cr",
        })
    }
}

impl FromStr for Side {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dr" | "dt" | "debit" | "wn" => Ok(Side::Debit),
            "cr" | "ct" | "credit" | "ma" => Ok(Side::Credit),
            other => Err(DomainError::validation(format!("unknown side '{other}'"))),
        }
    }
}

/// An account: tag, display name and currency.
///
/// Holds no balance. Debit, credit and balance are computed from the owning
/// ledger's records on every call (see [`AccountView`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    tag: AccountTag,
    name: String,
    currency: Currency,
    ledger: Option<LedgerBinding>,
}

impl Account {
    pub fn new(
        tag: impl Into<AccountTag>,
        name: impl Into<String>,
        currency: Currency,
    ) -> DomainResult<Self> {
        let tag = tag.into();
        if tag.is_empty() {
            return Err(DomainError::validation("account tag must not be empty"));
        }
        Ok(Self {
            tag,
            name: name.into(),
            currency,
            ledger: None,
        })
    }

    pub fn tag(&self) -> &AccountTag {
        &self.tag
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    /// The ledger this account is registered in, if any.
    pub fn ledger(&self) -> Option<&LedgerTag> {
        self.ledger.as_ref().map(LedgerBinding::tag)
    }

    pub fn binding(&self) -> Option<&LedgerBinding> {
        self.ledger.as_ref()
    }

    pub(crate) fn bind(&mut self, ledger: Option<LedgerBinding>) {
        self.ledger = ledger;
    }

    pub(crate) fn rename(&mut self, name: String) {
        self.name = name;
    }
}

impl Entity for Account {
    type Key = AccountTag;

    fn key(&self) -> &AccountTag {
        &self.tag
    }
}

/// One posting leg.
///
/// Never mutated after creation: posting replaces a draft record with a new
/// record that carries the post id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    account: AccountTag,
    raw_amount: i64,
    side: Side,
    entry: Sid,
    post: Option<PostId>,
}

impl AccountRecord {
    pub(crate) fn draft(account: AccountTag, raw_amount: i64, side: Side, entry: Sid) -> Self {
        Self {
            account,
            raw_amount,
            side,
            entry,
            post: None,
        }
    }

    pub fn account(&self) -> &AccountTag {
        &self.account
    }

    pub fn raw_amount(&self) -> i64 {
        self.raw_amount
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// Sid of the journal entry holding this record.
    pub fn entry(&self) -> Sid {
        self.entry
    }

    pub fn post(&self) -> Option<PostId> {
        self.post
    }

    pub fn is_posted(&self) -> bool {
        self.post.is_some()
    }

    /// Debit amounts count positive, credit amounts negative.
    pub fn signed_amount(&self) -> i64 {
        match self.side {
            Side::Debit => self.raw_amount,
            Side::Credit => -self.raw_amount,
        }
    }

    pub(crate) fn posted(&self, post: PostId) -> Self {
        Self {
            post: Some(post),
            ..self.clone()
        }
    }

    /// Fresh draft copy owned by entry `entry`.
    pub(crate) fn redrafted(&self, entry: Sid) -> Self {
        Self::draft(self.account.clone(), self.raw_amount, self.side, entry)
    }

    pub(crate) fn negated(&self) -> Self {
        Self::draft(self.account.clone(), -self.raw_amount, self.side, self.entry)
    }

    pub(crate) fn flipped(&self) -> Self {
        Self::draft(
            self.account.clone(),
            self.raw_amount,
            self.side.opposite(),
            self.entry,
        )
    }
}

/// An account read through the ledger that owns it.
#[derive(Debug, Clone, Copy)]
pub struct AccountView<'a> {
    account: &'a Account,
    ledger: &'a Ledger,
}

impl Deref for AccountView<'_> {
    type Target = Account;

    fn deref(&self) -> &Account {
        self.account
    }
}

impl<'a> AccountView<'a> {
    pub(crate) fn new(account: &'a Account, ledger: &'a Ledger) -> Self {
        Self { account, ledger }
    }

    pub fn account(&self) -> &'a Account {
        self.account
    }

    /// This account's records among the ledger records selected by `filter`.
    pub fn records(&self, filter: &EntryFilter) -> Records<'a> {
        let tag = self.account.tag();
        Box::new(
            self.ledger
                .account_records(filter)
                .filter(move |r| r.account() == tag),
        )
    }

    fn side_sum(&self, side: Side, pred: impl Fn(&AccountRecord) -> bool) -> i64 {
        self.records(&EntryFilter::posted())
            .filter(|r| r.side() == side && pred(r))
            .map(AccountRecord::raw_amount)
            .sum()
    }

    pub fn debit(&self) -> i64 {
        self.debit_where(|_| true)
    }

    pub fn credit(&self) -> i64 {
        self.credit_where(|_| true)
    }

    pub fn balance(&self) -> i64 {
        self.balance_where(|_| true)
    }

    pub fn debit_where(&self, pred: impl Fn(&AccountRecord) -> bool) -> i64 {
        self.side_sum(Side::Debit, pred)
    }

    pub fn credit_where(&self, pred: impl Fn(&AccountRecord) -> bool) -> i64 {
        self.side_sum(Side::Credit, pred)
    }

    pub fn balance_where(&self, pred: impl Fn(&AccountRecord) -> bool) -> i64 {
        self.debit_where(&pred) - self.credit_where(&pred)
    }

    pub fn balance_money(&self) -> DomainResult<Money> {
        Money::new(self.balance(), self.account.currency().clone())
    }

    pub fn has_posted_records(&self) -> bool {
        self.records(&EntryFilter::posted()).next().is_some()
    }

    fn amount(&self, raw: i64) -> String {
        self.account.currency().raw_to_amount(raw)
    }

    /// One line: tag, name, debit, credit and balance.
    pub fn short_str(&self) -> String {
        format!(
            "{:<10} {:.<28} Dr {:>14}  Cr {:>14}  Bal {:>14} {}",
            format!("/{}/", self.account.tag()),
            format!("{} ", self.account.name()),
            self.amount(self.debit()),
            self.amount(self.credit()),
            self.amount(self.balance()),
            self.account.currency().code(),
        )
    }

    /// Multi-line summary listing every posted record.
    pub fn full_str(&self) -> String {
        let mut out = format!(
            "A/C /{}/ {} [{}]\n",
            self.account.tag(),
            self.account.name(),
            self.account.currency().code()
        );
        for record in self.records(&EntryFilter::posted()) {
            let post = record.post().map(|p| p.to_string()).unwrap_or_default();
            out.push_str(&format!(
                "  j/e {} post {:>6}  {} {:>14}\n",
                record.entry(),
                post,
                record.side(),
                self.amount(record.raw_amount())
            ));
        }
        out.push_str(&format!(
            "  Dr {:>14}  Cr {:>14}  Bal {:>14}",
            self.amount(self.debit()),
            self.amount(self.credit()),
            self.amount(self.balance())
        ));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pln() -> Currency {
        Currency::new("PLN", "985", 100, "Polish zloty").unwrap()
    }

    #[test]
    fn side_parses_common_spellings() {
        assert_eq!("Dr".parse::<Side>().unwrap(), Side::Debit);
        assert_eq!("credit".parse::<Side>().unwrap(), Side::Credit);
        assert_eq!(" ma ".parse::<Side>().unwrap(), Side::Credit);
        assert!("left".parse::<Side>().is_err());
        assert_eq!(Side::Debit.opposite(), Side::Credit);
        assert_eq!(Side::Credit.to_string(), "Cr");
    }

    #[test]
    fn empty_account_tag_is_rejected() {
        assert!(matches!(
            Account::new(" ", "Nothing", pln()),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn record_transforms_produce_drafts() {
        let record = AccountRecord::draft("110".into(), 500, Side::Debit, Sid::new(3))
            .posted(PostId::new(9));
        assert!(record.is_posted());

        let storno = record.negated();
        assert_eq!((storno.raw_amount(), storno.side()), (-500, Side::Debit));
        assert!(!storno.is_posted());

        let reverse = record.flipped();
        assert_eq!((reverse.raw_amount(), reverse.side()), (500, Side::Credit));
        assert_eq!(reverse.signed_amount(), -500);

        let copy = record.redrafted(Sid::new(4));
        assert_eq!(copy.entry(), Sid::new(4));
        assert_eq!(copy.post(), None);
    }
}
