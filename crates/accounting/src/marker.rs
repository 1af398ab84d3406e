//! Classification markers for chart-of-accounts nodes.
//!
//! Markers drive reporting only; posting never looks at them.

use std::collections::BTreeSet;
use std::ops::{BitAnd, BitOr, Sub};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MarkerGroup {
    BalanceSheet,
    IncomeStatement,
    Assets,
    Liabilities,
    Equity,
    Revenues,
    Expenses,
    Clearing,
    Maintenance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Marker {
    // balance sheet sections
    Assets,
    Liabilities,
    Equity,
    // income statement sections
    Revenues,
    Expenses,
    // assets
    Receivables,
    Cash,
    Bank,
    TaxReceivables,
    Stock,
    Equipment,
    AccumulatedDepreciation,
    PrepaidExpenses,
    // liabilities
    Payables,
    TaxPayables,
    AccruedExpenses,
    Loans,
    // equity
    Capital,
    RetainedEarnings,
    Drawings,
    // revenues
    Sales,
    OtherIncome,
    // expenses
    CostOfGoodsSold,
    Salaries,
    Depreciation,
    OtherExpenses,
    // clearing
    Clearing,
    Suspense,
    // maintenance
    PostingNotAllowed,
    Hidden,
}

impl Marker {
    pub fn group(self) -> MarkerGroup {
        use Marker::*;
        match self {
            Assets | Liabilities | Equity => MarkerGroup::BalanceSheet,
            Revenues | Expenses => MarkerGroup::IncomeStatement,
            Receivables | Cash | Bank | TaxReceivables | Stock | Equipment
            | AccumulatedDepreciation | PrepaidExpenses => MarkerGroup::Assets,
            Payables | TaxPayables | AccruedExpenses | Loans => MarkerGroup::Liabilities,
            Capital | RetainedEarnings | Drawings => MarkerGroup::Equity,
            Sales | OtherIncome => MarkerGroup::Revenues,
            CostOfGoodsSold | Salaries | Depreciation | OtherExpenses => MarkerGroup::Expenses,
            Clearing | Suspense => MarkerGroup::Clearing,
            PostingNotAllowed | Hidden => MarkerGroup::Maintenance,
        }
    }
}

impl core::fmt::Display for Marker {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarkerSet(BTreeSet<Marker>);

impl MarkerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the marker was already present.
    pub fn insert(&mut self, marker: Marker) -> bool {
        self.0.insert(marker)
    }

    pub fn remove(&mut self, marker: Marker) -> bool {
        self.0.remove(&marker)
    }

    pub fn contains(&self, marker: Marker) -> bool {
        self.0.contains(&marker)
    }

    pub fn contains_all(&self, other: &MarkerSet) -> bool {
        other.0.is_subset(&self.0)
    }

    pub fn contains_any(&self, other: &MarkerSet) -> bool {
        !self.0.is_disjoint(&other.0)
    }

    pub fn has_group(&self, group: MarkerGroup) -> bool {
        self.0.iter().any(|m| m.group() == group)
    }

    pub fn remove_group(&mut self, group: MarkerGroup) {
        self.0.retain(|m| m.group() != group);
    }

    pub fn iter(&self) -> impl Iterator<Item = Marker> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl BitOr for &MarkerSet {
    type Output = MarkerSet;

    fn bitor(self, rhs: &MarkerSet) -> MarkerSet {
        MarkerSet(&self.0 | &rhs.0)
    }
}

impl Sub for &MarkerSet {
    type Output = MarkerSet;

    fn sub(self, rhs: &MarkerSet) -> MarkerSet {
        MarkerSet(&self.0 - &rhs.0)
    }
}

impl BitAnd for &MarkerSet {
    type Output = MarkerSet;

    fn bitand(self, rhs: &MarkerSet) -> MarkerSet {
        MarkerSet(&self.0 & &rhs.0)
    }
}

impl FromIterator<Marker> for MarkerSet {
    fn from_iter<I: IntoIterator<Item = Marker>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[Marker; N]> for MarkerSet {
    fn from(markers: [Marker; N]) -> Self {
        markers.into_iter().collect()
    }
}

impl core::fmt::Display for MarkerSet {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("{")?;
        for (i, marker) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{marker}")?;
        }
        f.write_str("}")
    }
}
