//! Money: a raw amount bound to its currency.

use core::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::currency::Currency;
use crate::error::{DomainError, DomainResult};

/// An exact amount of one currency.
///
/// The raw amount is always a multiple of the currency's smallest unit.
/// Arithmetic between different currencies fails instead of converting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "MoneyParts")]
pub struct Money {
    raw: i64,
    currency: Currency,
}

#[derive(Deserialize)]
struct MoneyParts {
    raw: i64,
    currency: Currency,
}

impl TryFrom<MoneyParts> for Money {
    type Error = DomainError;

    fn try_from(parts: MoneyParts) -> Result<Self, Self::Error> {
        Money::new(parts.raw, parts.currency)
    }
}

impl Money {
    pub fn new(raw: i64, currency: Currency) -> DomainResult<Self> {
        currency.check_raw(raw)?;
        Ok(Self { raw, currency })
    }

    pub fn zero(currency: Currency) -> Self {
        Self { raw: 0, currency }
    }

    pub fn parse(text: &str, currency: Currency) -> DomainResult<Self> {
        let raw = currency.amount_to_raw(text)?;
        Ok(Self { raw, currency })
    }

    pub fn raw(&self) -> i64 {
        self.raw
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    pub fn is_zero(&self) -> bool {
        self.raw == 0
    }

    pub fn abs(&self) -> DomainResult<Self> {
        self.with_raw(self.raw.checked_abs())
    }

    pub fn checked_neg(&self) -> DomainResult<Self> {
        self.with_raw(self.raw.checked_neg())
    }

    fn same_currency(&self, other: &Money) -> DomainResult<()> {
        if self.currency != other.currency {
            return Err(DomainError::CurrencyMismatch {
                left: self.currency.code().to_string(),
                right: other.currency.code().to_string(),
            });
        }
        Ok(())
    }

    fn with_raw(&self, raw: Option<i64>) -> DomainResult<Self> {
        let raw = raw.ok_or_else(|| {
            DomainError::precision(format!("{} amount overflow", self.currency.code()))
        })?;
        Ok(Self {
            raw,
            currency: self.currency.clone(),
        })
    }

    pub fn checked_add(&self, other: &Money) -> DomainResult<Self> {
        self.same_currency(other)?;
        self.with_raw(self.raw.checked_add(other.raw))
    }

    pub fn checked_sub(&self, other: &Money) -> DomainResult<Self> {
        self.same_currency(other)?;
        self.with_raw(self.raw.checked_sub(other.raw))
    }

    pub fn try_cmp(&self, other: &Money) -> DomainResult<Ordering> {
        self.same_currency(other)?;
        Ok(self.raw.cmp(&other.raw))
    }

    /// Splits this amount across `ratios`; see [`Currency::allocate`].
    pub fn allocate(&self, ratios: &[u64]) -> DomainResult<Vec<Money>> {
        Ok(self
            .currency
            .allocate(self.raw, ratios)?
            .into_iter()
            .map(|raw| Self {
                raw,
                currency: self.currency.clone(),
            })
            .collect())
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{} {}",
            self.currency.code(),
            self.currency.raw_to_amount(self.raw)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pln() -> Currency {
        Currency::new("PLN", "985", 100, "Polish zloty").unwrap()
    }

    fn eur() -> Currency {
        Currency::new("EUR", "978", 100, "Euro").unwrap()
    }

    #[test]
    fn arithmetic_within_one_currency() {
        let a = Money::parse("10.50", pln()).unwrap();
        let b = Money::new(250, pln()).unwrap();
        assert_eq!(a.checked_add(&b).unwrap().raw(), 1300);
        assert_eq!(a.checked_sub(&b).unwrap().raw(), 800);
        assert_eq!(b.checked_neg().unwrap().raw(), -250);
        assert_eq!(b.checked_neg().unwrap().abs().unwrap().raw(), 250);
        assert_eq!(a.try_cmp(&Money::zero(pln())).unwrap(), Ordering::Greater);
        assert_eq!(a.to_string(), "PLN 10.50");
    }

    #[test]
    fn mixing_currencies_fails() {
        let a = Money::new(100, pln()).unwrap();
        let b = Money::new(100, eur()).unwrap();
        assert_eq!(
            a.checked_add(&b).unwrap_err(),
            DomainError::CurrencyMismatch {
                left: "PLN".into(),
                right: "EUR".into()
            }
        );
        assert!(a.try_cmp(&b).is_err());
    }

    #[test]
    fn overflow_is_reported() {
        let max = Money::new(i64::MAX, pln()).unwrap();
        assert!(max.checked_add(&Money::new(1, pln()).unwrap()).is_err());

        let min = Money::new(i64::MIN, pln()).unwrap();
        assert!(matches!(min.checked_neg(), Err(DomainError::Precision(_))));
        assert!(matches!(min.abs(), Err(DomainError::Precision(_))));
        assert_eq!(max.checked_neg().unwrap().raw(), -i64::MAX);
    }

    #[test]
    fn new_checks_smallest_unit() {
        let mru = Currency::new("MRU", "929", 5, "Ouguiya").unwrap();
        assert!(Money::new(3, mru.clone()).is_err());
        assert!(Money::new(4, mru).is_ok());
    }

    #[test]
    fn deserializing_checks_smallest_unit() {
        let mru = Currency::new("MRU", "929", 5, "Ouguiya").unwrap();
        let good = serde_json::to_value(Money::new(4, mru).unwrap()).unwrap();
        let back: Money = serde_json::from_value(good.clone()).unwrap();
        assert_eq!(back.raw(), 4);

        let mut bad = good;
        bad["raw"] = serde_json::json!(3);
        assert!(serde_json::from_value::<Money>(bad).is_err());
    }

    #[test]
    fn allocate_keeps_currency() {
        let parts = Money::new(12300, pln()).unwrap().allocate(&[2, 5]).unwrap();
        assert_eq!(parts.iter().map(Money::raw).collect::<Vec<_>>(), vec![3515, 8785]);
        assert!(parts.iter().all(|m| m.currency().code() == "PLN"));
    }
}
