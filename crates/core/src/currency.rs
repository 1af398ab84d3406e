//! Currency definition and exact fixed-point conversions.
//!
//! Amounts are raw integers counted in the smallest representable fraction of
//! a unit. A currency with 100 subunits per unit keeps two fraction digits and
//! every raw amount is a multiple of 1; a currency with 5 subunits per unit
//! (MRU) keeps one fraction digit and every raw amount is a multiple of 2.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Largest fraction-digit count tried when resolving a subunit ratio.
pub const MAX_FRACTION_DIGITS: u32 = 18;

/// When the group separator is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingRule {
    Always,
    /// Group only integer parts with at least this many digits.
    MinIntegerDigits(usize),
}

/// Text layout of an amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmountFormat {
    pub fraction_separator: char,
    pub group_separator: Option<char>,
    /// Digit counts, from the fraction separator leftwards, before which a
    /// group separator goes (`3, 6, 9` or, for lakh/crore, `3, 5, 7`).
    pub group_positions: Vec<usize>,
    pub grouping: GroupingRule,
}

impl Default for AmountFormat {
    fn default() -> Self {
        Self {
            fraction_separator: '.',
            group_separator: None,
            group_positions: (1..=6).map(|n| n * 3).collect(),
            grouping: GroupingRule::Always,
        }
    }
}

impl AmountFormat {
    /// Thousands grouping with `separator`.
    pub fn grouped(separator: char) -> Self {
        Self::default().with_group_separator(Some(separator))
    }

    /// Lakh/crore grouping (`12,34,567`).
    pub fn indian(separator: char) -> Self {
        Self::grouped(separator).with_group_positions(core::iter::once(3).chain((5..=17).step_by(2)))
    }

    pub fn with_fraction_separator(mut self, separator: char) -> Self {
        self.fraction_separator = separator;
        self
    }

    pub fn with_group_separator(mut self, separator: Option<char>) -> Self {
        self.group_separator = separator;
        self
    }

    pub fn with_group_positions(mut self, positions: impl IntoIterator<Item = usize>) -> Self {
        self.group_positions = positions.into_iter().collect();
        self
    }

    pub fn with_grouping(mut self, grouping: GroupingRule) -> Self {
        self.grouping = grouping;
        self
    }

    fn group(&self, int_part: &str) -> String {
        let Some(separator) = self.group_separator else {
            return int_part.to_string();
        };
        if let GroupingRule::MinIntegerDigits(min) = self.grouping {
            if int_part.len() < min {
                return int_part.to_string();
            }
        }
        let len = int_part.len();
        let mut out = String::with_capacity(len + len / 2);
        for (i, ch) in int_part.chars().enumerate() {
            if i > 0 && self.group_positions.contains(&(len - i)) {
                out.push(separator);
            }
            out.push(ch);
        }
        out
    }
}

/// Construction parameters of a [`Currency`]; also its serialized form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencySpec {
    pub code: String,
    pub numeric_code: String,
    pub ratio: u64,
    pub name: String,
    #[serde(default)]
    pub unit_symbol: Option<String>,
    #[serde(default)]
    pub subunit_symbol: Option<String>,
    #[serde(default)]
    pub format: AmountFormat,
}

/// An immutable currency with its subunit resolution cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CurrencySpec", into = "CurrencySpec")]
pub struct Currency {
    spec: CurrencySpec,
    fraction_digits: u32,
    smallest_unit: i64,
}

/// Finds the smallest `k` for which `10^k / ratio` is exact.
///
/// Returns `(fraction_digits, smallest_unit)` where
/// `smallest_unit = 10^fraction_digits / ratio`.
pub fn resolve_subunit(ratio: u64) -> DomainResult<(u32, i64)> {
    if ratio == 0 {
        return Err(DomainError::UnsupportedRatio { ratio });
    }
    for k in 0..=MAX_FRACTION_DIGITS {
        let unit = 10u64.pow(k);
        let subunit = unit / ratio;
        if subunit != 0 && subunit * ratio == unit {
            return Ok((k, subunit as i64));
        }
    }
    Err(DomainError::UnsupportedRatio { ratio })
}

fn parse_digits(digits: &str, text: &str) -> DomainResult<i128> {
    if digits.is_empty() {
        return Ok(0);
    }
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DomainError::precision(format!("'{text}' is not a number")));
    }
    digits
        .parse::<i128>()
        .map_err(|_| DomainError::precision(format!("'{text}' is out of range")))
}

impl TryFrom<CurrencySpec> for Currency {
    type Error = DomainError;

    fn try_from(spec: CurrencySpec) -> Result<Self, Self::Error> {
        let (fraction_digits, smallest_unit) = resolve_subunit(spec.ratio)?;
        Ok(Self {
            spec,
            fraction_digits,
            smallest_unit,
        })
    }
}

impl From<Currency> for CurrencySpec {
    fn from(currency: Currency) -> Self {
        currency.spec
    }
}

impl Currency {
    pub fn new(
        code: impl Into<String>,
        numeric_code: impl Into<String>,
        ratio: u64,
        name: impl Into<String>,
    ) -> DomainResult<Self> {
        Self::try_from(CurrencySpec {
            code: code.into(),
            numeric_code: numeric_code.into(),
            ratio,
            name: name.into(),
            unit_symbol: None,
            subunit_symbol: None,
            format: AmountFormat::default(),
        })
    }

    pub fn with_symbols(mut self, unit: impl Into<String>, subunit: impl Into<String>) -> Self {
        self.spec.unit_symbol = Some(unit.into());
        self.spec.subunit_symbol = Some(subunit.into());
        self
    }

    pub fn with_format(mut self, format: AmountFormat) -> Self {
        self.spec.format = format;
        self
    }

    pub fn code(&self) -> &str {
        &self.spec.code
    }

    pub fn numeric_code(&self) -> &str {
        &self.spec.numeric_code
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn ratio(&self) -> u64 {
        self.spec.ratio
    }

    pub fn unit_symbol(&self) -> Option<&str> {
        self.spec.unit_symbol.as_deref()
    }

    pub fn subunit_symbol(&self) -> Option<&str> {
        self.spec.subunit_symbol.as_deref()
    }

    pub fn format(&self) -> &AmountFormat {
        &self.spec.format
    }

    pub fn fraction_digits(&self) -> u32 {
        self.fraction_digits
    }

    pub fn smallest_unit(&self) -> i64 {
        self.smallest_unit
    }

    /// Fails with `Precision` unless `raw` is a multiple of the smallest unit.
    pub fn check_raw(&self, raw: i64) -> DomainResult<i64> {
        if raw % self.smallest_unit != 0 {
            return Err(DomainError::precision(format!(
                "{raw} is not a multiple of the smallest unit {} of {}",
                self.smallest_unit, self.spec.code
            )));
        }
        Ok(raw)
    }

    fn scale(&self) -> i128 {
        10i128.pow(self.fraction_digits)
    }

    /// Parses text such as `-1 234.56` into a raw amount.
    ///
    /// Whitespace, underscores and the configured group separator are
    /// ignored. Extra fraction digits are rounded half away from zero.
    pub fn amount_to_raw(&self, text: &str) -> DomainResult<i64> {
        let format = &self.spec.format;
        let cleaned: String = text
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && Some(*c) != format.group_separator)
            .collect();
        let (negative, unsigned) = match cleaned.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, cleaned.strip_prefix('+').unwrap_or(&cleaned)),
        };

        let mut parts = unsigned.split(format.fraction_separator);
        let int_digits = parts.next().unwrap_or_default();
        let frac_digits = parts.next().unwrap_or_default();
        if parts.next().is_some() || (int_digits.is_empty() && frac_digits.is_empty()) {
            return Err(DomainError::precision(format!("'{text}' is not a number")));
        }

        if !frac_digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DomainError::precision(format!("'{text}' is not a number")));
        }

        let k = self.fraction_digits as usize;
        let int_value = parse_digits(int_digits, text)?;
        let (kept, dropped) = frac_digits.split_at(frac_digits.len().min(k));
        let mut frac_value = parse_digits(kept, text)? * 10i128.pow((k - kept.len()) as u32);
        if dropped.bytes().next().is_some_and(|b| b >= b'5') {
            frac_value += 1;
        }

        let magnitude = int_value
            .checked_mul(self.scale())
            .and_then(|v| v.checked_add(frac_value))
            .ok_or_else(|| DomainError::precision(format!("'{text}' is out of range")))?;
        let signed = if negative { -magnitude } else { magnitude };
        let raw = i64::try_from(signed)
            .map_err(|_| DomainError::precision(format!("'{text}' is out of range")))?;
        self.check_raw(raw)
    }

    /// Converts a numeric amount, rounding to the nearest raw value.
    pub fn amount_to_raw_f64(&self, amount: f64) -> DomainResult<i64> {
        let scaled = (amount * self.scale() as f64).round();
        if !scaled.is_finite() || scaled.abs() >= i64::MAX as f64 {
            return Err(DomainError::precision(format!("{amount} is out of range")));
        }
        self.check_raw(scaled as i64)
    }

    pub fn raw_to_amount(&self, raw: i64) -> String {
        self.raw_to_amount_with(raw, &self.spec.format)
    }

    /// Renders `raw` using `format` instead of the currency's own layout.
    pub fn raw_to_amount_with(&self, raw: i64, format: &AmountFormat) -> String {
        let k = self.fraction_digits as usize;
        let digits = format!("{:0>width$}", raw.unsigned_abs(), width = k + 1);
        let (int_part, frac_part) = digits.split_at(digits.len() - k);

        let mut out = String::with_capacity(digits.len() + 8);
        if raw < 0 {
            out.push('-');
        }
        out.push_str(&format.group(int_part));
        if k > 0 {
            out.push(format.fraction_separator);
            out.push_str(frac_part);
        }
        out
    }

    /// Splits `raw` across `ratios` so the parts add up to `raw` exactly.
    ///
    /// Each part is the ratio-proportional share truncated to a multiple of
    /// the smallest unit; the shortfall is then handed out one smallest unit
    /// at a time, in ratio order.
    pub fn allocate(&self, raw: i64, ratios: &[u64]) -> DomainResult<Vec<i64>> {
        self.check_raw(raw)?;
        let total: i128 = ratios.iter().map(|&r| r as i128).sum();
        if total == 0 {
            return Err(DomainError::allocation(
                "ratios must contain at least one non-zero value",
            ));
        }

        let unit = self.smallest_unit as i128;
        let raw_wide = raw as i128;
        let mut parts = ratios
            .iter()
            .map(|&ratio| {
                let share = raw_wide
                    .checked_mul(ratio as i128)
                    .ok_or_else(|| DomainError::allocation("amount too large to allocate"))?
                    .div_euclid(total);
                Ok(share - share.rem_euclid(unit))
            })
            .collect::<DomainResult<Vec<i128>>>()?;

        let mut remainder = raw_wide - parts.iter().sum::<i128>();
        if remainder < 0 {
            return Err(DomainError::allocation(format!(
                "negative remainder {remainder} while allocating {raw}"
            )));
        }
        for part in parts.iter_mut() {
            if remainder < unit {
                break;
            }
            *part += unit;
            remainder -= unit;
        }
        if remainder != 0 {
            return Err(DomainError::allocation(format!(
                "remainder {remainder} left after allocating {raw}"
            )));
        }

        parts
            .into_iter()
            .map(|p| i64::try_from(p).map_err(|_| DomainError::allocation("part out of range")))
            .collect()
    }
}

impl core::fmt::Display for Currency {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.spec.code)
    }
}
