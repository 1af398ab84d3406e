//! Injected sources: sequence ids, GUIDs and date phrases.
//!
//! The engine never reaches for global state; whoever builds a ledger hands
//! it these sources, so tests can pin every id and every "today".

use core::sync::atomic::{AtomicU64, Ordering};

use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::id::Guid;

/// Monotonic source of sequence numbers (entry sids and post ids).
pub trait SequenceSource: Send + core::fmt::Debug {
    fn next_sid(&mut self) -> u64;
}

/// Source of globally unique entry ids.
pub trait GuidSource: Send + core::fmt::Debug {
    fn next_guid(&mut self) -> Guid;
}

/// Resolves phrases such as `today` into a concrete date and time.
pub trait DateResolver {
    fn resolve(&self, phrase: &str) -> DomainResult<NaiveDateTime>;
}

/// Counter owned by a single ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonotonicSequence {
    next: u64,
}

impl MonotonicSequence {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u64) -> Self {
        Self { next: first }
    }
}

impl Default for MonotonicSequence {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceSource for MonotonicSequence {
    fn next_sid(&mut self) -> u64 {
        let sid = self.next;
        self.next += 1;
        sid
    }
}

static PROCESS_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Process-wide counter shared by every ledger in the process.
///
/// Starts at 1 when the process starts and is never reset.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessSequence;

impl SequenceSource for ProcessSequence {
    fn next_sid(&mut self) -> u64 {
        PROCESS_SEQUENCE.fetch_add(1, Ordering::Relaxed)
    }
}

/// Time-ordered UUIDv7 ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidV7Source;

impl GuidSource for UuidV7Source {
    fn next_guid(&mut self) -> Guid {
        Guid::new()
    }
}

/// Deterministic ids: `00000000-0000-0000-0000-000000000001`, `…02`, and so on.
#[derive(Debug, Clone, Default)]
pub struct CountingGuidSource {
    last: u128,
}

impl GuidSource for CountingGuidSource {
    fn next_guid(&mut self) -> Guid {
        self.last += 1;
        Guid::from_uuid(Uuid::from_u128(self.last))
    }
}

/// Resolves date phrases against the local clock, or against a pinned instant.
#[derive(Debug, Clone, Default)]
pub struct SystemDateResolver {
    pinned: Option<NaiveDateTime>,
}

impl SystemDateResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative phrases against `now` instead of the clock.
    pub fn pinned(now: NaiveDateTime) -> Self {
        Self { pinned: Some(now) }
    }

    fn now(&self) -> NaiveDateTime {
        self.pinned.unwrap_or_else(|| Local::now().naive_local())
    }
}

fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::default())
}

fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()
}

fn month_shift(date: NaiveDate, delta: i32) -> (i32, u32) {
    let index = date.year() * 12 + date.month0() as i32 + delta;
    (index.div_euclid(12), index.rem_euclid(12) as u32 + 1)
}

impl DateResolver for SystemDateResolver {
    fn resolve(&self, phrase: &str) -> DomainResult<NaiveDateTime> {
        let now = self.now();
        let today = now.date();
        let phrase = phrase.trim();
        let month_end = |delta: i32| {
            let (year, month) = month_shift(today, delta);
            last_day_of_month(year, month)
                .map(midnight)
                .ok_or_else(|| DomainError::validation(format!("date out of range: {phrase}")))
        };

        match phrase.to_ascii_lowercase().as_str() {
            "now" => Ok(now),
            "today" => Ok(midnight(today)),
            "yesterday" => Ok(midnight(today - Duration::days(1))),
            "tomorrow" => Ok(midnight(today + Duration::days(1))),
            "prev_month_last_day" => month_end(-1),
            "this_month_last_day" => month_end(0),
            "next_month_last_day" => month_end(1),
            _ => NaiveDateTime::parse_from_str(phrase, "%Y-%m-%d %H:%M:%S")
                .or_else(|_| NaiveDate::parse_from_str(phrase, "%Y-%m-%d").map(midnight))
                .map_err(|_| DomainError::validation(format!("unrecognized date: '{phrase}'"))),
        }
    }
}
