// Calendar-month periods for month-over-month comparisons

use crate::transaction::{Transaction, TransactionKind};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Years a `YYYY-MM` period can name
pub const MIN_YEAR: i32 = 1;
pub const MAX_YEAR: i32 = 9999;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "PeriodParts")]
pub struct Period {
    year: i32,
    /// 1..=12
    month: u32,
}

#[derive(Deserialize)]
struct PeriodParts {
    year: i32,
    month: u32,
}

impl TryFrom<PeriodParts> for Period {
    type Error = anyhow::Error;

    fn try_from(parts: PeriodParts) -> Result<Self> {
        Period::new(parts.year, parts.month)
    }
}

impl Period {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            bail!("year out of range: {}", year);
        }
        if !(1..=12).contains(&month) {
            bail!("month out of range: {}", month);
        }
        Ok(Period { year, month })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn containing(date: DateTime<Utc>) -> Self {
        Period {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn current() -> Self {
        Self::containing(Utc::now())
    }

    /// Parse `YYYY-MM`
    pub fn parse(s: &str) -> Result<Self> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .with_context(|| format!("Expected YYYY-MM, got {:?}", s))?;
        let year: i32 = year
            .parse()
            .with_context(|| format!("Invalid year in {:?}", s))?;
        let month: u32 = month
            .parse()
            .with_context(|| format!("Invalid month in {:?}", s))?;
        Self::new(year, month)
    }

    pub fn previous(&self) -> Self {
        if self.month == 1 {
            Period { year: self.year.saturating_sub(1), month: 12 }
        } else {
            Period { year: self.year, month: self.month - 1 }
        }
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Period { year: self.year.saturating_add(1), month: 1 }
        } else {
            Period { year: self.year, month: self.month + 1 }
        }
    }

    /// First instant of the month (inclusive).
    ///
    /// Months past either end of chrono's calendar saturate to its first or
    /// last instant.
    pub fn start(&self) -> DateTime<Utc> {
        match Utc.with_ymd_and_hms(self.year, self.month, 1, 0, 0, 0).single() {
            Some(start) => start,
            None if self.year > 0 => DateTime::<Utc>::MAX_UTC,
            None => DateTime::<Utc>::MIN_UTC,
        }
    }

    /// First instant of the following month (exclusive)
    pub fn end(&self) -> DateTime<Utc> {
        self.next().start()
    }

    pub fn contains(&self, date: DateTime<Utc>) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Split transactions into those inside `period` and those inside the month
/// before it. Everything else is dropped.
pub fn split_by_period(
    transactions: &[Transaction],
    period: Period,
) -> (Vec<Transaction>, Vec<Transaction>) {
    let previous = period.previous();

    let current_txs = transactions
        .iter()
        .filter(|tx| period.contains(tx.date))
        .cloned()
        .collect();
    let previous_txs = transactions
        .iter()
        .filter(|tx| previous.contains(tx.date))
        .cloned()
        .collect();

    (current_txs, previous_txs)
}

/// Transactions of one kind
pub fn of_kind(transactions: &[Transaction], kind: TransactionKind) -> Vec<Transaction> {
    transactions
        .iter()
        .filter(|tx| tx.kind == kind)
        .cloned()
        .collect()
}

/// Sum of amounts of one kind
pub fn total(transactions: &[Transaction], kind: TransactionKind) -> f64 {
    transactions
        .iter()
        .filter(|tx| tx.kind == kind)
        .fold(0.0, |acc, tx| acc + tx.amount)
}
