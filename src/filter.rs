// Expense listing filters
//
// Mirrors the filter sidebar of the expense listing: date range, free-text
// search, amount range, category, tag, and page-based pagination. Results are
// ordered newest first.

use crate::categories;
use crate::transaction::{parse_date, Transaction};
use anyhow::{bail, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseFilter {
    /// Inclusive lower bound
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,

    /// Inclusive upper bound
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,

    /// Case-insensitive substring of title or description
    #[serde(default)]
    pub query: String,

    /// Inclusive; 0 means unset
    #[serde(default)]
    pub min_amount: f64,

    /// Inclusive; 0 means unset
    #[serde(default)]
    pub max_amount: f64,

    #[serde(default)]
    pub category: Option<String>,

    #[serde(default)]
    pub tag: String,

    #[serde(default)]
    pub page_index: usize,

    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl Default for ExpenseFilter {
    fn default() -> Self {
        ExpenseFilter {
            from: None,
            to: None,
            query: String::new(),
            min_amount: 0.0,
            max_amount: 0.0,
            category: None,
            tag: String::new(),
            page_index: 0,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Matches before pagination
    pub total: usize,
    pub page_index: usize,
    pub page_size: usize,
    pub page_count: usize,
}

fn page_count(total: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 0;
    }
    total.div_ceil(page_size)
}

impl ExpenseFilter {
    /// Set the category from a user query; unknown categories clear it
    pub fn with_category_query(mut self, raw: &str) -> Self {
        self.category = categories::resolve_query(raw).map(str::to_string);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.from.is_none()
            && self.to.is_none()
            && self.query.trim().is_empty()
            && self.min_amount == 0.0
            && self.max_amount == 0.0
            && self.category.is_none()
            && self.tag.trim().is_empty()
    }

    pub fn matches(&self, tx: &Transaction) -> bool {
        if let Some(from) = self.from {
            if tx.date < from {
                return false;
            }
        }

        if let Some(to) = self.to {
            if tx.date > to {
                return false;
            }
        }

        let query = self.query.trim().to_lowercase();
        if !query.is_empty()
            && !tx.title.to_lowercase().contains(&query)
            && !tx.description.to_lowercase().contains(&query)
        {
            return false;
        }

        if self.min_amount != 0.0 && tx.amount < self.min_amount {
            return false;
        }

        if self.max_amount != 0.0 && tx.amount > self.max_amount {
            return false;
        }

        if let Some(category) = &self.category {
            if &tx.category != category {
                return false;
            }
        }

        let tag = self.tag.trim();
        if !tag.is_empty() && !tx.tag.eq_ignore_ascii_case(tag) {
            return false;
        }

        true
    }

    /// Filter, sort newest first, then cut out the requested page
    pub fn apply(&self, transactions: &[Transaction]) -> Page<Transaction> {
        let mut matched: Vec<&Transaction> =
            transactions.iter().filter(|tx| self.matches(tx)).collect();
        matched.sort_by(|a, b| b.date.cmp(&a.date));

        let total = matched.len();
        let items = matched
            .into_iter()
            .skip(self.page_index.saturating_mul(self.page_size))
            .take(self.page_size)
            .cloned()
            .collect();

        Page {
            items,
            total,
            page_index: self.page_index,
            page_size: self.page_size,
            page_count: page_count(total, self.page_size),
        }
    }
}

/// Parse the upper bound of a date range.
///
/// A plain `YYYY-MM-DD` covers the whole day, so it becomes the last instant
/// of that day. Full timestamps are taken as given.
pub fn parse_upper_bound(input: &str) -> Option<DateTime<Utc>> {
    match NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d") {
        Ok(day) => day
            .succ_opt()
            .and_then(|next| next.and_hms_opt(0, 0, 0))
            .map(|midnight| midnight.and_utc() - Duration::nanoseconds(1)),
        Err(_) => parse_date(input),
    }
}

/// Parse an amount typed into the filter form.
///
/// Empty input means "unset" (0). Only plain non-negative decimals are
/// accepted: digits with at most one decimal point.
pub fn parse_amount(input: &str) -> Result<f64> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(0.0);
    }

    let mut seen_dot = false;
    for c in input.chars() {
        match c {
            '0'..='9' => {}
            '.' if !seen_dot => seen_dot = true,
            _ => bail!("Not a valid amount: {:?}", input),
        }
    }
    if input == "." {
        bail!("Not a valid amount: {:?}", input);
    }

    Ok(input.parse::<f64>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, d, 10, 0, 0).unwrap()
    }

    fn ledger() -> Vec<Transaction> {
        vec![
            Transaction::new(12.5, "food", "USD", at(1)).with_title("Bakery").with_tag("breakfast"),
            Transaction::new(80.0, "shopping", "USD", at(3))
                .with_title("Shoes")
                .with_description("Running shoes for the marathon"),
            Transaction::new(45.0, "food", "USD", at(5)).with_title("Dinner out"),
            Transaction::new(1200.0, "housing", "USD", at(7)).with_title("Rent"),
        ]
    }

    #[test]
    fn test_empty_filter_matches_everything_newest_first() {
        let filter = ExpenseFilter::default();
        assert!(filter.is_empty());

        let page = filter.apply(&ledger());
        assert_eq!(page.total, 4);
        assert_eq!(page.items[0].title, "Rent");
        assert_eq!(page.items[3].title, "Bakery");
    }

    #[test]
    fn test_query_matches_title_or_description() {
        let filter = ExpenseFilter {
            query: "MARATHON".to_string(),
            ..Default::default()
        };
        let page = filter.apply(&ledger());
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].title, "Shoes");
    }

    #[test]
    fn test_amount_bounds_inclusive_and_zero_unset() {
        let filter = ExpenseFilter {
            min_amount: 45.0,
            max_amount: 80.0,
            ..Default::default()
        };
        assert_eq!(filter.apply(&ledger()).total, 2);

        let only_min = ExpenseFilter {
            min_amount: 100.0,
            ..Default::default()
        };
        assert_eq!(only_min.apply(&ledger()).total, 1);
    }

    #[test]
    fn test_date_category_and_tag() {
        let filter = ExpenseFilter {
            from: Some(at(2)),
            to: Some(at(5)),
            ..Default::default()
        }
        .with_category_query("Food");
        let page = filter.apply(&ledger());
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].title, "Dinner out");

        let tagged = ExpenseFilter {
            tag: "Breakfast".to_string(),
            ..Default::default()
        };
        assert_eq!(tagged.apply(&ledger()).total, 1);
    }

    #[test]
    fn test_unknown_category_query_is_ignored() {
        let filter = ExpenseFilter::default().with_category_query("crypto");
        assert_eq!(filter.category, None);
        assert_eq!(filter.apply(&ledger()).total, 4);
    }

    #[test]
    fn test_pagination() {
        let filter = ExpenseFilter {
            page_index: 1,
            page_size: 3,
            ..Default::default()
        };
        let page = filter.apply(&ledger());
        assert_eq!(page.total, 4);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.page_count, 2);

        let empty = ExpenseFilter::default().apply(&[]);
        assert_eq!(empty.page_count, 0);
    }

    #[test]
    fn test_date_only_upper_bound_covers_the_whole_day() {
        let to = parse_upper_bound("2024-06-05").unwrap();
        assert_eq!(
            to,
            Utc.with_ymd_and_hms(2024, 6, 6, 0, 0, 0).unwrap() - Duration::nanoseconds(1)
        );

        // "Dinner out" is at 10:00 on the 5th
        let filter = ExpenseFilter {
            from: parse_date("2024-06-05"),
            to: Some(to),
            ..Default::default()
        };
        let page = filter.apply(&ledger());
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].title, "Dinner out");

        let exact = parse_upper_bound("2024-06-05T08:00:00Z").unwrap();
        assert_eq!(exact, Utc.with_ymd_and_hms(2024, 6, 5, 8, 0, 0).unwrap());
        assert!(parse_upper_bound("next week").is_none());
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("").unwrap(), 0.0);
        assert_eq!(parse_amount("42").unwrap(), 42.0);
        assert_eq!(parse_amount("12.50").unwrap(), 12.5);
        assert!(parse_amount("-3").is_err());
        assert!(parse_amount("1.2.3").is_err());
        assert!(parse_amount("abc").is_err());
        assert!(parse_amount(".").is_err());
    }
}
