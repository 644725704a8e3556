// 📊 Transaction Aggregator - dashboard statistics
//
// Pure folds over an in-memory list of transactions. Nothing here fails:
// edge inputs degrade numerically (0, NaN, infinity) instead of erroring,
// because every caller renders the numbers directly.
//
// Zero-division policy differs per operation and is intentional:
// - compute_stats:               empty input -> avg = 0
// - compute_period_change:       non-finite percentage forced to 0
// - aggregate_by_category*:      percentage = amount / total * 100, unguarded
// - aggregate_change_vs_previous_period: percentage change unguarded

use crate::categories;
use crate::transaction::{Transaction, TransactionKind};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// CATEGORY MAP
// ============================================================================

/// Insertion-ordered mapping from category key to a running value.
///
/// Values are created on first sight of a key through
/// [`CategoryMap::get_or_insert_with`] and updated in place afterwards.
/// Iteration (and JSON serialization) follows insertion order, so a map
/// seeded from [`categories::CATEGORIES`] lists categories canonically.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryMap<V> {
    entries: Vec<(String, V)>,
    index: HashMap<String, usize>,
}

impl<V> CategoryMap<V> {
    pub fn new() -> Self {
        CategoryMap {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Insert-if-absent, then hand back the value for `key`
    pub fn get_or_insert_with<F>(&mut self, key: &str, default: F) -> &mut V
    where
        F: FnOnce() -> V,
    {
        let pos = match self.index.get(key) {
            Some(&pos) => pos,
            None => {
                self.entries.push((key.to_string(), default()));
                let pos = self.entries.len() - 1;
                self.index.insert(key.to_string(), pos);
                pos
            }
        };
        &mut self.entries[pos].1
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.index.get(key).map(|&pos| &self.entries[pos].1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut V)> {
        self.entries.iter_mut().map(|(k, v)| (k.as_str(), v))
    }
}

impl<V> Default for CategoryMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Serialize> Serialize for CategoryMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

// ============================================================================
// OUTPUT TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExpenseStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub sum: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeDirection {
    Increase,
    Decrease,
    Unchanged,
}

impl ChangeDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeDirection::Increase => "increase",
            ChangeDirection::Decrease => "decrease",
            ChangeDirection::Unchanged => "unchanged",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeriodChange {
    pub percentage: f64,
    pub direction: ChangeDirection,
    pub change: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    pub amount: f64,
    pub transactions_count: usize,
    /// Share of the total in percent, filled after every transaction is folded
    pub percentage: f64,
    /// Taken from the first transaction of the whole input, not per category
    pub currency: Option<String>,
}

impl CategorySummary {
    fn zero(currency: Option<String>) -> Self {
        CategorySummary {
            amount: 0.0,
            transactions_count: 0,
            percentage: 0.0,
            currency,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryChangeSummary {
    pub total_expenses: f64,
    pub percentage_change: f64,
    pub absolute_prev_value: f64,
    pub absolute_curr_value: f64,
    pub either_month_has_no_expenses: bool,
}

// ============================================================================
// OPERATIONS
// ============================================================================

/// Min, max, average and sum of transaction amounts.
///
/// `min` starts at +infinity and is reported as 0 when nothing lowered it;
/// `max` starts at 0, so an all-negative list reports `max = 0`.
/// Empty input yields all zeros. NaN amounts propagate into every field.
pub fn compute_stats(transactions: &[Transaction]) -> ExpenseStats {
    let mut min = f64::INFINITY;
    let mut max = 0.0;
    let mut sum = 0.0;

    for tx in transactions {
        min = nan_min(min, tx.amount);
        max = nan_max(max, tx.amount);
        sum += tx.amount;
    }

    if min == f64::INFINITY {
        min = 0.0;
    }

    let avg = if transactions.is_empty() {
        0.0
    } else {
        sum / transactions.len() as f64
    };

    ExpenseStats { min, max, avg, sum }
}

/// Compare two period totals.
///
/// `percentage` is relative to `|previous_total|` and is forced to 0 when it
/// comes out NaN or infinite (e.g. previous total of 0). For expenses the
/// direction is read as financial health, so spending more is a `Decrease`
/// and spending less an `Increase`.
pub fn compute_period_change(
    kind: TransactionKind,
    previous_total: f64,
    current_total: f64,
) -> PeriodChange {
    let change = current_total - previous_total;

    let mut percentage = change / previous_total.abs() * 100.0;
    if !percentage.is_finite() {
        percentage = 0.0;
    }

    let natural = if change > 0.0 {
        ChangeDirection::Increase
    } else if change < 0.0 {
        ChangeDirection::Decrease
    } else {
        ChangeDirection::Unchanged
    };

    let direction = match (kind, natural) {
        (TransactionKind::Expense, ChangeDirection::Increase) => ChangeDirection::Decrease,
        (TransactionKind::Expense, ChangeDirection::Decrease) => ChangeDirection::Increase,
        (_, direction) => direction,
    };

    PeriodChange {
        percentage,
        direction,
        change,
    }
}

/// Per-category totals for the categories present in `transactions`,
/// in order of first appearance.
///
/// Percentages are not guarded: a zero overall total yields NaN or
/// infinite shares.
pub fn aggregate_by_category(transactions: &[Transaction]) -> CategoryMap<CategorySummary> {
    let mut totals = CategoryMap::new();
    fold_categories(&mut totals, transactions);
    totals
}

/// Like [`aggregate_by_category`], but every category of the fixed set is
/// present (in canonical order) even without transactions. Categories
/// outside the fixed set are appended after it.
pub fn aggregate_by_category_with_budget_template(
    transactions: &[Transaction],
) -> CategoryMap<CategorySummary> {
    let currency = first_currency(transactions);

    let mut totals = CategoryMap::new();
    for key in categories::keys() {
        totals.get_or_insert_with(key, || CategorySummary::zero(currency.clone()));
    }

    fold_categories(&mut totals, transactions);
    totals
}

/// Current-period totals per category compared against the previous period.
///
/// Only categories present in `transactions` appear. A category missing
/// from `previous_totals` keeps `percentage_change = 0` and
/// `absolute_prev_value = 0`; a previous total of 0 is divided by as is.
pub fn aggregate_change_vs_previous_period(
    transactions: &[Transaction],
    previous_totals: &CategoryMap<CategorySummary>,
) -> CategoryMap<CategoryChangeSummary> {
    let mut changes: CategoryMap<CategoryChangeSummary> = CategoryMap::new();

    for tx in transactions {
        let entry = changes.get_or_insert_with(&tx.category, CategoryChangeSummary::default);
        entry.total_expenses += tx.amount;
        entry.absolute_curr_value = entry.total_expenses;
    }

    for (category, entry) in changes.iter_mut() {
        if let Some(previous) = previous_totals.get(category) {
            let change = entry.total_expenses - previous.amount;
            entry.percentage_change = change / previous.amount * 100.0;
            entry.absolute_prev_value = previous.amount;
        }
        entry.either_month_has_no_expenses =
            entry.absolute_prev_value == 0.0 || entry.absolute_curr_value == 0.0;
    }

    changes
}

// ============================================================================
// HELPERS
// ============================================================================

fn fold_categories(totals: &mut CategoryMap<CategorySummary>, transactions: &[Transaction]) {
    let currency = first_currency(transactions);
    let total = transactions.iter().fold(0.0, |acc, tx| acc + tx.amount);

    for tx in transactions {
        let summary =
            totals.get_or_insert_with(&tx.category, || CategorySummary::zero(currency.clone()));
        summary.amount += tx.amount;
        summary.transactions_count += 1;
    }

    for (_, summary) in totals.iter_mut() {
        summary.percentage = summary.amount / total * 100.0;
        summary.currency = currency.clone();
    }
}

fn first_currency(transactions: &[Transaction]) -> Option<String> {
    transactions.first().map(|tx| tx.currency.clone())
}

// f64::min/max skip NaN; running extremes here must not
fn nan_min(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else {
        a.min(b)
    }
}

fn nan_max(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else {
        a.max(b)
    }
}

// ============================================================================
// TESTS
// ============================================================================
