// 💰 Budgets - spending limits per category over a date window
//
// A budget holds a limit for some categories and a validity window. Budget
// usage folds the expenses inside that window with the budget-template
// aggregator and joins each category with its limit, so budget screens can
// show unused categories next to the ones that ran over.

use crate::aggregator::{aggregate_by_category_with_budget_template, CategoryMap};
use crate::transaction::{Transaction, TransactionKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    pub id: String,
    pub title: String,

    /// Category key -> spending limit
    pub category_limits: BTreeMap<String, f64>,

    pub currency: String,

    /// Inclusive
    pub start_date: DateTime<Utc>,

    /// Inclusive
    pub end_date: DateTime<Utc>,
}

impl Budget {
    pub fn new(
        title: &str,
        currency: &str,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> Self {
        Budget {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.to_string(),
            category_limits: BTreeMap::new(),
            currency: currency.to_string(),
            start_date,
            end_date,
        }
    }

    pub fn with_limit(mut self, category: &str, limit: f64) -> Self {
        self.category_limits.insert(category.to_string(), limit);
        self
    }

    pub fn limit_for(&self, category: &str) -> Option<f64> {
        self.category_limits.get(category).copied()
    }

    pub fn covers(&self, date: DateTime<Utc>) -> bool {
        date >= self.start_date && date <= self.end_date
    }

    pub fn total_limit(&self) -> f64 {
        self.category_limits.values().sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetUsage {
    pub spent: f64,
    pub transactions_count: usize,
    pub limit: Option<f64>,
    /// spent / limit * 100, `None` without a limit
    pub budget_percent: Option<f64>,
    pub over_budget: bool,
    pub currency: String,
}

/// Spending per category against `budget`.
///
/// Only expenses dated inside the budget window count. Every category of
/// the fixed set is present; categories the budget limits but nobody spent
/// on show `spent = 0`.
pub fn budget_usage(budget: &Budget, transactions: &[Transaction]) -> CategoryMap<BudgetUsage> {
    let in_window: Vec<Transaction> = transactions
        .iter()
        .filter(|tx| tx.kind == TransactionKind::Expense && budget.covers(tx.date))
        .cloned()
        .collect();

    let totals = aggregate_by_category_with_budget_template(&in_window);

    let mut usage = CategoryMap::new();
    for (category, summary) in totals.iter() {
        let limit = budget.limit_for(category);
        usage.get_or_insert_with(category, || {
            usage_for(summary.amount, summary.transactions_count, limit, &budget.currency)
        });
    }

    // Limits on categories outside the fixed set still show up
    for (category, &limit) in &budget.category_limits {
        usage.get_or_insert_with(category, || usage_for(0.0, 0, Some(limit), &budget.currency));
    }

    usage
}

fn usage_for(
    spent: f64,
    transactions_count: usize,
    limit: Option<f64>,
    currency: &str,
) -> BudgetUsage {
    let budget_percent = limit.map(|limit| spent / limit * 100.0);
    BudgetUsage {
        spent,
        transactions_count,
        limit,
        budget_percent,
        over_budget: limit.map_or(false, |limit| spent > limit),
        currency: currency.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categories;
    use chrono::TimeZone;

    fn at(m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, m, d, 12, 0, 0).unwrap()
    }

    fn march_budget() -> Budget {
        Budget::new("March", "EUR", at(3, 1), at(3, 31))
            .with_limit("food", 200.0)
            .with_limit("travel", 100.0)
    }

    #[test]
    fn test_budget_window() {
        let budget = march_budget();
        assert!(budget.covers(at(3, 1)));
        assert!(budget.covers(at(3, 31)));
        assert!(!budget.covers(at(4, 1)));
        assert_eq!(budget.total_limit(), 300.0);
    }

    #[test]
    fn test_budget_usage() {
        let budget = march_budget();
        let txs = vec![
            Transaction::new(50.0, "food", "EUR", at(3, 2)),
            Transaction::new(100.0, "food", "EUR", at(3, 20)),
            Transaction::new(150.0, "travel", "EUR", at(3, 21)),
            // Outside the window
            Transaction::new(500.0, "food", "EUR", at(4, 2)),
            // Not an expense
            Transaction::new(3000.0, "other", "EUR", at(3, 5)).with_kind(TransactionKind::Income),
        ];

        let usage = budget_usage(&budget, &txs);
        assert_eq!(usage.len(), categories::CATEGORIES.len());

        let food = usage.get("food").unwrap();
        assert_eq!(food.spent, 150.0);
        assert_eq!(food.transactions_count, 2);
        assert_eq!(food.budget_percent, Some(75.0));
        assert!(!food.over_budget);

        let travel = usage.get("travel").unwrap();
        assert_eq!(travel.budget_percent, Some(150.0));
        assert!(travel.over_budget);

        let other = usage.get("other").unwrap();
        assert_eq!(other.spent, 0.0);
        assert_eq!(other.limit, None);
        assert_eq!(other.budget_percent, None);
    }

    #[test]
    fn test_budget_usage_unknown_category_limit() {
        let budget = march_budget().with_limit("pets", 40.0);
        let usage = budget_usage(&budget, &[]);

        let pets = usage.get("pets").unwrap();
        assert_eq!(pets.spent, 0.0);
        assert_eq!(pets.budget_percent, Some(0.0));
        assert_eq!(usage.keys().last(), Some("pets"));
    }
}
