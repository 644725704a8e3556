// Dashboard summary: every widget's numbers for one month

use crate::aggregator::{
    aggregate_by_category, aggregate_by_category_with_budget_template,
    aggregate_change_vs_previous_period, compute_period_change, compute_stats, CategoryChangeSummary,
    CategoryMap, CategorySummary, ExpenseStats, PeriodChange,
};
use crate::period::{self, split_by_period, Period};
use crate::transaction::{Transaction, TransactionKind};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub period: Period,
    pub expense_count: usize,
    pub expense_stats: ExpenseStats,
    pub expense_total: f64,
    pub previous_expense_total: f64,
    pub income_total: f64,
    pub previous_income_total: f64,
    pub saving_total: f64,
    pub previous_saving_total: f64,
    pub expense_change: PeriodChange,
    pub income_change: PeriodChange,
    pub saving_change: PeriodChange,
    /// Current-month expenses, every category present
    pub categories: CategoryMap<CategorySummary>,
    /// Current-month expenses per category against the previous month
    pub category_changes: CategoryMap<CategoryChangeSummary>,
}

impl DashboardSummary {
    /// Summarize `period` against the month before it
    pub fn build(transactions: &[Transaction], period: Period) -> Self {
        let (current, previous) = split_by_period(transactions, period);

        let current_expenses = period::of_kind(&current, TransactionKind::Expense);
        let previous_expenses = period::of_kind(&previous, TransactionKind::Expense);

        let expense_total = period::total(&current, TransactionKind::Expense);
        let previous_expense_total = period::total(&previous, TransactionKind::Expense);
        let income_total = period::total(&current, TransactionKind::Income);
        let previous_income_total = period::total(&previous, TransactionKind::Income);
        let saving_total = period::total(&current, TransactionKind::Saving);
        let previous_saving_total = period::total(&previous, TransactionKind::Saving);

        let previous_by_category = aggregate_by_category(&previous_expenses);

        debug!(
            %period,
            current = current.len(),
            previous = previous.len(),
            "building dashboard summary"
        );

        DashboardSummary {
            period,
            expense_count: current_expenses.len(),
            expense_stats: compute_stats(&current_expenses),
            expense_total,
            previous_expense_total,
            income_total,
            previous_income_total,
            saving_total,
            previous_saving_total,
            expense_change: compute_period_change(
                TransactionKind::Expense,
                previous_expense_total,
                expense_total,
            ),
            income_change: compute_period_change(
                TransactionKind::Income,
                previous_income_total,
                income_total,
            ),
            saving_change: compute_period_change(
                TransactionKind::Saving,
                previous_saving_total,
                saving_total,
            ),
            categories: aggregate_by_category_with_budget_template(&current_expenses),
            category_changes: aggregate_change_vs_previous_period(
                &current_expenses,
                &previous_by_category,
            ),
        }
    }

    /// Categories that actually have spending this month, largest first
    pub fn top_categories(&self, limit: usize) -> Vec<(&str, &CategorySummary)> {
        let mut used: Vec<_> = self
            .categories
            .iter()
            .filter(|(_, summary)| summary.transactions_count > 0)
            .collect();
        used.sort_by(|a, b| b.1.amount.total_cmp(&a.1.amount));
        used.truncate(limit);
        used
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::ChangeDirection;
    use chrono::{TimeZone, Utc};

    fn tx(amount: f64, category: &str, m: u32, d: u32) -> Transaction {
        Transaction::new(amount, category, "USD", Utc.with_ymd_and_hms(2024, m, d, 8, 0, 0).unwrap())
    }

    #[test]
    fn test_build_dashboard() {
        let txs = vec![
            tx(100.0, "food", 4, 3),
            tx(50.0, "travel", 4, 9),
            tx(150.0, "food", 5, 2),
            tx(30.0, "gifts", 5, 20),
            tx(2000.0, "other", 4, 1).with_kind(TransactionKind::Income),
            tx(2000.0, "other", 5, 1).with_kind(TransactionKind::Income),
        ];

        let summary = DashboardSummary::build(&txs, Period::new(2024, 5).unwrap());

        assert_eq!(summary.expense_count, 2);
        assert_eq!(summary.expense_total, 180.0);
        assert_eq!(summary.previous_expense_total, 150.0);
        assert_eq!(summary.expense_stats.max, 150.0);
        assert_eq!(summary.expense_change.change, 30.0);
        assert_eq!(summary.expense_change.percentage, 20.0);
        assert_eq!(summary.expense_change.direction, ChangeDirection::Decrease);
        assert_eq!(summary.income_change.direction, ChangeDirection::Unchanged);
        assert_eq!(summary.saving_change.percentage, 0.0);

        // Income is not a spending category
        assert_eq!(summary.categories.get("other").unwrap().amount, 0.0);

        let food = summary.category_changes.get("food").unwrap();
        assert_eq!(food.percentage_change, 50.0);
        let gifts = summary.category_changes.get("gifts").unwrap();
        assert_eq!(gifts.absolute_prev_value, 0.0);
        assert!(!summary.category_changes.contains_key("travel"));

        let top = summary.top_categories(5);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].0, "food");
    }

    #[test]
    fn test_build_empty_month() {
        let summary = DashboardSummary::build(&[], Period::new(2024, 5).unwrap());
        assert_eq!(summary.expense_total, 0.0);
        assert_eq!(summary.expense_stats.avg, 0.0);
        assert!(summary.category_changes.is_empty());
        assert!(summary.top_categories(3).is_empty());
    }
}
