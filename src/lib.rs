// Expensasaurus - Core Library
// Aggregation, budgets, filters and storage shared by the CLI, TUI and API server

pub mod aggregator;
pub mod budget;
pub mod categories;
pub mod config;
pub mod dashboard;
pub mod filter;
pub mod period;
pub mod store;
pub mod transaction;

// Re-export commonly used types
pub use aggregator::{
    aggregate_by_category, aggregate_by_category_with_budget_template,
    aggregate_change_vs_previous_period, compute_period_change, compute_stats,
    CategoryChangeSummary, CategoryMap, CategorySummary, ChangeDirection, ExpenseStats,
    PeriodChange,
};
pub use budget::{budget_usage, Budget, BudgetUsage};
pub use categories::{Category, CATEGORIES};
pub use config::Config;
pub use dashboard::DashboardSummary;
pub use filter::{parse_amount, parse_upper_bound, ExpenseFilter, Page};
pub use period::{split_by_period, Period};
pub use store::{
    count_transactions, delete_transaction, get_all_transactions, get_budget, get_budgets,
    get_events_for_entity, get_transaction, get_transactions_for_comparison, insert_budget,
    insert_event, insert_transactions, setup_database, Event,
};
pub use transaction::{load_csv, Transaction, TransactionKind};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install the `tracing` subscriber used by the binaries.
///
/// Honors `RUST_LOG`; defaults to `info`. Logs go to stderr so command
/// output on stdout stays clean.
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // A second call (e.g. from tests) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
