// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{bail, Context, Result};
use expensasaurus::{
    budget_usage, categories, delete_transaction, get_all_transactions, get_budgets,
    get_transactions_for_comparison, insert_budget, insert_transactions, load_csv, store, Budget,
    Config, DashboardSummary, Period,
};
use std::env;
use std::path::Path;
use tracing::info;

const USAGE: &str = "\
Usage: expensasaurus [COMMAND]

Commands:
  import <file.csv>                      Import transactions from CSV
  stats [YYYY-MM]                        Monthly totals and change vs previous month
  categories [YYYY-MM]                   Spending by category
  compare [YYYY-MM]                      Category change vs previous month
  budgets                                Budgets and their usage
  budget <title> <YYYY-MM> <cat=limit>...  Create a budget for one month
  delete <id>                            Delete a transaction
  (none)                                 Open the terminal dashboard";

fn main() -> Result<()> {
    expensasaurus::init_logging();

    let args: Vec<String> = env::args().skip(1).collect();
    let config = Config::load()?;

    match args.first().map(String::as_str) {
        Some("import") => run_import(&config, &args[1..]),
        Some("stats") => run_stats(&config, &args[1..]),
        Some("categories") => run_categories(&config, &args[1..]),
        Some("compare") => run_compare(&config, &args[1..]),
        Some("budgets") => run_budgets(&config),
        Some("budget") => run_add_budget(&config, &args[1..]),
        Some("delete") => run_delete(&config, &args[1..]),
        Some("help") | Some("--help") | Some("-h") => {
            println!("{}", USAGE);
            Ok(())
        }
        Some(other) => bail!("Unknown command {:?}\n\n{}", other, USAGE),
        None => run_ui_mode(&config),
    }
}

fn period_arg(args: &[String]) -> Result<Period> {
    match args.first() {
        Some(raw) => Period::parse(raw),
        None => Ok(Period::current()),
    }
}

fn run_import(config: &Config, args: &[String]) -> Result<()> {
    let csv_path = args.first().context("import needs a CSV file path")?;

    println!("📂 Loading {}...", csv_path);
    let transactions = load_csv(Path::new(csv_path))?;
    println!("✓ Loaded {} transactions from CSV", transactions.len());

    let unknown: Vec<&str> = transactions
        .iter()
        .map(|tx| tx.category.as_str())
        .filter(|c| !categories::is_known(c))
        .collect();
    if !unknown.is_empty() {
        println!("⚠️  {} transactions use categories outside the fixed set", unknown.len());
    }

    let conn = store::open(&config.database_path)?;
    let inserted = insert_transactions(&conn, &transactions)?;
    let count = expensasaurus::count_transactions(&conn)?;

    println!("✓ Inserted: {} transactions", inserted);
    println!("✓ Skipped duplicates: {}", transactions.len() - inserted);
    println!("✓ Database contains {} transactions", count);

    Ok(())
}

fn load_summary(config: &Config, args: &[String]) -> Result<DashboardSummary> {
    let period = period_arg(args)?;
    let conn = store::open(&config.database_path)?;
    let transactions = get_transactions_for_comparison(&conn, period)?;
    info!(%period, count = transactions.len(), "loaded transactions");
    Ok(DashboardSummary::build(&transactions, period))
}

fn run_stats(config: &Config, args: &[String]) -> Result<()> {
    let summary = load_summary(config, args)?;
    let stats = &summary.expense_stats;

    println!("📊 {}", summary.period);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Expenses:   {:>12.2}  ({} transactions)", summary.expense_total, summary.expense_count);
    println!("  min {:.2} / max {:.2} / avg {:.2}", stats.min, stats.max, stats.avg);
    println!(
        "  vs {}: {:+.2} ({:+.1}%, {})",
        summary.period.previous(),
        summary.expense_change.change,
        summary.expense_change.percentage,
        summary.expense_change.direction.as_str()
    );
    println!("Income:     {:>12.2}", summary.income_total);
    println!(
        "  vs {}: {:+.2} ({:+.1}%, {})",
        summary.period.previous(),
        summary.income_change.change,
        summary.income_change.percentage,
        summary.income_change.direction.as_str()
    );
    println!("Savings:    {:>12.2}", summary.saving_total);
    println!(
        "  vs {}: {:+.2} ({:+.1}%, {})",
        summary.period.previous(),
        summary.saving_change.change,
        summary.saving_change.percentage,
        summary.saving_change.direction.as_str()
    );

    Ok(())
}

fn run_categories(config: &Config, args: &[String]) -> Result<()> {
    let summary = load_summary(config, args)?;

    println!("🏷️  Spending by category - {}", summary.period);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for (key, category) in summary.categories.iter() {
        let share = if category.percentage.is_finite() {
            format!("{:5.1}%", category.percentage)
        } else {
            "    -".to_string()
        };
        println!(
            "{:<16} {:>12.2} {:>4} tx  {}",
            categories::display_name(key),
            category.amount,
            category.transactions_count,
            share
        );
    }

    Ok(())
}

fn run_compare(config: &Config, args: &[String]) -> Result<()> {
    let summary = load_summary(config, args)?;

    println!("📈 {} vs {}", summary.period, summary.period.previous());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    if summary.category_changes.is_empty() {
        println!("No expenses in {}", summary.period);
    }
    for (key, change) in summary.category_changes.iter() {
        println!(
            "{:<16} {:>12.2} -> {:>12.2}  {:+.1}%{}",
            categories::display_name(key),
            change.absolute_prev_value,
            change.absolute_curr_value,
            change.percentage_change,
            if change.either_month_has_no_expenses { "  (no expenses in one month)" } else { "" }
        );
    }

    Ok(())
}

fn run_budgets(config: &Config) -> Result<()> {
    let conn = store::open(&config.database_path)?;
    let budgets = get_budgets(&conn)?;
    let transactions = get_all_transactions(&conn)?;

    if budgets.is_empty() {
        println!("No budgets defined. Create one with: expensasaurus budget <title> <YYYY-MM> food=300");
        return Ok(());
    }

    for budget in &budgets {
        println!(
            "\n💰 {} ({} - {}) limit {:.2} {} [{}]",
            budget.title,
            budget.start_date.format("%Y-%m-%d"),
            budget.end_date.format("%Y-%m-%d"),
            budget.total_limit(),
            budget.currency,
            budget.id
        );
        for (key, usage) in budget_usage(budget, &transactions).iter() {
            let Some(limit) = usage.limit else { continue };
            let percent = usage.budget_percent.unwrap_or(0.0);
            println!(
                "  {:<16} {:>10.2} / {:<10.2} {:>6.1}%{}",
                categories::display_name(key),
                usage.spent,
                limit,
                percent,
                if usage.over_budget { "  ❗ over budget" } else { "" }
            );
        }
    }

    Ok(())
}

fn run_add_budget(config: &Config, args: &[String]) -> Result<()> {
    if args.len() < 3 {
        bail!("budget needs a title, a month and at least one category=limit\n\n{}", USAGE);
    }

    let period = Period::parse(&args[1])?;
    let end = period.end() - chrono::Duration::seconds(1);
    let mut budget = Budget::new(&args[0], &config.default_currency, period.start(), end);

    for pair in &args[2..] {
        let (category, limit) = pair
            .split_once('=')
            .with_context(|| format!("Expected category=limit, got {:?}", pair))?;
        let key = categories::resolve_query(category)
            .with_context(|| format!("Unknown category {:?}", category))?;
        let limit: f64 = limit
            .parse()
            .with_context(|| format!("Invalid limit for {}: {:?}", key, limit))?;
        budget = budget.with_limit(key, limit);
    }

    let conn = store::open(&config.database_path)?;
    insert_budget(&conn, &budget)?;
    println!("✓ Budget {:?} saved ({})", budget.title, budget.id);

    Ok(())
}

fn run_delete(config: &Config, args: &[String]) -> Result<()> {
    let id = args.first().context("delete needs a transaction id")?;
    let conn = store::open(&config.database_path)?;

    if delete_transaction(&conn, id, "cli")? {
        println!("✓ Deleted {}", id);
        Ok(())
    } else {
        bail!("No transaction with id {}", id)
    }
}

#[cfg(feature = "tui")]
fn run_ui_mode(config: &Config) -> Result<()> {
    if !config.database_path.exists() {
        eprintln!("❌ Database not found at {:?}", config.database_path);
        eprintln!("   Run: expensasaurus import <file.csv>");
        eprintln!("   to import transactions first.");
        std::process::exit(1);
    }

    let conn = store::open(&config.database_path)?;
    let transactions = get_all_transactions(&conn)?;
    info!(count = transactions.len(), "starting dashboard");

    let mut app = ui::App::new(transactions, Period::current());
    ui::run_ui(&mut app)?;

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_config: &Config) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use a subcommand: expensasaurus --help");
    std::process::exit(1);
}
