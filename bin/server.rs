// Expensasaurus - API Server
// Dashboard widgets and expense listing over JSON

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use expensasaurus::{
    budget_usage, categories, delete_transaction, get_all_transactions, get_budget, get_budgets,
    get_events_for_entity, get_transaction, get_transactions_for_comparison, parse_amount,
    parse_upper_bound, store, transaction::parse_date, Budget, BudgetUsage, CategoryMap, Config,
    DashboardSummary, ExpenseFilter, Page, Period, Transaction, CATEGORIES,
};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
}

impl AppState {
    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panicked handler leaves the connection itself usable
        self.db.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Response {
        (
            StatusCode::OK,
            Json(ApiResponse {
                success: true,
                data: Some(data),
                error: None,
            }),
        )
            .into_response()
    }
}

fn failure(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(message.into()),
        }),
    )
        .into_response()
}

fn internal_error(context: &str, e: anyhow::Error) -> Response {
    error!(error = %e, "{}", context);
    failure(StatusCode::INTERNAL_SERVER_ERROR, format!("{}: {}", context, e))
}

// ============================================================================
// Query parameters
// ============================================================================

/// Raw listing query, as typed into the filter form
#[derive(Debug, Default, Deserialize)]
struct ExpenseQuery {
    from: Option<String>,
    to: Option<String>,
    q: Option<String>,
    min_amount: Option<String>,
    max_amount: Option<String>,
    category: Option<String>,
    tag: Option<String>,
    page: Option<usize>,
    page_size: Option<usize>,
}

impl ExpenseQuery {
    fn into_filter(self) -> Result<ExpenseFilter, String> {
        let date = |raw: Option<String>, parse: fn(&str) -> Option<DateTime<Utc>>| {
            match raw.filter(|s| !s.trim().is_empty()) {
                Some(s) => parse(&s)
                    .map(Some)
                    .ok_or_else(|| format!("Invalid date: {}", s)),
                None => Ok(None),
            }
        };

        let mut filter = ExpenseFilter {
            from: date(self.from, parse_date)?,
            to: date(self.to, parse_upper_bound)?,
            query: self.q.unwrap_or_default(),
            min_amount: parse_amount(self.min_amount.as_deref().unwrap_or(""))
                .map_err(|e| e.to_string())?,
            max_amount: parse_amount(self.max_amount.as_deref().unwrap_or(""))
                .map_err(|e| e.to_string())?,
            tag: self.tag.unwrap_or_default(),
            page_index: self.page.unwrap_or(0),
            ..Default::default()
        };
        if let Some(size) = self.page_size {
            filter.page_size = size.clamp(1, 100);
        }
        if let Some(category) = self.category {
            filter = filter.with_category_query(&category);
        }
        Ok(filter)
    }
}

#[derive(Debug, Deserialize)]
struct MonthQuery {
    month: Option<String>,
}

impl MonthQuery {
    fn period(&self) -> Result<Period, String> {
        match &self.month {
            Some(raw) => Period::parse(raw).map_err(|e| e.to_string()),
            None => Ok(Period::current()),
        }
    }
}

#[derive(Serialize)]
struct BudgetUsageResponse {
    budget: Budget,
    usage: CategoryMap<BudgetUsage>,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> Response {
    ApiResponse::ok("OK")
}

/// GET /api/expenses - Filtered, paginated listing
async fn list_expenses(State(state): State<AppState>, Query(query): Query<ExpenseQuery>) -> Response {
    let filter = match query.into_filter() {
        Ok(filter) => filter,
        Err(message) => return failure(StatusCode::BAD_REQUEST, message),
    };

    let conn = state.conn();
    match get_all_transactions(&conn) {
        Ok(transactions) => {
            let page: Page<Transaction> = filter.apply(&transactions);
            ApiResponse::ok(page)
        }
        Err(e) => internal_error("Error listing expenses", e),
    }
}

/// GET /api/expenses/:id
async fn get_expense(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let conn = state.conn();
    match get_transaction(&conn, &id) {
        Ok(Some(tx)) => ApiResponse::ok(tx),
        Ok(None) => failure(StatusCode::NOT_FOUND, format!("No expense with id {}", id)),
        Err(e) => internal_error("Error getting expense", e),
    }
}

/// GET /api/expenses/:id/events - Audit trail of one expense
async fn get_expense_events(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let conn = state.conn();
    match get_events_for_entity(&conn, "transaction", &id) {
        Ok(events) => ApiResponse::ok(events),
        Err(e) => internal_error("Error getting expense events", e),
    }
}

/// DELETE /api/expenses/:id
async fn remove_expense(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let conn = state.conn();
    match delete_transaction(&conn, &id, "api") {
        Ok(true) => ApiResponse::ok(id),
        Ok(false) => failure(StatusCode::NOT_FOUND, format!("No expense with id {}", id)),
        Err(e) => internal_error("Error deleting expense", e),
    }
}

/// GET /api/dashboard?month=YYYY-MM - Every dashboard widget for one month
async fn dashboard(State(state): State<AppState>, Query(query): Query<MonthQuery>) -> Response {
    let period = match query.period() {
        Ok(period) => period,
        Err(message) => return failure(StatusCode::BAD_REQUEST, message),
    };

    let conn = state.conn();
    match get_transactions_for_comparison(&conn, period) {
        Ok(transactions) => ApiResponse::ok(DashboardSummary::build(&transactions, period)),
        Err(e) => internal_error("Error building dashboard", e),
    }
}

/// GET /api/categories - The fixed category set in canonical order
async fn list_categories() -> Response {
    ApiResponse::ok(CATEGORIES)
}

/// GET /api/categories/:key
async fn get_category(Path(key): Path<String>) -> Response {
    match categories::resolve_query(&key).and_then(categories::find) {
        Some(category) => ApiResponse::ok(category),
        None => failure(StatusCode::NOT_FOUND, format!("Unknown category {}", key)),
    }
}

/// GET /api/budgets
async fn list_budgets(State(state): State<AppState>) -> Response {
    let conn = state.conn();
    match get_budgets(&conn) {
        Ok(budgets) => ApiResponse::ok(budgets),
        Err(e) => internal_error("Error listing budgets", e),
    }
}

/// GET /api/budgets/:id/usage - Spending per category against a budget
async fn get_budget_usage(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let conn = state.conn();

    let budget = match get_budget(&conn, &id) {
        Ok(Some(budget)) => budget,
        Ok(None) => return failure(StatusCode::NOT_FOUND, format!("No budget with id {}", id)),
        Err(e) => return internal_error("Error getting budget", e),
    };

    match get_all_transactions(&conn) {
        Ok(transactions) => {
            let usage = budget_usage(&budget, &transactions);
            ApiResponse::ok(BudgetUsageResponse { budget, usage })
        }
        Err(e) => internal_error("Error computing budget usage", e),
    }
}

fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/expenses", get(list_expenses))
        .route("/expenses/:id", get(get_expense).delete(remove_expense))
        .route("/expenses/:id/events", get(get_expense_events))
        .route("/dashboard", get(dashboard))
        .route("/categories", get(list_categories))
        .route("/categories/:key", get(get_category))
        .route("/budgets", get(list_budgets))
        .route("/budgets/:id/usage", get(get_budget_usage))
        .with_state(state);

    Router::new().nest("/api", api_routes).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    )
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    expensasaurus::init_logging();

    let config = Config::load()?;
    let conn = store::open(&config.database_path)?;
    info!(path = ?config.database_path, "database opened");

    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
    };

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!(address = %config.bind_address, "server listening");

    axum::serve(listener, router(state)).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_expense_query_into_filter() {
        let query = ExpenseQuery {
            from: Some("2024-05-01".to_string()),
            q: Some("rent".to_string()),
            min_amount: Some("10.5".to_string()),
            category: Some("Food".to_string()),
            page: Some(2),
            page_size: Some(500),
            ..Default::default()
        };

        let filter = query.into_filter().unwrap();
        assert!(filter.from.is_some());
        assert!(filter.to.is_none());
        assert_eq!(filter.query, "rent");
        assert_eq!(filter.min_amount, 10.5);
        assert_eq!(filter.max_amount, 0.0);
        assert_eq!(filter.category.as_deref(), Some("food"));
        assert_eq!(filter.page_index, 2);
        assert_eq!(filter.page_size, 100);
    }

    #[test]
    fn test_date_only_to_includes_the_whole_day() {
        let query = ExpenseQuery {
            to: Some("2024-05-31".to_string()),
            ..Default::default()
        };
        let filter = query.into_filter().unwrap();

        let noon = Utc.with_ymd_and_hms(2024, 5, 31, 12, 0, 0).unwrap();
        let next_day = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        assert!(filter.matches(&Transaction::new(9.0, "food", "USD", noon)));
        assert!(!filter.matches(&Transaction::new(9.0, "food", "USD", next_day)));
    }

    #[test]
    fn test_expense_query_rejects_bad_input() {
        let bad_amount = ExpenseQuery {
            max_amount: Some("-4".to_string()),
            ..Default::default()
        };
        assert!(bad_amount.into_filter().is_err());

        let bad_date = ExpenseQuery {
            to: Some("tomorrow".to_string()),
            ..Default::default()
        };
        assert!(bad_date.into_filter().is_err());
    }

    #[test]
    fn test_month_query() {
        let query = MonthQuery {
            month: Some("2024-02".to_string()),
        };
        assert_eq!(query.period().unwrap(), Period::new(2024, 2).unwrap());
        assert!(MonthQuery { month: Some("02-2024".to_string()) }.period().is_err());
    }
}
