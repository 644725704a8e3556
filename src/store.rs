// 🗄️ Transaction store - SQLite persistence for expenses, budgets and events
//
// The aggregator only ever sees in-memory lists; this module is where those
// lists come from. Imports are idempotent: each row carries a SHA-256 hash of
// its content and re-imported rows are skipped.

use crate::budget::Budget;
use crate::period::Period;
use crate::transaction::{Transaction, TransactionKind};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Event for the audit trail
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

/// Open (or create) the database file and make sure the schema exists
pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database: {:?}", path))?;
    setup_database(&conn)?;
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tx_uuid TEXT UNIQUE NOT NULL,
            idempotency_hash TEXT UNIQUE NOT NULL,
            date TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            amount REAL NOT NULL,
            category TEXT NOT NULL,
            currency TEXT NOT NULL,
            tag TEXT NOT NULL,
            kind TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS budgets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            budget_uuid TEXT UNIQUE NOT NULL,
            title TEXT NOT NULL,
            category_limits TEXT NOT NULL,
            currency TEXT NOT NULL,
            start_date TEXT NOT NULL,
            end_date TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transactions_category ON transactions(category)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// TRANSACTIONS
// ============================================================================

/// Insert transactions, skipping any whose content hash is already stored.
/// Returns how many rows were inserted.
pub fn insert_transactions(conn: &Connection, transactions: &[Transaction]) -> Result<usize> {
    let mut inserted = 0;
    let mut duplicates = 0;
    let mut conflicts = 0;

    for tx in transactions {
        let mut tx = tx.clone();
        tx.ensure_id();
        let hash = tx.compute_idempotency_hash();

        let result = conn.execute(
            "INSERT INTO transactions (
                tx_uuid, idempotency_hash, date, title, description,
                amount, category, currency, tag, kind
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                tx.id,
                hash,
                tx.date.to_rfc3339(),
                tx.title,
                tx.description,
                tx.amount,
                tx.category,
                tx.currency,
                tx.tag,
                tx.kind.as_str(),
            ],
        );

        match result {
            Ok(_) => {
                inserted += 1;

                let event = Event::new(
                    "transaction_added",
                    "transaction",
                    &tx.id,
                    serde_json::json!({
                        "amount": tx.amount,
                        "category": tx.category,
                        "kind": tx.kind,
                    }),
                    "importer",
                );
                if let Err(e) = insert_event(conn, &event) {
                    warn!(error = %e, id = %tx.id, "failed to record import event");
                }
            }
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                if stored_hash_for_id(conn, &tx.id)?.is_some_and(|stored| stored != hash) {
                    warn!(id = %tx.id, "id already belongs to a different transaction, skipping");
                    conflicts += 1;
                } else {
                    debug!(hash = %hash, "skipping duplicate transaction");
                    duplicates += 1;
                }
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!(inserted, duplicates, conflicts, "stored transactions");
    Ok(inserted)
}

fn stored_hash_for_id(conn: &Connection, id: &str) -> Result<Option<String>> {
    let hash = conn
        .query_row(
            "SELECT idempotency_hash FROM transactions WHERE tx_uuid = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(hash)
}

const TRANSACTION_COLUMNS: &str =
    "tx_uuid, date, title, description, amount, category, currency, tag, kind";

fn row_to_transaction(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    let date_str: String = row.get(1)?;
    let kind_str: String = row.get(8)?;

    Ok(Transaction {
        id: row.get(0)?,
        date: DateTime::parse_from_rfc3339(&date_str)
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
            })?
            .with_timezone(&Utc),
        title: row.get(2)?,
        description: row.get(3)?,
        amount: row.get(4)?,
        category: row.get(5)?,
        currency: row.get(6)?,
        tag: row.get(7)?,
        kind: TransactionKind::parse(&kind_str).unwrap_or_default(),
    })
}

/// All transactions, newest first
pub fn get_all_transactions(conn: &Connection) -> Result<Vec<Transaction>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM transactions ORDER BY date DESC",
        TRANSACTION_COLUMNS
    ))?;

    let transactions = stmt
        .query_map([], row_to_transaction)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(transactions)
}

/// Transactions dated inside `period` and the month before it, newest first.
/// This is exactly what a month-over-month dashboard needs.
pub fn get_transactions_for_comparison(conn: &Connection, period: Period) -> Result<Vec<Transaction>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM transactions WHERE date >= ?1 AND date < ?2 ORDER BY date DESC",
        TRANSACTION_COLUMNS
    ))?;

    // RFC 3339 in UTC sorts lexically
    let from = period.previous().start().to_rfc3339();
    let to = period.end().to_rfc3339();

    let transactions = stmt
        .query_map(params![from, to], row_to_transaction)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(transactions)
}

pub fn get_transaction(conn: &Connection, id: &str) -> Result<Option<Transaction>> {
    let tx = conn
        .query_row(
            &format!("SELECT {} FROM transactions WHERE tx_uuid = ?1", TRANSACTION_COLUMNS),
            params![id],
            row_to_transaction,
        )
        .optional()?;

    Ok(tx)
}

/// Delete by id; returns false when nothing matched
pub fn delete_transaction(conn: &Connection, id: &str, actor: &str) -> Result<bool> {
    let removed = conn.execute("DELETE FROM transactions WHERE tx_uuid = ?1", params![id])?;

    if removed == 0 {
        return Ok(false);
    }

    let event = Event::new(
        "transaction_deleted",
        "transaction",
        id,
        serde_json::json!({}),
        actor,
    );
    insert_event(conn, &event)?;

    info!(id, "deleted transaction");
    Ok(true)
}

pub fn count_transactions(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?;

    Ok(count)
}

// ============================================================================
// BUDGETS
// ============================================================================

pub fn insert_budget(conn: &Connection, budget: &Budget) -> Result<()> {
    let limits_json = serde_json::to_string(&budget.category_limits)?;

    conn.execute(
        "INSERT INTO budgets (
            budget_uuid, title, category_limits, currency, start_date, end_date
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            budget.id,
            budget.title,
            limits_json,
            budget.currency,
            budget.start_date.to_rfc3339(),
            budget.end_date.to_rfc3339(),
        ],
    )
    .with_context(|| format!("Failed to insert budget {:?}", budget.title))?;

    Ok(())
}

const BUDGET_COLUMNS: &str = "budget_uuid, title, category_limits, currency, start_date, end_date";

fn row_to_budget(row: &Row<'_>) -> rusqlite::Result<Budget> {
    let limits_json: String = row.get(2)?;
    let start_str: String = row.get(4)?;
    let end_str: String = row.get(5)?;

    let parse_time = |idx: usize, s: &str| {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
            })
    };

    let category_limits: BTreeMap<String, f64> = serde_json::from_str(&limits_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e)))?;

    Ok(Budget {
        id: row.get(0)?,
        title: row.get(1)?,
        category_limits,
        currency: row.get(3)?,
        start_date: parse_time(4, &start_str)?,
        end_date: parse_time(5, &end_str)?,
    })
}

pub fn get_budgets(conn: &Connection) -> Result<Vec<Budget>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM budgets ORDER BY start_date DESC",
        BUDGET_COLUMNS
    ))?;

    let budgets = stmt
        .query_map([], row_to_budget)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(budgets)
}

pub fn get_budget(conn: &Connection, id: &str) -> Result<Option<Budget>> {
    let budget = conn
        .query_row(
            &format!("SELECT {} FROM budgets WHERE budget_uuid = ?1", BUDGET_COLUMNS),
            params![id],
            row_to_budget,
        )
        .optional()?;

    Ok(budget)
}

// ============================================================================
// EVENTS
// ============================================================================

pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Events for one entity, newest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY timestamp DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                    .map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
                    })?
                    .with_timezone(&Utc),
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
                })?,
                actor: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    fn tx(amount: f64, category: &str, m: u32, d: u32, title: &str) -> Transaction {
        Transaction::new(amount, category, "USD", Utc.with_ymd_and_hms(2024, m, d, 12, 0, 0).unwrap())
            .with_title(title)
    }

    fn sample() -> Vec<Transaction> {
        vec![
            tx(45.99, "food", 12, 31, "Dinner"),
            tx(120.50, "shopping", 12, 30, "Jacket"),
            tx(2000.0, "other", 12, 29, "Salary").with_kind(TransactionKind::Income),
        ]
    }

    #[test]
    fn test_import_twice_is_idempotent() {
        let conn = memory_db();
        let transactions = sample();

        let inserted1 = insert_transactions(&conn, &transactions).unwrap();
        let count1 = count_transactions(&conn).unwrap();

        // Fresh ids do not defeat the content hash
        let mut reimport = sample();
        for t in &mut reimport {
            t.id.clear();
        }
        let inserted2 = insert_transactions(&conn, &reimport).unwrap();
        let count2 = count_transactions(&conn).unwrap();

        assert_eq!(inserted1, 3, "First import should insert 3 transactions");
        assert_eq!(count1, 3);
        assert_eq!(inserted2, 0, "Second import should insert nothing");
        assert_eq!(count2, 3);
    }

    #[test]
    fn test_id_collision_keeps_stored_row() {
        let conn = memory_db();
        let original = tx(45.99, "food", 12, 31, "Dinner");
        insert_transactions(&conn, std::slice::from_ref(&original)).unwrap();

        let mut other = tx(9.0, "travel", 12, 1, "Taxi");
        other.id = original.id.clone();
        let inserted = insert_transactions(&conn, &[other]).unwrap();

        assert_eq!(inserted, 0);
        assert_eq!(count_transactions(&conn).unwrap(), 1);
        let stored = get_transaction(&conn, &original.id).unwrap().unwrap();
        assert_eq!(stored.title, "Dinner");

        // Same id and same content is an ordinary re-import
        assert_eq!(insert_transactions(&conn, &[original]).unwrap(), 0);
        assert_eq!(count_transactions(&conn).unwrap(), 1);
    }

    #[test]
    fn test_roundtrip_fields() {
        let conn = memory_db();
        let original = tx(12.25, "food", 6, 1, "Bakery")
            .with_description("Croissants")
            .with_tag("breakfast");
        insert_transactions(&conn, std::slice::from_ref(&original)).unwrap();

        let loaded = get_transaction(&conn, &original.id).unwrap().unwrap();
        assert_eq!(loaded, original);

        assert!(get_transaction(&conn, "missing").unwrap().is_none());
    }

    #[test]
    fn test_get_all_newest_first() {
        let conn = memory_db();
        insert_transactions(&conn, &sample()).unwrap();

        let all = get_all_transactions(&conn).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].title, "Dinner");
        assert_eq!(all[2].kind, TransactionKind::Income);
    }

    #[test]
    fn test_transactions_for_comparison() {
        let conn = memory_db();
        insert_transactions(
            &conn,
            &[
                tx(10.0, "food", 3, 15, "March"),
                tx(20.0, "food", 2, 10, "February"),
                tx(30.0, "food", 1, 10, "January"),
                tx(40.0, "food", 4, 1, "April"),
            ],
        )
        .unwrap();

        let txs = get_transactions_for_comparison(&conn, Period::new(2024, 3).unwrap()).unwrap();
        let titles: Vec<_> = txs.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["March", "February"]);
    }

    #[test]
    fn test_delete_records_event() {
        let conn = memory_db();
        let transactions = sample();
        insert_transactions(&conn, &transactions).unwrap();
        let id = transactions[0].id.clone();

        assert!(delete_transaction(&conn, &id, "tester").unwrap());
        assert!(!delete_transaction(&conn, &id, "tester").unwrap());
        assert_eq!(count_transactions(&conn).unwrap(), 2);

        let events = get_events_for_entity(&conn, "transaction", &id).unwrap();
        assert_eq!(events.len(), 2);
        assert!(events.iter().any(|e| e.event_type == "transaction_deleted" && e.actor == "tester"));
        assert!(events.iter().any(|e| e.event_type == "transaction_added"));
    }

    #[test]
    fn test_budgets() {
        let conn = memory_db();
        let budget = Budget::new(
            "June",
            "USD",
            Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 6, 30, 23, 59, 59).unwrap(),
        )
        .with_limit("food", 300.0)
        .with_limit("travel", 150.0);

        insert_budget(&conn, &budget).unwrap();

        let all = get_budgets(&conn).unwrap();
        assert_eq!(all, vec![budget.clone()]);
        assert_eq!(get_budget(&conn, &budget.id).unwrap(), Some(budget));
        assert_eq!(get_budget(&conn, "missing").unwrap(), None);
    }

    #[test]
    fn test_open_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("expenses.db");

        {
            let conn = open(&path).unwrap();
            insert_transactions(&conn, &sample()).unwrap();
        }

        let conn = open(&path).unwrap();
        assert_eq!(count_transactions(&conn).unwrap(), 3);
    }
}
