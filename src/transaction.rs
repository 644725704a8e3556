use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

// ============================================================================
// TRANSACTION KIND
// ============================================================================

/// What a transaction records. Drives the polarity of period-over-period
/// change: rising expenses are bad, rising income or savings are good.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    #[default]
    Expense,
    Income,
    Saving,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Expense => "expense",
            TransactionKind::Income => "income",
            TransactionKind::Saving => "saving",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "expense" | "expenses" => Some(TransactionKind::Expense),
            "income" | "incomes" => Some(TransactionKind::Income),
            "saving" | "savings" => Some(TransactionKind::Saving),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// TRANSACTION
// ============================================================================

/// A single recorded expense, income or saving.
///
/// `amount`, `category`, `currency` and `date` are what the aggregator reads.
/// The remaining fields come along from the record source and are used for
/// listing, filtering and storage only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Stable identity (UUID), assigned on load when missing
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub description: String,

    pub amount: f64,

    /// Category key, normally one of [`crate::categories::CATEGORIES`]
    pub category: String,

    pub currency: String,

    #[serde(deserialize_with = "deserialize_date")]
    pub date: DateTime<Utc>,

    #[serde(default)]
    pub tag: String,

    #[serde(default, deserialize_with = "deserialize_kind")]
    pub kind: TransactionKind,
}

impl Transaction {
    pub fn new(
        amount: f64,
        category: &str,
        currency: &str,
        date: DateTime<Utc>,
    ) -> Self {
        Transaction {
            id: uuid::Uuid::new_v4().to_string(),
            title: String::new(),
            description: String::new(),
            amount,
            category: category.to_string(),
            currency: currency.to_string(),
            date,
            tag: String::new(),
            kind: TransactionKind::Expense,
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tag = tag.to_string();
        self
    }

    pub fn with_kind(mut self, kind: TransactionKind) -> Self {
        self.kind = kind;
        self
    }

    /// Assign a UUID if the record arrived without one
    pub fn ensure_id(&mut self) {
        if self.id.is_empty() {
            self.id = uuid::Uuid::new_v4().to_string();
        }
    }

    /// Hash used to skip re-imported rows.
    /// NOTE: this is for de-duplication, not identity (identity = `id`)
    pub fn compute_idempotency_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!(
            "{}{}{}{}{}",
            self.date.to_rfc3339(),
            self.amount,
            self.category,
            self.title,
            self.kind
        ));
        format!("{:x}", hasher.finalize())
    }
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC)
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn deserialize_date<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_date(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid date: {:?}", raw)))
}

// Blank cells in a CSV export mean "expense"
fn deserialize_kind<'de, D>(deserializer: D) -> std::result::Result<TransactionKind, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if raw.trim().is_empty() {
        return Ok(TransactionKind::default());
    }
    TransactionKind::parse(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("unknown transaction kind: {:?}", raw)))
}

// ============================================================================
// CSV LOADING
// ============================================================================

/// Load transactions from a CSV export.
///
/// Expected header: `date,title,description,amount,category,currency,tag,kind`
/// (`id`, `title`, `description`, `tag` and `kind` are optional).
pub fn load_csv(csv_path: &Path) -> Result<Vec<Transaction>> {
    let mut rdr = csv::Reader::from_path(csv_path)
        .with_context(|| format!("Failed to open CSV file: {:?}", csv_path))?;

    let mut transactions = Vec::new();

    for (line, result) in rdr.deserialize().enumerate() {
        let mut transaction: Transaction = result
            .with_context(|| format!("Failed to deserialize transaction on row {}", line + 1))?;
        transaction.ensure_id();
        debug!(id = %transaction.id, category = %transaction.category, "loaded row");
        transactions.push(transaction);
    }

    info!(count = transactions.len(), path = ?csv_path, "loaded transactions from CSV");
    Ok(transactions)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Write;

    #[test]
    fn test_parse_date_formats() {
        let plain = parse_date("2024-03-05").unwrap();
        assert_eq!(plain, Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap());

        let rfc = parse_date("2024-03-05T14:30:00+02:00").unwrap();
        assert_eq!(rfc, Utc.with_ymd_and_hms(2024, 3, 5, 12, 30, 0).unwrap());

        assert!(parse_date("05/03/2024").is_none());
    }

    #[test]
    fn test_idempotency_hash_is_stable() {
        let date = Utc.with_ymd_and_hms(2024, 12, 31, 0, 0, 0).unwrap();
        let tx = Transaction::new(45.99, "food", "USD", date).with_title("Lunch");
        let mut other = tx.clone();
        other.id = "another-id".to_string();

        // Identity does not take part in de-duplication
        assert_eq!(tx.compute_idempotency_hash(), other.compute_idempotency_hash());
        assert_eq!(tx.compute_idempotency_hash().len(), 64);

        other.amount = 46.0;
        assert_ne!(tx.compute_idempotency_hash(), other.compute_idempotency_hash());
    }

    #[test]
    fn test_load_csv() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "date,title,description,amount,category,currency,tag,kind").unwrap();
        writeln!(file, "2024-01-03,Groceries,Weekly shop,54.20,food,EUR,home,expense").unwrap();
        writeln!(file, "2024-01-05T08:00:00Z,Salary,,2500,other,EUR,,income").unwrap();
        writeln!(file, "2024-01-06,Bus,,2.80,transportation,EUR,,").unwrap();
        file.flush().unwrap();

        let txs = load_csv(file.path()).unwrap();
        assert_eq!(txs.len(), 3);
        assert_eq!(txs[0].category, "food");
        assert_eq!(txs[0].amount, 54.20);
        assert_eq!(txs[0].tag, "home");
        assert_eq!(txs[1].kind, TransactionKind::Income);
        assert_eq!(txs[2].kind, TransactionKind::Expense);
        assert!(txs.iter().all(|tx| !tx.id.is_empty()));
    }

    #[test]
    fn test_load_csv_rejects_bad_date() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "date,amount,category,currency").unwrap();
        writeln!(file, "yesterday,10,food,EUR").unwrap();
        file.flush().unwrap();

        let err = load_csv(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("row 1"));
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!(TransactionKind::parse("Income"), Some(TransactionKind::Income));
        assert_eq!(TransactionKind::parse("savings"), Some(TransactionKind::Saving));
        assert_eq!(TransactionKind::parse("transfer"), None);
    }
}
