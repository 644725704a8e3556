// Runtime configuration
//
// Resolution order: built-in defaults, then the JSON file named by
// EXPENSASAURUS_CONFIG (if set), then individual environment overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CONFIG_ENV: &str = "EXPENSASAURUS_CONFIG";
pub const DB_ENV: &str = "EXPENSASAURUS_DB";
pub const ADDR_ENV: &str = "EXPENSASAURUS_ADDR";
pub const CURRENCY_ENV: &str = "EXPENSASAURUS_CURRENCY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database file
    pub database_path: PathBuf,

    /// Address the API server binds to
    pub bind_address: String,

    /// Currency used for new budgets and empty summaries
    pub default_currency: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_path: PathBuf::from("expensasaurus.db"),
            bind_address: "127.0.0.1:3000".to_string(),
            default_currency: "USD".to_string(),
        }
    }
}

impl Config {
    /// Load from the environment
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Config::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from a JSON file; missing keys keep their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: Config =
            serde_json::from_str(&content).context("Failed to parse config JSON")?;

        debug!(path = ?path.as_ref(), "loaded config file");
        Ok(config)
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(db) = lookup(DB_ENV) {
            self.database_path = PathBuf::from(db);
        }
        if let Some(addr) = lookup(ADDR_ENV) {
            self.bind_address = addr;
        }
        if let Some(currency) = lookup(CURRENCY_ENV) {
            self.default_currency = currency.to_uppercase();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.database_path, PathBuf::from("expensasaurus.db"));
        assert_eq!(config.default_currency, "USD");
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"default_currency": "EUR"}}"#).unwrap();
        file.flush().unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.default_currency, "EUR");
        assert_eq!(config.bind_address, "127.0.0.1:3000");
    }

    #[test]
    fn test_from_file_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        file.flush().unwrap();

        assert!(Config::from_file(file.path()).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [(DB_ENV, "/tmp/x.db"), (CURRENCY_ENV, "gbp")]
            .into_iter()
            .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.database_path, PathBuf::from("/tmp/x.db"));
        assert_eq!(config.default_currency, "GBP");
        assert_eq!(config.bind_address, "127.0.0.1:3000");
    }
}
