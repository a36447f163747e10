use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Advisory lock key used when none is configured ("ackl").
pub const DEFAULT_LOCK_KEY: i64 = 0x6163_6b6c;

/// Connection settings for [`PgLedgerRepository`](crate::PgLedgerRepository).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    /// Key of the transaction-scoped advisory lock serializing writers.
    /// Ledgers sharing a database need distinct keys.
    pub ledger_lock_key: i64,
    /// Schema placed first on every connection's `search_path`; created on
    /// connect when migrations run. `None` keeps the server default.
    #[serde(default)]
    pub schema: Option<String>,
    /// Apply embedded migrations on connect.
    pub run_migrations: bool,
}

impl StoreConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            ..Self::default()
        }
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn validate(&self) -> StoreResult<()> {
        if self.database_url.trim().is_empty() {
            return Err(StoreError::Config("database_url must be set".into()));
        }
        if self.max_connections == 0 {
            return Err(StoreError::Config("max_connections must be at least 1".into()));
        }
        if let Some(schema) = &self.schema {
            if !is_plain_identifier(schema) {
                return Err(StoreError::Config(format!(
                    "schema {schema:?} must be a lowercase identifier"
                )));
            }
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            max_connections: 10,
            acquire_timeout_secs: 5,
            ledger_lock_key: DEFAULT_LOCK_KEY,
            schema: None,
            run_migrations: true,
        }
    }
}

/// Safe to splice into SQL unquoted: `[a-z_][a-z0-9_]*`, at most 63 bytes.
fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c == '_' || c.is_ascii_lowercase())
        && chars.all(|c| c == '_' || c.is_ascii_lowercase() || c.is_ascii_digit())
        && name.len() <= 63
}
