use std::path::Path;

use ackl_crypto::SigningKey;
use ackl_ledger::LedgerConfig;
use ackl_store::{StoreConfig, DEFAULT_LOCK_KEY};
use anyhow::Context;
use serde::{Deserialize, Serialize};

pub const DATABASE_URL_ENV: &str = "DATABASE_URL";
pub const SIGNING_KEY_ENV: &str = "ACKL_SIGNING_KEY";

/// Operator configuration, read from TOML and then overridden from the
/// environment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub ledger_lock_key: i64,
    /// PostgreSQL schema holding the ledger table.
    pub schema: Option<String>,
    /// Hex Ed25519 secret. Only `ack` needs it.
    pub signing_key_hex: Option<String>,
    pub ledger: LedgerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            max_connections: 5,
            ledger_lock_key: DEFAULT_LOCK_KEY,
            schema: None,
            signing_key_hex: None,
            ledger: LedgerConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from `path` when given, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        Ok(config.with_overrides(|key| std::env::var(key).ok()))
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing config file {}", path.display()))
    }

    /// Apply `DATABASE_URL` / `ACKL_SIGNING_KEY` from `lookup`.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(DATABASE_URL_ENV).filter(|v| !v.is_empty()) {
            self.database_url = url;
        }
        if let Some(key) = lookup(SIGNING_KEY_ENV).filter(|v| !v.is_empty()) {
            self.signing_key_hex = Some(key);
        }
        self
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            database_url: self.database_url.clone(),
            max_connections: self.max_connections,
            ledger_lock_key: self.ledger_lock_key,
            schema: self.schema.clone(),
            ..StoreConfig::default()
        }
    }

    /// The configured signing key, if any.
    pub fn signing_key(&self) -> anyhow::Result<Option<SigningKey>> {
        self.signing_key_hex
            .as_deref()
            .map(|hex| SigningKey::from_hex(hex).context("signing_key_hex is not a 32-byte hex key"))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use ackl_types::HashAlgorithmVersion;

    use super::*;

    #[test]
    fn defaults() {
        let config = AppConfig::default();
        assert_eq!(config.ledger_lock_key, DEFAULT_LOCK_KEY);
        assert_eq!(config.ledger.hash_algorithm, HashAlgorithmVersion::V2);
        assert!(config.signing_key().unwrap().is_none());
    }

    #[test]
    fn loads_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
database_url = "postgres://ledger@localhost/ackl"
max_connections = 3
signing_key_hex = "{}"

[ledger]
hash_algorithm = 1
"#,
            "07".repeat(32)
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.database_url, "postgres://ledger@localhost/ackl");
        assert_eq!(config.max_connections, 3);
        assert_eq!(config.ledger_lock_key, DEFAULT_LOCK_KEY);
        assert_eq!(config.ledger.hash_algorithm, HashAlgorithmVersion::V1);
        assert!(config.signing_key().unwrap().is_some());
        assert_eq!(config.store_config().max_connections, 3);
    }

    #[test]
    fn rejects_unknown_hash_version() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[ledger]\nhash_algorithm = 3").unwrap();
        assert!(AppConfig::from_file(file.path()).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AppConfig::from_file(&dir.path().join("absent.toml")).is_err());
    }

    #[test]
    fn environment_overrides_file() {
        let env: HashMap<&str, String> = [
            (DATABASE_URL_ENV, "postgres://env/ackl".to_string()),
            (SIGNING_KEY_ENV, "ab".repeat(32)),
        ]
        .into_iter()
        .collect();
        let config = AppConfig {
            database_url: "postgres://file/ackl".into(),
            ..AppConfig::default()
        }
        .with_overrides(|key| env.get(key).cloned());

        assert_eq!(config.database_url, "postgres://env/ackl");
        assert_eq!(config.signing_key_hex, Some("ab".repeat(32)));
    }

    #[test]
    fn schema_reaches_the_store() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "database_url = \"postgres://h/db\"\nschema = \"tenant_a\"").unwrap();
        let store = AppConfig::from_file(file.path()).unwrap().store_config();
        assert_eq!(store.schema.as_deref(), Some("tenant_a"));
        assert!(store.validate().is_ok());
    }

    #[test]
    fn bad_signing_key_is_reported() {
        let config = AppConfig {
            signing_key_hex: Some("not-hex".into()),
            ..AppConfig::default()
        };
        assert!(config.signing_key().is_err());
    }
}
