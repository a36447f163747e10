use ackl_types::HashAlgorithmVersion;
use serde::{Deserialize, Serialize};

/// Ledger policy applied at acknowledgment creation time.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Hashing scheme stamped on new records. Existing records keep theirs.
    pub hash_algorithm: HashAlgorithmVersion,
}

impl LedgerConfig {
    /// Keep writing legacy V1 records, for deployments that still have V1-only
    /// verifiers.
    pub fn legacy() -> Self {
        Self {
            hash_algorithm: HashAlgorithmVersion::V1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_uses_current_scheme() {
        assert_eq!(LedgerConfig::default().hash_algorithm, HashAlgorithmVersion::V2);
        assert_eq!(LedgerConfig::legacy().hash_algorithm, HashAlgorithmVersion::V1);
    }

    #[test]
    fn missing_fields_fall_back_to_default() {
        let config: LedgerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, LedgerConfig::default());
        let config: LedgerConfig = serde_json::from_str(r#"{"hash_algorithm":1}"#).unwrap();
        assert_eq!(config, LedgerConfig::legacy());
    }
}
