use std::collections::BTreeMap;

use ackl_types::{rfc3339_nanos, Digest, HashAlgorithmVersion, LedgerRecord};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;
use sha2::{Digest as _, Sha256};

/// Deterministic, versioned digest of a single ledger record.
///
/// The digest of a record is what its successor stores as `back_link`.
/// Both schemes cover the same semantic fields:
///
/// - **V1** pipe-joins the fields in a fixed order, with RFC 3339 nanosecond
///   timestamps and empty strings for absent optionals.
/// - **V2** builds a key-sorted map with Unix-second timestamps and encodes it
///   as compact JSON.
///
/// Both are SHA-256 and base64 (standard alphabet, padded). `back_link`,
/// `hash_algorithm_version` and `subject_deleted_at` are never hashed.
pub struct RecordHasher;

impl RecordHasher {
    /// Hash `record` under an explicit scheme.
    pub fn hash(record: &LedgerRecord, version: HashAlgorithmVersion) -> Digest {
        match version {
            HashAlgorithmVersion::V1 => Self::digest(Self::legacy_preimage(record).as_bytes()),
            HashAlgorithmVersion::V2 => match Self::canonical_preimage(record) {
                Ok(bytes) => Self::digest(&bytes),
                Err(error) => {
                    tracing::warn!(
                        record_id = %record.id,
                        %error,
                        "canonical record encoding failed, falling back to v1 hash"
                    );
                    Self::digest(Self::legacy_preimage(record).as_bytes())
                }
            },
        }
    }

    /// The digest a successor of `record` must carry, under the record's own
    /// stored scheme.
    pub fn link_digest(record: &LedgerRecord) -> Digest {
        Self::hash(record, record.hash_algorithm_version)
    }

    /// V1 preimage: fixed-order, pipe-delimited fields.
    pub fn legacy_preimage(record: &LedgerRecord) -> String {
        let id = record.id.to_string();
        let signed_at = rfc3339_nanos(&record.signed_at);
        let created_at = rfc3339_nanos(&record.created_at);
        [
            id.as_str(),
            record.subject_id.as_str(),
            record.actor_id.as_str(),
            record.actor_email.as_str(),
            record.actor_display_name.as_deref().unwrap_or(""),
            signed_at.as_str(),
            record.payload_digest.as_str(),
            record.signature_value.as_str(),
            record.nonce.as_str(),
            created_at.as_str(),
            record.referer.as_deref().unwrap_or(""),
        ]
        .join("|")
    }

    /// V2 preimage: compact JSON of a lexicographically key-sorted map.
    pub fn canonical_preimage(record: &LedgerRecord) -> Result<Vec<u8>, HasherError> {
        let mut fields: BTreeMap<&'static str, Value> = BTreeMap::new();
        fields.insert("id", Value::from(record.id.get()));
        fields.insert("subject_id", Value::from(record.subject_id.as_str()));
        fields.insert("actor_id", Value::from(record.actor_id.as_str()));
        fields.insert("actor_email", Value::from(record.actor_email.as_str()));
        fields.insert(
            "actor_display_name",
            Value::from(record.actor_display_name.as_deref().unwrap_or("")),
        );
        fields.insert("signed_at", Value::from(record.signed_at.timestamp()));
        fields.insert("payload_digest", Value::from(record.payload_digest.as_str()));
        fields.insert("signature_value", Value::from(record.signature_value.as_str()));
        fields.insert("nonce", Value::from(record.nonce.as_str()));
        fields.insert("created_at", Value::from(record.created_at.timestamp()));
        fields.insert("referer", Value::from(record.referer.as_deref().unwrap_or("")));

        serde_json::to_vec(&fields).map_err(|e| HasherError::Serialization(e.to_string()))
    }

    /// SHA-256 followed by standard base64.
    pub fn digest(data: &[u8]) -> Digest {
        Digest::new(STANDARD.encode(Sha256::digest(data)))
    }
}

/// Errors from hashing operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HasherError {
    #[error("serialization error: {0}")]
    Serialization(String),
}
