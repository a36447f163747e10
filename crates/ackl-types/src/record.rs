use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::digest::Digest;
use crate::version::HashAlgorithmVersion;

/// Persistence-assigned record identifier.
///
/// Ascending id order is the canonical chain order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(i64);

impl RecordId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", self.0)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// The person acknowledging a subject.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Stable subject identifier from the identity provider.
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
}

impl Actor {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

/// A fully signed acknowledgment that has not been persisted yet.
///
/// The store assigns `id` and `created_at` on insert.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecord {
    pub subject_id: String,
    pub actor_id: String,
    pub actor_email: String,
    pub actor_display_name: Option<String>,
    pub signed_at: DateTime<Utc>,
    pub payload_digest: String,
    pub signature_value: String,
    pub nonce: String,
    pub referer: Option<String>,
    pub back_link: Option<Digest>,
    pub hash_algorithm_version: HashAlgorithmVersion,
}

impl NewRecord {
    /// Materialize the persisted form.
    pub fn into_record(self, id: RecordId, created_at: DateTime<Utc>) -> LedgerRecord {
        LedgerRecord {
            id,
            subject_id: self.subject_id,
            actor_id: self.actor_id,
            actor_email: self.actor_email,
            actor_display_name: self.actor_display_name,
            signed_at: self.signed_at,
            payload_digest: self.payload_digest,
            signature_value: self.signature_value,
            nonce: self.nonce,
            referer: self.referer,
            back_link: self.back_link,
            created_at,
            hash_algorithm_version: self.hash_algorithm_version,
            subject_deleted_at: None,
        }
    }
}

/// One persisted acknowledgment in the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub id: RecordId,
    /// Identifier of the acknowledged document.
    pub subject_id: String,
    pub actor_id: String,
    pub actor_email: String,
    pub actor_display_name: Option<String>,
    pub signed_at: DateTime<Utc>,
    pub payload_digest: String,
    pub signature_value: String,
    pub nonce: String,
    pub referer: Option<String>,
    /// Hash of the chain predecessor; `None` only on the genesis record.
    pub back_link: Option<Digest>,
    pub created_at: DateTime<Utc>,
    /// Scheme used when hashing this record for its successor's link.
    pub hash_algorithm_version: HashAlgorithmVersion,
    /// Set when the acknowledged document was removed. Not part of any hash.
    pub subject_deleted_at: Option<DateTime<Utc>>,
}

impl LedgerRecord {
    pub fn is_genesis_shaped(&self) -> bool {
        self.back_link.is_none()
    }

    /// Actor view of the signer fields.
    pub fn actor(&self) -> Actor {
        Actor {
            id: self.actor_id.clone(),
            email: self.actor_email.clone(),
            display_name: self.actor_display_name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn candidate() -> NewRecord {
        NewRecord {
            subject_id: "doc-1".into(),
            actor_id: "user-1".into(),
            actor_email: "user@example.com".into(),
            actor_display_name: Some("User One".into()),
            signed_at: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
            payload_digest: "pd".into(),
            signature_value: "sig".into(),
            nonce: "n".into(),
            referer: None,
            back_link: None,
            hash_algorithm_version: HashAlgorithmVersion::V2,
        }
    }

    #[test]
    fn into_record_assigns_identity() {
        let created_at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 6).unwrap();
        let record = candidate().into_record(RecordId::new(7), created_at);
        assert_eq!(record.id, RecordId::new(7));
        assert_eq!(record.created_at, created_at);
        assert!(record.subject_deleted_at.is_none());
        assert!(record.is_genesis_shaped());
    }

    #[test]
    fn actor_view_matches_fields() {
        let record = candidate().into_record(RecordId::new(1), Utc::now());
        let actor = record.actor();
        assert_eq!(actor, Actor::new("user-1", "user@example.com").with_display_name("User One"));
    }

    #[test]
    fn record_ids_order_numerically() {
        assert!(RecordId::new(2) < RecordId::new(10));
        assert_eq!(format!("{}", RecordId::new(42)), "42");
    }
}
