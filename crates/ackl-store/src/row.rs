use ackl_ledger::RepositoryError;
use ackl_types::{Digest, HashAlgorithmVersion, LedgerRecord, RecordId};
use chrono::{DateTime, Utc};

/// Column list shared by every query returning records.
pub(crate) const RECORD_COLUMNS: &str = "id, subject_id, actor_id, actor_email, actor_display_name, \
     signed_at, payload_digest, signature_value, nonce, referer, back_link, created_at, \
     hash_algorithm_version, subject_deleted_at";

/// Database row for the `acknowledgments` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct RecordRow {
    pub id: i64,
    pub subject_id: String,
    pub actor_id: String,
    pub actor_email: String,
    pub actor_display_name: Option<String>,
    pub signed_at: DateTime<Utc>,
    pub payload_digest: String,
    pub signature_value: String,
    pub nonce: String,
    pub referer: Option<String>,
    pub back_link: Option<String>,
    pub created_at: DateTime<Utc>,
    pub hash_algorithm_version: i16,
    pub subject_deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<RecordRow> for LedgerRecord {
    type Error = RepositoryError;

    fn try_from(row: RecordRow) -> Result<Self, Self::Error> {
        let id = RecordId::new(row.id);
        let hash_algorithm_version =
            HashAlgorithmVersion::try_from(row.hash_algorithm_version).map_err(|e| {
                tracing::warn!(record_id = row.id, error = %e, "unreadable acknowledgment row");
                RepositoryError::CorruptRow {
                    id,
                    reason: e.to_string(),
                }
            })?;

        Ok(LedgerRecord {
            id,
            subject_id: row.subject_id,
            actor_id: row.actor_id,
            actor_email: row.actor_email,
            actor_display_name: row.actor_display_name,
            signed_at: row.signed_at,
            payload_digest: row.payload_digest,
            signature_value: row.signature_value,
            nonce: row.nonce,
            referer: row.referer,
            // Stored verbatim, even when empty, so the verifier sees it.
            back_link: row.back_link.map(Digest::new),
            created_at: row.created_at,
            hash_algorithm_version,
            subject_deleted_at: row.subject_deleted_at,
        })
    }
}

pub(crate) fn into_records(rows: Vec<RecordRow>) -> Result<Vec<LedgerRecord>, RepositoryError> {
    rows.into_iter().map(LedgerRecord::try_from).collect()
}
