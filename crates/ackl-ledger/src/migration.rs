use ackl_types::{HashAlgorithmVersion, RecordId};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::rebuild::ChainRebuilder;
use crate::traits::LedgerRepository;
use crate::verifier::ChainIntegrityVerifier;

/// Summary of a hash-version migration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationReport {
    pub target: HashAlgorithmVersion,
    pub total_records: u64,
    /// Records whose stored version changed.
    pub upgraded: Vec<RecordId>,
    /// Records whose backward link was rewritten afterwards.
    pub relinked: Vec<RecordId>,
}

/// Moves existing records to another hashing scheme.
///
/// Changing a record's version changes the digest its successor must carry,
/// so every migration is followed by a relink in the same transaction.
/// A ledger whose chain is already broken is refused untouched; repairing
/// it is an explicit [`ChainRebuilder::rebuild`].
pub struct HashVersionMigrator;

impl HashVersionMigrator {
    pub async fn migrate<R>(
        repository: &R,
        target: HashAlgorithmVersion,
    ) -> Result<MigrationReport, LedgerError>
    where
        R: LedgerRepository + ?Sized,
    {
        let mut tx = repository
            .begin_write()
            .await
            .map_err(|e| LedgerError::repository("migrate", e))?;
        let records = tx
            .list_all_ordered()
            .await
            .map_err(|e| LedgerError::repository("migrate", e))?;

        let integrity = ChainIntegrityVerifier::verify_records(&records);
        if let Some(break_at_id) = integrity.break_at_id {
            // Dropping the writer discards the transaction.
            tracing::warn!(
                %break_at_id,
                details = %integrity.details,
                "migration refused, chain broken"
            );
            return Err(LedgerError::ChainBroken {
                break_at_id,
                details: integrity.details,
            });
        }

        let mut upgraded = Vec::new();
        for record in records.iter().filter(|r| r.hash_algorithm_version != target) {
            tx.update_hash_version(record.id, target)
                .await
                .map_err(|e| LedgerError::repository("migrate", e))?;
            upgraded.push(record.id);
        }

        let relinked = ChainRebuilder::relink(tx.as_mut()).await?.relinked;
        tx.commit()
            .await
            .map_err(|e| LedgerError::repository("migrate", e))?;

        tracing::info!(
            %target,
            total_records = records.len(),
            upgraded = upgraded.len(),
            relinked = relinked.len(),
            "ledger hash version migrated"
        );
        Ok(MigrationReport {
            target,
            total_records: records.len() as u64,
            upgraded,
            relinked,
        })
    }
}
