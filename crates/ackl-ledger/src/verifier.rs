use ackl_types::{LedgerRecord, RecordId};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::linker::ChainLinker;
use crate::traits::LedgerRepository;

/// Outcome of a full chain verification.
///
/// A broken chain is a normal result, not an error: callers decide whether to
/// alert, block writes, or run the rebuilder.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityResult {
    pub valid: bool,
    pub total_records: u64,
    pub break_at_id: Option<RecordId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub break_kind: Option<ChainBreakKind>,
    pub details: String,
}

/// Why verification stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainBreakKind {
    /// The lowest-id record carries a backward link.
    GenesisHasBackLink,
    /// A non-genesis record has no backward link.
    MissingBackLink,
    /// A backward link differs from the predecessor's recomputed hash.
    BackLinkMismatch,
}

impl IntegrityResult {
    fn intact(total_records: u64, details: &str) -> Self {
        Self {
            valid: true,
            total_records,
            break_at_id: None,
            break_kind: None,
            details: details.to_string(),
        }
    }

    fn broken(total_records: u64, at: RecordId, kind: ChainBreakKind, details: String) -> Self {
        Self {
            valid: false,
            total_records,
            break_at_id: Some(at),
            break_kind: Some(kind),
            details,
        }
    }
}

/// Walks the whole ledger once and reports the first chain break.
pub struct ChainIntegrityVerifier;

impl ChainIntegrityVerifier {
    /// Verify every committed record from one consistent read snapshot.
    ///
    /// Only repository failures are errors; tampering is reported in the
    /// returned [`IntegrityResult`].
    pub async fn verify<R>(repository: &R) -> Result<IntegrityResult, LedgerError>
    where
        R: LedgerRepository + ?Sized,
    {
        let mut reader = repository
            .begin_read()
            .await
            .map_err(|e| LedgerError::repository("verify", e))?;
        let records = reader
            .list_all_ordered()
            .await
            .map_err(|e| LedgerError::repository("verify", e))?;

        let result = Self::verify_records(&records);
        if result.valid {
            tracing::info!(total_records = result.total_records, "ledger chain verified");
        } else {
            tracing::warn!(
                total_records = result.total_records,
                break_at_id = ?result.break_at_id.map(RecordId::get),
                details = %result.details,
                "ledger chain broken"
            );
        }
        Ok(result)
    }

    /// Verify records already sorted ascending by id.
    pub fn verify_records(records: &[LedgerRecord]) -> IntegrityResult {
        let total = records.len() as u64;
        let Some(genesis) = records.first() else {
            return IntegrityResult::intact(0, "No records found");
        };

        if let Some(link) = &genesis.back_link {
            return IntegrityResult::broken(
                total,
                genesis.id,
                ChainBreakKind::GenesisHasBackLink,
                format!(
                    "Genesis record {} has non-null backward link {}",
                    genesis.id,
                    link.short()
                ),
            );
        }

        for pair in records.windows(2) {
            let (prev, record) = (&pair[0], &pair[1]);
            // Non-genesis predecessors always yield a link.
            let Some(expected) = ChainLinker::expected_link(Some(prev)) else {
                continue;
            };
            match &record.back_link {
                None => {
                    return IntegrityResult::broken(
                        total,
                        record.id,
                        ChainBreakKind::MissingBackLink,
                        format!(
                            "Record {} has no backward link; expected {} (hash of record {} under {})",
                            record.id,
                            expected.short(),
                            prev.id,
                            prev.hash_algorithm_version
                        ),
                    );
                }
                Some(actual) if *actual != expected => {
                    return IntegrityResult::broken(
                        total,
                        record.id,
                        ChainBreakKind::BackLinkMismatch,
                        format!(
                            "Record {} backward link {} does not match hash {} of record {} under {}",
                            record.id,
                            actual.short(),
                            expected.short(),
                            prev.id,
                            prev.hash_algorithm_version
                        ),
                    );
                }
                Some(_) => {}
            }
        }

        IntegrityResult::intact(total, "Chain integrity verified successfully")
    }
}
