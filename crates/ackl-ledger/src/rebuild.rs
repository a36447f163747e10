use ackl_types::{Digest, LedgerRecord, RecordId};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::linker::ChainLinker;
use crate::traits::{LedgerRepository, LedgerWriter};

/// One backward link that has to be rewritten.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkCorrection {
    pub id: RecordId,
    pub back_link: Option<Digest>,
}

/// Summary of a rebuild run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuildReport {
    pub total_records: u64,
    /// Ids whose stored link was rewritten, ascending.
    pub relinked: Vec<RecordId>,
}

impl RebuildReport {
    pub fn is_noop(&self) -> bool {
        self.relinked.is_empty()
    }
}

/// Re-derives every backward link from the records as they are stored.
///
/// Hash versions are left untouched; content is re-linked, never re-hashed
/// under a different scheme.
pub struct ChainRebuilder;

impl ChainRebuilder {
    /// Relink the whole ledger inside one exclusive write transaction.
    ///
    /// Either every correction commits or none does. Running it twice writes
    /// nothing the second time.
    pub async fn rebuild<R>(repository: &R) -> Result<RebuildReport, LedgerError>
    where
        R: LedgerRepository + ?Sized,
    {
        let mut tx = repository
            .begin_write()
            .await
            .map_err(|e| LedgerError::repository("rebuild", e))?;
        let report = Self::relink(tx.as_mut()).await?;
        tx.commit()
            .await
            .map_err(|e| LedgerError::repository("rebuild", e))?;

        tracing::info!(
            total_records = report.total_records,
            relinked = report.relinked.len(),
            "ledger chain rebuilt"
        );
        Ok(report)
    }

    /// Rewrite differing links on an open writer without committing.
    pub(crate) async fn relink(tx: &mut dyn LedgerWriter) -> Result<RebuildReport, LedgerError> {
        let records = tx
            .list_all_ordered()
            .await
            .map_err(|e| LedgerError::repository("rebuild", e))?;
        let corrections = Self::plan(&records);

        for correction in &corrections {
            tracing::debug!(record_id = %correction.id, "rewriting backward link");
            tx.update_back_link(correction.id, correction.back_link.as_ref())
                .await
                .map_err(|e| LedgerError::repository("rebuild", e))?;
        }

        Ok(RebuildReport {
            total_records: records.len() as u64,
            relinked: corrections.into_iter().map(|c| c.id).collect(),
        })
    }

    /// Corrections needed to make `records` (ascending by id) a valid chain.
    pub fn plan(records: &[LedgerRecord]) -> Vec<LinkCorrection> {
        let mut corrections = Vec::new();
        let mut prev: Option<&LedgerRecord> = None;
        for record in records {
            let expected = ChainLinker::expected_link(prev);
            if record.back_link != expected {
                corrections.push(LinkCorrection {
                    id: record.id,
                    back_link: expected,
                });
            }
            prev = Some(record);
        }
        corrections
    }
}
