use ackl_types::{Digest, HashAlgorithmVersion, LedgerRecord, NewRecord, RecordId};
use async_trait::async_trait;

use crate::error::RepositoryError;

/// Read view over the ledger.
///
/// Every call on one reader observes the same consistent snapshot, so a full
/// scan never sees a record appear mid-way.
#[async_trait]
pub trait LedgerReader: Send {
    async fn get_by_subject_and_actor(
        &mut self,
        subject_id: &str,
        actor_id: &str,
    ) -> Result<Option<LedgerRecord>, RepositoryError>;

    async fn list_by_subject(&mut self, subject_id: &str)
        -> Result<Vec<LedgerRecord>, RepositoryError>;

    async fn list_by_actor(&mut self, actor_id: &str) -> Result<Vec<LedgerRecord>, RepositoryError>;

    async fn exists_by_subject_and_actor(
        &mut self,
        subject_id: &str,
        actor_id: &str,
    ) -> Result<bool, RepositoryError>;

    /// The record with the highest id, if any.
    async fn get_last(&mut self) -> Result<Option<LedgerRecord>, RepositoryError>;

    /// Every record, ascending by id.
    async fn list_all_ordered(&mut self) -> Result<Vec<LedgerRecord>, RepositoryError>;
}

/// Exclusive write transaction over the ledger.
///
/// At most one writer exists per ledger at a time, which serializes the
/// read-last-then-append sequence and rebuilds. Nothing is visible to other
/// readers until [`commit`](LedgerWriter::commit); dropping an uncommitted
/// writer discards its changes.
#[async_trait]
pub trait LedgerWriter: LedgerReader {
    /// Insert a record; the store assigns `id` and `created_at`.
    ///
    /// Fails with [`RepositoryError::UniqueViolation`] when the
    /// `(subject_id, actor_id)` pair already exists.
    async fn append(&mut self, record: NewRecord) -> Result<LedgerRecord, RepositoryError>;

    async fn update_back_link(
        &mut self,
        id: RecordId,
        back_link: Option<&Digest>,
    ) -> Result<(), RepositoryError>;

    async fn update_hash_version(
        &mut self,
        id: RecordId,
        version: HashAlgorithmVersion,
    ) -> Result<(), RepositoryError>;

    async fn commit(&mut self) -> Result<(), RepositoryError>;
}

/// Persistence boundary for ledger records.
///
/// Callers are expected to run inside whatever tenant scope the deployment
/// uses; the ledger itself is tenant-agnostic.
#[async_trait]
pub trait LedgerRepository: Send + Sync {
    async fn begin_read(&self) -> Result<Box<dyn LedgerReader>, RepositoryError>;

    async fn begin_write(&self) -> Result<Box<dyn LedgerWriter>, RepositoryError>;
}
