use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use ackl_types::{now_micros, Digest, HashAlgorithmVersion, LedgerRecord, NewRecord, RecordId};
use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::RepositoryError;
use crate::traits::{LedgerReader, LedgerRepository, LedgerWriter};

/// In-memory ledger store for tests, local demos, and embedding.
///
/// Readers get an immutable snapshot of the committed state. Writers hold a
/// per-ledger async lock for their whole lifetime and mutate a private copy
/// that replaces the committed state on commit, so a transaction either lands
/// completely or not at all.
pub struct InMemoryLedgerRepository {
    committed: Arc<RwLock<Arc<LedgerState>>>,
    writer_lock: Arc<Mutex<()>>,
}

#[derive(Clone, Default)]
struct LedgerState {
    records: BTreeMap<RecordId, LedgerRecord>,
    pairs: HashMap<(String, String), RecordId>,
    last_id: i64,
}

impl LedgerState {
    fn get_by_pair(&self, subject_id: &str, actor_id: &str) -> Option<LedgerRecord> {
        self.pairs
            .get(&(subject_id.to_string(), actor_id.to_string()))
            .and_then(|id| self.records.get(id))
            .cloned()
    }

    fn filtered(&self, keep: impl Fn(&LedgerRecord) -> bool) -> Vec<LedgerRecord> {
        self.records.values().filter(|r| keep(r)).cloned().collect()
    }

    fn last(&self) -> Option<LedgerRecord> {
        self.records.values().next_back().cloned()
    }

    fn ordered(&self) -> Vec<LedgerRecord> {
        self.records.values().cloned().collect()
    }

    fn insert(&mut self, record: NewRecord) -> Result<LedgerRecord, RepositoryError> {
        let key = (record.subject_id.clone(), record.actor_id.clone());
        if self.pairs.contains_key(&key) {
            return Err(RepositoryError::UniqueViolation {
                subject_id: key.0,
                actor_id: key.1,
            });
        }

        self.last_id += 1;
        let id = RecordId::new(self.last_id);
        let persisted = record.into_record(id, now_micros());
        self.pairs.insert(key, id);
        self.records.insert(id, persisted.clone());
        Ok(persisted)
    }

    fn record_mut(&mut self, id: RecordId) -> Result<&mut LedgerRecord, RepositoryError> {
        self.records
            .get_mut(&id)
            .ok_or(RepositoryError::RecordNotFound(id))
    }
}

impl InMemoryLedgerRepository {
    pub fn new() -> Self {
        Self {
            committed: Arc::new(RwLock::new(Arc::new(LedgerState::default()))),
            writer_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Number of committed records.
    pub fn len(&self) -> usize {
        self.snapshot().map(|s| s.records.len()).unwrap_or(0)
    }

    /// Returns `true` if nothing has been committed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Result<Arc<LedgerState>, RepositoryError> {
        self.committed
            .read()
            .map(|guard| Arc::clone(&*guard))
            .map_err(|_| RepositoryError::Backend("ledger read lock poisoned".into()))
    }

    /// Rewrite a committed record in place, bypassing every invariant.
    /// Simulates out-of-band tampering with the store.
    #[cfg(test)]
    pub(crate) fn tamper(&self, id: RecordId, edit: impl FnOnce(&mut LedgerRecord)) {
        let mut guard = self.committed.write().unwrap();
        let mut state = (**guard).clone();
        edit(state.records.get_mut(&id).unwrap());
        *guard = Arc::new(state);
    }
}

impl Default for InMemoryLedgerRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryLedgerRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryLedgerRepository")
            .field("record_count", &self.len())
            .finish()
    }
}

#[async_trait]
impl LedgerRepository for InMemoryLedgerRepository {
    async fn begin_read(&self) -> Result<Box<dyn LedgerReader>, RepositoryError> {
        Ok(Box::new(MemoryReader {
            state: self.snapshot()?,
        }))
    }

    async fn begin_write(&self) -> Result<Box<dyn LedgerWriter>, RepositoryError> {
        let guard = Arc::clone(&self.writer_lock).lock_owned().await;
        let working = (*self.snapshot()?).clone();
        Ok(Box::new(MemoryWriter {
            guard: Some(guard),
            working,
            committed: Arc::clone(&self.committed),
            closed: false,
        }))
    }
}

struct MemoryReader {
    state: Arc<LedgerState>,
}

#[async_trait]
impl LedgerReader for MemoryReader {
    async fn get_by_subject_and_actor(
        &mut self,
        subject_id: &str,
        actor_id: &str,
    ) -> Result<Option<LedgerRecord>, RepositoryError> {
        Ok(self.state.get_by_pair(subject_id, actor_id))
    }

    async fn list_by_subject(
        &mut self,
        subject_id: &str,
    ) -> Result<Vec<LedgerRecord>, RepositoryError> {
        Ok(self.state.filtered(|r| r.subject_id == subject_id))
    }

    async fn list_by_actor(&mut self, actor_id: &str) -> Result<Vec<LedgerRecord>, RepositoryError> {
        Ok(self.state.filtered(|r| r.actor_id == actor_id))
    }

    async fn exists_by_subject_and_actor(
        &mut self,
        subject_id: &str,
        actor_id: &str,
    ) -> Result<bool, RepositoryError> {
        Ok(self.state.get_by_pair(subject_id, actor_id).is_some())
    }

    async fn get_last(&mut self) -> Result<Option<LedgerRecord>, RepositoryError> {
        Ok(self.state.last())
    }

    async fn list_all_ordered(&mut self) -> Result<Vec<LedgerRecord>, RepositoryError> {
        Ok(self.state.ordered())
    }
}

struct MemoryWriter {
    /// Held until commit or drop.
    guard: Option<OwnedMutexGuard<()>>,
    working: LedgerState,
    committed: Arc<RwLock<Arc<LedgerState>>>,
    closed: bool,
}

impl MemoryWriter {
    fn open(&self) -> Result<&LedgerState, RepositoryError> {
        if self.closed {
            return Err(RepositoryError::TransactionClosed);
        }
        Ok(&self.working)
    }

    fn open_mut(&mut self) -> Result<&mut LedgerState, RepositoryError> {
        if self.closed {
            return Err(RepositoryError::TransactionClosed);
        }
        Ok(&mut self.working)
    }
}

#[async_trait]
impl LedgerReader for MemoryWriter {
    async fn get_by_subject_and_actor(
        &mut self,
        subject_id: &str,
        actor_id: &str,
    ) -> Result<Option<LedgerRecord>, RepositoryError> {
        Ok(self.open()?.get_by_pair(subject_id, actor_id))
    }

    async fn list_by_subject(
        &mut self,
        subject_id: &str,
    ) -> Result<Vec<LedgerRecord>, RepositoryError> {
        Ok(self.open()?.filtered(|r| r.subject_id == subject_id))
    }

    async fn list_by_actor(&mut self, actor_id: &str) -> Result<Vec<LedgerRecord>, RepositoryError> {
        Ok(self.open()?.filtered(|r| r.actor_id == actor_id))
    }

    async fn exists_by_subject_and_actor(
        &mut self,
        subject_id: &str,
        actor_id: &str,
    ) -> Result<bool, RepositoryError> {
        Ok(self.open()?.get_by_pair(subject_id, actor_id).is_some())
    }

    async fn get_last(&mut self) -> Result<Option<LedgerRecord>, RepositoryError> {
        Ok(self.open()?.last())
    }

    async fn list_all_ordered(&mut self) -> Result<Vec<LedgerRecord>, RepositoryError> {
        Ok(self.open()?.ordered())
    }
}

#[async_trait]
impl LedgerWriter for MemoryWriter {
    async fn append(&mut self, record: NewRecord) -> Result<LedgerRecord, RepositoryError> {
        self.open_mut()?.insert(record)
    }

    async fn update_back_link(
        &mut self,
        id: RecordId,
        back_link: Option<&Digest>,
    ) -> Result<(), RepositoryError> {
        self.open_mut()?.record_mut(id)?.back_link = back_link.cloned();
        Ok(())
    }

    async fn update_hash_version(
        &mut self,
        id: RecordId,
        version: HashAlgorithmVersion,
    ) -> Result<(), RepositoryError> {
        self.open_mut()?.record_mut(id)?.hash_algorithm_version = version;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), RepositoryError> {
        self.open()?;
        {
            let mut committed = self
                .committed
                .write()
                .map_err(|_| RepositoryError::Backend("ledger write lock poisoned".into()))?;
            *committed = Arc::new(std::mem::take(&mut self.working));
        }
        self.closed = true;
        self.guard = None;
        Ok(())
    }
}
