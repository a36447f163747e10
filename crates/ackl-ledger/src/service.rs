use std::sync::Arc;

use ackl_crypto::{generate_nonce, Signer, SigningRequest};
use ackl_types::{now_micros, Actor, HashAlgorithmVersion, LedgerRecord, NewRecord, RecordId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::LedgerConfig;
use crate::error::{LedgerError, RepositoryError};
use crate::linker::ChainLinker;
use crate::migration::{HashVersionMigrator, MigrationReport};
use crate::rebuild::{ChainRebuilder, RebuildReport};
use crate::traits::{LedgerReader, LedgerRepository};
use crate::verifier::{ChainIntegrityVerifier, IntegrityResult};

/// Whether one actor has acknowledged one subject.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcknowledgmentStatus {
    pub subject_id: String,
    pub actor_id: String,
    pub acknowledged: bool,
    pub record_id: Option<RecordId>,
    pub signed_at: Option<DateTime<Utc>>,
}

/// Entry point for creating and auditing acknowledgments.
///
/// Appends are serialized through the repository's exclusive writer: the
/// chain tail is read and the new record inserted in one transaction. Signing
/// happens before that transaction opens so a slow signer never holds it.
pub struct AcknowledgmentService<R: ?Sized, S: ?Sized> {
    repository: Arc<R>,
    signer: Arc<S>,
    config: LedgerConfig,
}

impl<R, S> AcknowledgmentService<R, S>
where
    R: LedgerRepository + ?Sized,
    S: Signer + ?Sized,
{
    pub fn new(repository: Arc<R>, signer: Arc<S>, config: LedgerConfig) -> Self {
        Self {
            repository,
            signer,
            config,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    /// Sign and append an acknowledgment of `subject_id` by `actor`.
    ///
    /// At most once per `(subject_id, actor.id)`: a second attempt, including
    /// one that loses a concurrent race, fails with
    /// [`LedgerError::AlreadyAcknowledged`].
    pub async fn create_acknowledgment(
        &self,
        subject_id: &str,
        actor: &Actor,
        referer: Option<&str>,
    ) -> Result<LedgerRecord, LedgerError> {
        validate_subject(subject_id)?;
        validate_actor(actor)?;

        let mut reader = self.reader_for("exists", subject_id, &actor.id).await?;
        let exists = reader
            .exists_by_subject_and_actor(subject_id, &actor.id)
            .await
            .map_err(|e| LedgerError::repository_for("exists", subject_id, &actor.id, e))?;
        drop(reader);
        if exists {
            return Err(already_acknowledged(subject_id, &actor.id));
        }

        let request = SigningRequest {
            subject_id: subject_id.to_string(),
            actor: actor.clone(),
            signed_at: now_micros(),
            nonce: generate_nonce(),
        };
        let signed = self.signer.sign(&request).await.map_err(|source| {
            tracing::error!(subject_id, actor_id = %actor.id, error = %source, "signing failed");
            LedgerError::SigningFailed {
                subject_id: subject_id.to_string(),
                actor_id: actor.id.clone(),
                source,
            }
        })?;

        let candidate = NewRecord {
            subject_id: request.subject_id,
            actor_id: request.actor.id,
            actor_email: request.actor.email,
            actor_display_name: request.actor.display_name,
            signed_at: request.signed_at,
            payload_digest: signed.payload_digest,
            signature_value: signed.signature_value,
            nonce: request.nonce,
            referer: referer.filter(|r| !r.is_empty()).map(str::to_string),
            back_link: None,
            hash_algorithm_version: self.config.hash_algorithm,
        };

        let record = self.append_linked(candidate).await?;
        tracing::info!(
            subject_id,
            actor_id = %actor.id,
            record_id = %record.id,
            genesis = record.is_genesis_shaped(),
            "acknowledgment recorded"
        );
        Ok(record)
    }

    async fn append_linked(&self, candidate: NewRecord) -> Result<LedgerRecord, LedgerError> {
        let subject_id = candidate.subject_id.clone();
        let actor_id = candidate.actor_id.clone();
        let fail = |operation: &'static str, e: RepositoryError| match e {
            RepositoryError::UniqueViolation { .. } => {
                tracing::warn!(subject_id = %subject_id, actor_id = %actor_id, "lost acknowledgment race");
                already_acknowledged(&subject_id, &actor_id)
            }
            other => LedgerError::repository_for(operation, &subject_id, &actor_id, other),
        };

        let mut tx = self
            .repository
            .begin_write()
            .await
            .map_err(|e| fail("begin_write", e))?;
        let last = tx.get_last().await.map_err(|e| fail("get_last", e))?;
        let linked = ChainLinker::link(candidate, last.as_ref());
        let record = tx.append(linked).await.map_err(|e| fail("append", e))?;
        tx.commit().await.map_err(|e| fail("commit", e))?;
        Ok(record)
    }

    pub async fn get_by_subject_and_actor(
        &self,
        subject_id: &str,
        actor_id: &str,
    ) -> Result<LedgerRecord, LedgerError> {
        validate_subject(subject_id)?;
        validate_actor_id(actor_id)?;
        let mut reader = self.reader_for("get", subject_id, actor_id).await?;
        reader
            .get_by_subject_and_actor(subject_id, actor_id)
            .await
            .map_err(|e| LedgerError::repository_for("get", subject_id, actor_id, e))?
            .ok_or_else(|| LedgerError::NotFound {
                subject_id: subject_id.to_string(),
                actor_id: actor_id.to_string(),
            })
    }

    pub async fn list_by_subject(&self, subject_id: &str) -> Result<Vec<LedgerRecord>, LedgerError> {
        validate_subject(subject_id)?;
        let failure = |source| LedgerError::RepositoryFailure {
            operation: "list_by_subject",
            subject_id: Some(subject_id.to_string()),
            actor_id: None,
            source,
        };
        let mut reader = self.repository.begin_read().await.map_err(failure)?;
        reader.list_by_subject(subject_id).await.map_err(failure)
    }

    pub async fn list_by_actor(&self, actor_id: &str) -> Result<Vec<LedgerRecord>, LedgerError> {
        validate_actor_id(actor_id)?;
        let failure = |source| LedgerError::RepositoryFailure {
            operation: "list_by_actor",
            subject_id: None,
            actor_id: Some(actor_id.to_string()),
            source,
        };
        let mut reader = self.repository.begin_read().await.map_err(failure)?;
        reader.list_by_actor(actor_id).await.map_err(failure)
    }

    pub async fn check_actor_acknowledged(
        &self,
        subject_id: &str,
        actor_id: &str,
    ) -> Result<bool, LedgerError> {
        validate_subject(subject_id)?;
        validate_actor_id(actor_id)?;
        let mut reader = self.reader_for("exists", subject_id, actor_id).await?;
        reader
            .exists_by_subject_and_actor(subject_id, actor_id)
            .await
            .map_err(|e| LedgerError::repository_for("exists", subject_id, actor_id, e))
    }

    pub async fn get_acknowledgment_status(
        &self,
        subject_id: &str,
        actor_id: &str,
    ) -> Result<AcknowledgmentStatus, LedgerError> {
        validate_subject(subject_id)?;
        validate_actor_id(actor_id)?;
        let mut reader = self.reader_for("status", subject_id, actor_id).await?;
        let record = reader
            .get_by_subject_and_actor(subject_id, actor_id)
            .await
            .map_err(|e| LedgerError::repository_for("status", subject_id, actor_id, e))?;
        Ok(AcknowledgmentStatus {
            subject_id: subject_id.to_string(),
            actor_id: actor_id.to_string(),
            acknowledged: record.is_some(),
            record_id: record.as_ref().map(|r| r.id),
            signed_at: record.map(|r| r.signed_at),
        })
    }

    pub async fn verify_chain_integrity(&self) -> Result<IntegrityResult, LedgerError> {
        ChainIntegrityVerifier::verify(self.repository.as_ref()).await
    }

    pub async fn rebuild_chain(&self) -> Result<RebuildReport, LedgerError> {
        ChainRebuilder::rebuild(self.repository.as_ref()).await
    }

    pub async fn migrate_hash_version(
        &self,
        target: HashAlgorithmVersion,
    ) -> Result<MigrationReport, LedgerError> {
        HashVersionMigrator::migrate(self.repository.as_ref(), target).await
    }

    async fn reader_for(
        &self,
        operation: &'static str,
        subject_id: &str,
        actor_id: &str,
    ) -> Result<Box<dyn LedgerReader>, LedgerError> {
        self.repository
            .begin_read()
            .await
            .map_err(|e| LedgerError::repository_for(operation, subject_id, actor_id, e))
    }
}

fn already_acknowledged(subject_id: &str, actor_id: &str) -> LedgerError {
    LedgerError::AlreadyAcknowledged {
        subject_id: subject_id.to_string(),
        actor_id: actor_id.to_string(),
    }
}

/// Whitespace-only subject ids count as empty.
fn validate_subject(subject_id: &str) -> Result<(), LedgerError> {
    if subject_id.trim().is_empty() {
        return Err(LedgerError::InvalidSubject);
    }
    Ok(())
}

/// Whitespace-only actor ids count as empty.
fn validate_actor_id(actor_id: &str) -> Result<(), LedgerError> {
    if actor_id.trim().is_empty() {
        return Err(LedgerError::InvalidActor {
            reason: "actor id must not be empty".into(),
        });
    }
    Ok(())
}

fn validate_actor(actor: &Actor) -> Result<(), LedgerError> {
    validate_actor_id(&actor.id)?;
    if actor.email.trim().is_empty() {
        return Err(LedgerError::InvalidActor {
            reason: "actor email must not be empty".into(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use ackl_crypto::{verify_record, Ed25519Signer, SignedPayload, SignerError, SigningKey};
    use ackl_types::Digest;
    use async_trait::async_trait;

    use super::*;
    use crate::memory::InMemoryLedgerRepository;
    use crate::traits::LedgerWriter;

    type MemoryService = AcknowledgmentService<InMemoryLedgerRepository, Ed25519Signer>;

    fn service() -> MemoryService {
        AcknowledgmentService::new(
            Arc::new(InMemoryLedgerRepository::new()),
            Arc::new(Ed25519Signer::new(SigningKey::generate())),
            LedgerConfig::default(),
        )
    }

    fn actor(id: &str) -> Actor {
        Actor::new(id, format!("{id}@example.com"))
    }

    struct FailingSigner;

    #[async_trait]
    impl Signer for FailingSigner {
        async fn sign(&self, _: &SigningRequest) -> Result<SignedPayload, SignerError> {
            Err(SignerError::Unavailable("hsm offline".into()))
        }
    }

    struct CountingSigner {
        inner: Ed25519Signer,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Signer for CountingSigner {
        async fn sign(&self, request: &SigningRequest) -> Result<SignedPayload, SignerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.sign(request).await
        }
    }

    struct DownRepository;

    #[async_trait]
    impl LedgerRepository for DownRepository {
        async fn begin_read(&self) -> Result<Box<dyn LedgerReader>, RepositoryError> {
            Err(RepositoryError::Backend("connection refused".into()))
        }

        async fn begin_write(&self) -> Result<Box<dyn LedgerWriter>, RepositoryError> {
            Err(RepositoryError::Backend("connection refused".into()))
        }
    }

    /// Readers see an empty ledger; writers see the real one. Simulates a
    /// duplicate that lands between the pre-check and the insert.
    struct StaleReads(InMemoryLedgerRepository);

    #[async_trait]
    impl LedgerRepository for StaleReads {
        async fn begin_read(&self) -> Result<Box<dyn LedgerReader>, RepositoryError> {
            InMemoryLedgerRepository::new().begin_read().await
        }

        async fn begin_write(&self) -> Result<Box<dyn LedgerWriter>, RepositoryError> {
            self.0.begin_write().await
        }
    }

    #[tokio::test]
    async fn first_acknowledgment_is_genesis() {
        let service = service();
        let record = service
            .create_acknowledgment("doc-1", &actor("alice"), Some("https://app/doc-1"))
            .await
            .unwrap();

        assert_eq!(record.id, RecordId::new(1));
        assert_eq!(record.back_link, None);
        assert_eq!(record.hash_algorithm_version, HashAlgorithmVersion::V2);
        assert_eq!(record.referer.as_deref(), Some("https://app/doc-1"));
        assert_eq!(record.nonce.len(), 64);
    }

    #[tokio::test]
    async fn later_acknowledgments_link_to_predecessor() {
        let service = service();
        let first = service
            .create_acknowledgment("doc-1", &actor("alice"), None)
            .await
            .unwrap();
        let second = service
            .create_acknowledgment("doc-1", &actor("bob"), None)
            .await
            .unwrap();

        assert_eq!(second.back_link, ChainLinker::expected_link(Some(&first)));
        assert!(service.verify_chain_integrity().await.unwrap().valid);
    }

    #[tokio::test]
    async fn records_carry_a_verifiable_signature() {
        let key = SigningKey::from_bytes([3; 32]);
        let verifying = key.verifying_key();
        let service = AcknowledgmentService::new(
            Arc::new(InMemoryLedgerRepository::new()),
            Arc::new(Ed25519Signer::new(key)),
            LedgerConfig::default(),
        );
        let record = service
            .create_acknowledgment("doc", &actor("alice").with_display_name("Alice"), None)
            .await
            .unwrap();
        assert!(verify_record(&verifying, &record).is_ok());
    }

    #[tokio::test]
    async fn legacy_config_stamps_v1() {
        let service = AcknowledgmentService::new(
            Arc::new(InMemoryLedgerRepository::new()),
            Arc::new(Ed25519Signer::new(SigningKey::generate())),
            LedgerConfig::legacy(),
        );
        let record = service
            .create_acknowledgment("doc", &actor("alice"), None)
            .await
            .unwrap();
        assert_eq!(record.hash_algorithm_version, HashAlgorithmVersion::V1);
    }

    #[tokio::test]
    async fn rejects_invalid_input() {
        let service = service();
        assert_eq!(
            service.create_acknowledgment("  ", &actor("alice"), None).await,
            Err(LedgerError::InvalidSubject)
        );
        let err = service
            .create_acknowledgment("doc", &Actor::new("", "a@example.com"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidActor { .. }));
        let err = service
            .create_acknowledgment("doc", &Actor::new(" \t", "a@example.com"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidActor { .. }));
        let err = service
            .create_acknowledgment("doc", &Actor::new("alice", ""), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidActor { .. }));
        assert!(service.repository().is_empty());
    }

    #[tokio::test]
    async fn duplicate_is_rejected_without_signing() {
        let signer = Arc::new(CountingSigner {
            inner: Ed25519Signer::new(SigningKey::generate()),
            calls: AtomicUsize::new(0),
        });
        let service = AcknowledgmentService::new(
            Arc::new(InMemoryLedgerRepository::new()),
            Arc::clone(&signer),
            LedgerConfig::default(),
        );
        service
            .create_acknowledgment("doc", &actor("alice"), None)
            .await
            .unwrap();
        let err = service
            .create_acknowledgment("doc", &actor("alice"), None)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            LedgerError::AlreadyAcknowledged {
                subject_id: "doc".into(),
                actor_id: "alice".into()
            }
        );
        assert_eq!(signer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(service.repository().len(), 1);
    }

    #[tokio::test]
    async fn signer_failure_writes_nothing() {
        let repo = Arc::new(InMemoryLedgerRepository::new());
        let service =
            AcknowledgmentService::new(Arc::clone(&repo), Arc::new(FailingSigner), LedgerConfig::default());
        let err = service
            .create_acknowledgment("doc", &actor("alice"), None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            LedgerError::SigningFailed { ref subject_id, source: SignerError::Unavailable(_), .. }
                if subject_id == "doc"
        ));
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn repository_failure_is_surfaced_with_context() {
        let service = AcknowledgmentService::new(
            Arc::new(DownRepository),
            Arc::new(Ed25519Signer::new(SigningKey::generate())),
            LedgerConfig::default(),
        );
        let err = service
            .create_acknowledgment("doc", &actor("alice"), None)
            .await
            .unwrap_err();
        assert!(err.is_infrastructure());
        assert!(matches!(
            err,
            LedgerError::RepositoryFailure { actor_id: Some(ref a), .. } if a == "alice"
        ));
        assert!(service.verify_chain_integrity().await.is_err());
    }

    #[tokio::test]
    async fn lost_race_maps_to_already_acknowledged() {
        let inner = InMemoryLedgerRepository::new();
        let service = AcknowledgmentService::new(
            Arc::new(StaleReads(inner)),
            Arc::new(Ed25519Signer::new(SigningKey::generate())),
            LedgerConfig::default(),
        );
        service
            .create_acknowledgment("doc", &actor("alice"), None)
            .await
            .unwrap();
        let err = service
            .create_acknowledgment("doc", &actor("alice"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyAcknowledged { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_appends_keep_the_chain_linear() {
        let service = Arc::new(service());
        let handles: Vec<_> = (0..32)
            .map(|i| {
                let service = Arc::clone(&service);
                tokio::spawn(async move {
                    service
                        .create_acknowledgment("doc", &actor(&format!("actor-{i}")), None)
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let result = service.verify_chain_integrity().await.unwrap();
        assert!(result.valid, "{}", result.details);
        assert_eq!(result.total_records, 32);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_duplicates_persist_once() {
        let service = Arc::new(service());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = Arc::clone(&service);
                tokio::spawn(async move {
                    service
                        .create_acknowledgment("doc", &actor("alice"), None)
                        .await
                })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(LedgerError::AlreadyAcknowledged { .. }) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(created, 1);
        assert_eq!(service.repository().len(), 1);
    }

    #[tokio::test]
    async fn read_pass_throughs() {
        let service = service();
        service
            .create_acknowledgment("doc-1", &actor("alice"), None)
            .await
            .unwrap();
        service
            .create_acknowledgment("doc-1", &actor("bob"), None)
            .await
            .unwrap();
        service
            .create_acknowledgment("doc-2", &actor("alice"), None)
            .await
            .unwrap();

        assert_eq!(service.list_by_subject("doc-1").await.unwrap().len(), 2);
        assert_eq!(service.list_by_actor("alice").await.unwrap().len(), 2);
        assert!(service.check_actor_acknowledged("doc-2", "alice").await.unwrap());
        assert!(!service.check_actor_acknowledged("doc-2", "bob").await.unwrap());

        let found = service.get_by_subject_and_actor("doc-1", "bob").await.unwrap();
        assert_eq!(found.actor_email, "bob@example.com");
        assert_eq!(
            service.get_by_subject_and_actor("doc-2", "bob").await,
            Err(LedgerError::NotFound {
                subject_id: "doc-2".into(),
                actor_id: "bob".into()
            })
        );
        assert_eq!(
            service.list_by_actor("").await,
            Err(LedgerError::InvalidActor {
                reason: "actor id must not be empty".into()
            })
        );
    }

    #[tokio::test]
    async fn status_reports_record() {
        let service = service();
        let pending = service.get_acknowledgment_status("doc", "alice").await.unwrap();
        assert!(!pending.acknowledged);
        assert_eq!(pending.record_id, None);

        let record = service
            .create_acknowledgment("doc", &actor("alice"), None)
            .await
            .unwrap();
        let status = service.get_acknowledgment_status("doc", "alice").await.unwrap();
        assert!(status.acknowledged);
        assert_eq!(status.record_id, Some(record.id));
        assert_eq!(status.signed_at, Some(record.signed_at));
    }

    #[tokio::test]
    async fn tampered_link_is_found_and_repaired() {
        let service = service();
        service
            .create_acknowledgment("doc", &actor("alice"), None)
            .await
            .unwrap();
        let second = service
            .create_acknowledgment("doc", &actor("bob"), None)
            .await
            .unwrap();
        service
            .repository()
            .tamper(second.id, |r| r.back_link = Some(Digest::new("arbitrary")));

        let broken = service.verify_chain_integrity().await.unwrap();
        assert!(!broken.valid);
        assert_eq!(broken.break_at_id, Some(second.id));

        let report = service.rebuild_chain().await.unwrap();
        assert_eq!(report.relinked, vec![second.id]);
        assert!(service.verify_chain_integrity().await.unwrap().valid);
    }

    #[tokio::test]
    async fn migration_then_new_records_stay_valid() {
        let service = AcknowledgmentService::new(
            Arc::new(InMemoryLedgerRepository::new()),
            Arc::new(Ed25519Signer::new(SigningKey::generate())),
            LedgerConfig::legacy(),
        );
        for name in ["a", "b", "c"] {
            service
                .create_acknowledgment("doc", &actor(name), None)
                .await
                .unwrap();
        }
        let report = service
            .migrate_hash_version(HashAlgorithmVersion::V2)
            .await
            .unwrap();
        assert_eq!(report.upgraded.len(), 3);
        service
            .create_acknowledgment("doc", &actor("d"), None)
            .await
            .unwrap();
        assert!(service.verify_chain_integrity().await.unwrap().valid);
    }
}
