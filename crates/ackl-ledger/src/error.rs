use ackl_crypto::SignerError;
use ackl_types::RecordId;

/// Errors raised by a [`LedgerRepository`](crate::LedgerRepository) backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    /// The storage-level `(subject_id, actor_id)` uniqueness guard fired.
    #[error("unique constraint violated for subject {subject_id} and actor {actor_id}")]
    UniqueViolation { subject_id: String, actor_id: String },

    #[error("record {0} not found")]
    RecordNotFound(RecordId),

    #[error("transaction already committed")]
    TransactionClosed,

    #[error("corrupt row for record {id}: {reason}")]
    CorruptRow { id: RecordId, reason: String },

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Errors produced by ledger operations.
///
/// Verification reports a broken chain as data, see
/// [`IntegrityResult`](crate::IntegrityResult); only operations that would
/// rewrite links over it turn the break into [`LedgerError::ChainBroken`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("invalid actor: {reason}")]
    InvalidActor { reason: String },

    #[error("invalid subject: subject id must not be empty")]
    InvalidSubject,

    #[error("subject {subject_id} already acknowledged by actor {actor_id}")]
    AlreadyAcknowledged { subject_id: String, actor_id: String },

    #[error("no acknowledgment of subject {subject_id} by actor {actor_id}")]
    NotFound { subject_id: String, actor_id: String },

    #[error("signing failed for subject {subject_id}, actor {actor_id}: {source}")]
    SigningFailed {
        subject_id: String,
        actor_id: String,
        #[source]
        source: SignerError,
    },

    /// Raised by operations that refuse to run over a broken chain.
    #[error("ledger chain broken at record {break_at_id}: {details}; run rebuild first")]
    ChainBroken {
        break_at_id: RecordId,
        details: String,
    },

    #[error("repository failure during {operation}: {source}")]
    RepositoryFailure {
        operation: &'static str,
        subject_id: Option<String>,
        actor_id: Option<String>,
        #[source]
        source: RepositoryError,
    },
}

impl LedgerError {
    /// Repository failure outside any particular acknowledgment.
    pub fn repository(operation: &'static str, source: RepositoryError) -> Self {
        Self::RepositoryFailure {
            operation,
            subject_id: None,
            actor_id: None,
            source,
        }
    }

    /// Repository failure while handling one `(subject, actor)` pair.
    pub fn repository_for(
        operation: &'static str,
        subject_id: &str,
        actor_id: &str,
        source: RepositoryError,
    ) -> Self {
        Self::RepositoryFailure {
            operation,
            subject_id: Some(subject_id.to_string()),
            actor_id: Some(actor_id.to_string()),
            source,
        }
    }

    /// Caller input errors; never worth retrying.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidActor { .. } | Self::InvalidSubject)
    }

    /// Infrastructure faults the caller may choose to retry.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Self::SigningFailed { .. } | Self::RepositoryFailure { .. })
    }
}
