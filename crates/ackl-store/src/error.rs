use ackl_ledger::RepositoryError;

/// Errors from setting up the PostgreSQL backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("invalid store configuration: {0}")]
    Config(String),
}

/// Result alias for store setup.
pub type StoreResult<T> = Result<T, StoreError>;

/// Map a driver error from a ledger operation onto the repository surface.
pub(crate) fn backend(error: sqlx::Error) -> RepositoryError {
    RepositoryError::Backend(error.to_string())
}

/// Like [`backend`], but recognizes the `(subject_id, actor_id)` guard.
pub(crate) fn on_insert(error: sqlx::Error, subject_id: &str, actor_id: &str) -> RepositoryError {
    match &error {
        sqlx::Error::Database(db) if db.is_unique_violation() => RepositoryError::UniqueViolation {
            subject_id: subject_id.to_string(),
            actor_id: actor_id.to_string(),
        },
        _ => backend(error),
    }
}
