//! PostgreSQL backend for the acknowledgment ledger.
//!
//! Records live in one `acknowledgments` table (see `migrations/`) whose
//! `(subject_id, actor_id)` unique constraint is the authoritative duplicate
//! guard and whose trigger keeps `created_at` immutable.
//!
//! [`PgLedgerRepository`] implements the ledger's repository traits:
//!
//! - readers are `REPEATABLE READ READ ONLY` transactions, one snapshot each
//! - writers hold a transaction-scoped advisory lock for their lifetime
//! - unique violations surface as `RepositoryError::UniqueViolation`

pub mod config;
pub mod error;
pub mod postgres;
mod row;

pub use config::{StoreConfig, DEFAULT_LOCK_KEY};
pub use error::{StoreError, StoreResult};
pub use postgres::PgLedgerRepository;
