//! Tamper-evident acknowledgment ledger.
//!
//! Every acknowledgment is a signed record carrying the hash of its
//! predecessor, so any later edit breaks the chain at a detectable point.
//! This crate provides:
//! - `LedgerReader` / `LedgerWriter` / `LedgerRepository` transaction boundaries
//! - `InMemoryLedgerRepository` for tests and embedding
//! - `ChainLinker`, `ChainIntegrityVerifier`, `ChainRebuilder`
//! - `HashVersionMigrator` for moving records between hash schemes
//! - `AcknowledgmentService`, the signing and append entry point

pub mod config;
pub mod error;
pub mod linker;
pub mod memory;
pub mod migration;
pub mod rebuild;
pub mod service;
pub mod traits;
pub mod verifier;

pub use config::LedgerConfig;
pub use error::{LedgerError, RepositoryError};
pub use linker::ChainLinker;
pub use memory::InMemoryLedgerRepository;
pub use migration::{HashVersionMigrator, MigrationReport};
pub use rebuild::{ChainRebuilder, LinkCorrection, RebuildReport};
pub use service::{AcknowledgmentService, AcknowledgmentStatus};
pub use traits::{LedgerReader, LedgerRepository, LedgerWriter};
pub use verifier::{ChainBreakKind, ChainIntegrityVerifier, IntegrityResult};
