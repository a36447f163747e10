//! Foundation types for the Acknowledgment Ledger (ACKL).
//!
//! Every other ACKL crate depends on `ackl-types`.
//!
//! # Key Types
//!
//! - [`LedgerRecord`] -- One persisted acknowledgment, hash-linked to its predecessor
//! - [`NewRecord`] -- A signed acknowledgment awaiting persistence
//! - [`Actor`] -- The person acknowledging a subject
//! - [`Digest`] -- Base64 SHA-256 record digest used as a backward link
//! - [`HashAlgorithmVersion`] -- Closed set of record hashing schemes

pub mod digest;
pub mod error;
pub mod record;
pub mod temporal;
pub mod version;

pub use digest::Digest;
pub use error::TypeError;
pub use record::{Actor, LedgerRecord, NewRecord, RecordId};
pub use temporal::{now_micros, rfc3339_nanos, truncate_to_micros};
pub use version::HashAlgorithmVersion;
