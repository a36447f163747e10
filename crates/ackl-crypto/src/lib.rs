//! Cryptographic primitives for the Acknowledgment Ledger.
//!
//! Provides versioned SHA-256 record hashing for backward links, the
//! [`Signer`] boundary with a local Ed25519 implementation, and nonce
//! generation.

pub mod hasher;
pub mod nonce;
pub mod signer;

pub use hasher::{HasherError, RecordHasher};
pub use nonce::generate_nonce;
pub use signer::{
    verify_record, Ed25519Signer, SignedPayload, Signer, SignerError, SigningKey, SigningRequest,
    VerifyingKey,
};
