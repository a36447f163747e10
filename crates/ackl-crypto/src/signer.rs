use ackl_types::{rfc3339_nanos, Actor, LedgerRecord};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

/// What the signer is asked to attest: one actor acknowledging one subject.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningRequest {
    pub subject_id: String,
    pub actor: Actor,
    pub signed_at: DateTime<Utc>,
    pub nonce: String,
}

impl SigningRequest {
    /// Rebuild the request a persisted record was signed from.
    pub fn from_record(record: &LedgerRecord) -> Self {
        Self {
            subject_id: record.subject_id.clone(),
            actor: record.actor(),
            signed_at: record.signed_at,
            nonce: record.nonce.clone(),
        }
    }

    /// Canonical bytes covered by the signature.
    pub fn canonical_payload(&self) -> Vec<u8> {
        [
            self.subject_id.as_str(),
            self.actor.id.as_str(),
            self.actor.email.as_str(),
            rfc3339_nanos(&self.signed_at).as_str(),
            self.nonce.as_str(),
        ]
        .join("|")
        .into_bytes()
    }

    /// Hex SHA-256 of the canonical payload.
    pub fn payload_digest(&self) -> String {
        hex::encode(Sha256::digest(self.canonical_payload()))
    }
}

/// Signer output stored on the record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedPayload {
    pub payload_digest: String,
    pub signature_value: String,
}

/// Boundary to whatever produces acknowledgment signatures.
///
/// Implementations may be remote; the ledger never retries a failed call.
#[async_trait]
pub trait Signer: Send + Sync {
    async fn sign(&self, request: &SigningRequest) -> Result<SignedPayload, SignerError>;
}

/// Ed25519 signing key (private).
pub struct SigningKey(ed25519_dalek::SigningKey);

/// Ed25519 verifying key (public).
#[derive(Clone, PartialEq, Eq)]
pub struct VerifyingKey(ed25519_dalek::VerifyingKey);

impl SigningKey {
    /// Generate a new random signing key.
    pub fn generate() -> Self {
        let mut csprng = rand::thread_rng();
        Self(ed25519_dalek::SigningKey::generate(&mut csprng))
    }

    /// Create from raw 32-byte secret.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(ed25519_dalek::SigningKey::from_bytes(&bytes))
    }

    /// Parse a hex-encoded 32-byte secret.
    pub fn from_hex(encoded: &str) -> Result<Self, SignerError> {
        let bytes = hex::decode(encoded.trim()).map_err(|_| SignerError::InvalidKey)?;
        let secret: [u8; 32] = bytes.try_into().map_err(|_| SignerError::InvalidKey)?;
        Ok(Self::from_bytes(secret))
    }

    /// The corresponding public verifying key.
    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey(self.0.verifying_key())
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> ed25519_dalek::Signature {
        use ed25519_dalek::Signer as _;
        self.0.sign(message)
    }

    /// Raw secret key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }
}

impl VerifyingKey {
    /// Verify a signature on a message.
    pub fn verify(
        &self,
        message: &[u8],
        signature: &ed25519_dalek::Signature,
    ) -> Result<(), SignerError> {
        use ed25519_dalek::Verifier;
        self.0
            .verify(message, signature)
            .map_err(|_| SignerError::InvalidSignature)
    }

    /// Raw public key bytes.
    pub fn as_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    /// Create from raw 32-byte public key.
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, SignerError> {
        let key =
            ed25519_dalek::VerifyingKey::from_bytes(&bytes).map_err(|_| SignerError::InvalidKey)?;
        Ok(Self(key))
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SigningKey(<redacted>)")
    }
}

impl std::fmt::Debug for VerifyingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VerifyingKey({})", hex::encode(self.0.to_bytes()))
    }
}

/// Local signer holding the tenant's single Ed25519 identity.
///
/// `payload_digest` is the hex SHA-256 of the canonical payload and
/// `signature_value` the base64 signature over that payload.
#[derive(Debug)]
pub struct Ed25519Signer {
    key: SigningKey,
}

impl Ed25519Signer {
    pub fn new(key: SigningKey) -> Self {
        Self { key }
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }

    fn sign_request(&self, request: &SigningRequest) -> SignedPayload {
        let signature = self.key.sign(&request.canonical_payload());
        SignedPayload {
            payload_digest: request.payload_digest(),
            signature_value: STANDARD.encode(signature.to_bytes()),
        }
    }

    /// Check that a persisted record carries a valid signature by this
    /// signer's key.
    pub fn verify_record(&self, record: &LedgerRecord) -> Result<(), SignerError> {
        verify_record(&self.verifying_key(), record)
    }
}

#[async_trait]
impl Signer for Ed25519Signer {
    async fn sign(&self, request: &SigningRequest) -> Result<SignedPayload, SignerError> {
        Ok(self.sign_request(request))
    }
}

/// Verify a record's payload digest and signature against a public key.
pub fn verify_record(key: &VerifyingKey, record: &LedgerRecord) -> Result<(), SignerError> {
    let request = SigningRequest::from_record(record);
    if request.payload_digest() != record.payload_digest {
        return Err(SignerError::PayloadMismatch);
    }
    let bytes = STANDARD
        .decode(&record.signature_value)
        .map_err(|_| SignerError::InvalidSignature)?;
    let raw: [u8; 64] = bytes
        .try_into()
        .map_err(|_| SignerError::InvalidSignature)?;
    key.verify(
        &request.canonical_payload(),
        &ed25519_dalek::Signature::from_bytes(&raw),
    )
}

/// Errors from signing operations.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum SignerError {
    #[error("signer unavailable: {0}")]
    Unavailable(String),
    #[error("signing request rejected: {0}")]
    Rejected(String),
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid key")]
    InvalidKey,
    #[error("payload digest does not match record contents")]
    PayloadMismatch,
}
