use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Base64-encoded SHA-256 digest of a ledger record.
///
/// Stored on the successor record as its backward link. The value is opaque
/// text; equality is exact string equality.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Digest(String);

impl Digest {
    /// Wrap an already-encoded digest.
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// Wrap an encoded digest, rejecting empty input.
    pub fn parse(encoded: &str) -> Result<Self, TypeError> {
        if encoded.is_empty() {
            return Err(TypeError::EmptyDigest);
        }
        Ok(Self(encoded.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, for log lines and terminal output.
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(8)
            .map(|(idx, _)| idx)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.short())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Digest {
    fn from(encoded: String) -> Self {
        Self(encoded)
    }
}

impl AsRef<str> for Digest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
