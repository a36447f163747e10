use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Hashing scheme used for backward links that reference a record.
///
/// The tag is stored on every record. Verification always re-derives a
/// predecessor's hash with the predecessor's own tag, so records written under
/// different schemes coexist in one chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i16", into = "i16")]
pub enum HashAlgorithmVersion {
    /// Legacy pipe-delimited field concatenation.
    V1,
    /// Canonical key-sorted JSON map.
    V2,
}

impl HashAlgorithmVersion {
    /// The scheme applied to newly created records unless configured otherwise.
    pub const CURRENT: Self = Self::V2;

    /// Every known scheme, oldest first.
    pub const ALL: [Self; 2] = [Self::V1, Self::V2];

    /// Integer tag as persisted.
    pub const fn as_i16(self) -> i16 {
        match self {
            Self::V1 => 1,
            Self::V2 => 2,
        }
    }
}

impl Default for HashAlgorithmVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

impl TryFrom<i16> for HashAlgorithmVersion {
    type Error = TypeError;

    fn try_from(tag: i16) -> Result<Self, Self::Error> {
        match tag {
            1 => Ok(Self::V1),
            2 => Ok(Self::V2),
            other => Err(TypeError::UnknownHashVersion(other.into())),
        }
    }
}

impl From<HashAlgorithmVersion> for i16 {
    fn from(version: HashAlgorithmVersion) -> Self {
        version.as_i16()
    }
}

impl FromStr for HashAlgorithmVersion {
    type Err = TypeError;

    /// Accepts `v1`, `V1`, or `1` (and likewise for later versions).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);
        let tag: i16 = digits
            .parse()
            .map_err(|_| TypeError::InvalidVersionLabel(s.to_string()))?;
        Self::try_from(tag)
    }
}

impl fmt::Display for HashAlgorithmVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.as_i16())
    }
}
