//! Change-detection fingerprints
//!
//! Provides [`Fingerprint`], a 32-byte Blake3 digest over the scene fields
//! whose change must be written back to the store.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// A 32-byte fingerprint (Blake3) of a scene's mutable state
///
/// Covers availability, footprint presence and the thumbnail reference.
/// Two observations with equal fingerprints never produce a store write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Create fingerprint from byte slice
    ///
    /// # Errors
    /// Returns error if slice length is not exactly 32 bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, FingerprintError> {
        if bytes.len() != 32 {
            return Err(FingerprintError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }

    /// Fingerprint the change-relevant state of a scene
    ///
    /// Field boundaries are tagged so `None` and `Some("")` hash differently.
    #[must_use]
    pub fn of(available: bool, has_footprint: bool, thumbnail_url: Option<&str>) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&[u8::from(available), u8::from(has_footprint)]);
        match thumbnail_url {
            Some(url) => {
                hasher.update(&[1]);
                hasher.update(url.as_bytes());
            }
            None => {
                hasher.update(&[0]);
            }
        }
        Self(*hasher.finalize().as_bytes())
    }

    /// Blake3 digest of arbitrary bytes
    ///
    /// Used by the store journal to checksum committed batches.
    #[inline]
    #[must_use]
    pub fn digest(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Short string representation (first 16 hex chars)
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for Fingerprint {
    type Err = FingerprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        Self::from_slice(&bytes)
    }
}

// Stored records are JSON, so the fingerprint always travels as hex.
impl serde::Serialize for Fingerprint {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for Fingerprint {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Errors that can occur when decoding fingerprints
#[derive(Debug, thiserror::Error)]
pub enum FingerprintError {
    /// Invalid digest length
    #[error("invalid fingerprint length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// Hex encoding error
    #[error("hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),
}
