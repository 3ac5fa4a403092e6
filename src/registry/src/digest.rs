//! SHA-256 content digests.
//!
//! A digest is 64 lowercase hex characters. On the wire (descriptors,
//! manifests, index.json) it carries the `sha256:` prefix; on disk the
//! bare hex names the blob file.

use std::fmt;

use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use sha2::{Digest as _, Sha256};

use chartcask_core::{CaskError, Result};

const PREFIX: &str = "sha256:";
const HEX_LEN: usize = 64;

/// A SHA-256 digest identifying a blob's content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest(String);

impl Digest {
    /// Compute the digest of a byte slice.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Digest(hex::encode(hasher.finalize()))
    }

    /// Parse a digest from its bare-hex or `sha256:`-prefixed form.
    pub fn parse(s: &str) -> Result<Self> {
        let hex = s.strip_prefix(PREFIX).unwrap_or(s);
        if hex.len() != HEX_LEN
            || !hex
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        {
            return Err(CaskError::Serialization(format!(
                "invalid sha256 digest: {s:?}"
            )));
        }
        Ok(Digest(hex.to_string()))
    }

    /// Bare hex form, used for blob file names.
    pub fn hex(&self) -> &str {
        &self.0
    }

    /// `sha256:`-prefixed wire form.
    pub fn prefixed(&self) -> String {
        format!("{PREFIX}{}", self.0)
    }

    /// First 7 hex characters, for human-readable listings.
    pub fn short(&self) -> &str {
        &self.0[..7]
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{PREFIX}{}", self.0)
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.prefixed())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Digest::parse(&s).map_err(de::Error::custom)
    }
}
