//! Canonical object identity
//!
//! An [`ObjectId`] is the only dedup key used by the engine: change records,
//! resolution targets, resolved documents and the final removal/upsert
//! reduction are all keyed by it. It is derived from `(codename, language)`
//! alone, so re-indexing the same content always lands on the same index row.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Number of digest bytes kept in the hex identifier (128 bits).
const OBJECT_ID_BYTES: usize = 16;

/// Stable index identity of one `(codename, language)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    /// Wrap an identifier that was already derived (e.g. read back from the index).
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ObjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derive the ObjectId for a codename/language pair.
///
/// The codename is length-prefixed before hashing so that no two distinct
/// pairs share a preimage (`("ab", "c")` vs `("a", "bc")`).
pub fn object_id(codename: &str, language: &str) -> ObjectId {
    let mut hasher = Sha256::new();
    hasher.update(codename.len().to_string().as_bytes());
    hasher.update(b":");
    hasher.update(codename.as_bytes());
    hasher.update(language.as_bytes());
    let digest = hasher.finalize();

    let hex = digest[..OBJECT_ID_BYTES]
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<String>();
    ObjectId(hex)
}

/// A codename/language pair together with its derived identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectKey {
    pub object_id: ObjectId,
    pub codename: String,
    pub language: String,
}

impl ObjectKey {
    pub fn new(codename: impl Into<String>, language: impl Into<String>) -> Self {
        let codename = codename.into();
        let language = language.into();
        Self {
            object_id: object_id(&codename, &language),
            codename,
            language,
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.codename, self.language)
    }
}
