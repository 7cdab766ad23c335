//! Persisted artifact record
//!
//! An [`Artifact`] couples a key with its JSON payload, the path it was
//! read from or written to, and the payload's content hash.

use crate::hash::ContentHash;
use crate::key::{ArtifactKey, ArtifactKind};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// A derived artifact as stored on disk
///
/// # Invariants
/// - `hash` is always `ContentHash::of_value(&payload)`
/// - Immutable after construction
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    key: ArtifactKey,
    payload: Value,
    hash: ContentHash,
    path: PathBuf,
}

impl Artifact {
    /// Create artifact (computes hash)
    #[must_use]
    pub fn new(key: ArtifactKey, payload: Value, path: impl Into<PathBuf>) -> Self {
        let hash = ContentHash::of_value(&payload);
        Self {
            key,
            payload,
            hash,
            path: path.into(),
        }
    }

    /// Artifact key
    #[inline]
    #[must_use]
    pub fn key(&self) -> &ArtifactKey {
        &self.key
    }

    /// Artifact kind (shortcut for `key().kind()`)
    #[inline]
    #[must_use]
    pub fn kind(&self) -> ArtifactKind {
        self.key.kind()
    }

    /// JSON payload
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Take the payload out
    #[inline]
    #[must_use]
    pub fn into_payload(self) -> Value {
        self.payload
    }

    /// Content hash of the payload
    #[inline]
    #[must_use]
    pub fn hash(&self) -> &ContentHash {
        &self.hash
    }

    /// Absolute storage path
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Pretty JSON bytes, as written to disk
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        // `{:#}` pretty-prints
        format!("{:#}", self.payload).into_bytes()
    }
}
