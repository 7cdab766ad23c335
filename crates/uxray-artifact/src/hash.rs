//! Content hashing for persisted payloads
//!
//! Provides [`ContentHash`], a 32-byte Blake3 digest over the compact JSON
//! encoding of an artifact payload. Two payloads with the same hash are
//! byte-identical on the wire.

use serde_json::Value;
use std::fmt::{self, Display, Formatter};

/// A 32-byte content hash (Blake3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Compute Blake3 hash of arbitrary data
    #[inline]
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Hash a JSON payload by its compact encoding
    ///
    /// `serde_json` keeps object keys sorted unless `preserve_order` is on,
    /// so equal values always encode to the same bytes.
    #[must_use]
    pub fn of_value(value: &Value) -> Self {
        Self::compute(value.to_string().as_bytes())
    }

    /// Short string representation (first 16 hex chars)
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl Display for ContentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}
