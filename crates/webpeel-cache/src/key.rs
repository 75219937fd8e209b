//! Canonical cache keys.

use sha2::{Digest, Sha256};
use webpeel_types::PeelOptions;

/// A cache key derived from a URL plus every option that changes the
/// rendered output.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Compute the key for a request.
    pub fn compute(url: &str, options: &PeelOptions) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        hasher.update(b"|");
        hasher.update(options.cache_fingerprint().as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
