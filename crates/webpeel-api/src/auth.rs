//! API-key authentication.
//!
//! Keys are only ever stored and compared as SHA-256 hashes. Requests
//! present the plaintext via `Authorization: Bearer` or `X-API-Key`.

use async_trait::async_trait;
use axum::extract::Request;
use axum::http::header::AUTHORIZATION;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use sqlx::postgres::PgPool;
use sqlx::Row;
use std::sync::Arc;

/// An authenticated key identity attached to the request.
#[derive(Debug, Clone)]
pub struct ApiKeyIdentity {
    /// The key row id; also the quota accounting id.
    pub key_id: String,
    pub account_id: String,
}

/// Lookup of key hashes.
#[async_trait]
pub trait KeyStore: Send + Sync {
    async fn lookup(&self, key_hash: &str) -> Option<ApiKeyIdentity>;
}

pub fn hash_key(plaintext: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(plaintext.as_bytes());
    hex::encode(hasher.finalize())
}

/// Pull the presented key out of the request headers.
pub fn presented_key(request: &Request) -> Option<String> {
    if let Some(value) = request.headers().get(AUTHORIZATION) {
        if let Ok(value) = value.to_str() {
            if let Some(token) = value.strip_prefix("Bearer ") {
                return Some(token.trim().to_string());
            }
        }
    }
    request
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// In-memory store seeded from configuration (development and tests).
#[derive(Default)]
pub struct MemoryKeyStore {
    keys: DashMap<String, ApiKeyIdentity>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plaintext key; only its hash is retained.
    pub fn insert_plaintext(&self, plaintext: &str, account_id: &str) {
        let hash = hash_key(plaintext);
        self.keys.insert(
            hash.clone(),
            ApiKeyIdentity {
                key_id: hash,
                account_id: account_id.to_string(),
            },
        );
    }

    pub fn seeded(keys: &[String]) -> Arc<Self> {
        let store = Self::new();
        for (i, key) in keys.iter().enumerate() {
            store.insert_plaintext(key, &format!("dev-account-{}", i));
        }
        Arc::new(store)
    }
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    async fn lookup(&self, key_hash: &str) -> Option<ApiKeyIdentity> {
        self.keys.get(key_hash).map(|k| k.clone())
    }
}

/// Postgres-backed key store.
pub struct PgKeyStore {
    pool: PgPool,
}

impl PgKeyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KeyStore for PgKeyStore {
    async fn lookup(&self, key_hash: &str) -> Option<ApiKeyIdentity> {
        sqlx::query("SELECT id, user_id FROM api_keys WHERE key_hash = $1 AND revoked_at IS NULL")
            .bind(key_hash)
            .fetch_optional(&self.pool)
            .await
            .ok()
            .flatten()
            .map(|row| ApiKeyIdentity {
                key_id: row.get("id"),
                account_id: row.get("user_id"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashing_is_stable_sha256() {
        assert_eq!(
            hash_key("secret"),
            "2bb80d537b1da3e38bd30361aa855686bde0eacd7162fef6a25fe97bf527a25b"
        );
    }

    #[tokio::test]
    async fn memory_store_only_matches_hashed_keys() {
        let store = MemoryKeyStore::new();
        store.insert_plaintext("pk-live-1", "acct-1");
        assert!(store.lookup(&hash_key("pk-live-1")).await.is_some());
        assert!(store.lookup("pk-live-1").await.is_none());
        assert!(store.lookup(&hash_key("other")).await.is_none());
    }
}
