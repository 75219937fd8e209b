//! Keyless fallback: interpret the query as a whitespace-separated URL
//! list instead of searching.

use crate::{SearchBackend, SearchHit, SearchProvider};
use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

/// URL-parsing pseudo-provider for deployments without a search key.
pub struct NoneProvider;

#[async_trait]
impl SearchProvider for NoneProvider {
    fn backend(&self) -> SearchBackend {
        SearchBackend::None
    }

    async fn search(&self, query: &str, limit: u32) -> Result<Vec<SearchHit>> {
        let hits: Vec<SearchHit> = query
            .split_whitespace()
            .filter_map(|token| url::Url::parse(token).ok())
            .filter(|u| matches!(u.scheme(), "http" | "https"))
            .take(limit as usize)
            .map(|u| SearchHit {
                title: u.host_str().unwrap_or("").to_string(),
                url: u.to_string(),
                snippet: String::new(),
            })
            .collect();
        debug!(count = hits.len(), "none provider parsed URLs from query");
        Ok(hits)
    }
}
