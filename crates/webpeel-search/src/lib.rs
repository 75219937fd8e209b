//! Search provider abstraction.
//!
//! The service needs a web-search capability for deep fetch and the
//! `/v1/search` surface; providers implement [`SearchProvider`] and the
//! factory picks one from configuration. Keyless deployments get
//! [`NoneProvider`], which treats the query as a URL list.

mod none_provider;
mod serper;

pub use none_provider::NoneProvider;
pub use serper::SerperProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One search result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Which backend the factory selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchBackend {
    Serper,
    None,
}

/// A pluggable search backend.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn backend(&self) -> SearchBackend;

    /// Run a query, returning up to `limit` hits.
    async fn search(&self, query: &str, limit: u32) -> anyhow::Result<Vec<SearchHit>>;
}

/// Select a provider from the optional Serper API key.
pub fn create_provider(serper_api_key: Option<String>) -> anyhow::Result<Arc<dyn SearchProvider>> {
    match serper_api_key.filter(|k| !k.trim().is_empty()) {
        Some(key) => Ok(Arc::new(SerperProvider::new(key)?)),
        None => Ok(Arc::new(NoneProvider)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_picks_none_without_a_key() {
        let provider = create_provider(None).unwrap();
        assert_eq!(provider.backend(), SearchBackend::None);
        let provider = create_provider(Some("  ".into())).unwrap();
        assert_eq!(provider.backend(), SearchBackend::None);
    }

    #[test]
    fn factory_picks_serper_with_a_key() {
        let provider = create_provider(Some("key".into())).unwrap();
        assert_eq!(provider.backend(), SearchBackend::Serper);
    }
}
