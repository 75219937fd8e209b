//! Serper.dev search backend.

use crate::{SearchBackend, SearchHit, SearchProvider};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

const SERPER_ENDPOINT: &str = "https://google.serper.dev/search";

/// Google search via the Serper.dev API.
pub struct SerperProvider {
    api_key: String,
    endpoint: String,
    client: reqwest::Client,
}

impl SerperProvider {
    pub fn new(api_key: String) -> Result<Self> {
        Self::with_endpoint(api_key, SERPER_ENDPOINT.to_string())
    }

    /// Endpoint override for tests.
    pub fn with_endpoint(api_key: String, endpoint: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .context("failed to build search client")?;
        Ok(Self {
            api_key,
            endpoint,
            client,
        })
    }
}

#[async_trait]
impl SearchProvider for SerperProvider {
    fn backend(&self) -> SearchBackend {
        SearchBackend::Serper
    }

    async fn search(&self, query: &str, limit: u32) -> Result<Vec<SearchHit>> {
        if query.trim().is_empty() {
            return Err(anyhow!("search query cannot be empty"));
        }
        let limit = limit.clamp(1, 100);

        let response = self
            .client
            .post(&self.endpoint)
            .header("X-API-KEY", &self.api_key)
            .json(&serde_json::json!({ "q": query, "num": limit }))
            .send()
            .await
            .context("serper request failed")?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "serper returned {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            ));
        }

        let body: Value = response.json().await.context("serper response not JSON")?;
        let hits = body["organic"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .take(limit as usize)
                    .filter_map(|item| {
                        Some(SearchHit {
                            title: item["title"].as_str()?.to_string(),
                            url: item["link"].as_str()?.to_string(),
                            snippet: item["snippet"].as_str().unwrap_or("").to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn parses_organic_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("X-API-KEY", "k"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"organic":[
                    {"title":"A","link":"https://a.com","snippet":"first"},
                    {"title":"B","link":"https://b.com"}
                ]}"#,
            ))
            .mount(&server)
            .await;

        let provider = SerperProvider::with_endpoint("k".into(), server.uri()).unwrap();
        let hits = provider.search("rust", 10).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].url, "https://a.com");
        assert_eq!(hits[1].snippet, "");
    }

    #[tokio::test]
    async fn empty_queries_are_rejected() {
        let provider = SerperProvider::with_endpoint("k".into(), "http://unused".into()).unwrap();
        assert!(provider.search("  ", 5).await.is_err());
    }

    #[tokio::test]
    async fn upstream_errors_surface() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("bad key"))
            .mount(&server)
            .await;

        let provider = SerperProvider::with_endpoint("k".into(), server.uri()).unwrap();
        assert!(provider.search("rust", 5).await.is_err());
    }
}
