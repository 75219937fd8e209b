//! Deep fetch: search → peel the top hits → heuristic synthesis.

use crate::batch::peel_batch;
use crate::WebPeel;
use serde::{Deserialize, Serialize};
use tracing::debug;
use webpeel_extraction::heuristics::{
    detect_comparison, extract_dates, extract_entities, extract_key_points, extract_numbers,
    quick_answer, ComparisonTable, NumberFacts, QuickAnswer,
};
use webpeel_types::{PeelError, PeelOptions, PeelResult};

/// How many search hits deep fetch reads.
const DEEP_FETCH_SOURCES: usize = 5;
/// Key points pulled per report.
const KEY_POINT_LIMIT: usize = 10;

/// One source consulted by a deep fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeepSource {
    pub url: String,
    pub title: String,
}

/// Synthesized multi-source answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeepFetchReport {
    pub query: String,
    pub sources: Vec<DeepSource>,
    pub key_points: Vec<String>,
    pub entities: Vec<String>,
    pub numbers: NumberFacts,
    pub dates: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<ComparisonTable>,
}

impl WebPeel {
    /// Search the query, peel the top hits, and synthesize key points,
    /// entities, numeric facts and (when the query compares things) a
    /// comparison table.
    pub async fn deep_fetch(
        &self,
        query: &str,
        options: &PeelOptions,
    ) -> Result<DeepFetchReport, PeelError> {
        let provider = self.search_provider().ok_or_else(|| {
            PeelError::invalid_request("deep fetch requires a configured search provider")
        })?;
        let hits = provider
            .search(query, DEEP_FETCH_SOURCES as u32)
            .await
            .map_err(|e| PeelError::internal(format!("search failed: {}", e)))?;
        if hits.is_empty() {
            return Ok(DeepFetchReport {
                query: query.to_string(),
                sources: Vec::new(),
                key_points: Vec::new(),
                entities: Vec::new(),
                numbers: NumberFacts::default(),
                dates: Vec::new(),
                comparison: None,
            });
        }

        let urls: Vec<String> = hits.iter().map(|h| h.url.clone()).collect();
        let peeled: Vec<PeelResult> = peel_batch(self, &urls, options)
            .await
            .into_iter()
            .filter_map(Result::ok)
            .collect();
        debug!(query, sources = peeled.len(), "deep fetch gathered sources");

        let combined: String = peeled
            .iter()
            .map(|p| p.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let contents: Vec<&str> = peeled.iter().map(|p| p.content.as_str()).collect();

        Ok(DeepFetchReport {
            query: query.to_string(),
            sources: peeled
                .iter()
                .map(|p| DeepSource {
                    url: p.url.clone(),
                    title: p.title.clone(),
                })
                .collect(),
            key_points: extract_key_points(&combined, query, KEY_POINT_LIMIT),
            entities: extract_entities(&contents),
            numbers: extract_numbers(&combined),
            dates: extract_dates(&combined),
            comparison: detect_comparison(query, &combined),
        })
    }

    /// Answer a question against one fetched page.
    pub async fn quick_answer(
        &self,
        question: &str,
        url: &str,
        options: &PeelOptions,
    ) -> Result<(QuickAnswer, PeelResult), PeelError> {
        let result = self.peel(url, options).await?;
        let answer = quick_answer(question, &result.content, None);
        Ok((answer, result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WebPeel;
    use std::sync::Arc;
    use webpeel_search::{SearchBackend, SearchHit, SearchProvider};
    use webpeel_tracking::ChangeTracker;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct FixedSearch {
        hits: Vec<SearchHit>,
    }

    #[async_trait::async_trait]
    impl SearchProvider for FixedSearch {
        fn backend(&self) -> SearchBackend {
            SearchBackend::None
        }

        async fn search(&self, _query: &str, _limit: u32) -> anyhow::Result<Vec<SearchHit>> {
            Ok(self.hits.clone())
        }
    }

    #[tokio::test]
    async fn deep_fetch_synthesizes_across_sources() {
        let server = MockServer::start().await;
        let page = "<html><body><article><p>Rust Foundation announced that adoption grew 45% \
            this year, an important milestone for the ecosystem and for memory safety work \
            across the industry. Rust Foundation members shipped updates on March 5, 2024.</p>\
            </article></body></html>";
        Mock::given(method("GET"))
            .and(path("/a"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/b"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let service = WebPeel::builder()
            .tracker(ChangeTracker::new(dir.path()))
            .search(Arc::new(FixedSearch {
                hits: vec![
                    SearchHit {
                        title: "A".into(),
                        url: format!("{}/a", server.uri()),
                        snippet: String::new(),
                    },
                    SearchHit {
                        title: "B".into(),
                        url: format!("{}/b", server.uri()),
                        snippet: String::new(),
                    },
                ],
            }))
            .build()
            .unwrap();

        let report = service
            .deep_fetch("rust adoption growth", &PeelOptions::default())
            .await
            .unwrap();
        assert_eq!(report.sources.len(), 2);
        assert!(!report.key_points.is_empty());
        assert!(report.entities.iter().any(|e| e.contains("Rust")));
        assert_eq!(report.numbers.percentages, vec!["45%".to_string()]);
        assert_eq!(report.dates, vec!["March 5, 2024".to_string()]);
    }

    #[tokio::test]
    async fn deep_fetch_without_provider_is_an_invalid_request() {
        let dir = tempfile::tempdir().unwrap();
        let service = WebPeel::builder()
            .tracker(ChangeTracker::new(dir.path()))
            .build()
            .unwrap();
        let err = service
            .deep_fetch("anything", &PeelOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), "invalid_request");
    }

    #[tokio::test]
    async fn quick_answer_runs_over_peeled_content() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/doc"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<html><body><article><p>WebPeel is a content extraction service built for \
                 AI pipelines and automated research tools across the industry. It was \
                 released in 2021 after a year of beta testing with design partners.</p>\
                 </article></body></html>",
            ))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let service = WebPeel::builder()
            .tracker(ChangeTracker::new(dir.path()))
            .build()
            .unwrap();
        let (answer, _page) = service
            .quick_answer(
                "what is WebPeel",
                &format!("{}/doc", server.uri()),
                &PeelOptions::default(),
            )
            .await
            .unwrap();
        assert!(answer.best().unwrap().contains("extraction service"));
        assert!(answer.confidence > 0.0);
    }
}
