//! The WebPeel orchestrator.
//!
//! [`WebPeel`] composes the cache, the tiered fetcher, the extraction
//! pipeline and the change tracker into the single `peel` operation, and
//! layers batch, crawl, deep-fetch and quick-answer flows on top.

mod batch;
mod deep;
mod extract;
mod pipeline;
mod watch_bridge;

pub use batch::{peel_batch, CrawlOptions};
pub use deep::{DeepFetchReport, DeepSource};
pub use extract::ExtractionEngine;

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use webpeel_cache::{CacheConfig, CacheKey, SwrCache};
use webpeel_fetch::{SmartFetchConfig, SmartFetcher};
use webpeel_search::SearchProvider;
use webpeel_tracking::ChangeTracker;
use webpeel_types::{validate_url, PeelError, PeelOptions, PeelResult};

/// How a cache probe resolved, for `X-Cache` reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheDisposition {
    Hit { age_secs: u64 },
    Miss,
}

/// A peel result plus how the cache was involved.
#[derive(Debug, Clone)]
pub struct PeelOutcome {
    pub result: PeelResult,
    pub cache: CacheDisposition,
}

/// The composed service core.
pub struct WebPeel {
    fetcher: Arc<SmartFetcher>,
    cache: Arc<SwrCache<PeelResult>>,
    tracker: Arc<ChangeTracker>,
    search: Option<Arc<dyn SearchProvider>>,
    extraction_engine: Option<Arc<dyn ExtractionEngine>>,
}

/// Builder over the component parts; defaults are production-shaped
/// except for the rendered tiers, which are attached explicitly.
pub struct WebPeelBuilder {
    fetcher: Option<SmartFetcher>,
    cache_config: CacheConfig,
    tracker: Option<ChangeTracker>,
    search: Option<Arc<dyn SearchProvider>>,
    extraction_engine: Option<Arc<dyn ExtractionEngine>>,
}

impl WebPeelBuilder {
    pub fn fetcher(mut self, fetcher: SmartFetcher) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn cache_config(mut self, config: CacheConfig) -> Self {
        self.cache_config = config;
        self
    }

    pub fn tracker(mut self, tracker: ChangeTracker) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn search(mut self, search: Arc<dyn SearchProvider>) -> Self {
        self.search = Some(search);
        self
    }

    pub fn extraction_engine(mut self, engine: Arc<dyn ExtractionEngine>) -> Self {
        self.extraction_engine = Some(engine);
        self
    }

    pub fn build(self) -> Result<WebPeel, PeelError> {
        let fetcher = match self.fetcher {
            Some(fetcher) => fetcher,
            None => SmartFetcher::new(SmartFetchConfig::default(), Duration::from_secs(30))
                .map_err(|e| PeelError::internal(e.to_string()))?,
        };
        Ok(WebPeel {
            fetcher: Arc::new(fetcher),
            cache: Arc::new(SwrCache::new(self.cache_config)),
            tracker: Arc::new(
                self.tracker.unwrap_or_else(ChangeTracker::default_location),
            ),
            search: self.search,
            extraction_engine: self.extraction_engine,
        })
    }
}

impl WebPeel {
    pub fn builder() -> WebPeelBuilder {
        WebPeelBuilder {
            fetcher: None,
            cache_config: CacheConfig::default(),
            tracker: None,
            search: None,
            extraction_engine: None,
        }
    }

    pub fn tracker(&self) -> Arc<ChangeTracker> {
        Arc::clone(&self.tracker)
    }

    pub fn search_provider(&self) -> Option<Arc<dyn SearchProvider>> {
        self.search.clone()
    }

    pub fn cache(&self) -> Arc<SwrCache<PeelResult>> {
        Arc::clone(&self.cache)
    }

    /// Fetch and extract one URL. See the crate docs for the pipeline
    /// stages; this is the primary operation everything else builds on.
    pub async fn peel(&self, url: &str, options: &PeelOptions) -> Result<PeelResult, PeelError> {
        Ok(self.peel_with_cache(url, options).await?.result)
    }

    /// `peel` with the cache disposition attached, for header reporting.
    pub async fn peel_with_cache(
        &self,
        url: &str,
        options: &PeelOptions,
    ) -> Result<PeelOutcome, PeelError> {
        let parsed = validate_url(url)?;
        let url = parsed.to_string();
        let key = CacheKey::compute(&url, options);

        if let Some(hit) = self.cache.lookup(key.as_str()) {
            let age_secs = hit.age.as_secs();
            if hit.stale && self.cache.claim_revalidation(key.as_str()) {
                self.spawn_revalidation(url.clone(), options.clone(), key.clone());
            }
            debug!(%url, stale = hit.stale, "peel served from cache");
            let mut result = hit.value;
            result.method = webpeel_types::FetchMethod::Cached;
            return Ok(PeelOutcome {
                result,
                cache: CacheDisposition::Hit { age_secs },
            });
        }

        let result = pipeline::fetch_and_extract(
            &self.fetcher,
            &self.tracker,
            self.extraction_engine.as_deref(),
            &parsed,
            options,
        )
        .await?;

        self.cache
            .store(key.as_str(), result.clone(), cache_cost(&result));
        Ok(PeelOutcome {
            result,
            cache: CacheDisposition::Miss,
        })
    }

    fn spawn_revalidation(&self, url: String, options: PeelOptions, key: CacheKey) {
        let fetcher = Arc::clone(&self.fetcher);
        let tracker = Arc::clone(&self.tracker);
        let cache = Arc::clone(&self.cache);
        let engine = self.extraction_engine.clone();
        tokio::spawn(async move {
            let parsed = match validate_url(&url) {
                Ok(parsed) => parsed,
                Err(_) => return,
            };
            match pipeline::fetch_and_extract(
                &fetcher,
                &tracker,
                engine.as_deref(),
                &parsed,
                &options,
            )
            .await
            {
                Ok(result) => {
                    let cost = cache_cost(&result);
                    cache.store(key.as_str(), result, cost);
                    debug!(%url, "stale cache entry revalidated");
                }
                Err(e) => {
                    // The stale entry keeps serving; the claim stays held
                    // until a successful store so we do not hammer a
                    // failing origin.
                    warn!(%url, error = %e, "background revalidation failed");
                }
            }
        });
    }
}

fn cache_cost(result: &PeelResult) -> usize {
    result.content.len()
        + result.screenshot.as_ref().map(String::len).unwrap_or(0)
        + result.links.iter().map(String::len).sum::<usize>()
        + 512
}

#[cfg(test)]
mod tests {
    use super::*;
    use webpeel_types::OutputFormat;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn service() -> (MockServer, WebPeel, tempfile::TempDir) {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let service = WebPeel::builder()
            .tracker(ChangeTracker::new(dir.path()))
            .build()
            .unwrap();
        (server, service, dir)
    }

    const PAGE: &str = r#"<html><head><title>Test Page</title>
        <meta property="og:description" content="A test page"></head>
        <body><article><h1>Welcome</h1>
        <p>This article body is long enough to count as main content for
        the detector, with several words of real prose in it and a
        <a href="/next">link onward</a> plus more text to pass the length
        threshold comfortably.</p></article></body></html>"#;

    fn mount_page(server: &MockServer) -> String {
        format!("{}/article", server.uri())
    }

    #[tokio::test]
    async fn peel_extracts_markdown_with_metadata_and_links() {
        let (server, service, _dir) = service().await;
        Mock::given(method("GET"))
            .and(path("/article"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(PAGE)
                    .insert_header("content-type", "text/html"),
            )
            .mount(&server)
            .await;

        let result = service
            .peel(&mount_page(&server), &PeelOptions::default())
            .await
            .unwrap();
        assert_eq!(result.title, "Test Page");
        assert!(result.content.contains("# Welcome"));
        assert_eq!(result.metadata.description.as_deref(), Some("A test page"));
        assert_eq!(result.links.len(), 1);
        assert!(result.links[0].ends_with("/next"));
        assert_eq!(result.fingerprint.len(), 16);
        assert!(result.tokens > 0);
        assert!(result.quality > 0.0);
        assert_eq!(result.status_code, 200);
    }

    #[tokio::test]
    async fn repeat_peel_is_idempotent_and_cache_hits() {
        let (server, service, _dir) = service().await;
        Mock::given(method("GET"))
            .and(path("/article"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .expect(1)
            .mount(&server)
            .await;

        let url = mount_page(&server);
        let first = service
            .peel_with_cache(&url, &PeelOptions::default())
            .await
            .unwrap();
        let second = service
            .peel_with_cache(&url, &PeelOptions::default())
            .await
            .unwrap();
        assert_eq!(first.cache, CacheDisposition::Miss);
        assert!(matches!(second.cache, CacheDisposition::Hit { .. }));
        assert_eq!(second.result.method, webpeel_types::FetchMethod::Cached);
        assert_eq!(first.result.fingerprint, second.result.fingerprint);
        assert_eq!(first.result.links, second.result.links);
    }

    #[tokio::test]
    async fn format_changes_make_distinct_cache_entries() {
        let (server, service, _dir) = service().await;
        Mock::given(method("GET"))
            .and(path("/article"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .expect(2)
            .mount(&server)
            .await;

        let url = mount_page(&server);
        let markdown = service
            .peel(&url, &PeelOptions::default())
            .await
            .unwrap();
        let text = service
            .peel(
                &url,
                &PeelOptions {
                    format: OutputFormat::Text,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_ne!(markdown.content, text.content);
        assert!(!text.content.contains('#'));
    }

    #[tokio::test]
    async fn invalid_urls_fail_fast() {
        let (_server, service, _dir) = service().await;
        let err = service
            .peel("ftp://nope", &PeelOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), "invalid_url");
    }

    #[tokio::test]
    async fn empty_body_produces_empty_result() {
        let (server, service, _dir) = service().await;
        Mock::given(method("GET"))
            .and(path("/article"))
            .respond_with(ResponseTemplate::new(200).set_body_string(""))
            .mount(&server)
            .await;

        let result = service
            .peel(&mount_page(&server), &PeelOptions::default())
            .await
            .unwrap();
        assert!(result.content.is_empty());
        assert!(result.links.is_empty());
        assert_eq!(result.quality, 0.0);
    }

    #[tokio::test]
    async fn change_tracking_reports_new_then_same() {
        let (server, service, _dir) = service().await;
        Mock::given(method("GET"))
            .and(path("/article"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .mount(&server)
            .await;

        let options = PeelOptions {
            change_tracking: true,
            ..Default::default()
        };
        let url = mount_page(&server);
        let first = service.peel(&url, &options).await.unwrap();
        assert_eq!(
            first.change_status.as_ref().unwrap().status,
            webpeel_types::ChangeStatus::New
        );

        // Second fetch must miss the cache to re-track; clear it.
        service.cache().clear();
        let second = service.peel(&url, &options).await.unwrap();
        assert_eq!(
            second.change_status.as_ref().unwrap().status,
            webpeel_types::ChangeStatus::Same
        );
    }

    #[tokio::test]
    async fn selector_restricts_output() {
        let (server, service, _dir) = service().await;
        Mock::given(method("GET"))
            .and(path("/article"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<html><body><h1>Big Title</h1><div class=\"target\">only this</div></body></html>",
            ))
            .mount(&server)
            .await;

        let result = service
            .peel(
                &mount_page(&server),
                &PeelOptions {
                    selector: Some("div.target".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(result.content.contains("only this"));
        assert!(!result.content.contains("Big Title"));
    }
}
