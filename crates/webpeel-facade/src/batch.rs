//! Batch peeling and same-host crawling.

use crate::WebPeel;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use tracing::{debug, warn};
use url::Url;
use webpeel_types::{PeelError, PeelOptions, PeelResult};

/// In-flight units for library-level batch peels.
const BATCH_CONCURRENCY: usize = 5;

/// Peel a URL list with bounded concurrency. Results are indexed by
/// input position; per-URL failures are returned in place, never fatal.
pub async fn peel_batch(
    service: &WebPeel,
    urls: &[String],
    options: &PeelOptions,
) -> Vec<Result<PeelResult, PeelError>> {
    let mut indexed: Vec<(usize, Result<PeelResult, PeelError>)> =
        stream::iter(urls.iter().cloned().enumerate())
            .map(|(index, url)| async move {
                (index, service.peel(&url, options).await)
            })
            .buffer_unordered(BATCH_CONCURRENCY)
            .collect()
            .await;
    indexed.sort_by_key(|(index, _)| *index);
    indexed.into_iter().map(|(_, result)| result).collect()
}

/// Crawl bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlOptions {
    pub max_pages: usize,
    pub max_depth: usize,
    /// Stay on the seed URL's host.
    pub same_host_only: bool,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            max_pages: 10,
            max_depth: 2,
            same_host_only: true,
        }
    }
}

impl WebPeel {
    /// URL discovery: peel the seed and return its link inventory,
    /// optionally restricted to the seed's host.
    pub async fn map(
        &self,
        seed: &str,
        options: &PeelOptions,
        same_host_only: bool,
    ) -> Result<Vec<String>, PeelError> {
        let seed_url = webpeel_types::validate_url(seed)?;
        let seed_host = seed_url.host_str().map(|h| h.to_string());
        let result = self.peel(seed_url.as_str(), options).await?;
        if !same_host_only {
            return Ok(result.links);
        }
        Ok(result
            .links
            .into_iter()
            .filter(|link| {
                Url::parse(link)
                    .ok()
                    .and_then(|u| u.host_str().map(|h| h.to_string()))
                    == seed_host
            })
            .collect())
    }

    /// Breadth-first crawl from a seed URL, following extracted links.
    /// Page failures are logged and skipped; the crawl continues.
    pub async fn crawl(
        &self,
        seed: &str,
        options: &PeelOptions,
        crawl: &CrawlOptions,
    ) -> Result<Vec<PeelResult>, PeelError> {
        let seed_url = webpeel_types::validate_url(seed)?;
        let seed_host = seed_url.host_str().map(|h| h.to_string());

        let mut queue: VecDeque<(String, usize)> = VecDeque::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut results = Vec::new();
        queue.push_back((seed_url.to_string(), 0));
        seen.insert(seed_url.to_string());

        while let Some((url, depth)) = queue.pop_front() {
            if results.len() >= crawl.max_pages {
                break;
            }
            let result = match self.peel(&url, options).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(%url, error = %e, "crawl page failed; continuing");
                    continue;
                }
            };

            if depth < crawl.max_depth {
                for link in &result.links {
                    if seen.len() >= crawl.max_pages * 4 {
                        break;
                    }
                    if crawl.same_host_only {
                        let keep = Url::parse(link)
                            .ok()
                            .and_then(|u| u.host_str().map(|h| h.to_string()))
                            == seed_host;
                        if !keep {
                            continue;
                        }
                    }
                    if seen.insert(link.clone()) {
                        queue.push_back((link.clone(), depth + 1));
                    }
                }
            }
            debug!(%url, depth, links = result.links.len(), "crawled page");
            results.push(result);
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webpeel_tracking::ChangeTracker;
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

    fn body(inner: &str) -> String {
        format!(
            "<html><body><article><p>Filler prose to pass the main content detector; \
             it needs at least one hundred characters of visible text to accept the \
             region as primary. {}</p></article></body></html>",
            inner
        )
    }

    #[tokio::test]
    async fn batch_results_keep_input_order_with_failures_in_place() {
        let (server, service, _dir) = service().await;
        Mock::given(method("GET"))
            .and(path("/a"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body("page a")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/b"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let urls = vec![
            format!("{}/a", server.uri()),
            format!("{}/b", server.uri()),
            "not-a-url".to_string(),
        ];
        let results = peel_batch(&service, &urls, &PeelOptions::default()).await;
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert!(results[2].is_err());
    }

    #[tokio::test]
    async fn crawl_follows_same_host_links_within_bounds() {
        let (server, service, _dir) = service().await;
        Mock::given(method("GET"))
            .and(path("/start"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body(
                "<a href=\"/next\">next</a> <a href=\"https://elsewhere.com/x\">away</a>",
            )))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/next"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body("terminal page")))
            .mount(&server)
            .await;

        let results = service
            .crawl(
                &format!("{}/start", server.uri()),
                &PeelOptions::default(),
                &CrawlOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[1].url.ends_with("/next"));
    }

    #[tokio::test]
    async fn map_lists_same_host_links() {
        let (server, service, _dir) = service().await;
        Mock::given(method("GET"))
            .and(path("/start"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body(
                "<a href=\"/one\">one</a> <a href=\"https://elsewhere.com/x\">away</a>",
            )))
            .mount(&server)
            .await;

        let seed = format!("{}/start", server.uri());
        let same_host = service
            .map(&seed, &PeelOptions::default(), true)
            .await
            .unwrap();
        assert_eq!(same_host.len(), 1);
        assert!(same_host[0].ends_with("/one"));

        service.cache().clear();
        let all = service
            .map(&seed, &PeelOptions::default(), false)
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn crawl_respects_max_pages() {
        let (server, service, _dir) = service().await;
        // Every page links to two more.
        for i in 0..20 {
            Mock::given(method("GET"))
                .and(path(format!("/p{}", i)))
                .respond_with(ResponseTemplate::new(200).set_body_string(body(&format!(
                    "<a href=\"/p{}\">a</a> <a href=\"/p{}\">b</a>",
                    i * 2 + 1,
                    i * 2 + 2
                ))))
                .mount(&server)
                .await;
        }

        let results = service
            .crawl(
                &format!("{}/p0", server.uri()),
                &PeelOptions::default(),
                &CrawlOptions {
                    max_pages: 3,
                    max_depth: 5,
                    same_host_only: true,
                },
            )
            .await
            .unwrap();
        assert_eq!(results.len(), 3);
    }
}
