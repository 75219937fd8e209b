//! Last-resort fetch sources tried when every tier is blocked:
//! a Cloudflare-worker proxy, the PeelTLS rotating-fingerprint relay and
//! the Google Cache mirror.

use crate::challenge::looks_like_challenge;
use crate::client::http_client;
use crate::error::FetchError;
use crate::FetchStrategy;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use webpeel_types::{FetchMethod, FetchResult, PeelOptions};

const FALLBACK_TIMEOUT: Duration = Duration::from_secs(20);

/// Relay response shape shared by the worker proxy and PeelTLS relay.
#[derive(Debug, Deserialize)]
struct RelayResponse {
    html: String,
    #[serde(default)]
    status: Option<u16>,
    #[serde(default)]
    edge: Option<String>,
}

/// Proxy fetch through a deployed Cloudflare worker.
pub struct CfWorkerFetcher {
    worker_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl CfWorkerFetcher {
    pub fn new(worker_url: String, token: Option<String>) -> Result<Self, FetchError> {
        Ok(Self {
            worker_url,
            token,
            client: http_client(FALLBACK_TIMEOUT)?,
        })
    }
}

#[async_trait]
impl FetchStrategy for CfWorkerFetcher {
    fn name(&self) -> &'static str {
        "cf-worker"
    }

    fn method(&self) -> FetchMethod {
        FetchMethod::CfWorker
    }

    async fn fetch(&self, url: &str, _options: &PeelOptions) -> Result<FetchResult, FetchError> {
        let mut request = self.client.get(&self.worker_url).query(&[("url", url)]);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;
        let status = response.status().as_u16();
        if status >= 400 {
            return Err(FetchError::UpstreamStatus {
                url: url.to_string(),
                status,
            });
        }
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        // Workers respond with JSON when healthy; raw HTML is accepted
        // for older deployments.
        let (html, upstream_status, edge) = match serde_json::from_str::<RelayResponse>(&body) {
            Ok(relay) => (relay.html, relay.status.unwrap_or(200), relay.edge),
            Err(_) => (body, 200, None),
        };
        if html.trim().is_empty() {
            return Err(FetchError::Rejected {
                strategy: "cf-worker",
                url: url.to_string(),
            });
        }
        let challenge = looks_like_challenge(&html, upstream_status);
        Ok(FetchResult {
            url: url.to_string(),
            html,
            status_code: upstream_status,
            content_type: Some("text/html".to_string()),
            method: FetchMethod::CfWorker,
            challenge_detected: challenge,
            edge,
            screenshot: None,
        })
    }
}

/// Fetch through the PeelTLS relay, which rotates JA3/TLS fingerprints
/// per request.
pub struct PeelTlsFetcher {
    endpoint: String,
    client: reqwest::Client,
}

impl PeelTlsFetcher {
    pub fn new(endpoint: String) -> Result<Self, FetchError> {
        Ok(Self {
            endpoint,
            client: http_client(FALLBACK_TIMEOUT)?,
        })
    }
}

#[async_trait]
impl FetchStrategy for PeelTlsFetcher {
    fn name(&self) -> &'static str {
        "peeltls"
    }

    fn method(&self) -> FetchMethod {
        FetchMethod::PeelTls
    }

    async fn fetch(&self, url: &str, _options: &PeelOptions) -> Result<FetchResult, FetchError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("url", url)])
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;
        let status = response.status().as_u16();
        if status >= 400 {
            return Err(FetchError::UpstreamStatus {
                url: url.to_string(),
                status,
            });
        }
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;
        let (html, upstream_status, edge) = match serde_json::from_str::<RelayResponse>(&body) {
            Ok(relay) => (relay.html, relay.status.unwrap_or(200), relay.edge),
            Err(_) => (body, 200, None),
        };
        if html.trim().is_empty() {
            return Err(FetchError::Rejected {
                strategy: "peeltls",
                url: url.to_string(),
            });
        }
        let challenge = looks_like_challenge(&html, upstream_status);
        Ok(FetchResult {
            url: url.to_string(),
            html,
            status_code: upstream_status,
            content_type: Some("text/html".to_string()),
            method: FetchMethod::PeelTls,
            challenge_detected: challenge,
            edge,
            screenshot: None,
        })
    }
}

const GOOGLE_CACHE_BASE: &str = "https://webcache.googleusercontent.com/search";

/// Minimum body size for a cache hit to be believable.
const MIN_CACHE_BODY: usize = 2_000;

/// Scrape the Google Cache copy of a page, with strict validation so a
/// challenge redirect or empty result page is never mistaken for content.
pub struct GoogleCacheFetcher {
    base: String,
    client: reqwest::Client,
}

impl GoogleCacheFetcher {
    pub fn new() -> Result<Self, FetchError> {
        Self::with_base(GOOGLE_CACHE_BASE.to_string())
    }

    /// Base override for tests.
    pub fn with_base(base: String) -> Result<Self, FetchError> {
        Ok(Self {
            base,
            client: http_client(FALLBACK_TIMEOUT)?,
        })
    }

    fn validate(url: &str, html: &str) -> Result<(), FetchError> {
        let rejected = || FetchError::Rejected {
            strategy: "google-cache",
            url: url.to_string(),
        };
        if html.len() < MIN_CACHE_BODY {
            return Err(rejected());
        }
        if html.contains("did not match any documents") {
            return Err(rejected());
        }
        if looks_like_challenge(html, 200) || html.contains("document.location.replace") {
            return Err(rejected());
        }
        let has_banner = html.contains("This is Google's cache of")
            || html.contains("googleusercontent.com");
        if !has_banner {
            return Err(rejected());
        }
        Ok(())
    }
}

#[async_trait]
impl FetchStrategy for GoogleCacheFetcher {
    fn name(&self) -> &'static str {
        "google-cache"
    }

    fn method(&self) -> FetchMethod {
        FetchMethod::GoogleCache
    }

    async fn fetch(&self, url: &str, _options: &PeelOptions) -> Result<FetchResult, FetchError> {
        let response = self
            .client
            .get(&self.base)
            .query(&[("q", format!("cache:{}", url))])
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;
        let status = response.status().as_u16();
        if status >= 400 {
            return Err(FetchError::UpstreamStatus {
                url: url.to_string(),
                status,
            });
        }
        let html = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;
        Self::validate(url, &html)?;
        debug!(url, "serving google cache copy");
        Ok(FetchResult {
            url: url.to_string(),
            html,
            status_code: 200,
            content_type: Some("text/html".to_string()),
            method: FetchMethod::GoogleCache,
            challenge_detected: false,
            edge: None,
            screenshot: None,
        })
    }
}
