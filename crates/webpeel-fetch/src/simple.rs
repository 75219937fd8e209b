//! Simple HTTP fetch tier.

use crate::challenge::looks_like_challenge;
use crate::client::{decode_body, http_client, proxied_client};
use crate::error::FetchError;
use crate::pdf::{is_pdf_content_type, pdf_to_html};
use crate::FetchStrategy;
use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue, COOKIE, USER_AGENT};
use std::time::Duration;
use tracing::{debug, warn};
use webpeel_types::{FetchMethod, FetchResult, PeelOptions};

/// Base delay for transient-error backoff.
const BACKOFF_BASE_MS: u64 = 500;
const BACKOFF_FACTOR: u32 = 2;
const MAX_ATTEMPTS: u32 = 3;

/// Raw HTTP GET with browser-grade headers, charset-aware decoding and a
/// direct PDF path.
pub struct SimpleFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl SimpleFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        Ok(Self {
            client: http_client(timeout)?,
            timeout,
        })
    }

    async fn attempt(
        &self,
        url: &str,
        options: &PeelOptions,
        proxy: Option<&str>,
    ) -> Result<FetchResult, FetchError> {
        let one_off;
        let client = match proxy {
            Some(p) => {
                one_off = proxied_client(self.timeout, p)?;
                &one_off
            }
            None => &self.client,
        };

        let mut request = client.get(url);
        if let Some(ua) = &options.user_agent {
            request = request.header(USER_AGENT, ua);
        }
        for (name, value) in &options.headers {
            let (Ok(name), Ok(value)) = (
                name.parse::<HeaderName>(),
                HeaderValue::from_str(value),
            ) else {
                warn!(header = %name, "skipping unrepresentable request header");
                continue;
            };
            request = request.header(name, value);
        }
        if !options.cookies.is_empty() {
            if let Ok(value) = HeaderValue::from_str(&options.cookies.join("; ")) {
                request = request.header(COOKIE, value);
            }
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        if status >= 500 {
            return Err(FetchError::UpstreamStatus { url: final_url, status });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        if is_pdf_content_type(content_type.as_deref()) {
            let html = pdf_to_html(&final_url, &bytes)?;
            return Ok(FetchResult {
                url: final_url,
                html,
                status_code: status,
                content_type,
                method: FetchMethod::Simple,
                challenge_detected: false,
                edge: None,
                screenshot: None,
            });
        }

        let html = decode_body(&bytes, content_type.as_deref());
        let challenge = looks_like_challenge(&html, status);
        Ok(FetchResult {
            url: final_url,
            html,
            status_code: status,
            content_type,
            method: FetchMethod::Simple,
            challenge_detected: challenge,
            edge: None,
            screenshot: None,
        })
    }
}

#[async_trait]
impl FetchStrategy for SimpleFetcher {
    fn name(&self) -> &'static str {
        "simple"
    }

    fn method(&self) -> FetchMethod {
        FetchMethod::Simple
    }

    /// GET with up to three attempts; only transient network failures are
    /// retried. 4xx responses come back as results, not errors.
    async fn fetch(&self, url: &str, options: &PeelOptions) -> Result<FetchResult, FetchError> {
        let proxy_pool: Vec<&str> = options
            .proxy
            .iter()
            .map(String::as_str)
            .chain(options.proxies.iter().map(String::as_str))
            .collect();

        let mut last_error = None;
        for attempt in 0..MAX_ATTEMPTS {
            let proxy = (!proxy_pool.is_empty())
                .then(|| proxy_pool[attempt as usize % proxy_pool.len()]);
            match self.attempt(url, options, proxy).await {
                Ok(result) => {
                    if attempt > 0 {
                        debug!(url, attempt = attempt + 1, "simple fetch succeeded after retry");
                    }
                    return Ok(result);
                }
                Err(e) if e.is_transient() && attempt + 1 < MAX_ATTEMPTS => {
                    let delay = BACKOFF_BASE_MS * u64::from(BACKOFF_FACTOR.pow(attempt));
                    debug!(url, attempt = attempt + 1, delay_ms = delay, error = %e, "retrying after transient error");
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error.unwrap_or(FetchError::Timeout {
            url: url.to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> SimpleFetcher {
        SimpleFetcher::new(Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn fetches_html_with_status_and_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<html><body>hello</body></html>")
                    .insert_header("content-type", "text/html; charset=utf-8"),
            )
            .mount(&server)
            .await;

        let result = fetcher()
            .fetch(&format!("{}/page", server.uri()), &PeelOptions::default())
            .await
            .unwrap();
        assert_eq!(result.status_code, 200);
        assert_eq!(result.method, FetchMethod::Simple);
        assert!(result.html.contains("hello"));
        assert!(!result.challenge_detected);
    }

    #[tokio::test]
    async fn not_found_is_returned_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("nope"))
            .expect(1)
            .mount(&server)
            .await;

        let result = fetcher()
            .fetch(&format!("{}/missing", server.uri()), &PeelOptions::default())
            .await
            .unwrap();
        assert_eq!(result.status_code, 404);
    }

    #[tokio::test]
    async fn server_errors_escalate_as_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = fetcher()
            .fetch(&format!("{}/down", server.uri()), &PeelOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::UpstreamStatus { status: 503, .. }));
    }

    #[tokio::test]
    async fn challenge_pages_are_flagged() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/guarded"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<html><head><title>Just a moment...</title></head><body></body></html>",
            ))
            .mount(&server)
            .await;

        let result = fetcher()
            .fetch(&format!("{}/guarded", server.uri()), &PeelOptions::default())
            .await
            .unwrap();
        assert!(result.challenge_detected);
    }

    #[tokio::test]
    async fn custom_headers_and_user_agent_are_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/echo"))
            .and(header("x-custom", "yes"))
            .and(header("user-agent", "custom-agent/2.0"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let options = PeelOptions {
            user_agent: Some("custom-agent/2.0".into()),
            headers: [("x-custom".to_string(), "yes".to_string())].into(),
            ..Default::default()
        };
        let result = fetcher()
            .fetch(&format!("{}/echo", server.uri()), &options)
            .await
            .unwrap();
        assert_eq!(result.status_code, 200);
    }

    #[tokio::test]
    async fn pdf_responses_take_the_pdf_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/doc.pdf"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(b"garbage".to_vec())
                    .insert_header("content-type", "application/pdf"),
            )
            .mount(&server)
            .await;

        // Unparseable PDF bytes surface as a PDF error, not as HTML.
        let err = fetcher()
            .fetch(&format!("{}/doc.pdf", server.uri()), &PeelOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Pdf { .. }));
    }
}
