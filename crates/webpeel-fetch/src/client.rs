//! Shared HTTP client construction and response decoding.

use crate::error::FetchError;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use std::time::Duration;

/// Browser-grade default user agent for the simple tier.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

const ACCEPT_HTML: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";

/// Redirect ceiling for the simple tier.
pub const MAX_REDIRECTS: usize = 10;

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers
}

/// Build the shared client for plain HTTP fetches.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, FetchError> {
    reqwest::Client::builder()
        .user_agent(DEFAULT_USER_AGENT)
        .default_headers(default_headers())
        .gzip(true)
        .brotli(true)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .connect_timeout(Duration::from_secs(10))
        .timeout(timeout)
        .cookie_store(true)
        .build()
        .map_err(|e| FetchError::Network {
            url: String::new(),
            message: format!("client construction failed: {}", e),
        })
}

/// Build a one-off client routed through a proxy. Falls back to direct
/// configuration errors rather than silently ignoring the proxy.
pub fn proxied_client(timeout: Duration, proxy: &str) -> Result<reqwest::Client, FetchError> {
    let proxy = reqwest::Proxy::all(proxy).map_err(|e| FetchError::Network {
        url: proxy.to_string(),
        message: format!("invalid proxy: {}", e),
    })?;
    reqwest::Client::builder()
        .user_agent(DEFAULT_USER_AGENT)
        .default_headers(default_headers())
        .gzip(true)
        .brotli(true)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .timeout(timeout)
        .cookie_store(true)
        .proxy(proxy)
        .build()
        .map_err(|e| FetchError::Network {
            url: String::new(),
            message: format!("client construction failed: {}", e),
        })
}

static META_CHARSET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<meta[^>]+charset\s*=\s*["']?\s*([a-zA-Z0-9_-]+)"#).unwrap()
});
static HEADER_CHARSET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)charset\s*=\s*([a-zA-Z0-9_-]+)").unwrap());

/// Decode a response body using the charset declared in the Content-Type
/// header, falling back to a `<meta charset>` sniff of the first bytes,
/// then UTF-8 (lossy).
pub fn decode_body(bytes: &[u8], content_type: Option<&str>) -> String {
    let from_header = content_type
        .and_then(|ct| HEADER_CHARSET.captures(ct))
        .map(|c| c[1].to_string());

    let from_meta = || {
        let head = &bytes[..bytes.len().min(1024)];
        let sniff = String::from_utf8_lossy(head);
        META_CHARSET.captures(&sniff).map(|c| c[1].to_string())
    };

    let label = from_header.or_else(from_meta);
    if let Some(label) = label {
        if let Some(encoding) = encoding_rs::Encoding::for_label(label.as_bytes()) {
            let (decoded, _, _) = encoding.decode(bytes);
            return decoded.into_owned();
        }
    }
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_without_declaration_decodes() {
        assert_eq!(decode_body("héllo".as_bytes(), None), "héllo");
    }

    #[test]
    fn header_charset_wins() {
        // "café" in ISO-8859-1.
        let bytes = [0x63, 0x61, 0x66, 0xE9];
        let decoded = decode_body(&bytes, Some("text/html; charset=iso-8859-1"));
        assert_eq!(decoded, "café");
    }

    #[test]
    fn meta_charset_is_sniffed() {
        let mut bytes = b"<html><head><meta charset=\"windows-1252\"></head><body>".to_vec();
        bytes.push(0x93); // left curly quote in cp1252
        bytes.extend_from_slice(b"quoted");
        let decoded = decode_body(&bytes, Some("text/html"));
        assert!(decoded.contains('\u{201C}'));
    }

    #[test]
    fn unknown_charset_falls_back_to_lossy_utf8() {
        let decoded = decode_body(b"plain ascii", Some("text/html; charset=bogus-enc"));
        assert_eq!(decoded, "plain ascii");
    }
}
