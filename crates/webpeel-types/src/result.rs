//! Fetch and peel result types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a page was ultimately obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchMethod {
    /// Raw HTTP GET, no rendering.
    Simple,
    /// Headless browser render.
    Browser,
    /// Browser render with anti-detection measures.
    Stealth,
    /// Served from the result cache.
    Cached,
    /// Cloudflare-worker proxy fallback.
    CfWorker,
    /// Google Cache scrape fallback.
    GoogleCache,
    /// TLS-fingerprint-rotating HTTP fallback.
    #[serde(rename = "peeltls")]
    PeelTls,
}

impl FetchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Browser => "browser",
            Self::Stealth => "stealth",
            Self::Cached => "cached",
            Self::CfWorker => "cf-worker",
            Self::GoogleCache => "google-cache",
            Self::PeelTls => "peeltls",
        }
    }

    /// Whether this method ran a real browser.
    pub fn is_rendered(&self) -> bool {
        matches!(self, Self::Browser | Self::Stealth)
    }
}

impl std::fmt::Display for FetchMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw outcome of one fetch attempt, before extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResult {
    /// Final URL after redirects.
    pub url: String,
    pub html: String,
    pub status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub method: FetchMethod,
    /// Set when every tier returned a bot-challenge page and this is the
    /// best HTML obtained.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub challenge_detected: bool,
    /// Edge location or proxy identifier, when a fallback supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge: Option<String>,
    /// Screenshot captured during a rendered fetch, base64-encoded PNG.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
}

impl FetchResult {
    pub fn new(url: impl Into<String>, html: impl Into<String>, method: FetchMethod) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
            status_code: 200,
            content_type: Some("text/html".to_string()),
            method,
            challenge_detected: false,
            edge: None,
            screenshot: None,
        }
    }
}

/// Page metadata pulled from the document head and structured data.
///
/// `published` carries the raw source string; `publish_date` is the same
/// value normalized to ISO 8601. Clients that only render keep reading
/// `published`; clients that sort use `publish_date`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub word_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<FetchMethod>,
}

/// An image discovered on the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// Change-tracking outcome relative to the stored snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    /// First observation of this URL.
    New,
    /// Fingerprint matches the stored snapshot.
    Same,
    /// Content differs from the stored snapshot.
    Changed,
}

/// One line of a unified diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffLine {
    pub kind: DiffKind,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffKind {
    Add,
    Del,
    Ctx,
}

/// Unified line diff between two snapshots.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentDiff {
    /// Rendered unified-diff text with hunk headers.
    pub text: String,
    pub additions: usize,
    pub deletions: usize,
    pub changes: Vec<DiffLine>,
    /// Set when inputs were capped before diffing.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
}

/// Change-tracking summary attached to a peel result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSummary {
    pub status: ChangeStatus,
    /// ISO-8601 timestamp of the previous observation, if any.
    pub previous_scrape_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<ContentDiff>,
}

/// The complete result of one peel operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeelResult {
    pub url: String,
    pub title: String,
    pub content: String,
    pub method: FetchMethod,
    /// Wall-clock time spent, in milliseconds.
    pub elapsed: u64,
    /// Estimated token count of `content`.
    pub tokens: usize,
    /// First 16 hex chars of the SHA-256 of the normalized content.
    pub fingerprint: String,
    /// Extraction quality estimate in [0, 1].
    pub quality: f64,
    pub metadata: PageMetadata,
    /// Absolute, deduplicated, sorted http(s) links.
    pub links: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<ImageInfo>>,
    /// Base64-encoded PNG, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_status: Option<ChangeSummary>,
    /// Set when the served result was produced under a bot challenge.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub challenge_detected: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_method_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_string(&FetchMethod::CfWorker).unwrap(),
            "\"cf-worker\""
        );
        assert_eq!(
            serde_json::to_string(&FetchMethod::GoogleCache).unwrap(),
            "\"google-cache\""
        );
        assert_eq!(
            serde_json::to_string(&FetchMethod::PeelTls).unwrap(),
            "\"peeltls\""
        );
    }

    #[test]
    fn fetch_method_display_matches_wire_form() {
        for m in [
            FetchMethod::Simple,
            FetchMethod::Browser,
            FetchMethod::Stealth,
            FetchMethod::Cached,
            FetchMethod::CfWorker,
            FetchMethod::GoogleCache,
            FetchMethod::PeelTls,
        ] {
            let wire = serde_json::to_string(&m).unwrap();
            assert_eq!(wire.trim_matches('"'), m.as_str());
        }
    }

    #[test]
    fn change_status_lowercase() {
        assert_eq!(
            serde_json::to_string(&ChangeStatus::Changed).unwrap(),
            "\"changed\""
        );
    }
}
