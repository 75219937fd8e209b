//! Fetch-layer error classification.

use thiserror::Error;

/// Failure classes the escalation engine distinguishes.
#[derive(Error, Debug)]
pub enum FetchError {
    /// DNS, TCP, TLS or timeout failures. Retried with backoff.
    #[error("network error fetching {url}: {message}")]
    Network { url: String, message: String },

    #[error("timed out fetching {url}")]
    Timeout { url: String },

    /// Server-side failure (HTTP >= 500). Escalates to the next tier.
    #[error("upstream returned {status} for {url}")]
    UpstreamStatus { url: String, status: u16 },

    #[error("browser error for {url}: {message}")]
    Browser { url: String, message: String },

    /// Strategy requires configuration that is absent.
    #[error("{strategy} is not configured")]
    NotConfigured { strategy: &'static str },

    /// Fallback response failed its validation gate.
    #[error("{strategy} returned an unusable response for {url}")]
    Rejected { strategy: &'static str, url: String },

    #[error("could not parse PDF from {url}: {message}")]
    Pdf { url: String, message: String },
}

impl FetchError {
    /// Transient errors are worth retrying on the same tier.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Timeout { .. })
    }

    pub(crate) fn from_reqwest(url: &str, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else {
            Self::Network {
                url: url.to_string(),
                message: e.to_string(),
            }
        }
    }
}
