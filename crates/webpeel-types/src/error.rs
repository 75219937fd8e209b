//! Service error type with HTTP and wire-format mapping.

use thiserror::Error;

/// Errors surfaced by WebPeel operations.
///
/// Each variant maps to a stable wire `type` string and an HTTP status
/// code; user-facing messages never carry internal paths or stack detail.
#[derive(Error, Debug)]
pub enum PeelError {
    #[error("{message}")]
    InvalidRequest { message: String },

    #[error("invalid URL `{url}`: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("authentication required")]
    AuthenticationRequired,

    #[error("invalid API key")]
    InvalidKey,

    #[error("hourly burst limit exceeded")]
    BurstLimitExceeded { retry_after_secs: u64 },

    #[error("operation timed out: {operation}")]
    Timeout { operation: String },

    #[error("not found: {resource}")]
    NotFound { resource: String },

    #[error("failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("extraction failed: {message}")]
    ExtractionFailed { message: String },

    #[error("LLM provider rejected credentials: {message}")]
    LlmAuthFailed { message: String },

    #[error("LLM provider rate limited: {message}")]
    LlmRateLimited { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl PeelError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn fetch(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Stable wire identifier for the error envelope.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::InvalidRequest { .. } => "invalid_request",
            Self::InvalidUrl { .. } => "invalid_url",
            Self::AuthenticationRequired => "authentication_required",
            Self::InvalidKey => "invalid_key",
            Self::BurstLimitExceeded { .. } => "burst_limit_exceeded",
            Self::Timeout { .. } => "timeout",
            Self::NotFound { .. } => "not_found",
            Self::Fetch { .. } | Self::ExtractionFailed { .. } => "extraction_failed",
            Self::LlmAuthFailed { .. } => "llm_auth_failed",
            Self::LlmRateLimited { .. } => "llm_rate_limited",
            Self::Internal { .. } => "internal_error",
        }
    }

    /// HTTP status this error responds with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidRequest { .. } | Self::InvalidUrl { .. } => 400,
            Self::AuthenticationRequired | Self::InvalidKey | Self::LlmAuthFailed { .. } => 401,
            Self::NotFound { .. } => 404,
            Self::BurstLimitExceeded { .. } | Self::LlmRateLimited { .. } => 429,
            Self::Timeout { .. } => 504,
            Self::Fetch { .. } => 502,
            Self::ExtractionFailed { .. } | Self::Internal { .. } => 500,
        }
    }

    /// Short remediation hint for the error envelope, when one exists.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::AuthenticationRequired => {
                Some("pass an API key via `Authorization: Bearer` or `X-API-Key`")
            }
            Self::BurstLimitExceeded { .. } => {
                Some("wait for the hourly window to reset or spread requests out")
            }
            Self::InvalidUrl { .. } => Some("only absolute http(s) URLs up to 2048 chars"),
            _ => None,
        }
    }
}

/// Maximum accepted URL length.
pub const MAX_URL_LEN: usize = 2048;

/// Validate and normalize a request URL.
///
/// Accepts absolute http/https URLs up to [`MAX_URL_LEN`] characters.
pub fn validate_url(raw: &str) -> Result<url::Url, PeelError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PeelError::InvalidUrl {
            url: String::new(),
            message: "empty URL".to_string(),
        });
    }
    if trimmed.len() > MAX_URL_LEN {
        let head: String = trimmed.chars().take(64).collect();
        return Err(PeelError::InvalidUrl {
            url: format!("{}…", head),
            message: format!("URL exceeds {} characters", MAX_URL_LEN),
        });
    }
    let parsed = url::Url::parse(trimmed).map_err(|e| PeelError::InvalidUrl {
        url: trimmed.to_string(),
        message: e.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(PeelError::InvalidUrl {
            url: trimmed.to_string(),
            message: format!("unsupported scheme `{}`", other),
        }),
    }
}
