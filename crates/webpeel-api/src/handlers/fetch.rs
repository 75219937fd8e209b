//! The `/v1/fetch` surface.

use super::{with_budget, BUDGET_DEFAULT, BUDGET_RENDER};
use crate::auth::ApiKeyIdentity;
use crate::errors::ApiError;
use crate::middleware::RequestId;
use crate::quota_headers::{apply_quota_headers, apply_soft_limit, charge};
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;
use webpeel_facade::CacheDisposition;
use webpeel_quota::UsageClass;
use webpeel_types::{OutputFormat, PeelOptions};

/// GET query shape; the POST body carries full options.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FetchQuery {
    url: String,
    format: OutputFormat,
    render: bool,
    stealth: bool,
    screenshot: bool,
    selector: Option<String>,
    #[serde(alias = "budget")]
    max_tokens: Option<usize>,
    wait: Option<u64>,
    timeout: Option<u64>,
    images: bool,
    change_tracking: bool,
    raw: bool,
}

impl Default for FetchQuery {
    fn default() -> Self {
        Self {
            url: String::new(),
            format: OutputFormat::Markdown,
            render: false,
            stealth: false,
            screenshot: false,
            selector: None,
            max_tokens: None,
            wait: None,
            timeout: None,
            images: false,
            change_tracking: false,
            raw: false,
        }
    }
}

impl FetchQuery {
    fn into_parts(self) -> (String, PeelOptions) {
        let mut options = PeelOptions {
            format: self.format,
            render: self.render,
            stealth: self.stealth,
            screenshot: self.screenshot,
            selector: self.selector,
            max_tokens: self.max_tokens,
            wait: self.wait,
            images: self.images,
            change_tracking: self.change_tracking,
            raw: self.raw,
            ..Default::default()
        };
        if let Some(timeout) = self.timeout {
            options.timeout_ms = timeout;
        }
        (self.url, options)
    }
}

/// POST body: a URL plus any request options.
#[derive(Debug, Deserialize)]
pub struct FetchBody {
    url: String,
    #[serde(flatten)]
    options: PeelOptions,
}

pub async fn fetch_get(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Extension(identity): Extension<ApiKeyIdentity>,
    Query(query): Query<FetchQuery>,
) -> Result<Response, ApiError> {
    let (url, options) = query.into_parts();
    run_fetch(state, request_id, identity, url, options).await
}

pub async fn fetch_post(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Extension(identity): Extension<ApiKeyIdentity>,
    Json(body): Json<FetchBody>,
) -> Result<Response, ApiError> {
    run_fetch(state, request_id, identity, body.url, body.options).await
}

async fn run_fetch(
    state: AppState,
    request_id: String,
    identity: ApiKeyIdentity,
    url: String,
    mut options: PeelOptions,
) -> Result<Response, ApiError> {
    let class = if options.stealth {
        UsageClass::Stealth
    } else {
        UsageClass::Basic
    };
    let decision = charge(&state, &identity.key_id, class, &request_id).await?;
    let degraded = apply_soft_limit(&mut options, &decision);

    let budget = if options.needs_render() {
        BUDGET_RENDER
    } else {
        BUDGET_DEFAULT
    };
    let outcome = with_budget(budget, "fetch", &request_id, async {
        state
            .peel
            .peel_with_cache(&url, &options)
            .await
            .map_err(|e| ApiError::new(e, request_id.clone()))
    })
    .await?;

    let mut response = Json(&outcome.result).into_response();
    let headers = response.headers_mut();
    apply_quota_headers(headers, &decision, degraded.as_deref());
    match outcome.cache {
        CacheDisposition::Hit { age_secs } => {
            headers.insert("X-Cache", axum::http::HeaderValue::from_static("HIT"));
            if let Ok(value) = age_secs.to_string().parse() {
                headers.insert("X-Cache-Age", value);
            }
        }
        CacheDisposition::Miss => {
            headers.insert("X-Cache", axum::http::HeaderValue::from_static("MISS"));
        }
    }
    Ok(response)
}
