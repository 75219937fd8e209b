//! `/v1/screenshot` and the design-analysis variant.

use super::{with_budget, BUDGET_SCREENSHOT};
use crate::auth::ApiKeyIdentity;
use crate::errors::ApiError;
use crate::middleware::RequestId;
use crate::quota_headers::{apply_quota_headers, charge};
use crate::state::AppState;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::json;
use webpeel_extraction::heuristics::detect_page_type;
use webpeel_quota::UsageClass;
use webpeel_types::{PeelError, PeelOptions};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotBody {
    url: String,
    #[serde(default)]
    full_page: bool,
    #[serde(default)]
    wait: Option<u64>,
}

async fn capture(
    state: &AppState,
    request_id: &str,
    body: &ScreenshotBody,
) -> Result<webpeel_types::PeelResult, ApiError> {
    let options = PeelOptions {
        screenshot: true,
        screenshot_full_page: body.full_page,
        wait: body.wait,
        ..Default::default()
    };
    with_budget(BUDGET_SCREENSHOT, "screenshot", request_id, async {
        state
            .peel
            .peel(&body.url, &options)
            .await
            .map_err(|e| ApiError::new(e, request_id.to_string()))
    })
    .await
}

pub async fn screenshot(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Extension(identity): Extension<ApiKeyIdentity>,
    Json(body): Json<ScreenshotBody>,
) -> Result<Response, ApiError> {
    let decision = charge(&state, &identity.key_id, UsageClass::Basic, &request_id).await?;
    let result = capture(&state, &request_id, &body).await?;
    let Some(image) = result.screenshot else {
        return Err(ApiError::new(
            PeelError::ExtractionFailed {
                message: "no rendering tier available for screenshots".to_string(),
            },
            request_id,
        ));
    };

    let mut response = Json(json!({
        "url": result.url,
        "screenshot": image,
        "contentType": "image/png",
    }))
    .into_response();
    apply_quota_headers(response.headers_mut(), &decision, None);
    Ok(response)
}

/// Screenshot plus the heuristic page-type read, for design review
/// tooling.
pub async fn design_analysis(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Extension(identity): Extension<ApiKeyIdentity>,
    Json(body): Json<ScreenshotBody>,
) -> Result<Response, ApiError> {
    let decision = charge(&state, &identity.key_id, UsageClass::Basic, &request_id).await?;
    let result = capture(&state, &request_id, &body).await?;

    let parsed = webpeel_types::validate_url(&result.url)
        .map_err(|e| ApiError::new(e, request_id.clone()))?;
    let page_type = detect_page_type(&parsed, &result.content);

    let mut response = Json(json!({
        "url": result.url,
        "screenshot": result.screenshot,
        "analysis": {
            "pageType": page_type,
            "title": result.title,
            "wordCount": result.metadata.word_count,
            "quality": result.quality,
            "linkCount": result.links.len(),
        },
    }))
    .into_response();
    apply_quota_headers(response.headers_mut(), &decision, None);
    Ok(response)
}
