//! `/v1/extract` — structured extraction over a fetched page.

use super::{with_budget, BUDGET_DEFAULT};
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
use webpeel_quota::UsageClass;
use webpeel_types::{ExtractSpec, PeelOptions};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractBody {
    url: String,
    #[serde(default)]
    schema: Option<serde_json::Value>,
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    selectors: Option<std::collections::HashMap<String, String>>,
}

pub async fn extract(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Extension(identity): Extension<ApiKeyIdentity>,
    Json(body): Json<ExtractBody>,
) -> Result<Response, ApiError> {
    let decision = charge(&state, &identity.key_id, UsageClass::Basic, &request_id).await?;

    let options = PeelOptions {
        extract: Some(ExtractSpec {
            schema: body.schema,
            prompt: body.prompt,
            selectors: body.selectors,
        }),
        ..Default::default()
    };
    let result = with_budget(BUDGET_DEFAULT, "extract", &request_id, async {
        state
            .peel
            .peel(&body.url, &options)
            .await
            .map_err(|e| ApiError::new(e, request_id.clone()))
    })
    .await?;

    let mut response = Json(json!({
        "success": true,
        "data": result.extracted,
        "metadata": {
            "url": result.url,
            "title": result.title,
            "tokens": result.tokens,
            "method": result.method,
        },
    }))
    .into_response();
    apply_quota_headers(response.headers_mut(), &decision, None);
    Ok(response)
}
