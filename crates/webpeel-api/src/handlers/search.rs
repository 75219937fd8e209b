//! `/v1/search`.

use crate::auth::ApiKeyIdentity;
use crate::errors::ApiError;
use crate::middleware::RequestId;
use crate::quota_headers::{apply_quota_headers, charge};
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::json;
use webpeel_quota::UsageClass;
use webpeel_types::PeelError;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    q: String,
    #[serde(default = "default_limit")]
    limit: u32,
}

fn default_limit() -> u32 {
    10
}

pub async fn search(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Extension(identity): Extension<ApiKeyIdentity>,
    Query(query): Query<SearchQuery>,
) -> Result<Response, ApiError> {
    if query.q.trim().is_empty() {
        return Err(ApiError::new(
            PeelError::invalid_request("query parameter `q` is required"),
            request_id,
        ));
    }
    let decision = charge(&state, &identity.key_id, UsageClass::Search, &request_id).await?;

    let provider = state.peel.search_provider().ok_or_else(|| {
        ApiError::new(
            PeelError::invalid_request("no search provider configured"),
            request_id.clone(),
        )
    })?;
    let hits = provider
        .search(&query.q, query.limit)
        .await
        .map_err(|e| ApiError::internal(e, &request_id))?;

    let mut response = Json(json!({ "results": hits })).into_response();
    apply_quota_headers(response.headers_mut(), &decision, None);
    Ok(response)
}
