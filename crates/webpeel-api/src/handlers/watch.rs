//! `/v1/watch` — persistent URL watches.

use crate::auth::ApiKeyIdentity;
use crate::errors::ApiError;
use crate::middleware::RequestId;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::json;
use webpeel_types::{validate_url, PeelError};
use webpeel_workers::{Watch, MIN_CHECK_INTERVAL_MINUTES};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchBody {
    url: String,
    #[serde(default)]
    webhook_url: Option<String>,
    #[serde(default = "default_interval")]
    check_interval_minutes: u32,
    #[serde(default)]
    selector: Option<String>,
}

fn default_interval() -> u32 {
    60
}

pub async fn create(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Extension(identity): Extension<ApiKeyIdentity>,
    Json(body): Json<WatchBody>,
) -> Result<Response, ApiError> {
    validate_url(&body.url).map_err(|e| ApiError::new(e, request_id.clone()))?;
    if body.check_interval_minutes < MIN_CHECK_INTERVAL_MINUTES {
        return Err(ApiError::new(
            PeelError::invalid_request(format!(
                "checkIntervalMinutes must be at least {}",
                MIN_CHECK_INTERVAL_MINUTES
            )),
            request_id,
        ));
    }

    let watch = Watch::new(
        identity.account_id.clone(),
        body.url.clone(),
        body.webhook_url,
        body.check_interval_minutes,
        body.selector,
    );
    state
        .watches
        .create(&watch)
        .await
        .map_err(|e| ApiError::internal(e, &request_id))?;
    Ok((StatusCode::CREATED, Json(watch)).into_response())
}

pub async fn list(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Extension(identity): Extension<ApiKeyIdentity>,
) -> Result<Response, ApiError> {
    let watches = state
        .watches
        .list(&identity.account_id)
        .await
        .map_err(|e| ApiError::internal(e, &request_id))?;
    Ok(Json(json!({ "watches": watches })).into_response())
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Extension(identity): Extension<ApiKeyIdentity>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let deleted = state
        .watches
        .delete(&id, &identity.account_id)
        .await
        .map_err(|e| ApiError::internal(e, &request_id))?;
    if !deleted {
        return Err(ApiError::new(
            PeelError::NotFound {
                resource: format!("watch {}", id),
            },
            request_id,
        ));
    }
    Ok(Json(json!({ "id": id, "deleted": true })).into_response())
}
