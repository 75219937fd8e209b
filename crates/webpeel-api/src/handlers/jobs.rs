//! `/v1/jobs` — job inspection and cancellation.

use crate::errors::ApiError;
use crate::middleware::RequestId;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::json;
use webpeel_types::PeelError;
use webpeel_workers::JobStatus;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    status: Option<JobStatus>,
}

pub async fn get(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    match state.jobs.get_job(&id) {
        Some(job) => Ok(Json(job).into_response()),
        None => Err(ApiError::new(
            PeelError::NotFound {
                resource: format!("job {}", id),
            },
            request_id,
        )),
    }
}

pub async fn cancel(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    if state.jobs.get_job(&id).is_none() {
        return Err(ApiError::new(
            PeelError::NotFound {
                resource: format!("job {}", id),
            },
            request_id,
        ));
    }
    let cancelled = state.jobs.cancel_job(&id);
    Ok(Json(json!({ "id": id, "cancelled": cancelled })).into_response())
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Response {
    // Opportunistic retention sweep; terminal jobs expire after 24h.
    state.jobs.purge_expired();
    Json(json!({ "jobs": state.jobs.list_jobs(query.status) })).into_response()
}
