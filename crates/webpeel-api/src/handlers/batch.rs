//! `/v1/batch/scrape` — async batch jobs.

use crate::auth::ApiKeyIdentity;
use crate::errors::ApiError;
use crate::middleware::RequestId;
use crate::quota_headers::{apply_quota_headers, charge};
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use webpeel_quota::UsageClass;
use webpeel_types::{OutputFormat, PeelError, PeelOptions};
use webpeel_workers::{run_batch, JobType};

/// Upper bound on URLs per batch submission.
const MAX_BATCH_URLS: usize = 100;
const BATCH_CONCURRENCY: usize = 5;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchBody {
    urls: Vec<String>,
    #[serde(default)]
    format: Option<OutputFormat>,
    #[serde(default)]
    webhook: Option<String>,
    #[serde(default)]
    options: Option<PeelOptions>,
}

pub async fn submit(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Extension(identity): Extension<ApiKeyIdentity>,
    Json(body): Json<BatchBody>,
) -> Result<Response, ApiError> {
    if body.urls.is_empty() {
        return Err(ApiError::new(
            PeelError::invalid_request("`urls` must be a non-empty array"),
            request_id,
        ));
    }
    if body.urls.len() > MAX_BATCH_URLS {
        return Err(ApiError::new(
            PeelError::invalid_request(format!(
                "`urls` is limited to {} entries per batch",
                MAX_BATCH_URLS
            )),
            request_id,
        ));
    }
    let decision = charge(&state, &identity.key_id, UsageClass::Basic, &request_id).await?;

    let mut options = body.options.unwrap_or_default();
    if let Some(format) = body.format {
        options.format = format;
    }

    let job = state.jobs.create_job(JobType::Batch, body.webhook);
    let job_id = job.id.clone();
    info!(job_id = %job_id, urls = body.urls.len(), "batch job accepted");

    let jobs = Arc::clone(&state.jobs);
    let notifier = Arc::clone(&state.notifier);
    let peel = Arc::clone(&state.peel);
    let urls = body.urls;
    let task_job_id = job_id.clone();
    tokio::spawn(async move {
        let peel_fn = move |url: String| {
            let peel = Arc::clone(&peel);
            let options = options.clone();
            async move {
                peel.peel(&url, &options)
                    .await
                    .map(|result| serde_json::to_value(result).unwrap_or_default())
                    .map_err(|e| e.to_string())
            }
        };
        run_batch(
            jobs,
            notifier,
            task_job_id,
            urls,
            BATCH_CONCURRENCY,
            peel_fn,
        )
        .await;
    });

    let mut response = (
        StatusCode::ACCEPTED,
        Json(json!({
            "id": job_id,
            "url": format!("/v1/batch/scrape/{}", job_id),
        })),
    )
        .into_response();
    apply_quota_headers(response.headers_mut(), &decision, None);
    Ok(response)
}

pub async fn status(
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
