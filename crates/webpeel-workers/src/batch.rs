//! Bounded-concurrency batch execution.

use crate::job::{JobPatch, JobStatus};
use crate::store::JobStore;
use crate::webhook::{WebhookEvent, WebhookNotifier};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info};

/// Default number of in-flight units per batch.
pub const DEFAULT_BATCH_CONCURRENCY: usize = 5;

/// Per-URL outcome, indexed by input position.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItem {
    pub index: usize,
    pub url: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Run a URL batch through `peel_fn` with bounded concurrency.
///
/// Units may complete out of order; results come back sorted by input
/// position. Per-URL failures are recorded, never fatal. Cancellation is
/// polled before each unit is dispatched: already-running units finish,
/// no new ones start.
pub async fn run_batch<F, Fut>(
    store: Arc<JobStore>,
    notifier: Arc<WebhookNotifier>,
    job_id: String,
    urls: Vec<String>,
    concurrency: usize,
    peel_fn: F,
) -> Vec<BatchItem>
where
    F: Fn(String) -> Fut + Send + Sync + Clone + 'static,
    Fut: Future<Output = Result<serde_json::Value, String>> + Send,
{
    let total = urls.len();
    let webhook_url = store.get_job(&job_id).and_then(|j| j.webhook_url);

    store.update_job(
        &job_id,
        JobPatch {
            status: Some(JobStatus::Running),
            total: Some(total),
            completed: Some(0),
            ..Default::default()
        },
    );
    notifier
        .deliver_if_configured(
            webhook_url.as_deref(),
            &WebhookEvent::job("started", &job_id, None),
        )
        .await;

    let mut results: Vec<BatchItem> = stream::iter(urls.into_iter().enumerate())
        .map(|(index, url)| {
            let store = Arc::clone(&store);
            let notifier = Arc::clone(&notifier);
            let webhook_url = webhook_url.clone();
            let job_id = job_id.clone();
            let peel_fn = peel_fn.clone();
            async move {
                if store.is_cancelled(&job_id) {
                    debug!(job_id = %job_id, index, "batch unit skipped after cancellation");
                    return BatchItem {
                        index,
                        url,
                        success: false,
                        data: None,
                        error: Some("cancelled".to_string()),
                    };
                }

                let item = match peel_fn(url.clone()).await {
                    Ok(data) => BatchItem {
                        index,
                        url,
                        success: true,
                        data: Some(data),
                        error: None,
                    },
                    Err(error) => BatchItem {
                        index,
                        url,
                        success: false,
                        data: None,
                        error: Some(error),
                    },
                };

                if let Some(job) = store.get_job(&job_id) {
                    let done = job.completed.unwrap_or(0) + 1;
                    store.update_job(
                        &job_id,
                        JobPatch {
                            completed: Some(done),
                            ..Default::default()
                        },
                    );
                }
                // Per-unit progress events are best effort.
                notifier
                    .deliver_if_configured(
                        webhook_url.as_deref(),
                        &WebhookEvent::job(
                            "page",
                            &job_id,
                            Some(serde_json::json!({
                                "index": item.index,
                                "url": item.url,
                                "success": item.success,
                            })),
                        ),
                    )
                    .await;
                item
            }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;
    results.sort_by_key(|item| item.index);

    let cancelled = store.is_cancelled(&job_id);
    let terminal = if cancelled { "cancelled" } else { "completed" };
    store.update_job(
        &job_id,
        JobPatch {
            status: Some(if cancelled {
                JobStatus::Cancelled
            } else {
                JobStatus::Completed
            }),
            data: Some(serde_json::json!({ "results": results })),
            ..Default::default()
        },
    );
    notifier
        .deliver_if_configured(
            webhook_url.as_deref(),
            &WebhookEvent::job(terminal, &job_id, None),
        )
        .await;
    info!(job_id = %job_id, total, cancelled, "batch finished");
    results
}
