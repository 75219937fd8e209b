//! HTTP handlers.

pub mod answer;
pub mod batch;
pub mod extract;
pub mod fetch;
pub mod health;
pub mod jobs;
pub mod openapi;
pub mod screenshot;
pub mod search;
pub mod watch;

use crate::errors::ApiError;
use std::future::Future;
use std::time::Duration;
use webpeel_types::PeelError;

/// Per-request budgets by operation family.
pub const BUDGET_DEFAULT: Duration = Duration::from_secs(30);
pub const BUDGET_RENDER: Duration = Duration::from_secs(60);
pub const BUDGET_SCREENSHOT: Duration = Duration::from_secs(60);
pub const BUDGET_CRAWL: Duration = Duration::from_secs(300);

/// Enforce a server-side budget around a handler's core operation.
pub async fn with_budget<T>(
    budget: Duration,
    operation: &str,
    request_id: &str,
    fut: impl Future<Output = Result<T, ApiError>>,
) -> Result<T, ApiError> {
    match tokio::time::timeout(budget, fut).await {
        Ok(result) => result,
        Err(_) => Err(ApiError::new(
            PeelError::Timeout {
                operation: operation.to_string(),
            },
            request_id,
        )),
    }
}
