//! The wire error envelope.
//!
//! Every user-visible error carries a stable `type`, a human message, an
//! optional hint and the request id. Internal detail goes to tracing,
//! never into the response body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{error, warn};
use webpeel_types::PeelError;

/// An error bound to its request id, ready to serialize.
#[derive(Debug)]
pub struct ApiError {
    pub error: PeelError,
    pub request_id: String,
}

impl ApiError {
    pub fn new(error: PeelError, request_id: impl Into<String>) -> Self {
        Self {
            error,
            request_id: request_id.into(),
        }
    }

    /// Wrap an opaque internal failure, logging the detail server-side.
    pub fn internal(detail: impl std::fmt::Display, request_id: impl Into<String>) -> Self {
        let request_id = request_id.into();
        error!(request_id = %request_id, detail = %detail, "internal error");
        Self {
            error: PeelError::internal("an internal error occurred"),
            request_id,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.error.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(request_id = %self.request_id, error = %self.error, "request failed");
        } else {
            warn!(request_id = %self.request_id, error = %self.error, "request rejected");
        }

        let mut body = json!({
            "success": false,
            "error": {
                "type": self.error.error_type(),
                "message": self.error.to_string(),
            },
            "requestId": self.request_id,
        });
        if let Some(hint) = self.error.hint() {
            body["error"]["hint"] = json!(hint);
        }

        let mut response = (status, Json(body)).into_response();
        if let PeelError::BurstLimitExceeded { retry_after_secs } = &self.error {
            if let Ok(value) = retry_after_secs.to_string().parse() {
                response.headers_mut().insert("Retry-After", value);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn envelope_shape_is_stable() {
        let err = ApiError::new(
            PeelError::InvalidUrl {
                url: "x".into(),
                message: "bad".into(),
            },
            "req-1",
        );
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["type"], "invalid_url");
        assert_eq!(body["requestId"], "req-1");
        assert!(body["error"]["hint"].is_string());
    }

    #[tokio::test]
    async fn burst_block_carries_retry_after() {
        let err = ApiError::new(
            PeelError::BurstLimitExceeded {
                retry_after_secs: 120,
            },
            "req-2",
        );
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["Retry-After"], "120");
    }

    #[tokio::test]
    async fn internal_errors_do_not_leak_detail() {
        let err = ApiError::internal("db password wrong at /secret/path", "req-3");
        let body = body_json(err.into_response()).await;
        assert_eq!(body["error"]["type"], "internal_error");
        assert!(!body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("password"));
    }
}
