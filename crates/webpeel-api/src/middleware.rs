//! Request-id and authentication middleware.

use crate::auth::{hash_key, presented_key, ApiKeyIdentity};
use crate::errors::ApiError;
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;
use webpeel_types::PeelError;

/// Request id attached to every request and response.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Assign a request id, expose it to handlers via extensions, and echo
/// it on the response.
pub async fn request_id(mut request: Request, next: Next) -> Response {
    let id = Uuid::new_v4().to_string();
    request.extensions_mut().insert(RequestId(id.clone()));
    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert("X-Request-Id", value);
    }
    response
}

/// Authenticate by API key and attach the identity to the request.
pub async fn require_api_key(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|r| r.0.clone())
        .unwrap_or_default();

    let Some(presented) = presented_key(&request) else {
        return Err(ApiError::new(PeelError::AuthenticationRequired, request_id));
    };
    let Some(identity) = state.keys.lookup(&hash_key(&presented)).await else {
        return Err(ApiError::new(PeelError::InvalidKey, request_id));
    };

    request.extensions_mut().insert::<ApiKeyIdentity>(identity);
    Ok(next.run(request).await)
}
