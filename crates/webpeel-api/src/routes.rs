//! The route table — the single source of truth for the operation
//! surface. `/openapi.yaml` documents exactly what is registered here.

use crate::handlers;
use crate::middleware::{request_id, require_api_key};
use crate::state::AppState;
use axum::middleware as axum_middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/openapi.yaml", get(handlers::openapi::openapi));

    let protected = Router::new()
        .route("/v1/fetch", get(handlers::fetch::fetch_get).post(handlers::fetch::fetch_post))
        .route("/v1/search", get(handlers::search::search))
        .route("/v1/extract", post(handlers::extract::extract))
        .route("/v1/batch/scrape", post(handlers::batch::submit))
        .route(
            "/v1/batch/scrape/:id",
            get(handlers::batch::status).delete(handlers::batch::cancel),
        )
        .route("/v1/answer", post(handlers::answer::answer))
        .route("/v1/answer/quick", get(handlers::answer::quick))
        .route("/v1/screenshot", post(handlers::screenshot::screenshot))
        .route(
            "/v1/screenshot/design-analysis",
            post(handlers::screenshot::design_analysis),
        )
        .route(
            "/v1/watch",
            post(handlers::watch::create).get(handlers::watch::list),
        )
        .route("/v1/watch/:id", delete(handlers::watch::delete))
        .route("/v1/jobs", get(handlers::jobs::list))
        .route(
            "/v1/jobs/:id",
            get(handlers::jobs::get).delete(handlers::jobs::cancel),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    let cors = if state.cors_origins.is_empty() {
        CorsLayer::permissive()
    } else {
        let origins: Vec<_> = state
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new().allow_origin(AllowOrigin::list(origins))
    };

    public
        .merge(protected)
        .layer(axum_middleware::from_fn(request_id))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
