//! Router assembly
//!
//! Wires the handlers to their routes and wraps them in the request-id,
//! HTTP tracing and CORS layers.

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::CorsConfig;
use crate::error::AppResult;
use crate::handlers::{AppState, chat_stream, health};
use crate::middleware::request_id_middleware;

/// Build the application router
///
/// # Errors
///
/// Returns a configuration error if a CORS origin is not a valid header value.
pub fn build_router(state: AppState, cors: &CorsConfig) -> AppResult<Router> {
    let cors_layer = cors_layer(cors)?;

    Ok(Router::new()
        .route("/chat/stream", post(chat_stream::handler))
        .route("/health", get(health::handler))
        .with_state(state)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer))
}

/// CORS policy for the frontend
///
/// Credentials are allowed, which rules out wildcard methods and headers,
/// so both are mirrored from the preflight request instead.
pub fn cors_layer(cors: &CorsConfig) -> AppResult<CorsLayer> {
    let origins = cors.origin_header_values()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request()))
}
