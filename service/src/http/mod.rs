//! Shared HTTP plumbing: JSON error bodies and CORS.

use axum::{
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::ToSchema;

/// Error body returned by every endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

fn error(status: StatusCode, msg: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: msg.to_string(),
        }),
    )
        .into_response()
}

#[must_use]
pub fn bad_request(msg: &str) -> Response {
    error(StatusCode::BAD_REQUEST, msg)
}

#[must_use]
pub fn unauthorized(msg: &str) -> Response {
    error(StatusCode::UNAUTHORIZED, msg)
}

#[must_use]
pub fn forbidden(msg: &str) -> Response {
    error(StatusCode::FORBIDDEN, msg)
}

#[must_use]
pub fn not_found(msg: &str) -> Response {
    error(StatusCode::NOT_FOUND, msg)
}

#[must_use]
pub fn conflict(msg: &str) -> Response {
    error(StatusCode::CONFLICT, msg)
}

#[must_use]
pub fn service_unavailable(msg: &str) -> Response {
    error(StatusCode::SERVICE_UNAVAILABLE, msg)
}

/// Generic 500. Callers log the underlying cause before returning this.
#[must_use]
pub fn internal_error() -> Response {
    error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}

/// Build the CORS layer from configured origins.
///
/// `"*"` allows any origin; an empty list blocks cross-origin requests.
#[must_use]
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let allow_origin: AllowOrigin = if allowed_origins.iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow any origin - not recommended for production");
        AllowOrigin::any()
    } else if allowed_origins.is_empty() {
        tracing::info!(
            "CORS allowed origins not configured - cross-origin requests will be blocked"
        );
        AllowOrigin::list(Vec::<HeaderValue>::new())
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        tracing::info!(origins = ?allowed_origins, "CORS allowed origins configured");
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .allow_origin(allow_origin)
}
