//! HTTP surface of the relay.
//!
//! - POST /ai/suggest    streams a suggestion
//! - OPTIONS (any path)  CORS preflight, 204
//!
//! Every response, errors included, carries the CORS header set.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::{
    HeaderName, HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN,
};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::protocol::{SuggestionRequest, SUGGEST_PATH};
use crate::relay::error::RelayError;
use crate::relay::streaming::relay_response;
use crate::relay::upstream::UpstreamClient;

/// CORS headers attached to every response.
pub const CORS_HEADERS: [(HeaderName, &str); 3] = [
    (ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
    (ACCESS_CONTROL_ALLOW_METHODS, "POST, OPTIONS"),
    (ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type, Authorization"),
];

/// Application state shared across handlers.
pub struct AppState {
    pub upstream: UpstreamClient,
}

/// Build the axum router with the relay route, fallbacks, and CORS headers.
pub fn build_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route(
            SUGGEST_PATH,
            post(suggest).options(preflight).fallback(method_not_allowed),
        )
        .fallback(not_found)
        .with_state(state);

    for (name, value) in CORS_HEADERS {
        router = router.layer(SetResponseHeaderLayer::overriding(
            name,
            HeaderValue::from_static(value),
        ));
    }

    router.layer(TraceLayer::new_for_http())
}

// ─── Route Handlers ────────────────────────────────────────────────────────

async fn suggest(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, RelayError> {
    let request_id = Uuid::new_v4().to_string();

    let request = SuggestionRequest::from_json(&body).inspect_err(|e| {
        debug!(request_id, error = %e, "Rejected suggestion request");
    })?;

    info!(
        request_id,
        model = state.upstream.model(),
        context_len = request.context.len(),
        "Suggestion request"
    );

    let upstream = state
        .upstream
        .open_stream(&request.context)
        .await
        .map_err(|e| {
            error!(request_id, error = %e, "Upstream request failed");
            RelayError::Upstream(e)
        })?;

    Ok(relay_response(upstream, &request_id).await)
}

async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn method_not_allowed() -> Response {
    (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed").into_response()
}

async fn not_found(method: Method) -> Response {
    if method == Method::OPTIONS {
        return StatusCode::NO_CONTENT.into_response();
    }
    (StatusCode::NOT_FOUND, "Not Found").into_response()
}
