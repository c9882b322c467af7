//! Passthrough of the upstream SSE body.
//!
//! The relay does not parse events: bytes are forwarded as they arrive and
//! framing is left to the consumer. When the downstream client disconnects,
//! axum drops the body stream, which drops the upstream response and closes
//! that connection as well.

use axum::body::Body;
use axum::http::header::{HeaderValue, CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::StreamExt;
use tracing::warn;

/// Convert an upstream response into the relay's response.
///
/// Success streams the body through under SSE headers. Anything else is
/// forwarded with the upstream status, body, and content type unchanged.
pub async fn relay_response(upstream: reqwest::Response, request_id: &str) -> Response {
    let status = upstream.status();

    if !status.is_success() {
        let content_type = upstream
            .headers()
            .get(CONTENT_TYPE)
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static("text/plain"));

        let body = match upstream.bytes().await {
            Ok(body) => body,
            Err(e) => {
                warn!(request_id, error = %e, "Failed to read upstream error body");
                Bytes::new()
            }
        };

        warn!(
            request_id,
            status = status.as_u16(),
            body_len = body.len(),
            "Upstream returned non-success status"
        );

        return (status, [(CONTENT_TYPE, content_type)], body).into_response();
    }

    let request_id = request_id.to_string();
    let stream = upstream.bytes_stream().inspect(move |chunk| {
        if let Err(e) = chunk {
            warn!(request_id = %request_id, error = %e, "Upstream stream interrupted");
        }
    });

    (
        status,
        [
            (CONTENT_TYPE, HeaderValue::from_static("text/event-stream")),
            (CACHE_CONTROL, HeaderValue::from_static("no-cache")),
            (CONNECTION, HeaderValue::from_static("keep-alive")),
        ],
        Body::from_stream(stream),
    )
        .into_response()
}
