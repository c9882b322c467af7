//! Relay failures that the relay itself answers for.
//!
//! Upstream non-success responses are not errors here: they are passed
//! through verbatim by [`crate::relay::streaming`].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Invalid JSON body.")]
    InvalidJson,

    #[error("Invalid request payload.")]
    InvalidPayload,

    #[error("Missing required field: context (string).")]
    MissingContext,

    #[error("Upstream request failed.")]
    Upstream(#[source] reqwest::Error),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidJson | Self::InvalidPayload | Self::MissingContext => {
                StatusCode::BAD_REQUEST
            }
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_are_bad_request() {
        for err in [
            RelayError::InvalidJson,
            RelayError::InvalidPayload,
            RelayError::MissingContext,
        ] {
            assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn test_messages() {
        assert_eq!(RelayError::InvalidJson.to_string(), "Invalid JSON body.");
        assert_eq!(
            RelayError::MissingContext.to_string(),
            "Missing required field: context (string)."
        );
    }
}
