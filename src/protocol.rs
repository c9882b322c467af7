//! Request contract shared by the relay and its consumers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::relay::error::RelayError;

/// Path of the single relay endpoint.
pub const SUGGEST_PATH: &str = "/ai/suggest";

/// Inbound payload: a free-text workout context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionRequest {
    pub context: String,
}

impl SuggestionRequest {
    /// Validate a raw request body.
    ///
    /// The body must be a JSON object whose `context` is a string that is
    /// non-empty after trimming. The context itself is kept as sent.
    pub fn from_json(body: &[u8]) -> Result<Self, RelayError> {
        let value: Value = serde_json::from_slice(body).map_err(|_| RelayError::InvalidJson)?;
        let object = value.as_object().ok_or(RelayError::InvalidPayload)?;

        let context = object
            .get("context")
            .and_then(Value::as_str)
            .filter(|context| !context.trim().is_empty())
            .ok_or(RelayError::MissingContext)?;

        Ok(Self {
            context: context.to_string(),
        })
    }
}
