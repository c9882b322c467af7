//! Relay service: a single streaming endpoint in front of the upstream LLM API.
//!
//! - [`api`]: Router, CORS headers, and the `/ai/suggest` handler
//! - [`error`]: Input and transport failures rendered as HTTP responses
//! - [`prompt`]: Upstream request body construction
//! - [`streaming`]: Passthrough of the upstream SSE body
//! - [`upstream`]: HTTP client for the upstream API

pub mod api;
pub mod error;
pub mod prompt;
pub mod streaming;
pub mod upstream;
