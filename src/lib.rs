//! fitscribe-relay: streaming suggestion relay for workout logging.
//!
//! A single POST endpoint accepts a workout context, asks an upstream LLM
//! for a streamed, templated suggestion, and pipes the upstream SSE body
//! back unmodified. The [`client`] module is the matching consumer that
//! turns that body into text deltas.

pub mod client;
pub mod config;
pub mod protocol;
pub mod relay;
