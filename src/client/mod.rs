//! Stream consumer for the relay endpoint.
//!
//! - [`sse`]: Line framing and upstream envelope parsing
//! - [`consumer`]: Request/stream cycle as an event stream or callbacks
//! - [`suggestion`]: Parsing of the completed six-line template

pub mod consumer;
pub mod sse;
pub mod suggestion;
