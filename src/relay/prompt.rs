//! Upstream request construction.
//!
//! Every suggestion request becomes one streamed call to the upstream
//! Responses API: a fixed system instruction, then the caller's context
//! followed by the six-line output template.

use serde::Serialize;

/// Sampling temperature. Kept low so the template is followed consistently.
pub const TEMPERATURE: f64 = 0.3;

pub const SYSTEM_PROMPT: &str = concat!(
    "You are a concise fitness logging assistant. ",
    "You are a scribe, not a coach. ",
    "Output must be short, factual, and structured. ",
    "Do not ask questions. ",
    "Always follow the output format.",
);

pub const OUTPUT_FORMAT: &str = concat!(
    "NEXT_SET: <weight> x <reps> (optional RPE)\n",
    "PROGRESSION: <one short line>\n",
    "ANOMALY: <one short line or 'none'>\n",
    "SUMMARY1: <short line>\n",
    "SUMMARY2: <short line>\n",
    "SUMMARY3: <short line>",
);

/// Streaming request body for the upstream Responses API.
#[derive(Debug, Serialize)]
pub struct ResponsesRequest {
    pub model: String,
    pub stream: bool,
    pub temperature: f64,
    pub input: Vec<InputMessage>,
}

#[derive(Debug, Serialize)]
pub struct InputMessage {
    pub role: &'static str,
    pub content: Vec<InputContent>,
}

#[derive(Debug, Serialize)]
pub struct InputContent {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: String,
}

impl InputMessage {
    fn text(role: &'static str, text: String) -> Self {
        Self {
            role,
            content: vec![InputContent {
                kind: "input_text",
                text,
            }],
        }
    }
}

/// The user turn: caller context, then the output template.
pub fn user_turn(context: &str) -> String {
    format!("Context:\n{context}\n\nOutput format:\n{OUTPUT_FORMAT}")
}

/// Build the streamed upstream request for a validated context.
pub fn build_request(model: &str, context: &str) -> ResponsesRequest {
    ResponsesRequest {
        model: model.to_string(),
        stream: true,
        temperature: TEMPERATURE,
        input: vec![
            InputMessage::text("system", SYSTEM_PROMPT.to_string()),
            InputMessage::text("user", user_turn(context)),
        ],
    }
}
