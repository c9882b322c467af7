//! Stream consumer: one request/stream cycle against the relay.
//!
//! [`SuggestionClient::stream`] yields zero or more [`StreamEvent::Delta`]
//! followed by exactly one terminal event ([`StreamEvent::Done`] or
//! [`StreamEvent::Error`]), then ends. Dropping the stream cancels the
//! request; nothing is delivered after that.

use std::future::Future;
use std::time::Duration;

use futures::stream::Stream;
use futures::StreamExt;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use thiserror::Error;
use tokio::time::timeout;
use tracing::debug;

use crate::client::sse::{parse_line, Envelope, Frame, LineBuffer, LineTooLong};
use crate::config::ClientConfig;
use crate::protocol::SuggestionRequest;

#[derive(Error, Debug)]
pub enum ConsumerError {
    #[error("Failed to encode request: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Relay request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Relay returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("No data from relay for {0:?}")]
    IdleTimeout(Duration),

    #[error(transparent)]
    LineTooLong(#[from] LineTooLong),

    #[error("Stream ended before completion")]
    UnexpectedEof,
}

/// The caller stopped a stream before it reached a terminal event.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Suggestion stream cancelled")]
pub struct Cancelled;

/// What the caller receives incrementally.
#[derive(Debug)]
pub enum StreamEvent {
    /// A fragment of generated text.
    Delta(String),
    /// The upstream signalled completion.
    Done,
    /// The cycle failed; already delivered deltas stand.
    Error(ConsumerError),
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error(_))
    }
}

/// Callback-style delivery, driven by [`SuggestionClient::stream_suggestion`].
///
/// Callbacks run sequentially on the task that awaits the call, so a handler
/// may mutate its own state through `&mut self` without synchronization.
pub trait SuggestionHandler {
    fn on_delta(&mut self, delta: &str);
    fn on_complete(&mut self);
    fn on_error(&mut self, error: ConsumerError);
}

/// Client for the relay's suggestion endpoint.
///
/// Calls are independent: each owns its own request and stream.
#[derive(Debug, Clone)]
pub struct SuggestionClient {
    http: reqwest::Client,
    endpoint: String,
    idle_timeout: Duration,
}

impl SuggestionClient {
    /// Create a client for a relay endpoint URL.
    pub fn new(endpoint: impl Into<String>, config: &ClientConfig) -> Result<Self, ConsumerError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self::with_http(http, endpoint, config.idle_timeout()))
    }

    /// Create a client around an existing `reqwest::Client`.
    pub fn with_http(http: reqwest::Client, endpoint: impl Into<String>, idle_timeout: Duration) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            idle_timeout,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Start a suggestion stream for `context`.
    ///
    /// Nothing is sent until the stream is first polled. The idle timeout
    /// bounds the wait for response headers and for every body read.
    pub fn stream(&self, context: &str) -> impl Stream<Item = StreamEvent> + Send + 'static {
        let http = self.http.clone();
        let endpoint = self.endpoint.clone();
        let idle = self.idle_timeout;
        let payload = serde_json::to_vec(&SuggestionRequest {
            context: context.to_string(),
        });

        async_stream::stream! {
            let payload = match payload {
                Ok(payload) => payload,
                Err(e) => {
                    yield StreamEvent::Error(e.into());
                    return;
                }
            };

            let send = http
                .post(&endpoint)
                .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
                .body(payload)
                .send();

            let response = match timeout(idle, send).await {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => {
                    yield StreamEvent::Error(e.into());
                    return;
                }
                Err(_) => {
                    yield StreamEvent::Error(ConsumerError::IdleTimeout(idle));
                    return;
                }
            };

            let status = response.status();
            if !status.is_success() {
                let body = match timeout(idle, response.text()).await {
                    Ok(Ok(body)) => body,
                    _ => String::new(),
                };
                yield StreamEvent::Error(ConsumerError::Status { status, body });
                return;
            }

            let mut bytes = std::pin::pin!(response.bytes_stream());
            let mut lines = LineBuffer::new();

            loop {
                let chunk = match timeout(idle, bytes.next()).await {
                    Ok(Some(Ok(chunk))) => chunk,
                    Ok(Some(Err(e))) => {
                        yield StreamEvent::Error(e.into());
                        return;
                    }
                    Ok(None) => break,
                    Err(_) => {
                        yield StreamEvent::Error(ConsumerError::IdleTimeout(idle));
                        return;
                    }
                };

                lines.push(&chunk);
                loop {
                    let line = match lines.next_line() {
                        Ok(Some(line)) => line,
                        Ok(None) => break,
                        Err(e) => {
                            yield StreamEvent::Error(e.into());
                            return;
                        }
                    };
                    if let Some(event) = interpret(&line) {
                        let terminal = event.is_terminal();
                        yield event;
                        if terminal {
                            return;
                        }
                    }
                }
            }

            if let Some(event) = lines.finish().as_deref().and_then(interpret) {
                let terminal = event.is_terminal();
                yield event;
                if terminal {
                    return;
                }
            }

            yield StreamEvent::Error(ConsumerError::UnexpectedEof);
        }
    }

    /// Run one stream to its terminal event, reporting through `handler`.
    ///
    /// Exactly one of `on_complete` / `on_error` is called, after all
    /// `on_delta` calls. Dropping the returned future stops delivery.
    pub async fn stream_suggestion<H>(&self, context: &str, handler: &mut H)
    where
        H: SuggestionHandler + ?Sized,
    {
        let mut events = std::pin::pin!(self.stream(context));

        while let Some(event) = events.next().await {
            match event {
                StreamEvent::Delta(delta) => handler.on_delta(&delta),
                StreamEvent::Done => {
                    handler.on_complete();
                    return;
                }
                StreamEvent::Error(e) => {
                    handler.on_error(e);
                    return;
                }
            }
        }
    }

    /// Like [`stream_suggestion`](Self::stream_suggestion), but stops as soon
    /// as `cancel` resolves.
    ///
    /// On cancellation no further callbacks run, including the terminal one.
    pub async fn stream_suggestion_until<H, F>(
        &self,
        context: &str,
        handler: &mut H,
        cancel: F,
    ) -> Result<(), Cancelled>
    where
        H: SuggestionHandler + ?Sized,
        F: Future<Output = ()>,
    {
        tokio::select! {
            _ = self.stream_suggestion(context, handler) => Ok(()),
            _ = cancel => {
                debug!(endpoint = %self.endpoint, "Suggestion stream cancelled");
                Err(Cancelled)
            }
        }
    }
}

/// Map one line to the event it produces, if any.
fn interpret(line: &str) -> Option<StreamEvent> {
    match parse_line(line)? {
        Frame::Done => Some(StreamEvent::Done),
        Frame::Event(Envelope::OutputTextDelta { delta }) => Some(StreamEvent::Delta(delta)),
        Frame::Event(Envelope::Completed) => Some(StreamEvent::Done),
        Frame::Event(Envelope::Unknown) => None,
        Frame::Malformed(payload) => {
            debug!(len = payload.len(), "Skipping malformed stream frame");
            None
        }
    }
}
