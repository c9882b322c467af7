//! SSE line framing and the upstream event envelope.
//!
//! The relay forwards the upstream body untouched, so consumers see the
//! vendor stream directly:
//!
//! ```text
//! data: {"type":"response.output_text.delta","delta":"NEXT"}
//!
//! data: {"type":"response.completed","response":{...}}
//!
//! data: [DONE]
//! ```

use serde::Deserialize;
use thiserror::Error;

/// Prefix of every line that carries a payload.
pub const DATA_PREFIX: &str = "data: ";

/// Payload that terminates the stream regardless of envelope contents.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Upstream event envelope, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum Envelope {
    #[serde(rename = "response.output_text.delta")]
    OutputTextDelta { delta: String },

    #[serde(rename = "response.completed")]
    Completed,

    /// Any other event type. Ignored by consumers.
    #[serde(other)]
    Unknown,
}

/// One classified `data:` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Done,
    Event(Envelope),
    /// Payload that is not a recognizable envelope. Skipped, never fatal.
    Malformed(String),
}

/// Classify a single line. Returns `None` for non-data lines
/// (blank separators, comments, `event:` fields, keep-alives).
pub fn parse_line(line: &str) -> Option<Frame> {
    let payload = line.strip_prefix(DATA_PREFIX)?;

    if payload == DONE_SENTINEL {
        return Some(Frame::Done);
    }

    Some(match serde_json::from_str::<Envelope>(payload) {
        Ok(envelope) => Frame::Event(envelope),
        Err(_) => Frame::Malformed(payload.to_string()),
    })
}

/// Longest line accepted before the stream is abandoned.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Stream line exceeds {limit} bytes")]
pub struct LineTooLong {
    pub limit: usize,
}

/// Reassembles lines from arbitrarily chunked bytes.
///
/// Lines end at `\n`, `\r\n`, or a lone `\r`. Splitting happens at the byte
/// level so multi-byte characters cut across chunks are decoded intact.
/// Bytes already searched are not rescanned when more data arrives.
#[derive(Debug)]
pub struct LineBuffer {
    buf: Vec<u8>,
    /// Start of the first unconsumed line.
    start: usize,
    /// Everything before this index is known to hold no terminator.
    scanned: usize,
    /// The last line ended in `\r`; a following `\n` belongs to it.
    after_cr: bool,
    limit: usize,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::with_limit(MAX_LINE_BYTES)
    }
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            buf: Vec::new(),
            start: 0,
            scanned: 0,
            after_cr: false,
            limit,
        }
    }

    /// Append a chunk of body bytes.
    pub fn push(&mut self, chunk: &[u8]) {
        if self.start > 0 {
            self.buf.drain(..self.start);
            self.scanned -= self.start;
            self.start = 0;
        }
        self.buf.extend_from_slice(chunk);
    }

    /// Take the next complete line, if one is buffered.
    ///
    /// Fails once a line grows past the limit, terminated or not.
    pub fn next_line(&mut self) -> Result<Option<String>, LineTooLong> {
        self.skip_lf_after_cr();

        let from = self.scanned.max(self.start);
        let found = self.buf[from..]
            .iter()
            .position(|&b| b == b'\n' || b == b'\r');

        let Some(offset) = found else {
            self.scanned = self.buf.len();
            if self.buf.len() - self.start > self.limit {
                return Err(LineTooLong { limit: self.limit });
            }
            return Ok(None);
        };

        let end = from + offset;
        if end - self.start > self.limit {
            return Err(LineTooLong { limit: self.limit });
        }

        self.after_cr = self.buf[end] == b'\r';
        let line = String::from_utf8_lossy(&self.buf[self.start..end]).into_owned();
        self.start = end + 1;
        self.scanned = self.start;
        Ok(Some(line))
    }

    /// Take whatever remains after the body ended without a final terminator.
    pub fn finish(&mut self) -> Option<String> {
        self.skip_lf_after_cr();
        let rest = (self.start < self.buf.len())
            .then(|| String::from_utf8_lossy(&self.buf[self.start..]).into_owned());

        self.buf.clear();
        self.start = 0;
        self.scanned = 0;
        self.after_cr = false;
        rest
    }

    fn skip_lf_after_cr(&mut self) {
        if !self.after_cr || self.start >= self.buf.len() {
            return;
        }
        if self.buf[self.start] == b'\n' {
            self.start += 1;
            self.scanned = self.scanned.max(self.start);
        }
        self.after_cr = false;
    }
}
