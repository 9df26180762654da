//! Incremental NDJSON decoder.
//!
//! Chunks arrive with no framing guarantee: a record can straddle several
//! chunks and one chunk can carry several records. Bytes are buffered until a
//! newline completes a line, so multi-byte UTF-8 sequences split across chunks
//! are reassembled before any text is decoded.

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

/// One decoded line of a chat response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StreamRecord {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub message: Option<RecordMessage>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub done_reason: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub prompt_eval_count: Option<u32>,
    #[serde(default)]
    pub eval_count: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RecordMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCallFragment>>,
}

/// A tool call, or a piece of one.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ToolCallFragment {
    #[serde(default)]
    pub id: Option<String>,
    /// Position of the call this fragment continues.
    #[serde(default)]
    pub index: Option<usize>,
    #[serde(default)]
    pub function: Option<FunctionFragment>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FunctionFragment {
    #[serde(default)]
    pub name: Option<String>,
    /// Either structured JSON or a string holding (part of) a JSON document.
    #[serde(default)]
    pub arguments: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DecodeEvent {
    Record(StreamRecord),
    /// The line was dropped; decoding continues with the next one.
    Malformed { line: String, error: String },
}

/// Longest line accepted before it is dropped as malformed.
pub const MAX_LINE_BYTES: usize = 16 * 1024 * 1024;

/// How much of an oversized line is kept for the error report.
const OVERSIZED_PREVIEW: usize = 200;

#[derive(Debug)]
pub struct FrameDecoder {
    pending: Vec<u8>,
    max_line: usize,
    /// Inside an oversized line that was already reported.
    discarding: bool,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
            max_line: MAX_LINE_BYTES,
            discarding: false,
        }
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_line(mut self, max_line: usize) -> Self {
        self.max_line = max_line;
        self
    }

    /// Feed one chunk and return every record completed by it.
    ///
    /// A line longer than the limit becomes a single `Malformed` event and
    /// the rest of it is skipped up to the next newline.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<DecodeEvent> {
        let mut events = Vec::new();

        let mut chunk = chunk;
        if self.discarding {
            match chunk.iter().position(|b| *b == b'\n') {
                Some(newline) => {
                    self.discarding = false;
                    chunk = &chunk[newline + 1..];
                }
                None => return events,
            }
        }
        self.pending.extend_from_slice(chunk);

        let mut start = 0;
        while let Some(offset) = self.pending[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            let line = &self.pending[start..end];
            let event = if line.len() > self.max_line {
                Some(oversized(line, self.max_line))
            } else {
                decode_line(line)
            };
            events.extend(event);
            start = end + 1;
        }
        self.pending.drain(..start);

        if self.pending.len() > self.max_line {
            events.push(oversized(&self.pending, self.max_line));
            self.pending.clear();
            self.discarding = true;
        }

        events
    }

    /// Flush a trailing line that was never newline-terminated.
    pub fn finish(&mut self) -> Vec<DecodeEvent> {
        let rest = std::mem::take(&mut self.pending);
        if std::mem::take(&mut self.discarding) {
            return Vec::new();
        }
        decode_line(&rest).into_iter().collect()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

fn oversized(raw: &[u8], max_line: usize) -> DecodeEvent {
    warn!("dropping response line longer than {} bytes", max_line);
    let preview = &raw[..raw.len().min(OVERSIZED_PREVIEW)];
    DecodeEvent::Malformed {
        line: String::from_utf8_lossy(preview).into_owned(),
        error: format!("line exceeds {} bytes", max_line),
    }
}

fn decode_line(raw: &[u8]) -> Option<DecodeEvent> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    if raw.iter().all(u8::is_ascii_whitespace) {
        return None;
    }

    let event = match serde_json::from_slice::<StreamRecord>(raw) {
        Ok(record) => DecodeEvent::Record(record),
        Err(e) => {
            let line = String::from_utf8_lossy(raw).into_owned();
            warn!("skipping undecodable response line: {}", e);
            DecodeEvent::Malformed {
                line,
                error: e.to_string(),
            }
        }
    };
    Some(event)
}
