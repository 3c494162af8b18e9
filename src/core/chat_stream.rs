//! Line-oriented decoding of streaming completion bodies.
//!
//! Every backend streams one of two framings (SSE `data:` lines or
//! newline-delimited JSON) carrying either incremental fragments or the full
//! candidate so far. [`StreamDecoder`] turns any of those combinations into a
//! sequence of cumulative snapshots that only ever grow.

use futures_util::{Stream, StreamExt};
use memchr::memchr;
use serde_json::Value;
use tracing::debug;

use crate::core::error::CompletionError;

/// Callback receiving the full response text accumulated so far.
pub type SnapshotCallback<'a> = dyn FnMut(&str) + Send + 'a;

const SSE_DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WireFormat {
    /// `data: {json}` lines, terminated by `data: [DONE]`.
    ServerSentEvents,
    /// One JSON object per line.
    NdJson,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Accumulation {
    /// Each record carries a fragment to append.
    Delta,
    /// Each record carries the whole candidate text so far.
    FullCandidate,
}

/// How one backend frames and fills its streaming records.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamShape {
    pub format: WireFormat,
    pub accumulation: Accumulation,
    /// JSON pointer to the text inside one record.
    pub text_path: &'static str,
    /// JSON pointer to a boolean that ends the stream when `true`.
    pub done_path: Option<&'static str>,
}

impl StreamShape {
    pub const fn sse_delta(text_path: &'static str) -> Self {
        Self {
            format: WireFormat::ServerSentEvents,
            accumulation: Accumulation::Delta,
            text_path,
            done_path: None,
        }
    }

    pub const fn ndjson_delta(text_path: &'static str, done_path: &'static str) -> Self {
        Self {
            format: WireFormat::NdJson,
            accumulation: Accumulation::Delta,
            text_path,
            done_path: Some(done_path),
        }
    }
}

enum LineOutcome {
    Skip,
    End,
    Record(Value),
}

pub struct StreamDecoder {
    shape: StreamShape,
    buffer: Vec<u8>,
    snapshot: String,
    finished: bool,
}

impl StreamDecoder {
    pub fn new(shape: StreamShape) -> Self {
        Self {
            shape,
            buffer: Vec::new(),
            snapshot: String::new(),
            finished: false,
        }
    }

    pub fn snapshot(&self) -> &str {
        &self.snapshot
    }

    /// True once a sentinel or `done` record has been seen.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Buffer `chunk` and process every complete line it closes.
    pub fn feed<F>(&mut self, chunk: &[u8], on_snapshot: &mut F)
    where
        F: FnMut(&str) + ?Sized,
    {
        if self.finished {
            return;
        }

        self.buffer.extend_from_slice(chunk);
        while let Some(newline_pos) = memchr(b'\n', &self.buffer) {
            let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            self.process_line(&line[..newline_pos], on_snapshot);
            if self.finished {
                self.buffer.clear();
                return;
            }
        }
    }

    /// Process any unterminated trailing line and return the final text.
    pub fn finish<F>(mut self, on_snapshot: &mut F) -> String
    where
        F: FnMut(&str) + ?Sized,
    {
        if !self.finished && !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            self.process_line(&rest, on_snapshot);
        }
        self.snapshot
    }

    fn process_line<F>(&mut self, raw: &[u8], on_snapshot: &mut F)
    where
        F: FnMut(&str) + ?Sized,
    {
        let line = match std::str::from_utf8(raw) {
            Ok(line) => line.trim(),
            Err(err) => {
                debug!(error = %err, "skipping stream line with invalid UTF-8");
                return;
            }
        };

        let record = match self.classify(line) {
            LineOutcome::Skip => return,
            LineOutcome::End => {
                self.finished = true;
                return;
            }
            LineOutcome::Record(record) => record,
        };

        if let Some(text) = record.pointer(self.shape.text_path).and_then(Value::as_str) {
            if self.apply(text) {
                on_snapshot(&self.snapshot);
            }
        }

        if let Some(done_path) = self.shape.done_path {
            if record.pointer(done_path).and_then(Value::as_bool) == Some(true) {
                self.finished = true;
            }
        }
    }

    fn classify(&self, line: &str) -> LineOutcome {
        if line.is_empty() {
            return LineOutcome::Skip;
        }

        let payload = match self.shape.format {
            WireFormat::ServerSentEvents => match line.strip_prefix(SSE_DATA_PREFIX) {
                Some(payload) => payload.trim_start(),
                // event:, id:, retry: and ": comment" lines carry no text.
                None => return LineOutcome::Skip,
            },
            WireFormat::NdJson => line,
        };

        if self.shape.format == WireFormat::ServerSentEvents && payload == DONE_SENTINEL {
            return LineOutcome::End;
        }
        if payload.is_empty() {
            return LineOutcome::Skip;
        }

        match serde_json::from_str::<Value>(payload) {
            Ok(record) => LineOutcome::Record(record),
            Err(err) => {
                debug!(error = %err, "skipping unparseable stream line");
                LineOutcome::Skip
            }
        }
    }

    /// Returns true when the snapshot changed.
    fn apply(&mut self, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }

        match self.shape.accumulation {
            Accumulation::Delta => self.snapshot.push_str(text),
            Accumulation::FullCandidate => {
                if text.len() <= self.snapshot.len() {
                    return false;
                }
                self.snapshot.clear();
                self.snapshot.push_str(text);
            }
        }
        true
    }
}

/// Drive a byte stream through a [`StreamDecoder`] until it ends or signals
/// completion, returning the final cumulative text.
pub async fn decode_stream<S, B, E>(
    stream: S,
    shape: StreamShape,
    mut on_snapshot: Option<&mut SnapshotCallback<'_>>,
) -> Result<String, CompletionError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let mut stream = std::pin::pin!(stream);
    let mut decoder = StreamDecoder::new(shape);
    let mut ignore = |_: &str| {};

    while let Some(chunk) = stream.next().await {
        let bytes = chunk
            .map_err(|err| CompletionError::Network(format!("Response stream interrupted: {err}")))?;
        match on_snapshot.as_mut() {
            Some(callback) => decoder.feed(bytes.as_ref(), &mut **callback),
            None => decoder.feed(bytes.as_ref(), &mut ignore),
        }
        if decoder.is_finished() {
            break;
        }
    }

    Ok(match on_snapshot {
        Some(callback) => decoder.finish(callback),
        None => decoder.finish(&mut ignore),
    })
}
