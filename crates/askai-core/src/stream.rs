//! Incremental parser for the answer service's response bodies.
//!
//! Streaming bodies (`text/event-stream`) arrive as arbitrarily sized byte
//! chunks. Records are separated by a blank line; within a record the first
//! `data:` line carries the payload:
//!
//! ```text
//! data: {"answer":"Hel"}
//!
//! data: {"answer":"lo","chunks":[{"repo":"docs","path":"a.md"}]}
//!
//! data: [DONE]
//!
//! ```
//!
//! Records without a `data:` line are literal answer text. Payloads decode
//! into [`Payload`]; anything that is not valid JSON is appended verbatim
//! rather than dropped.
//!
//! Non-streaming bodies are a single JSON document, handled by
//! [`parse_json_body`].

use askai_types::query::{QueryAnswer, SourceRef};
use serde_json::Value;

/// End-of-stream sentinel sent as a `data:` payload.
pub const DONE_SENTINEL: &str = "[DONE]";

const RECORD_SEPARATOR: &str = "\n\n";
const DATA_FIELD: &str = "data:";

/// Answer text and source list built up while a response streams.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamAccumulator {
    pub answer: String,
    pub sources: Vec<SourceRef>,
}

impl StreamAccumulator {
    pub fn snapshot(&self) -> QueryAnswer {
        QueryAnswer {
            answer: self.answer.clone(),
            sources: self.sources.clone(),
        }
    }

    pub fn into_answer(self) -> QueryAnswer {
        QueryAnswer {
            answer: self.answer,
            sources: self.sources,
        }
    }

    fn apply(&mut self, payload: Payload) {
        match payload {
            Payload::Done | Payload::Ignored => {}
            Payload::Fragment { answer, sources } => {
                if let Some(fragment) = answer {
                    self.answer.push_str(&fragment);
                }
                // The service always sends the complete current list.
                if let Some(sources) = sources {
                    self.sources = sources;
                }
            }
            Payload::Text(text) | Payload::Raw(text) => self.answer.push_str(&text),
        }
    }
}

/// Decoded form of one record's payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// The end-of-stream sentinel.
    Done,
    /// A JSON object with an optional answer fragment and/or source list.
    Fragment {
        answer: Option<String>,
        sources: Option<Vec<SourceRef>>,
    },
    /// A bare JSON string.
    Text(String),
    /// Valid JSON of a shape that carries nothing for the reader.
    Ignored,
    /// Not JSON at all; used verbatim.
    Raw(String),
}

/// Decode a `data:` payload (marker already stripped).
pub fn decode_payload(data: &str) -> Payload {
    if data == DONE_SENTINEL {
        return Payload::Done;
    }

    match serde_json::from_str::<Value>(data) {
        Ok(Value::String(text)) => Payload::Text(text),
        Ok(Value::Object(object)) => {
            let answer = object
                .get("answer")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string);
            let sources = extract_sources(&object);
            Payload::Fragment { answer, sources }
        }
        Ok(other) => {
            tracing::debug!(payload = %other, "ignoring payload without answer or sources");
            Payload::Ignored
        }
        Err(_) => Payload::Raw(data.to_string()),
    }
}

/// Source list of a payload object.
///
/// `chunks` and `sources` are aliases; `chunks` wins when both are arrays.
/// Streamed records and whole bodies share this precedence, so a cached
/// answer never depends on which response format the endpoint chose.
fn extract_sources(object: &serde_json::Map<String, Value>) -> Option<Vec<SourceRef>> {
    ["chunks", "sources"].iter().find_map(|field| {
        object
            .get(*field)
            .and_then(Value::as_array)
            .map(|items| items.iter().cloned().map(SourceRef).collect())
    })
}

/// Parse a complete non-streaming body.
///
/// A bare JSON string is the whole answer; an object contributes `answer`
/// and its source list. A body that is not JSON is used as raw answer text.
pub fn parse_json_body(body: &[u8]) -> QueryAnswer {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::String(answer)) => QueryAnswer::new(answer, Vec::new()),
        Ok(Value::Object(object)) => {
            let answer = object
                .get("answer")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let sources = extract_sources(&object).unwrap_or_default();
            QueryAnswer::new(answer, sources)
        }
        Ok(other) => {
            tracing::debug!(body = %other, "non-streaming body carries no answer");
            QueryAnswer::default()
        }
        Err(err) => {
            let text = String::from_utf8_lossy(body).trim().to_string();
            if !text.is_empty() {
                tracing::debug!(error = %err, "non-streaming body is not JSON, using raw text");
            }
            QueryAnswer::new(text, Vec::new())
        }
    }
}

/// UTF-8 decoder that tolerates multi-byte sequences split across chunks.
///
/// An incomplete sequence at the end of a chunk is held back until the next
/// chunk arrives. Bytes that can never form valid UTF-8 become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next chunk, returning all text that is complete so far.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let bytes = if self.pending.is_empty() {
            chunk.to_vec()
        } else {
            let mut combined = std::mem::take(&mut self.pending);
            combined.extend_from_slice(chunk);
            combined
        };

        let mut out = String::with_capacity(bytes.len());
        let mut input = bytes.as_slice();

        loop {
            match std::str::from_utf8(input) {
                Ok(text) => {
                    out.push_str(text);
                    break;
                }
                Err(err) => {
                    let (valid, rest) = input.split_at(err.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match err.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            input = &rest[len..];
                        }
                        None => {
                            // Truncated sequence at the tail: wait for more bytes.
                            self.pending = rest.to_vec();
                            break;
                        }
                    }
                }
            }
        }

        out
    }

    /// Flush held-back bytes at end of input.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        let pending = std::mem::take(&mut self.pending);
        String::from_utf8_lossy(&pending).into_owned()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

/// Event-stream parser: bytes in, accumulated answer out.
#[derive(Debug, Default)]
pub struct StreamParser {
    decoder: Utf8StreamDecoder,
    buffer: String,
    accumulator: StreamAccumulator,
}

impl StreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one received chunk.
    ///
    /// `on_update` runs once after every complete record except the `[DONE]`
    /// sentinel. Returns the number of records processed.
    pub fn feed<F>(&mut self, chunk: &[u8], on_update: &mut F) -> usize
    where
        F: FnMut(&StreamAccumulator) + ?Sized,
    {
        let text = self.decoder.decode(chunk);
        self.buffer.push_str(&text);

        let mut processed = 0;
        while let Some(end) = self.buffer.find(RECORD_SEPARATOR) {
            let record: String = self.buffer.drain(..end + RECORD_SEPARATOR.len()).collect();
            let record = &record[..end];
            processed += 1;

            if self.process_record(record) {
                on_update(&self.accumulator);
            }
        }
        processed
    }

    /// Signal end of body: emit the final update and return the result.
    pub fn finish<F>(mut self, on_update: &mut F) -> QueryAnswer
    where
        F: FnMut(&StreamAccumulator) + ?Sized,
    {
        let tail = self.decoder.finish();
        self.buffer.push_str(&tail);
        if !self.buffer.trim().is_empty() {
            tracing::debug!(
                remainder_len = self.buffer.len(),
                "discarding unterminated record at end of stream"
            );
        }

        on_update(&self.accumulator);
        self.accumulator.into_answer()
    }

    pub fn accumulator(&self) -> &StreamAccumulator {
        &self.accumulator
    }

    /// Apply one record. Returns false when the record was the sentinel.
    fn process_record(&mut self, record: &str) -> bool {
        let data_line = record.split('\n').find(|line| line.starts_with(DATA_FIELD));

        let Some(line) = data_line else {
            self.accumulator.apply(Payload::Raw(record.to_string()));
            return true;
        };

        let data = line[DATA_FIELD.len()..].trim();
        let payload = decode_payload(data);
        if payload == Payload::Done {
            return false;
        }
        self.accumulator.apply(payload);
        true
    }
}
