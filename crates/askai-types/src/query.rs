//! Query request/response types for askai.
//!
//! These types model the data shapes exchanged with the answer service:
//! the POST body, conversation history entries, opaque source references,
//! and the `{answer, sources}` pair produced by a query.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Who authored a conversation message.
///
/// The answer service's history format labels assistant turns `"ai"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sender {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "ai", alias = "assistant")]
    Assistant,
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sender::User => write!(f, "user"),
            Sender::Assistant => write!(f, "ai"),
        }
    }
}

impl FromStr for Sender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Sender::User),
            "ai" | "assistant" => Ok(Sender::Assistant),
            other => Err(format!("invalid message sender: '{other}'")),
        }
    }
}

/// A single message in the conversation window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub sender: Sender,
    pub text: String,
}

impl ConversationMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Assistant,
            text: text.into(),
        }
    }
}

/// Opaque reference to a supporting document returned by the service.
///
/// The client never interprets the payload; it is carried through to the
/// caller exactly as received. [`SourceRef::describe`] exists only for
/// human-readable listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceRef(pub serde_json::Value);

impl SourceRef {
    /// Short human-readable label for terminal output.
    ///
    /// Prefers `repo:path`, then `title`, `url`, `path`, and finally the
    /// compact JSON form.
    pub fn describe(&self) -> String {
        let field = |name: &str| self.0.get(name).and_then(|v| v.as_str());

        if let (Some(repo), Some(path)) = (field("repo"), field("path")) {
            return format!("{repo}:{path}");
        }
        for name in ["title", "url", "path"] {
            if let Some(value) = field(name) {
                return value.to_string();
            }
        }
        match &self.0 {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Access the raw payload.
    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

impl From<serde_json::Value> for SourceRef {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// Body POSTed to both the primary and the secondary endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    pub history: Vec<ConversationMessage>,
}

/// The `{answer, sources}` pair produced by a query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryAnswer {
    pub answer: String,
    pub sources: Vec<SourceRef>,
}

impl QueryAnswer {
    pub fn new(answer: impl Into<String>, sources: Vec<SourceRef>) -> Self {
        Self {
            answer: answer.into(),
            sources,
        }
    }

    /// True when the service produced no answer text at all.
    pub fn is_empty_answer(&self) -> bool {
        self.answer.is_empty()
    }
}

/// Incremental progress for one request, delivered to subscribers.
///
/// `sequence` identifies the request that produced the update; `is_final`
/// marks the last update for that request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerUpdate {
    pub sequence: u64,
    pub answer: String,
    pub sources: Vec<SourceRef>,
    pub is_final: bool,
}
