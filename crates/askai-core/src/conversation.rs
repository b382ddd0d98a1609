//! Bounded conversation window.
//!
//! Holds the user/assistant exchange shown to the user and sent back to the
//! service as history. The window never exceeds `max_messages`; the oldest
//! messages fall off first.

use askai_types::query::{ConversationMessage, Sender, SourceRef};

#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<ConversationMessage>,
    max_messages: usize,
    sources: Vec<SourceRef>,
}

impl Conversation {
    pub fn new(max_messages: usize) -> Self {
        Self {
            messages: Vec::new(),
            max_messages: max_messages.max(1),
            sources: Vec::new(),
        }
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    pub fn max_messages(&self) -> usize {
        self.max_messages
    }

    /// History payload for a new question: the trailing `max_messages - 1`
    /// messages followed by the question itself.
    pub fn history_for(&self, user_text: &str) -> Vec<ConversationMessage> {
        let keep = self.max_messages - 1;
        let start = self.messages.len().saturating_sub(keep);
        let mut history = self.messages[start..].to_vec();
        history.push(ConversationMessage::user(user_text));
        history
    }

    /// Append the question and an empty assistant placeholder.
    pub fn push_exchange(&mut self, user_text: &str) {
        self.messages.push(ConversationMessage::user(user_text));
        self.messages.push(ConversationMessage::assistant(""));
        self.trim();
    }

    /// Append a question and its already-known answer (cache hits).
    pub fn push_answered(&mut self, user_text: &str, answer: &str) {
        self.messages.push(ConversationMessage::user(user_text));
        self.messages.push(ConversationMessage::assistant(answer));
        self.trim();
    }

    /// Overwrite the last assistant message, or append one if the window
    /// ends with a user message.
    pub fn fill_last_assistant(&mut self, text: &str) {
        match self.messages.last_mut() {
            Some(last) if last.sender == Sender::Assistant => last.text = text.to_string(),
            _ => {
                self.messages.push(ConversationMessage::assistant(text));
                self.trim();
            }
        }
    }

    /// Sources of the most recently answered question.
    pub fn sources(&self) -> &[SourceRef] {
        &self.sources
    }

    pub fn set_sources(&mut self, sources: Vec<SourceRef>) {
        self.sources = sources;
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.sources.clear();
    }

    fn trim(&mut self) {
        if self.messages.len() > self.max_messages {
            let excess = self.messages.len() - self.max_messages;
            self.messages.drain(..excess);
        }
    }
}
