//! Interactive ask session: debounce in front of the orchestrator.

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use askai_types::config::ClientConfig;
use askai_types::error::UserNotice;
use askai_types::query::{AnswerUpdate, ConversationMessage, SourceRef};

use crate::debounce::DebounceGate;
use crate::fallback::FallbackCoordinator;
use crate::orchestrator::{RequestOrchestrator, RunOutcome};

/// One user-facing conversation.
///
/// [`ask`](Self::ask) is for typed input: rapid submissions collapse into the
/// last one. [`ask_now`](Self::ask_now) skips the debounce and returns the
/// outcome directly.
#[derive(Debug)]
pub struct AskSession {
    orchestrator: RequestOrchestrator,
    debounce: DebounceGate,
}

impl AskSession {
    pub fn new(orchestrator: RequestOrchestrator, debounce: DebounceGate) -> Self {
        Self {
            orchestrator,
            debounce,
        }
    }

    /// Build a session with the orchestrator and debounce delay from `config`.
    pub fn from_config(fallback: FallbackCoordinator, config: &ClientConfig) -> Self {
        Self::new(
            RequestOrchestrator::new(fallback, config),
            DebounceGate::new(config.debounce_delay()),
        )
    }

    /// Supersede whatever is in flight and schedule `text` after the debounce delay.
    ///
    /// Results arrive on the bus; the handle resolves once the scheduled run
    /// (if it survives the debounce) has finished.
    pub fn ask(&self, text: impl Into<String>) -> JoinHandle<()> {
        let text = text.into();
        self.orchestrator.supersede();

        let orchestrator = self.orchestrator.clone();
        self.debounce.trigger(async move {
            match orchestrator.run(&text).await {
                Ok(outcome) => tracing::debug!(?outcome, "debounced ask finished"),
                Err(notice) => tracing::debug!(%notice, "debounced ask failed"),
            }
        })
    }

    /// Run `text` immediately, dropping any debounced ask still waiting.
    pub async fn ask_now(&self, text: &str) -> Result<RunOutcome, UserNotice> {
        self.debounce.cancel_pending();
        self.orchestrator.run(text).await
    }

    /// Cancel the waiting ask and the request in flight.
    ///
    /// Returns true if a request was in flight.
    pub fn cancel(&self) -> bool {
        self.debounce.cancel_pending();
        self.orchestrator.cancel()
    }

    /// End the conversation: drop pending and in-flight work, then clear
    /// messages and sources. The in-flight request is discarded silently.
    pub fn end(&self) {
        self.debounce.cancel_pending();
        self.orchestrator.supersede();
        self.orchestrator.clear_conversation();
        tracing::info!("conversation ended");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AnswerUpdate> {
        self.orchestrator.subscribe()
    }

    pub fn messages(&self) -> Vec<ConversationMessage> {
        self.orchestrator.messages()
    }

    pub fn last_sources(&self) -> Vec<SourceRef> {
        self.orchestrator.last_sources()
    }

    pub fn orchestrator(&self) -> &RequestOrchestrator {
        &self.orchestrator
    }
}
