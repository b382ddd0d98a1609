//! Broadcast channel for streamed answer progress.
//!
//! The orchestrator publishes an [`AnswerUpdate`] after every parsed record
//! and once more with the final text. Front ends subscribe and render.
//! Publishing with no active subscribers is a no-op.

use askai_types::query::AnswerUpdate;
use tokio::sync::broadcast;

/// Default number of buffered updates per receiver before it lags.
pub const DEFAULT_BUS_CAPACITY: usize = 256;

/// Multi-consumer bus of [`AnswerUpdate`]s.
///
/// Cloning the bus clones the sender.
#[derive(Clone)]
pub struct AnswerBus {
    sender: broadcast::Sender<AnswerUpdate>,
}

impl AnswerBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to all future updates.
    pub fn subscribe(&self) -> broadcast::Receiver<AnswerUpdate> {
        self.sender.subscribe()
    }

    pub fn publish(&self, update: AnswerUpdate) {
        let _ = self.sender.send(update);
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for AnswerBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

impl std::fmt::Debug for AnswerBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerBus")
            .field("receiver_count", &self.sender.receiver_count())
            .finish()
    }
}
