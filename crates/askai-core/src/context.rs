//! Per-attempt request context.
//!
//! A `RequestContext` bundles what every layer below the orchestrator needs
//! to know about the query it is serving: its sequence number (used for
//! staleness checks), its cancellation token, and the inactivity window
//! applied to every wait on the network.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Execution context for one orchestrated query.
///
/// Cloning shares the cancellation token; cancelling any clone cancels all.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Monotonic sequence number assigned by the orchestrator.
    pub sequence: u64,
    /// Signalled when the request is superseded or aborted.
    pub cancellation: CancellationToken,
    /// Maximum silence tolerated between two received chunks.
    pub inactivity: Duration,
}

impl RequestContext {
    pub fn new(sequence: u64, inactivity: Duration) -> Self {
        Self {
            sequence,
            cancellation: CancellationToken::new(),
            inactivity,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Cancel this context. Cancelling twice, or after completion, is a no-op.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }
}
