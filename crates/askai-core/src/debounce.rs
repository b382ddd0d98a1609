//! Trailing-edge debounce for user-triggered queries.
//!
//! A burst of triggers inside the delay window collapses into the last one.
//! Earlier scheduled calls are dropped, not queued. Once a scheduled call has
//! started running it is no longer owned by the gate.

use std::future::Future;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct PendingCall {
    token: CancellationToken,
    started: Arc<AtomicBool>,
}

/// Single-slot delayed scheduler.
pub struct DebounceGate {
    delay: Duration,
    pending: Mutex<Option<PendingCall>>,
}

impl DebounceGate {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Mutex::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `call` to run after the delay, dropping any call still waiting.
    ///
    /// The returned handle completes when `call` finishes, or immediately
    /// after the wait if a later trigger dropped it.
    pub fn trigger<F>(&self, call: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut pending = self.pending.lock().expect("debounce lock poisoned");
        if let Some(previous) = pending.take() {
            previous.token.cancel();
        }

        let token = CancellationToken::new();
        let started = Arc::new(AtomicBool::new(false));
        let task_token = token.clone();
        let task_started = Arc::clone(&started);
        let delay = self.delay;

        let handle = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = task_token.cancelled() => {
                    tracing::trace!("debounced call dropped by a later trigger");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }
            task_started.store(true, Ordering::SeqCst);
            call.await;
        });

        *pending = Some(PendingCall { token, started });
        handle
    }

    /// Drop the waiting call, if any. A call already running is unaffected.
    pub fn cancel_pending(&self) {
        if let Some(previous) = self
            .pending
            .lock()
            .expect("debounce lock poisoned")
            .take()
        {
            previous.token.cancel();
        }
    }

    /// True while a scheduled call is still waiting out its delay.
    pub fn has_pending(&self) -> bool {
        self.pending
            .lock()
            .expect("debounce lock poisoned")
            .as_ref()
            .is_some_and(|p| !p.token.is_cancelled() && !p.started.load(Ordering::SeqCst))
    }
}

impl std::fmt::Debug for DebounceGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebounceGate")
            .field("delay", &self.delay)
            .field("has_pending", &self.has_pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Notify;

    const DELAY: Duration = Duration::from_millis(300);

    #[tokio::test(start_paused = true)]
    async fn burst_collapses_to_last_call() {
        let gate = DebounceGate::new(DELAY);
        let ran = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..3 {
            let ran = Arc::clone(&ran);
            handles.push(gate.trigger(async move {
                ran.lock().unwrap().push(i);
            }));
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(*ran.lock().unwrap(), vec![2]);
        assert!(!gate.has_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn spaced_triggers_all_run() {
        let gate = DebounceGate::new(DELAY);
        let ran = Arc::new(Mutex::new(Vec::new()));

        for i in 0..2 {
            let ran = Arc::clone(&ran);
            gate.trigger(async move {
                ran.lock().unwrap().push(i);
            })
            .await
            .unwrap();
        }

        assert_eq!(*ran.lock().unwrap(), vec![0, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn call_does_not_run_before_delay() {
        let gate = DebounceGate::new(DELAY);
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let handle = gate.trigger(async move { flag.store(true, Ordering::SeqCst) });

        tokio::time::sleep(Duration::from_millis(299)).await;
        assert!(!ran.load(Ordering::SeqCst));
        assert!(gate.has_pending());

        handle.await.unwrap();
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_pending_drops_waiting_call() {
        let gate = DebounceGate::new(DELAY);
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let handle = gate.trigger(async move { flag.store(true, Ordering::SeqCst) });

        gate.cancel_pending();
        assert!(!gate.has_pending());
        handle.await.unwrap();
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn running_call_is_not_aborted_by_later_trigger() {
        let gate = DebounceGate::new(DELAY);
        let release = Arc::new(Notify::new());
        let finished = Arc::new(AtomicBool::new(false));

        let (r, f) = (Arc::clone(&release), Arc::clone(&finished));
        let first = gate.trigger(async move {
            r.notified().await;
            f.store(true, Ordering::SeqCst);
        });

        // Let the first call start.
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(!gate.has_pending());

        let second = gate.trigger(async {});
        release.notify_one();

        first.await.unwrap();
        second.await.unwrap();
        assert!(finished.load(Ordering::SeqCst));
    }
}
