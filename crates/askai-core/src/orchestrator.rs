//! Single-flight query orchestration.
//!
//! The orchestrator owns the "current request" slot. Every call to
//! [`RequestOrchestrator::run`] takes a fresh sequence number and a fresh
//! cancellation token, and cancels whatever was current before. Results of a
//! request are applied to the conversation, the cache, and the answer bus
//! only while that request is still current; the check happens at the moment
//! of each effect, under the slot's lock.
//!
//! Lock order is always `current` → `conversation`. Neither lock is held
//! across an `.await`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info_span};

use askai_types::config::ClientConfig;
use askai_types::error::UserNotice;
use askai_types::query::{AnswerUpdate, ConversationMessage, QueryAnswer, QueryRequest, SourceRef};

use crate::bus::{AnswerBus, DEFAULT_BUS_CAPACITY};
use crate::cache::ResponseCache;
use crate::context::RequestContext;
use crate::conversation::Conversation;
use crate::fallback::FallbackCoordinator;
use crate::normalize::normalize;
use crate::stream::StreamAccumulator;

/// How a call to [`RequestOrchestrator::run`] ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The answer was applied and published as the final update.
    Answered { answer: QueryAnswer, from_cache: bool },
    /// The input normalized to nothing; no request was made.
    NoQuestion,
    /// A newer request took over; nothing from this one was applied.
    Superseded,
}

#[derive(Debug)]
struct CurrentRequest {
    sequence: u64,
    token: CancellationToken,
}

struct Inner {
    fallback: FallbackCoordinator,
    cache: ResponseCache,
    conversation: Mutex<Conversation>,
    bus: AnswerBus,
    current: Mutex<Option<CurrentRequest>>,
    next_sequence: AtomicU64,
    inactivity: Duration,
}

/// Drives queries through cache, fallback cascade and the answer bus.
///
/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct RequestOrchestrator {
    inner: Arc<Inner>,
}

impl RequestOrchestrator {
    pub fn new(fallback: FallbackCoordinator, config: &ClientConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                fallback,
                cache: ResponseCache::new(config.cache_capacity, config.cache_ttl()),
                conversation: Mutex::new(Conversation::new(config.max_messages)),
                bus: AnswerBus::new(DEFAULT_BUS_CAPACITY),
                current: Mutex::new(None),
                next_sequence: AtomicU64::new(0),
                inactivity: config.inactivity_timeout(),
            }),
        }
    }

    /// Ask `question`, superseding any request in flight.
    ///
    /// Streamed progress is published on the bus (see
    /// [`subscribe`](Self::subscribe)). The only error is a [`UserNotice`],
    /// and only for a request that was still current when it failed.
    pub async fn run(&self, question: &str) -> Result<RunOutcome, UserNotice> {
        let key = normalize(question);
        if key.is_empty() {
            return Ok(RunOutcome::NoQuestion);
        }
        let text = question.trim();
        let ctx = self.begin();
        let sequence = ctx.sequence;

        if let Some(entry) = self.inner.cache.lookup(&key) {
            tracing::debug!(sequence, key = %key, "answer served from cache");
            let answer = entry.into_answer();
            let applied = self.if_current(sequence, |inner| {
                let mut conversation = inner.lock_conversation();
                conversation.push_answered(text, &answer.answer);
                conversation.set_sources(answer.sources.clone());
                inner.publish(sequence, &answer.answer, &answer.sources, true);
            });
            self.release(sequence);
            return Ok(if applied {
                RunOutcome::Answered {
                    answer,
                    from_cache: true,
                }
            } else {
                RunOutcome::Superseded
            });
        }

        let history = self.inner.lock_conversation().history_for(text);
        self.if_current(sequence, |inner| inner.lock_conversation().push_exchange(text));

        let request = QueryRequest {
            question: text.to_string(),
            history,
        };
        let mut on_update = |acc: &StreamAccumulator| {
            self.if_current(sequence, |inner| {
                inner.lock_conversation().fill_last_assistant(&acc.answer);
                inner.publish(sequence, &acc.answer, &acc.sources, false);
            });
        };

        let span = info_span!(
            "askai.query",
            sequence,
            primary = self.inner.fallback.primary_name(),
            secondary = self.inner.fallback.secondary_name(),
        );
        let result = self
            .inner
            .fallback
            .resolve(&request, &ctx, &mut on_update)
            .instrument(span)
            .await;

        let outcome = match result {
            Ok(resolution) => {
                let answer = resolution.answer;
                let applied = self.if_current(sequence, |inner| {
                    let mut conversation = inner.lock_conversation();
                    conversation.fill_last_assistant(&answer.answer);
                    conversation.set_sources(answer.sources.clone());
                    if resolution.cacheable {
                        inner
                            .cache
                            .insert(&key, answer.answer.clone(), answer.sources.clone());
                    }
                    inner.publish(sequence, &answer.answer, &answer.sources, true);
                });
                if applied {
                    Ok(RunOutcome::Answered {
                        answer,
                        from_cache: false,
                    })
                } else {
                    Ok(RunOutcome::Superseded)
                }
            }
            Err(err) => {
                let notice = UserNotice::from(&err);
                let applied = self.if_current(sequence, |inner| {
                    let mut conversation = inner.lock_conversation();
                    conversation.fill_last_assistant(notice.message());
                    conversation.set_sources(Vec::new());
                    inner.publish(sequence, notice.message(), &[], true);
                });
                if applied {
                    tracing::warn!(sequence, error = %err, "query failed");
                    Err(notice)
                } else {
                    Ok(RunOutcome::Superseded)
                }
            }
        };

        self.release(sequence);
        outcome
    }

    /// Abort the current request on the user's behalf.
    ///
    /// The request stays current, so its cancellation notice is still shown.
    /// Returns false when nothing was in flight.
    pub fn cancel(&self) -> bool {
        let current = self.inner.lock_current();
        match current.as_ref() {
            Some(request) => {
                tracing::info!(sequence = request.sequence, "request cancelled by user");
                request.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Invalidate the current request without starting a new one.
    ///
    /// Its outcome, whatever it turns out to be, is discarded.
    pub fn supersede(&self) {
        if let Some(request) = self.inner.lock_current().take() {
            tracing::debug!(sequence = request.sequence, "request superseded");
            request.token.cancel();
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AnswerUpdate> {
        self.inner.bus.subscribe()
    }

    /// Snapshot of the conversation window.
    pub fn messages(&self) -> Vec<ConversationMessage> {
        self.inner.lock_conversation().messages().to_vec()
    }

    /// Sources of the last applied answer.
    pub fn last_sources(&self) -> Vec<SourceRef> {
        self.inner.lock_conversation().sources().to_vec()
    }

    pub fn clear_conversation(&self) {
        self.inner.lock_conversation().clear();
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.inner.cache
    }

    /// Sequence number of the request currently in flight, if any.
    pub fn current_sequence(&self) -> Option<u64> {
        self.inner.lock_current().as_ref().map(|r| r.sequence)
    }

    /// Claim the current slot for a new request, cancelling the previous one.
    fn begin(&self) -> RequestContext {
        let sequence = self.inner.next_sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let ctx = RequestContext::new(sequence, self.inner.inactivity);

        let previous = self.inner.lock_current().replace(CurrentRequest {
            sequence,
            token: ctx.cancellation.clone(),
        });
        if let Some(previous) = previous {
            tracing::debug!(
                superseded = previous.sequence,
                sequence,
                "new request supersedes in-flight request"
            );
            previous.token.cancel();
        }
        ctx
    }

    /// Clear the slot if `sequence` still owns it.
    fn release(&self, sequence: u64) {
        let mut current = self.inner.lock_current();
        if current.as_ref().is_some_and(|r| r.sequence == sequence) {
            *current = None;
        }
    }

    /// Run `effect` only if `sequence` is still current. Returns whether it ran.
    fn if_current(&self, sequence: u64, effect: impl FnOnce(&Inner)) -> bool {
        let current = self.inner.lock_current();
        if current.as_ref().is_some_and(|r| r.sequence == sequence) {
            effect(&self.inner);
            true
        } else {
            tracing::trace!(sequence, "dropping effect of stale request");
            false
        }
    }
}

impl Inner {
    fn lock_current(&self) -> std::sync::MutexGuard<'_, Option<CurrentRequest>> {
        self.current.lock().expect("current request lock poisoned")
    }

    fn lock_conversation(&self) -> std::sync::MutexGuard<'_, Conversation> {
        self.conversation.lock().expect("conversation lock poisoned")
    }

    fn publish(&self, sequence: u64, answer: &str, sources: &[SourceRef], is_final: bool) {
        self.bus.publish(AnswerUpdate {
            sequence,
            answer: answer.to_string(),
            sources: sources.to_vec(),
            is_final,
        });
    }
}

impl std::fmt::Debug for RequestOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestOrchestrator")
            .field("current_sequence", &self.current_sequence())
            .field("cached", &self.inner.cache.len())
            .finish()
    }
}
