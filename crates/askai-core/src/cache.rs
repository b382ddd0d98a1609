//! Bounded response cache with time-windowed reuse.
//!
//! Eviction is FIFO-with-refresh: the entry written longest ago is dropped
//! when a new key arrives at capacity. A cache hit re-writes the entry with
//! a fresh timestamp, moving it to the back of the queue. A miss (absent or
//! expired) changes nothing.
//!
//! Every operation runs under a single lock and clones values in and out,
//! so readers never observe a partially written entry. The lock is never
//! held across `.await`.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use askai_types::query::{QueryAnswer, SourceRef};

/// A cached answer snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub answer: String,
    pub sources: Vec<SourceRef>,
    pub timestamp: Instant,
}

impl CacheEntry {
    pub fn into_answer(self) -> QueryAnswer {
        QueryAnswer {
            answer: self.answer,
            sources: self.sources,
        }
    }
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    /// Keys from oldest to most recently written.
    order: VecDeque<String>,
}

impl CacheState {
    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
        self.order.push_back(key.to_string());
    }
}

/// Normalized-question → answer cache.
#[derive(Debug)]
pub struct ResponseCache {
    state: Mutex<CacheState>,
    capacity: usize,
    ttl: Duration,
}

impl ResponseCache {
    /// Create a cache holding at most `capacity` entries (minimum 1), each
    /// reusable for `ttl` after it was last written.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            capacity: capacity.max(1),
            ttl,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a fresh entry, refreshing it on hit.
    pub fn lookup(&self, key: &str) -> Option<CacheEntry> {
        self.lookup_at(key, Instant::now())
    }

    /// [`lookup`](Self::lookup) against an explicit clock reading.
    pub fn lookup_at(&self, key: &str, now: Instant) -> Option<CacheEntry> {
        let mut state = self.state.lock().expect("response cache lock poisoned");

        let entry = state.entries.get_mut(key)?;
        if now.saturating_duration_since(entry.timestamp) >= self.ttl {
            tracing::trace!(key, "cache entry expired");
            return None;
        }

        entry.timestamp = now;
        let snapshot = entry.clone();
        state.touch(key);
        Some(snapshot)
    }

    /// Store an answer, evicting the oldest entry if a new key arrives at capacity.
    pub fn insert(&self, key: &str, answer: String, sources: Vec<SourceRef>) {
        self.insert_at(key, answer, sources, Instant::now());
    }

    /// [`insert`](Self::insert) against an explicit clock reading.
    pub fn insert_at(&self, key: &str, answer: String, sources: Vec<SourceRef>, now: Instant) {
        let mut state = self.state.lock().expect("response cache lock poisoned");

        if !state.entries.contains_key(key) && state.entries.len() >= self.capacity {
            if let Some(oldest) = state.order.pop_front() {
                state.entries.remove(&oldest);
                tracing::debug!(evicted = %oldest, "cache at capacity, evicted oldest entry");
            }
        }

        state.entries.insert(
            key.to_string(),
            CacheEntry {
                answer,
                sources,
                timestamp: now,
            },
        );
        state.touch(key);
    }

    /// Whether an entry (fresh or not) is physically present.
    pub fn contains(&self, key: &str) -> bool {
        self.state
            .lock()
            .expect("response cache lock poisoned")
            .entries
            .contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.state
            .lock()
            .expect("response cache lock poisoned")
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut state = self.state.lock().expect("response cache lock poisoned");
        state.entries.clear();
        state.order.clear();
    }
}
