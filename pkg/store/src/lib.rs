//! The store adapter: dedup-on-insert, per-topic append and fetch (§4.1).
//!
//! The core treats the store as a black box behind the [`MessageStore`]
//! trait; [`MemoryStore`] is the reference, in-process implementation. Any
//! backend that can honor the two-operation contract (an embedded KV store, a
//! SQL table, ...) is a drop-in replacement.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use broker_core::StoreOutcome;
use parking_lot::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store is not initialized")]
    NotInitialized,
}

/// Contract consumed by the core (§4.1).
///
/// `fetch` returns payloads in the order they were first inserted at this
/// broker; `store` is keyed globally on `id`, not per-topic (§9).
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn store(&self, topic: &str, payload: &str, id: &str) -> Result<StoreOutcome, StoreError>;

    async fn fetch(&self, topic: &str, limit: usize, offset: usize) -> Result<Vec<String>, StoreError>;
}

#[derive(Default)]
struct Inner {
    /// Global id set; membership in here is the sole dedup signal (§3, §9).
    seen_ids: HashSet<String>,
    /// Per-topic payloads, in insertion order.
    topics: HashMap<String, Vec<String>>,
}

/// In-memory reference implementation of [`MessageStore`].
///
/// A single lock guards both the dedup set and the per-topic logs, which is
/// fine because store operations are assumed non-suspending fast local I/O
/// (§5) — the critical section never awaits.
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore { inner: Mutex::new(Inner::default()) }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn store(&self, topic: &str, payload: &str, id: &str) -> Result<StoreOutcome, StoreError> {
        let mut inner = self.inner.lock();
        if !inner.seen_ids.insert(id.to_string()) {
            return Ok(StoreOutcome::Duplicate);
        }
        inner.topics.entry(topic.to_string()).or_default().push(payload.to_string());
        Ok(StoreOutcome::Stored)
    }

    async fn fetch(&self, topic: &str, limit: usize, offset: usize) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.lock();
        let messages = match inner.topics.get(topic) {
            Some(messages) => messages,
            None => return Ok(Vec::new()),
        };
        Ok(messages.iter().skip(offset).take(limit).cloned().collect())
    }
}
