//! Debounced, id-ordered, single-consumer ingestion queue.
//!
//! ```text
//! enqueue ──► pending (BTreeMap keyed by (PostId, LaneKey))
//!                │
//!          debounce timer (restarted by every enqueue)
//!                ▼
//!             drain ── pop lowest id ─► ledger re-check ─► ItemProcessor
//!                ▲                                              │
//!                └────────── inter-item delay ◄─────────────────┘
//! ```
//!
//! At most one drain is active. The `draining` flag sits under the same
//! lock as the pending map and is flipped before the drain task awaits
//! anything, so an enqueue during a drain is folded into that drain.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use deckbridge_core::{LaneKey, PostId};
use metrics::{counter, gauge};
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use super::ledger::DedupLedger;
use crate::Result;
use crate::source::ElementHandle;

/// A detected post waiting to be processed.
#[derive(Clone)]
pub struct QueuedItem {
    pub element: Arc<dyn ElementHandle>,
    pub post_id: PostId,
    pub lane: LaneKey,
    /// Detection time (epoch millis).
    pub detected_at: i64,
}

impl std::fmt::Debug for QueuedItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedItem")
            .field("post_id", &self.post_id)
            .field("lane", &self.lane)
            .field("detected_at", &self.detected_at)
            .finish_non_exhaustive()
    }
}

/// Queue timing.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Quiet period after the last enqueue before a drain starts.
    pub debounce: Duration,
    /// Pause between two processed items of one drain.
    pub inter_item: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(1500),
            inter_item: Duration::from_millis(2000),
        }
    }
}

/// Consumer of dequeued items.
#[async_trait]
pub trait ItemProcessor: Send + Sync {
    async fn process(&self, item: QueuedItem) -> Result<()>;
}

/// Outcome of [`IngestionQueue::enqueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Queued,
    AlreadyQueued,
    AlreadyProcessed,
}

#[derive(Default)]
struct QueueState {
    pending: BTreeMap<(PostId, LaneKey), QueuedItem>,
    draining: bool,
    debounce: Option<JoinHandle<()>>,
    /// Bumped per armed timer; only the latest timer may clear `debounce`.
    generation: u64,
}

struct Inner {
    config: QueueConfig,
    ledger: DedupLedger,
    processor: Arc<dyn ItemProcessor>,
    state: Mutex<QueueState>,
}

/// Handle to the ingestion queue. Cheap to clone.
#[derive(Clone)]
pub struct IngestionQueue {
    inner: Arc<Inner>,
}

impl IngestionQueue {
    pub fn new(config: QueueConfig, ledger: DedupLedger, processor: Arc<dyn ItemProcessor>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                ledger,
                processor,
                state: Mutex::new(QueueState::default()),
            }),
        }
    }

    /// Add a detected post and restart the debounce timer.
    ///
    /// Must be called from within a tokio runtime.
    pub fn enqueue(&self, item: QueuedItem) -> EnqueueOutcome {
        let key = (item.post_id.clone(), item.lane.clone());
        let mut state = self.inner.state.lock();

        if state.pending.contains_key(&key) {
            return EnqueueOutcome::AlreadyQueued;
        }
        if self.inner.ledger.is_processed(&item.lane, &item.post_id) {
            counter!("queue_posts_skipped_total").increment(1);
            return EnqueueOutcome::AlreadyProcessed;
        }

        tracing::debug!(post_id = %item.post_id, lane = %item.lane, "Queued post");
        state.pending.insert(key, item);
        counter!("queue_posts_enqueued_total").increment(1);
        gauge!("queue_depth").set(state.pending.len() as f64);

        if let Some(timer) = state.debounce.take() {
            timer.abort();
        }
        state.generation += 1;
        let generation = state.generation;
        let inner = Arc::clone(&self.inner);
        state.debounce = Some(tokio::spawn(async move {
            tokio::time::sleep(inner.config.debounce).await;
            Inner::start_drain(inner, generation);
        }));

        EnqueueOutcome::Queued
    }

    /// Items waiting, not counting one currently being processed.
    pub fn pending_len(&self) -> usize {
        self.inner.state.lock().pending.len()
    }

    pub fn is_draining(&self) -> bool {
        self.inner.state.lock().draining
    }

    /// Nothing pending, no timer armed, no drain running.
    pub fn is_idle(&self) -> bool {
        let state = self.inner.state.lock();
        state.pending.is_empty() && !state.draining && state.debounce.is_none()
    }

    /// Wait until the queue is idle.
    pub async fn wait_idle(&self, poll: Duration) {
        while !self.is_idle() {
            tokio::time::sleep(poll).await;
        }
    }
}

impl Inner {
    /// Spawn the drain task unless one is already running.
    ///
    /// A timer that fired after being superseded does nothing.
    fn start_drain(inner: Arc<Inner>, generation: u64) {
        {
            let mut state = inner.state.lock();
            if state.generation != generation {
                return;
            }
            state.debounce = None;
            if state.draining || state.pending.is_empty() {
                return;
            }
            state.draining = true;
        }
        tokio::spawn(async move { inner.drain().await });
    }

    async fn drain(&self) {
        tracing::info!("Queue drain started: {} pending", self.state.lock().pending.len());
        counter!("queue_drains_total").increment(1);
        let mut processed = 0usize;

        loop {
            let next = {
                let mut state = self.state.lock();
                let next = state.pending.pop_first().map(|(_, item)| item);
                if next.is_none() {
                    state.draining = false;
                }
                gauge!("queue_depth").set(state.pending.len() as f64);
                next
            };
            let Some(item) = next else {
                break;
            };

            if self.ledger.is_processed(&item.lane, &item.post_id) {
                tracing::debug!(post_id = %item.post_id, lane = %item.lane, "Skipping already processed post");
                counter!("queue_posts_skipped_total").increment(1);
                continue;
            }

            let post_id = item.post_id.clone();
            if let Err(e) = self.processor.process(item).await {
                tracing::error!(post_id = %post_id, "Failed to process post: {}", e);
                counter!("queue_item_errors_total").increment(1);
            }
            processed += 1;

            let more = !self.state.lock().pending.is_empty();
            if more {
                tokio::time::sleep(self.config.inter_item).await;
            }
        }

        tracing::info!("Queue drain finished: {} processed", processed);
    }
}
