//! Persistent record of processed posts.
//!
//! The ledger maps `(lane, post id)` to the timestamp recorded when the post
//! was processed. Its total size across all lanes is capped; inserting past
//! the cap evicts the globally oldest entries first.
//!
//! Every mutation is written through to the store before returning, so a
//! crash leaves the ledger matching the last completed call.

use std::collections::BTreeMap;
use std::sync::Arc;

use deckbridge_core::{LaneKey, PostId};
use metrics::{counter, gauge};

use crate::Result;
use crate::store::{DocumentCache, ProcessedPosts};

/// Capacity-bounded dedup ledger backed by the configuration document.
#[derive(Clone)]
pub struct DedupLedger {
    cache: Arc<DocumentCache>,
    max_processed: usize,
}

impl DedupLedger {
    pub fn new(cache: Arc<DocumentCache>, max_processed: usize) -> Self {
        Self {
            cache,
            max_processed,
        }
    }

    pub fn max_processed(&self) -> usize {
        self.max_processed
    }

    pub fn is_processed(&self, lane: &LaneKey, id: &PostId) -> bool {
        self.cache
            .get()
            .processed_tweets
            .get(lane.as_str())
            .is_some_and(|posts| posts.contains_key(id.as_str()))
    }

    /// Record a post as processed.
    ///
    /// No-op if already present. Returns whether an entry was added.
    pub fn mark_processed(&self, lane: &LaneKey, id: &PostId, timestamp: i64) -> Result<bool> {
        let max = self.max_processed;
        let added = self.cache.update(|doc| {
            let posts = doc
                .processed_tweets
                .entry(lane.as_str().to_string())
                .or_default();
            if posts.contains_key(id.as_str()) {
                return None;
            }
            posts.insert(id.as_str().to_string(), timestamp);

            let total = total(&doc.processed_tweets);
            let evicted = if total > max {
                evict(&mut doc.processed_tweets, total - max)
            } else {
                0
            };
            Some((total - evicted, evicted))
        })?;

        let Some((entries, evicted)) = added else {
            return Ok(false);
        };

        if evicted > 0 {
            tracing::info!("Evicted {} oldest ledger entries", evicted);
            counter!("ledger_entries_evicted_total").increment(evicted as u64);
        }
        gauge!("ledger_entries").set(entries as f64);
        tracing::debug!(post_id = %id, lane = %lane, "Marked post as processed");
        Ok(true)
    }

    /// Entries across all lanes.
    pub fn total_count(&self) -> usize {
        self.cache.get().processed_count()
    }

    /// Remove the `n` globally oldest entries. Returns how many were removed.
    pub fn evict_oldest(&self, n: usize) -> Result<usize> {
        if n == 0 {
            return Ok(0);
        }
        let removed = self.cache.update(|doc| {
            let removed = evict(&mut doc.processed_tweets, n);
            (removed > 0).then_some(removed)
        })?;
        let removed = removed.unwrap_or(0);
        if removed > 0 {
            counter!("ledger_entries_evicted_total").increment(removed as u64);
        }
        Ok(removed)
    }

    /// Per-lane entry counts, lanes with no entries omitted.
    pub fn counts_by_lane(&self) -> BTreeMap<String, usize> {
        self.cache
            .force_refresh()
            .processed_tweets
            .iter()
            .filter(|(_, posts)| !posts.is_empty())
            .map(|(lane, posts)| (lane.clone(), posts.len()))
            .collect()
    }
}

fn total(processed: &ProcessedPosts) -> usize {
    processed.values().map(BTreeMap::len).sum()
}

/// Remove up to `n` entries with the smallest timestamps. Lanes left empty
/// are dropped.
fn evict(processed: &mut ProcessedPosts, n: usize) -> usize {
    let mut all: Vec<(i64, String, String)> = processed
        .iter()
        .flat_map(|(lane, posts)| {
            posts
                .iter()
                .map(move |(id, &ts)| (ts, lane.clone(), id.clone()))
        })
        .collect();
    // Timestamp first; lane and id make ties deterministic.
    all.sort();

    let mut removed = 0;
    for (_, lane, id) in all.into_iter().take(n) {
        if let Some(posts) = processed.get_mut(&lane)
            && posts.remove(&id).is_some()
        {
            removed += 1;
        }
    }
    processed.retain(|_, posts| !posts.is_empty());
    removed
}
