//! Forwards posts appended to one lane into the ingestion queue.

use deckbridge_core::{LaneKey, PostId};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use super::host::InsertedNode;
use crate::pipeline::{IngestionQueue, QueuedItem};

/// Spawn a watcher over a lane's insertion stream.
///
/// Only direct children that are post articles are forwarded. The task ends
/// when the stream closes.
pub fn spawn_watcher(
    lane: LaneKey,
    mut insertions: UnboundedReceiver<InsertedNode>,
    queue: IngestionQueue,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(lane = %lane, "Watching lane");
        while let Some(node) = insertions.recv().await {
            forward(&lane, node, &queue);
        }
        tracing::info!(lane = %lane, "Lane watcher stopped");
    })
}

fn forward(lane: &LaneKey, node: InsertedNode, queue: &IngestionQueue) {
    if !node.is_appended_post() {
        return;
    }

    let Some(raw) = node.element.attr("data-tweet-id") else {
        tracing::debug!(lane = %lane, "Post element without id");
        return;
    };
    let post_id = match PostId::parse(&raw) {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!(lane = %lane, "Dropping post: {}", e);
            return;
        }
    };

    tracing::debug!(post_id = %post_id, lane = %lane, "New post element detected");
    queue.enqueue(QueuedItem {
        element: node.element,
        post_id,
        lane: lane.clone(),
        detected_at: chrono::Utc::now().timestamp_millis(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Result;
    use crate::pipeline::{DedupLedger, ItemProcessor, QueueConfig};
    use crate::source::MemoryElement;
    use crate::source::host::{CHIRP_CONTAINER, ElementHandle};
    use crate::store::{DocumentCache, MemoryStore};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Default)]
    struct Collect(Mutex<Vec<String>>);

    #[async_trait]
    impl ItemProcessor for Collect {
        async fn process(&self, item: QueuedItem) -> Result<()> {
            self.0.lock().push(item.post_id.to_string());
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_forwards_only_top_level_posts() {
        let ledger = DedupLedger::new(
            Arc::new(DocumentCache::new(Arc::new(MemoryStore::new()))),
            500,
        );
        let collect = Arc::new(Collect::default());
        let queue = IngestionQueue::new(QueueConfig::default(), ledger, collect.clone());

        let column = MemoryElement::column("Home", "@a");
        let rx = column.observe_children(CHIRP_CONTAINER).unwrap();
        let handle = spawn_watcher(LaneKey::new("Home|@a"), rx, queue);

        column.append_post(r#"<article class="stream-item" data-tweet-id="2"></article>"#);
        // Nested re-render of a post already in the list.
        column.insert(
            CHIRP_CONTAINER,
            1,
            MemoryElement::new(r#"<article class="stream-item" data-tweet-id="3"></article>"#),
        );
        // Not a post.
        column.append_post(r#"<div class="stream-item" data-tweet-id="4"></div>"#);
        // Non-numeric id.
        column.append_post(r#"<article class="stream-item" data-tweet-id="abc"></article>"#);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(*collect.0.lock(), vec!["2".to_string()]);

        drop(column);
        handle.await.unwrap();
    }
}
