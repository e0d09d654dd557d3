//! Per-post processing: expand, extract, deliver, record.
//!
//! ```text
//! Detected ─► [Expansion] ─► Extracted ─► Delivering ─► Delivered | Failed
//!                                                           │
//!                                          mark_processed ◄─┘ (either way)
//! ```

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};

use super::ledger::DedupLedger;
use super::queue::{ItemProcessor, QueuedItem};
use crate::Result;
use crate::delivery::{DeliveryClient, DeliveryOutcome};
use crate::extract::{self, dom};
use crate::source::{EXPAND_CONTROL, ElementHandle};
use crate::store::ConfigStore;

/// Polling budget while waiting for a truncated post to expand.
#[derive(Debug, Clone)]
pub struct ExpansionConfig {
    pub max_attempts: u32,
    pub check_interval: Duration,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            max_attempts: 50,
            check_interval: Duration::from_millis(100),
        }
    }
}

/// The queue's consumer in production.
pub struct PostPipeline {
    config: ConfigStore,
    ledger: DedupLedger,
    delivery: Arc<dyn DeliveryClient>,
    expansion: ExpansionConfig,
}

impl PostPipeline {
    pub fn new(config: ConfigStore, ledger: DedupLedger, delivery: Arc<dyn DeliveryClient>) -> Self {
        Self {
            config,
            ledger,
            delivery,
            expansion: ExpansionConfig::default(),
        }
    }

    pub fn with_expansion(mut self, expansion: ExpansionConfig) -> Self {
        self.expansion = expansion;
        self
    }

    /// Click "show more" if present and wait for the full text.
    ///
    /// Returns `false` if the control was still there when the budget ran
    /// out; processing continues with the truncated text either way.
    async fn expand(&self, element: &dyn ElementHandle) -> bool {
        if !has_expand_control(&element.outer_html()) {
            return true;
        }

        tracing::debug!("Expanding truncated post");
        element.click(EXPAND_CONTROL);

        for _ in 0..self.expansion.max_attempts {
            tokio::time::sleep(self.expansion.check_interval).await;
            if !has_expand_control(&element.outer_html()) {
                tracing::debug!("Post expanded");
                return true;
            }
        }

        tracing::warn!("Timed out waiting for post to expand; continuing");
        false
    }
}

static EXPAND: LazyLock<Selector> = LazyLock::new(|| dom::selector(EXPAND_CONTROL));

fn has_expand_control(html: &str) -> bool {
    Html::parse_fragment(html).select(&EXPAND).next().is_some()
}

#[async_trait]
impl ItemProcessor for PostPipeline {
    async fn process(&self, item: QueuedItem) -> Result<()> {
        let QueuedItem {
            element,
            post_id,
            lane,
            detected_at,
        } = item;

        let Some(binding) = self.config.binding(&lane) else {
            tracing::warn!(post_id = %post_id, lane = %lane, "No binding for lane; skipping post");
            return Ok(());
        };

        if self.ledger.is_processed(&lane, &post_id) {
            tracing::debug!(post_id = %post_id, lane = %lane, "Already processed");
            return Ok(());
        }

        tracing::info!(post_id = %post_id, lane = %lane, "New post detected");

        self.expand(element.as_ref()).await;

        let html = element.outer_html();
        let message = match extract::extract(&html, &post_id) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("{}; sending without text", e);
                e.into_partial()
            }
        };
        let timestamp = extract::post_timestamp(&html, detected_at);

        tracing::debug!(
            post_id = %post_id,
            content_type = message.content_type.as_str(),
            chars = message.text.chars().count(),
            "Extracted message"
        );

        let outcome = self.delivery.deliver(&binding.bluesky, &message).await;
        if let DeliveryOutcome::Failed(failure) = &outcome {
            tracing::warn!(post_id = %post_id, "Not retrying failed delivery: {}", failure);
        }

        self.ledger.mark_processed(&lane, &post_id, timestamp)?;
        Ok(())
    }
}
