//! The ingestion pipeline proper.
//!
//! - [`IngestionQueue`] - debounced, id-ordered, single-consumer queue
//! - [`PostPipeline`] - per-post expansion, extraction, delivery
//! - [`DedupLedger`] - capacity-bounded record of processed posts
//!
//! # Architecture
//!
//! ```text
//! [LaneWatcher] → [IngestionQueue] → [PostPipeline] → [DeliveryClient]
//!                        ↓                  ↓
//!                   DedupLedger  ←──  mark_processed
//! ```

mod ledger;
mod processor;
mod queue;

pub use ledger::DedupLedger;
pub use processor::{ExpansionConfig, PostPipeline};
pub use queue::{EnqueueOutcome, IngestionQueue, ItemProcessor, QueueConfig, QueuedItem};
