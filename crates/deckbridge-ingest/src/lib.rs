//! Deckbridge relay: watches deck lanes and republishes their posts.
//!
//! Posts appended to a configured lane are queued, expanded, converted to a
//! destination-ready [`deckbridge_core::Message`], and delivered once to the
//! publishing endpoint bound to that lane.
//!
//! # Modules
//!
//! - [`source`] - host page seam, lane discovery, per-lane watchers
//! - [`pipeline`] - ingestion queue, per-post processor, dedup ledger
//! - [`extract`] - post markup to message
//! - [`delivery`] - HTTP client for the publishing endpoint
//! - [`store`] - persisted configuration document and its cache
//! - [`admin`] - export, import, reset, connection test
//! - [`settings`] - environment-driven runtime settings
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │    HostPage     │  (browser bridge, or MemoryPage for replay)
//! └────────┬────────┘
//!          │  LaneDiscovery + one watcher per enabled lane
//!          ▼
//! ┌─────────────────┐
//! │ IngestionQueue  │  debounced, id-ordered, one drain at a time
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │  PostPipeline   │  expand → extract → deliver → mark processed
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ DeliveryClient  │  single attempt, never retried
//! └─────────────────┘
//! ```
//!
//! Configuration and the processed-post ledger share one JSON document in a
//! [`store::KeyValueStore`].

pub mod admin;
pub mod delivery;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod settings;
pub mod source;
pub mod store;

pub use error::{Error, Result};

pub use admin::{AdminApi, Summary, export_filename};
pub use delivery::{
    DeliveryClient, DeliveryFailure, DeliveryOutcome, HealthStatus, HttpDeliveryClient,
    HttpDeliveryConfig,
};
pub use pipeline::{
    DedupLedger, EnqueueOutcome, IngestionQueue, ItemProcessor, PostPipeline, QueueConfig,
    QueuedItem,
};
pub use settings::Settings;
pub use source::{Capture, DiscoveryConfig, ElementHandle, HostPage, LaneDiscovery, MemoryPage};
pub use store::{ConfigStore, DocumentCache, KeyValueStore, MemoryStore, SqliteStore};
