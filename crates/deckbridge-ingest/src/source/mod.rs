//! Where posts come from.
//!
//! The host page renders lanes of posts. This module finds those lanes,
//! watches each enabled one, and feeds new posts into the ingestion queue.
//!
//! # Components
//!
//! - [`HostPage`] / [`ElementHandle`] - the page seam a browser bridge implements
//! - [`MemoryPage`] / [`MemoryElement`] - in-process host for tests and replay
//! - [`LaneDiscovery`] - readiness wait, lane scan, late-lane observer
//! - [`spawn_watcher`] - one task per lane, forwarding appended posts
//! - [`Capture`] - recorded posts replayed into a [`MemoryPage`]
//!
//! # Architecture
//!
//! ```text
//! [HostPage] ─► [LaneDiscovery] ─► spawn_watcher (per enabled lane)
//!                                        │
//!                                        ▼
//!                                 [IngestionQueue]
//! ```

mod capture;
mod discovery;
pub(crate) mod host;
mod memory;
mod watcher;

pub use capture::{Capture, CaptureRecord, CaptureStats};
pub use discovery::{DiscoveryConfig, LaneDiscovery, LaneInfo};
pub use host::{
    APP_COLUMNS, CHIRP_CONTAINER, COLUMN, COLUMN_HEADER, EXPAND_CONTROL, ElementHandle, HostPage,
    InsertedNode,
};
pub use memory::{MemoryElement, MemoryPage};
pub use watcher::spawn_watcher;
