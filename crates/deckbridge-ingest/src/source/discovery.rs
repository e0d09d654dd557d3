//! Finds lanes on the host page and wires a watcher to each enabled one.
//!
//! Startup sequence:
//!
//! 1. Poll for the lanes container until it renders (bounded attempts).
//! 2. Wait a short settle delay for the initial lanes to fill in.
//! 3. Scan the rendered lanes, retrying while none exist (same budget).
//! 4. Observe the lanes container and attach watchers to lanes added later.
//!
//! A lane is watched only when it has an enabled binding, and at most once
//! per lane key.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use deckbridge_core::LaneKey;
use metrics::gauge;
use parking_lot::Mutex;
use scraper::{Html, Selector};
use tokio::task::JoinHandle;

use super::host::{APP_COLUMNS, CHIRP_CONTAINER, COLUMN, COLUMN_HEADER, ElementHandle, HostPage};
use super::watcher::spawn_watcher;
use crate::extract::dom::{find, root_element, selector, text_content};
use crate::pipeline::IngestionQueue;
use crate::store::ConfigStore;
use crate::{Error, Result};

static HEADER: LazyLock<Selector> = LazyLock::new(|| selector(COLUMN_HEADER));
static HEADING: LazyLock<Selector> = LazyLock::new(|| selector(".column-heading"));
static ATTRIBUTION: LazyLock<Selector> = LazyLock::new(|| selector(".attribution"));

/// Retry budget while the host page loads.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub poll_interval: Duration,
    pub max_attempts: u32,
    /// Pause between the lanes container appearing and the first scan.
    pub settle_delay: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            max_attempts: 30,
            settle_delay: Duration::from_secs(2),
        }
    }
}

/// Heading and attribution read from a lane's header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaneInfo {
    pub heading: String,
    pub attribution: String,
}

impl LaneInfo {
    pub fn key(&self) -> LaneKey {
        LaneKey::from_parts(&self.heading, &self.attribution)
    }

    /// Read a lane's identity from its markup. `None` without a header.
    pub fn from_html(html: &str) -> Option<Self> {
        let fragment = Html::parse_fragment(html);
        let root = root_element(&fragment)?;
        let header = find(root, &HEADER)?;
        let text_of = |sel: &Selector| {
            header
                .select(sel)
                .next()
                .map(|el| text_content(el).trim().to_string())
                .unwrap_or_default()
        };
        Some(Self {
            heading: text_of(&*HEADING),
            attribution: text_of(&*ATTRIBUTION),
        })
    }
}

/// Lane discovery and watcher registry.
pub struct LaneDiscovery {
    page: Arc<dyn HostPage>,
    config: ConfigStore,
    queue: IngestionQueue,
    settings: DiscoveryConfig,
    watchers: Mutex<HashMap<LaneKey, JoinHandle<()>>>,
    lane_observer: Mutex<Option<JoinHandle<()>>>,
}

impl LaneDiscovery {
    pub fn new(
        page: Arc<dyn HostPage>,
        config: ConfigStore,
        queue: IngestionQueue,
        settings: DiscoveryConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            page,
            config,
            queue,
            settings,
            watchers: Mutex::new(HashMap::new()),
            lane_observer: Mutex::new(None),
        })
    }

    /// Run the startup sequence. Returns the number of lanes watched.
    pub async fn start(self: &Arc<Self>) -> Result<usize> {
        tracing::info!("Waiting for host page...");
        self.wait_for_host().await?;
        tracing::info!("Host page ready");
        tokio::time::sleep(self.settings.settle_delay).await;

        let watched = self.initial_scan().await?;
        self.observe_new_lanes();

        tracing::info!("Startup complete: watching {} lanes", watched);
        Ok(watched)
    }

    async fn wait_for_host(&self) -> Result<()> {
        for _ in 0..self.settings.max_attempts {
            tokio::time::sleep(self.settings.poll_interval).await;
            if self.page.query(APP_COLUMNS).is_some() {
                return Ok(());
            }
        }
        tracing::error!("Host page did not load");
        Err(Error::HostNotReady {
            attempts: self.settings.max_attempts,
        })
    }

    async fn initial_scan(&self) -> Result<usize> {
        for attempt in 1..=self.settings.max_attempts {
            let columns = self.page.query_all(COLUMN);
            if columns.is_empty() {
                if attempt < self.settings.max_attempts {
                    tracing::warn!(
                        "No lanes found; retrying in {:?}",
                        self.settings.poll_interval
                    );
                    tokio::time::sleep(self.settings.poll_interval).await;
                }
                continue;
            }

            tracing::info!("Found {} lanes", columns.len());
            let watched = columns.iter().filter(|column| self.attach(column)).count();
            return Ok(watched);
        }

        tracing::error!("No lanes rendered");
        Err(Error::HostNotReady {
            attempts: self.settings.max_attempts,
        })
    }

    fn observe_new_lanes(self: &Arc<Self>) {
        let Some(mut insertions) = self.page.observe(APP_COLUMNS) else {
            tracing::warn!("Lanes container not observable; new lanes will not be watched");
            return;
        };

        let discovery = Arc::clone(self);
        let handle = tokio::spawn(async move {
            while let Some(node) = insertions.recv().await {
                if node.is_appended_column() {
                    tracing::info!("New lane detected");
                    discovery.attach(&node.element);
                }
            }
        });
        if let Some(previous) = self.lane_observer.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Attach a watcher to a lane if it is enabled and not yet watched.
    pub fn attach(&self, column: &Arc<dyn ElementHandle>) -> bool {
        let Some(info) = LaneInfo::from_html(&column.outer_html()) else {
            tracing::warn!("Lane has no header; not watching");
            return false;
        };
        let lane = info.key();

        if self.config.enabled_binding(&lane).is_none() {
            tracing::info!(lane = %lane, "Lane not configured or disabled; not watching");
            return false;
        }

        let mut watchers = self.watchers.lock();
        // A finished watcher means the lane element went away; a re-rendered
        // lane with the same key takes its place.
        if watchers.get(&lane).is_some_and(|h| !h.is_finished()) {
            tracing::debug!(lane = %lane, "Lane already watched");
            return false;
        }

        let Some(insertions) = column.observe_children(CHIRP_CONTAINER) else {
            tracing::warn!(lane = %lane, "Lane has no post list; not watching");
            return false;
        };

        let handle = spawn_watcher(lane.clone(), insertions, self.queue.clone());
        if watchers.insert(lane.clone(), handle).is_some() {
            tracing::info!(lane = %lane, "Lane re-rendered; watching new element");
        }
        gauge!("lanes_watched").set(active(&watchers) as f64);
        true
    }

    /// Lane keys with a running watcher, sorted.
    pub fn watched_lanes(&self) -> Vec<LaneKey> {
        let mut lanes: Vec<_> = self
            .watchers
            .lock()
            .iter()
            .filter(|(_, h)| !h.is_finished())
            .map(|(lane, _)| lane.clone())
            .collect();
        lanes.sort();
        lanes
    }

    /// Stop every watcher and the lane observer.
    pub fn shutdown(&self) {
        if let Some(handle) = self.lane_observer.lock().take() {
            handle.abort();
        }
        for (_, handle) in self.watchers.lock().drain() {
            handle.abort();
        }
        gauge!("lanes_watched").set(0.0);
    }
}

fn active(watchers: &HashMap<LaneKey, JoinHandle<()>>) -> usize {
    watchers.values().filter(|h| !h.is_finished()).count()
}
