//! Durable state for the relay.
//!
//! Configuration and the processed-post ledger share one JSON document stored
//! under a single key of a synchronous key-value primitive:
//!
//! ```text
//! [KeyValueStore] ← [DocumentCache] ← [ConfigStore]
//!                                   ← [DedupLedger]
//! ```
//!
//! - [`KeyValueStore`] - `get`/`set` of opaque strings ([`MemoryStore`], [`SqliteStore`])
//! - [`DocumentCache`] - short-lived read cache, write-through on save
//! - [`ConfigStore`] - lane bindings and credentials

mod cache;
mod config;
mod document;
mod sqlite;

pub use cache::{DEFAULT_FRESHNESS, DocumentCache};
pub use config::{AddBindingOutcome, ConfigStore};
pub use document::{CONFIG_KEY, ConfigDocument, Credentials, LaneBinding, ProcessedPosts};
pub use sqlite::SqliteStore;

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::Result;

/// Synchronous key-value persistence primitive.
///
/// Implementations must make `set` durable before returning; callers rely on
/// write-through semantics and never buffer.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Replace the value stored under `key`.
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// In-process store, for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store with an existing value.
    pub fn with_value(key: &str, value: &str) -> Self {
        let store = Self::new();
        store
            .values
            .lock()
            .insert(key.to_string(), value.to_string());
        store
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
