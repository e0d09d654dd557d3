//! Short-lived read cache over the persisted document.
//!
//! Bursts of activity (a drain checking the ledger, looking up a binding,
//! then recording the post) read the same document many times within a few
//! milliseconds. [`DocumentCache`] keeps the parsed document for a freshness
//! window and replaces it on every write, so reads never observe a value older
//! than the last save made through this cache.

use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use parking_lot::Mutex;

use super::KeyValueStore;
use super::document::{CONFIG_KEY, ConfigDocument};
use crate::Result;

/// How long a loaded document is served without re-reading the store.
pub const DEFAULT_FRESHNESS: Duration = Duration::from_millis(1000);

/// Cached, write-through access to the configuration document.
pub struct DocumentCache {
    store: Arc<dyn KeyValueStore>,
    cache: Cache<(), Arc<ConfigDocument>>,
    /// Serializes read-modify-write cycles.
    write_lock: Mutex<()>,
}

impl DocumentCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_freshness(store, DEFAULT_FRESHNESS)
    }

    pub fn with_freshness(store: Arc<dyn KeyValueStore>, freshness: Duration) -> Self {
        Self {
            store,
            cache: Cache::builder()
                .max_capacity(1)
                .time_to_live(freshness)
                .build(),
            write_lock: Mutex::new(()),
        }
    }

    /// Current document, from cache when fresh.
    pub fn get(&self) -> Arc<ConfigDocument> {
        if let Some(doc) = self.cache.get(&()) {
            return doc;
        }
        self.load()
    }

    /// Drop the cached copy and re-read the store.
    pub fn force_refresh(&self) -> Arc<ConfigDocument> {
        self.invalidate();
        self.load()
    }

    /// Drop the cached copy; the next read goes to the store.
    pub fn invalidate(&self) {
        self.cache.invalidate(&());
    }

    /// Persist a document and make it the cached value.
    pub fn save(&self, doc: ConfigDocument) -> Result<()> {
        let json = doc.to_json()?;
        self.invalidate();
        self.store.set(CONFIG_KEY, &json)?;
        self.cache.insert((), Arc::new(doc));
        Ok(())
    }

    /// Apply a mutation to a copy of the current document and persist it.
    ///
    /// The closure returns `None` to signal "nothing changed", in which case
    /// no write happens.
    pub fn update<R, F>(&self, f: F) -> Result<Option<R>>
    where
        F: FnOnce(&mut ConfigDocument) -> Option<R>,
    {
        let _guard = self.write_lock.lock();
        let mut doc = (*self.get()).clone();
        match f(&mut doc) {
            Some(result) => {
                self.save(doc)?;
                Ok(Some(result))
            }
            None => Ok(None),
        }
    }

    /// Overwrite the stored value with an empty string.
    ///
    /// The next read recreates the default document.
    pub fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock();
        self.invalidate();
        self.store.set(CONFIG_KEY, "")
    }

    fn load(&self) -> Arc<ConfigDocument> {
        let now = chrono::Utc::now().timestamp_millis();

        let raw = match self.store.get(CONFIG_KEY) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!("Failed to read configuration: {}", e);
                return Arc::new(ConfigDocument::default());
            }
        };

        let doc = match raw.as_deref() {
            None | Some("") => {
                let doc = ConfigDocument::default();
                match self.persist(&doc) {
                    Ok(()) => tracing::info!("Created default configuration"),
                    Err(e) => tracing::error!("Failed to write default configuration: {}", e),
                }
                doc
            }
            Some(json) => match ConfigDocument::parse(json, now) {
                Ok((doc, migrated)) => {
                    if migrated && let Err(e) = self.persist(&doc) {
                        tracing::error!("Failed to persist migrated configuration: {}", e);
                    }
                    tracing::debug!(lanes = doc.columns.len(), "Loaded configuration");
                    doc
                }
                Err(e) => {
                    // Leave the stored value untouched so it can be recovered by hand.
                    tracing::error!("Stored configuration is unreadable: {}", e);
                    return Arc::new(ConfigDocument::default());
                }
            },
        };

        let doc = Arc::new(doc);
        self.cache.insert((), Arc::clone(&doc));
        doc
    }

    fn persist(&self, doc: &ConfigDocument) -> Result<()> {
        self.store.set(CONFIG_KEY, &doc.to_json()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store wrapper that counts reads.
    struct CountingStore {
        inner: MemoryStore,
        reads: AtomicUsize,
    }

    impl KeyValueStore for CountingStore {
        fn get(&self, key: &str) -> Result<Option<String>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<()> {
            self.inner.set(key, value)
        }
    }

    fn counting(value: Option<&str>) -> Arc<CountingStore> {
        let inner = match value {
            Some(v) => MemoryStore::with_value(CONFIG_KEY, v),
            None => MemoryStore::new(),
        };
        Arc::new(CountingStore {
            inner,
            reads: AtomicUsize::new(0),
        })
    }

    #[test]
    fn test_missing_document_creates_default() {
        let store = counting(None);
        let cache = DocumentCache::new(store.clone());

        let doc = cache.get();
        assert_eq!(*doc, ConfigDocument::default());

        let stored = store.inner.get(CONFIG_KEY).unwrap().unwrap();
        assert_eq!(stored, r#"{"columns":[],"processedTweets":{}}"#);
    }

    #[test]
    fn test_fresh_reads_hit_cache() {
        let store = counting(Some("{}"));
        let cache = DocumentCache::with_freshness(store.clone(), Duration::from_secs(60));

        cache.get();
        cache.get();
        cache.get();
        assert_eq!(store.reads.load(Ordering::SeqCst), 1);

        cache.force_refresh();
        assert_eq!(store.reads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_invalidate_forces_store_read() {
        let store = counting(Some("{}"));
        let cache = DocumentCache::with_freshness(store.clone(), Duration::from_secs(60));

        cache.get();
        cache.invalidate();
        cache.get();
        assert_eq!(store.reads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_save_is_write_through() {
        let store = counting(Some("{}"));
        let cache = DocumentCache::with_freshness(store.clone(), Duration::from_secs(60));

        let updated = cache
            .update(|doc| {
                doc.processed_tweets
                    .entry("Home|x".to_string())
                    .or_default()
                    .insert("7".to_string(), 1);
                Some(())
            })
            .unwrap();
        assert!(updated.is_some());

        let stored = store.inner.get(CONFIG_KEY).unwrap().unwrap();
        assert!(stored.contains(r#""7":1"#));
        assert_eq!(cache.get().processed_count(), 1);
    }

    #[test]
    fn test_update_none_skips_write() {
        let store = counting(Some(r#"{"columns":[]}"#));
        let cache = DocumentCache::new(store.clone());

        let result: Option<()> = cache.update(|_| None).unwrap();
        assert!(result.is_none());
        assert_eq!(
            store.inner.get(CONFIG_KEY).unwrap().as_deref(),
            Some(r#"{"columns":[]}"#)
        );
    }

    #[test]
    fn test_unreadable_document_is_not_overwritten() {
        let store = counting(Some("{broken"));
        let cache = DocumentCache::new(store.clone());

        assert_eq!(*cache.get(), ConfigDocument::default());
        assert_eq!(
            store.inner.get(CONFIG_KEY).unwrap().as_deref(),
            Some("{broken")
        );
    }

    #[test]
    fn test_migration_is_persisted() {
        let store = counting(Some(
            r#"{"columns":[{"columnKey":"A|b","heading":"A","attribution":"b"}],"processedTweets":["1"]}"#,
        ));
        let cache = DocumentCache::new(store.clone());

        assert_eq!(cache.get().processed_count(), 1);
        let stored = store.inner.get(CONFIG_KEY).unwrap().unwrap();
        assert!(stored.contains(r#""processedTweets":{"A|b":{"1":"#));
    }

    #[test]
    fn test_clear_resets_to_default() {
        let store = counting(Some(r#"{"columns":[{"columnKey":"A|b"}]}"#));
        let cache = DocumentCache::new(store.clone());
        assert_eq!(cache.get().columns.len(), 1);

        cache.clear().unwrap();
        assert!(cache.get().columns.is_empty());
    }
}
