//! Runtime settings loaded from environment variables.

use std::time::Duration;

use deckbridge_core::DEFAULT_MAX_PROCESSED;

use crate::delivery::HttpDeliveryConfig;
use crate::pipeline::QueueConfig;
use crate::{Error, Result};

/// Relay settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Delivery endpoint.
    pub server_url: String,

    /// Health probe endpoint.
    pub health_url: String,

    /// Ledger capacity across all lanes.
    pub max_processed: usize,

    /// Quiet period before a queue drain.
    pub debounce: Duration,

    /// Pause between processed posts.
    pub inter_item: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        let delivery = HttpDeliveryConfig::default();
        let queue = QueueConfig::default();
        Self {
            server_url: delivery.server_url,
            health_url: delivery.health_url,
            max_processed: DEFAULT_MAX_PROCESSED,
            debounce: queue.debounce,
            inter_item: queue.inter_item,
        }
    }
}

impl Settings {
    /// Load settings from environment variables.
    ///
    /// All optional:
    /// - `DECKBRIDGE_SERVER_URL`: delivery endpoint (default: "http://localhost:5000/post-to-bluesky")
    /// - `DECKBRIDGE_HEALTH_URL`: health endpoint (default: "http://localhost:5000/health")
    /// - `DECKBRIDGE_MAX_PROCESSED`: ledger capacity (default: 500)
    /// - `DECKBRIDGE_DEBOUNCE_MS`: debounce in millis (default: 1500)
    /// - `DECKBRIDGE_INTERVAL_MS`: delay between posts in millis (default: 2000)
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let server_url = std::env::var("DECKBRIDGE_SERVER_URL").unwrap_or(defaults.server_url);
        let health_url = std::env::var("DECKBRIDGE_HEALTH_URL").unwrap_or(defaults.health_url);

        let max_processed = parse_var("DECKBRIDGE_MAX_PROCESSED")?.unwrap_or(defaults.max_processed);
        if max_processed == 0 {
            return Err(Error::Config(
                "DECKBRIDGE_MAX_PROCESSED must be at least 1".to_string(),
            ));
        }

        let debounce = parse_var("DECKBRIDGE_DEBOUNCE_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.debounce);
        let inter_item = parse_var("DECKBRIDGE_INTERVAL_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.inter_item);

        tracing::info!(
            server_url = %server_url,
            health_url = %health_url,
            max_processed,
            debounce_ms = debounce.as_millis() as u64,
            interval_ms = inter_item.as_millis() as u64,
            "Relay settings loaded"
        );

        Ok(Self {
            server_url,
            health_url,
            max_processed,
            debounce,
            inter_item,
        })
    }

    pub fn delivery(&self) -> HttpDeliveryConfig {
        HttpDeliveryConfig {
            server_url: self.server_url.clone(),
            health_url: self.health_url.clone(),
            ..HttpDeliveryConfig::default()
        }
    }

    pub fn queue(&self) -> QueueConfig {
        QueueConfig {
            debounce: self.debounce,
            inter_item: self.inter_item,
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("{} is not a valid number: {:?}", key, raw))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serializes tests that touch process env vars.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const ENV_KEYS: &[&str] = &[
        "DECKBRIDGE_SERVER_URL",
        "DECKBRIDGE_HEALTH_URL",
        "DECKBRIDGE_MAX_PROCESSED",
        "DECKBRIDGE_DEBOUNCE_MS",
        "DECKBRIDGE_INTERVAL_MS",
    ];

    fn with_env_vars<F: FnOnce()>(vars: &[(&str, &str)], f: F) {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());

        let saved: Vec<_> = ENV_KEYS
            .iter()
            .map(|k| (*k, std::env::var(k).ok()))
            .collect();

        // SAFETY: Serialized by mutex; only test code touches these vars.
        unsafe {
            for k in ENV_KEYS {
                std::env::remove_var(k);
            }
            for (k, v) in vars {
                std::env::set_var(k, v);
            }
        }

        f();

        // SAFETY: Restoring previous env state.
        unsafe {
            for (k, v) in &saved {
                match v {
                    Some(val) => std::env::set_var(k, val),
                    None => std::env::remove_var(k),
                }
            }
        }
    }

    #[test]
    fn settings_defaults() {
        with_env_vars(&[], || {
            let settings = Settings::from_env().unwrap();
            assert_eq!(settings.server_url, "http://localhost:5000/post-to-bluesky");
            assert_eq!(settings.health_url, "http://localhost:5000/health");
            assert_eq!(settings.max_processed, 500);
            assert_eq!(settings.debounce, Duration::from_millis(1500));
            assert_eq!(settings.inter_item, Duration::from_millis(2000));
        });
    }

    #[test]
    fn settings_custom_values() {
        with_env_vars(
            &[
                ("DECKBRIDGE_SERVER_URL", "http://relay:8000/post"),
                ("DECKBRIDGE_HEALTH_URL", "http://relay:8000/health"),
                ("DECKBRIDGE_MAX_PROCESSED", "42"),
                ("DECKBRIDGE_DEBOUNCE_MS", "10"),
                ("DECKBRIDGE_INTERVAL_MS", " 20 "),
            ],
            || {
                let settings = Settings::from_env().unwrap();
                assert_eq!(settings.delivery().server_url, "http://relay:8000/post");
                assert_eq!(settings.delivery().health_url, "http://relay:8000/health");
                assert_eq!(settings.delivery().request_timeout, Duration::from_secs(30));
                assert_eq!(settings.max_processed, 42);
                assert_eq!(settings.queue().debounce, Duration::from_millis(10));
                assert_eq!(settings.queue().inter_item, Duration::from_millis(20));
            },
        );
    }

    #[test]
    fn settings_rejects_bad_numbers() {
        with_env_vars(&[("DECKBRIDGE_DEBOUNCE_MS", "soon")], || {
            let err = Settings::from_env().unwrap_err();
            assert!(matches!(err, Error::Config(_)));
        });
        with_env_vars(&[("DECKBRIDGE_MAX_PROCESSED", "0")], || {
            assert!(Settings::from_env().is_err());
        });
    }

    #[test]
    fn settings_blank_means_default() {
        with_env_vars(&[("DECKBRIDGE_MAX_PROCESSED", "")], || {
            assert_eq!(Settings::from_env().unwrap().max_processed, 500);
        });
    }
}
