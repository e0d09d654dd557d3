//! Administrative operations: connection test, export/import, reset.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::delivery::{DeliveryClient, HealthStatus};
use crate::pipeline::DedupLedger;
use crate::store::{AddBindingOutcome, ConfigStore, Credentials, LaneBinding};
use crate::{Error, Result};

/// Prefix of exported settings files.
pub const EXPORT_FILE_PREFIX: &str = "tweetdeck-bluesky-config";

/// Exported settings. The ledger is never part of an export.
#[derive(Debug, Serialize)]
struct Export<'a> {
    columns: &'a [LaneBinding],
}

#[derive(Debug, Deserialize)]
struct Import {
    columns: Vec<LaneBinding>,
}

/// Snapshot of configuration and ledger size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub lanes: Vec<LaneSummary>,
    pub total_processed: usize,
    pub ledger_capacity: usize,
    /// Ledger entries per lane key, including lanes no longer configured.
    pub processed_by_lane: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaneSummary {
    pub key: String,
    pub handle: String,
    pub enabled: bool,
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Configured lanes: {}", self.lanes.len())?;
        for lane in &self.lanes {
            let state = if lane.enabled { "enabled" } else { "disabled" };
            writeln!(f, "  {} -> {} ({})", lane.key, lane.handle, state)?;
        }
        writeln!(
            f,
            "Processed posts: {} (cap {})",
            self.total_processed, self.ledger_capacity
        )?;
        for (key, count) in &self.processed_by_lane {
            writeln!(f, "  {}: {}", key, count)?;
        }
        Ok(())
    }
}

/// Operator-facing surface over the stores and the delivery client.
pub struct AdminApi {
    config: ConfigStore,
    ledger: DedupLedger,
    delivery: Arc<dyn DeliveryClient>,
}

impl AdminApi {
    pub fn new(config: ConfigStore, ledger: DedupLedger, delivery: Arc<dyn DeliveryClient>) -> Self {
        Self {
            config,
            ledger,
            delivery,
        }
    }

    /// Probe the endpoint's health route.
    pub async fn test_connection(&self) -> HealthStatus {
        let status = self.delivery.health().await;
        if status.is_healthy() {
            tracing::info!("Connection test passed: {}", status);
        } else {
            tracing::warn!("Connection test failed: {}", status);
        }
        status
    }

    /// Bindings as pretty-printed JSON.
    pub fn export(&self) -> Result<String> {
        let columns = self.config.bindings();
        let json = serde_json::to_string_pretty(&Export { columns: &columns })?;
        tracing::info!("Exported {} lane bindings", columns.len());
        Ok(json)
    }

    /// Replace all bindings from an export. The ledger is kept.
    pub fn import(&self, json: &str) -> Result<usize> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        if !value.get("columns").is_some_and(serde_json::Value::is_array) {
            return Err(Error::Validation(
                "invalid settings file: missing columns array".to_string(),
            ));
        }

        let Import { columns } = serde_json::from_value(value)?;
        let count = columns.len();
        self.config.replace_bindings(columns)?;
        tracing::info!("Imported {} lane bindings", count);
        Ok(count)
    }

    pub fn reset(&self) -> Result<()> {
        self.config.reset()
    }

    pub fn add_lane(
        &self,
        heading: &str,
        attribution: &str,
        handle: &str,
        app_password: &str,
    ) -> Result<AddBindingOutcome> {
        let credentials = Credentials {
            handle: handle.to_string(),
            app_password: app_password.to_string(),
        };
        let outcome = self.config.add_binding(heading, attribution, credentials)?;
        match outcome {
            AddBindingOutcome::Added => {
                tracing::info!(heading, attribution, "Lane added");
            }
            AddBindingOutcome::AlreadyExists => {
                tracing::warn!(heading, attribution, "Lane already configured");
            }
        }
        Ok(outcome)
    }

    pub fn summary(&self) -> Summary {
        let lanes = self
            .config
            .bindings()
            .into_iter()
            .map(|b| LaneSummary {
                enabled: b.is_enabled(),
                key: b.column_key.to_string(),
                handle: b.bluesky.handle,
            })
            .collect();

        Summary {
            lanes,
            total_processed: self.ledger.total_count(),
            ledger_capacity: self.ledger.max_processed(),
            processed_by_lane: self.ledger.counts_by_lane(),
        }
    }
}

/// File name for an export taken at `now`, second precision.
pub fn export_filename(now: DateTime<Utc>) -> String {
    format!("{}_{}.json", EXPORT_FILE_PREFIX, now.format("%Y-%m-%dT%H-%M-%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DocumentCache, MemoryStore};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use deckbridge_core::{LaneKey, Message, PostId};

    struct Health(HealthStatus);

    #[async_trait]
    impl DeliveryClient for Health {
        async fn deliver(&self, _: &Credentials, _: &Message) -> crate::delivery::DeliveryOutcome {
            crate::delivery::DeliveryOutcome::Delivered
        }

        async fn health(&self) -> HealthStatus {
            self.0.clone()
        }
    }

    fn parts(health: HealthStatus) -> (AdminApi, DedupLedger, ConfigStore) {
        let cache = Arc::new(DocumentCache::new(Arc::new(MemoryStore::new())));
        let config = ConfigStore::new(Arc::clone(&cache));
        let ledger = DedupLedger::new(cache, 500);
        let api = AdminApi::new(config.clone(), ledger.clone(), Arc::new(Health(health)));
        (api, ledger, config)
    }

    fn admin_with(health: HealthStatus) -> (AdminApi, DedupLedger) {
        let (api, ledger, _) = parts(health);
        (api, ledger)
    }

    fn sorted_bindings(config: &ConfigStore) -> Vec<LaneBinding> {
        let mut bindings = config.bindings();
        bindings.sort_by(|a, b| a.column_key.cmp(&b.column_key));
        bindings
    }

    fn admin() -> (AdminApi, DedupLedger) {
        admin_with(HealthStatus::Healthy)
    }

    #[tokio::test]
    async fn test_connection_reports_health() {
        let (api, _) = admin_with(HealthStatus::ServerError(503));
        assert_eq!(api.test_connection().await, HealthStatus::ServerError(503));
    }

    #[test]
    fn test_export_omits_ledger() {
        let (api, ledger) = admin();
        api.add_lane("Home", "@alice", "alice.bsky.social", "pw").unwrap();
        ledger
            .mark_processed(&LaneKey::new("Home|@alice"), &PostId::parse("1").unwrap(), 1)
            .unwrap();

        let json = api.export().unwrap();
        assert!(json.starts_with("{\n  \"columns\": ["));
        assert!(json.contains("\"appPassword\": \"pw\""));
        assert!(!json.contains("processedTweets"));
    }

    #[test]
    fn test_export_import_round_trip_keeps_ledger() {
        let (source, _, source_config) = parts(HealthStatus::Healthy);
        source.add_lane("Lists", "@bob", "b", "pw2").unwrap();
        source.add_lane("Home", "@alice", "a", "pw").unwrap();
        source_config
            .set_enabled(&LaneKey::new("Lists|@bob"), false)
            .unwrap();
        let exported = source.export().unwrap();

        let (target, ledger, target_config) = parts(HealthStatus::Healthy);
        target.add_lane("Stale", "@carol", "c", "pw3").unwrap();
        ledger
            .mark_processed(&LaneKey::new("Old|x"), &PostId::parse("9").unwrap(), 1)
            .unwrap();
        assert_eq!(target.import(&exported).unwrap(), 2);

        let imported = sorted_bindings(&target_config);
        assert_eq!(imported, sorted_bindings(&source_config));
        assert_eq!(imported[1].enabled, Some(false));
        assert_eq!(imported[1].bluesky.app_password, "pw2");
        assert_eq!(ledger.total_count(), 1);
    }

    #[test]
    fn test_import_requires_columns_array() {
        let (api, _) = admin();
        api.add_lane("Home", "@alice", "a", "pw").unwrap();

        for bad in [r#"{}"#, r#"{"columns": {}}"#, r#"{"columns": "x"}"#] {
            let err = api.import(bad).unwrap_err();
            assert!(matches!(err, Error::Validation(_)), "{bad}");
        }
        assert!(matches!(api.import("not json"), Err(Error::Json(_))));
        // Nothing replaced.
        assert_eq!(api.summary().lanes.len(), 1);
    }

    #[test]
    fn test_add_lane_twice() {
        let (api, _) = admin();
        assert_eq!(
            api.add_lane("Home", "@alice", "a", "pw").unwrap(),
            AddBindingOutcome::Added
        );
        assert_eq!(
            api.add_lane("Home", "@alice", "b", "pw").unwrap(),
            AddBindingOutcome::AlreadyExists
        );
    }

    #[test]
    fn test_summary_and_reset() {
        let (api, ledger) = admin();
        api.add_lane("Home", "@alice", "alice.bsky.social", "pw").unwrap();
        let lane = LaneKey::new("Home|@alice");
        for id in ["1", "2"] {
            ledger
                .mark_processed(&lane, &PostId::parse(id).unwrap(), 1)
                .unwrap();
        }

        let summary = api.summary();
        assert_eq!(summary.total_processed, 2);
        assert_eq!(summary.ledger_capacity, 500);
        assert!(summary.to_string().contains("Processed posts: 2 (cap 500)"));
        assert_eq!(summary.processed_by_lane["Home|@alice"], 2);
        assert!(summary.lanes[0].enabled);
        assert!(summary.to_string().contains("Home|@alice -> alice.bsky.social (enabled)"));

        api.reset().unwrap();
        let summary = api.summary();
        assert!(summary.lanes.is_empty());
        assert_eq!(summary.total_processed, 0);
    }

    #[test]
    fn test_export_filename() {
        let now = Utc.with_ymd_and_hms(2024, 5, 29, 12, 34, 56).unwrap()
            + chrono::Duration::milliseconds(789);
        assert_eq!(
            export_filename(now),
            "tweetdeck-bluesky-config_2024-05-29T12-34-56.json"
        );
    }
}
