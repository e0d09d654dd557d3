//! The persisted configuration document.
//!
//! # Shape
//!
//! ```json
//! {
//!   "columns": [
//!     {"columnKey": "Home|@alice", "heading": "Home", "attribution": "@alice",
//!      "enabled": true, "bluesky": {"handle": "...", "appPassword": "..."}}
//!   ],
//!   "processedTweets": {"Home|@alice": {"1850000000000000000": 1717171717000}}
//! }
//! ```
//!
//! Older documents stored `processedTweets` as a flat array of ids. Those are
//! migrated into the keyed shape on load, attributing every id to the first
//! configured lane.

use std::collections::BTreeMap;

use deckbridge_core::LaneKey;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Key under which the document is stored.
pub const CONFIG_KEY: &str = "config";

/// lane key → post id → processed-at (epoch millis).
pub type ProcessedPosts = BTreeMap<String, BTreeMap<String, i64>>;

/// Destination account credentials for a lane.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub handle: String,
    #[serde(default, rename = "appPassword")]
    pub app_password: String,
}

/// Configuration for one monitored lane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaneBinding {
    pub column_key: LaneKey,
    #[serde(default)]
    pub heading: String,
    #[serde(default)]
    pub attribution: String,
    /// Absent means enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub bluesky: Credentials,
}

impl LaneBinding {
    pub fn new(heading: &str, attribution: &str, credentials: Credentials) -> Self {
        Self {
            column_key: LaneKey::from_parts(heading, attribution),
            heading: heading.trim().to_string(),
            attribution: attribution.trim().to_string(),
            enabled: None,
            bluesky: credentials,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled != Some(false)
    }
}

/// Configuration and ledger state, persisted as one JSON value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDocument {
    pub columns: Vec<LaneBinding>,
    pub processed_tweets: ProcessedPosts,
}

/// On-disk form, tolerant of the legacy ledger shape.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDocument {
    #[serde(default)]
    columns: Vec<LaneBinding>,
    #[serde(default)]
    processed_tweets: RawProcessed,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawProcessed {
    Keyed(ProcessedPosts),
    Legacy(Vec<serde_json::Value>),
}

impl Default for RawProcessed {
    fn default() -> Self {
        RawProcessed::Keyed(ProcessedPosts::new())
    }
}

impl ConfigDocument {
    /// Parse a stored document, migrating the legacy ledger if present.
    ///
    /// Returns the document and whether a migration happened (in which case
    /// the caller should persist it).
    pub fn parse(json: &str, now_millis: i64) -> Result<(Self, bool)> {
        let raw: RawDocument = serde_json::from_str(json)?;

        match raw.processed_tweets {
            RawProcessed::Keyed(processed_tweets) => Ok((
                Self {
                    columns: raw.columns,
                    processed_tweets,
                },
                false,
            )),
            RawProcessed::Legacy(ids) => {
                let processed_tweets = migrate_legacy(&raw.columns, &ids, now_millis);
                Ok((
                    Self {
                        columns: raw.columns,
                        processed_tweets,
                    },
                    true,
                ))
            }
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Total ledger entries across every lane.
    pub fn processed_count(&self) -> usize {
        self.processed_tweets.values().map(BTreeMap::len).sum()
    }

    pub fn binding(&self, lane: &LaneKey) -> Option<&LaneBinding> {
        self.columns.iter().find(|c| &c.column_key == lane)
    }
}

fn migrate_legacy(
    columns: &[LaneBinding],
    ids: &[serde_json::Value],
    now_millis: i64,
) -> ProcessedPosts {
    tracing::info!("Legacy processed-post list detected, migrating to per-lane ledger");

    let mut processed = ProcessedPosts::new();
    let Some(first) = columns.first() else {
        tracing::warn!(
            "No lanes configured; discarding {} legacy processed entries",
            ids.len()
        );
        return processed;
    };

    let lane = processed
        .entry(first.column_key.as_str().to_string())
        .or_default();
    for id in ids {
        let id = match id {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            other => {
                tracing::warn!("Skipping malformed legacy entry: {}", other);
                continue;
            }
        };
        lane.insert(id, now_millis);
    }

    tracing::info!(
        "Migrated {} legacy entries to lane '{}'",
        lane.len(),
        first.column_key
    );
    processed
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_717_171_717_000;

    #[test]
    fn test_parse_keyed_document() {
        let json = r#"{
            "columns": [{"columnKey": "Home|@alice", "heading": "Home", "attribution": "@alice",
                         "bluesky": {"handle": "alice.bsky.social", "appPassword": "pw"}}],
            "processedTweets": {"Home|@alice": {"100": 5, "101": 6}}
        }"#;
        let (doc, migrated) = ConfigDocument::parse(json, NOW).unwrap();
        assert!(!migrated);
        assert_eq!(doc.columns.len(), 1);
        assert!(doc.columns[0].is_enabled());
        assert_eq!(doc.columns[0].bluesky.app_password, "pw");
        assert_eq!(doc.processed_count(), 2);
    }

    #[test]
    fn test_missing_fields_default() {
        let (doc, migrated) = ConfigDocument::parse("{}", NOW).unwrap();
        assert!(!migrated);
        assert_eq!(doc, ConfigDocument::default());
    }

    #[test]
    fn test_legacy_migration_single_lane() {
        let json = r#"{
            "columns": [{"columnKey": "Home|Following", "heading": "Home", "attribution": "Following",
                         "bluesky": {"handle": "h", "appPassword": "p"}}],
            "processedTweets": ["1", "2", 3]
        }"#;
        let (doc, migrated) = ConfigDocument::parse(json, NOW).unwrap();
        assert!(migrated);
        assert_eq!(doc.processed_count(), 3);
        let lane = &doc.processed_tweets["Home|Following"];
        assert_eq!(lane.len(), 3);
        assert!(lane.values().all(|&ts| ts == NOW));
        assert!(lane.contains_key("3"));
    }

    #[test]
    fn test_legacy_migration_without_lanes_drops_entries() {
        let json = r#"{"columns": [], "processedTweets": ["1", "2"]}"#;
        let (doc, migrated) = ConfigDocument::parse(json, NOW).unwrap();
        assert!(migrated);
        assert_eq!(doc.processed_count(), 0);
    }

    #[test]
    fn test_enabled_omitted_when_absent() {
        let binding = LaneBinding::new("Home", "@alice", Credentials::default());
        let json = serde_json::to_value(&binding).unwrap();
        assert!(json.get("enabled").is_none());
        assert_eq!(json["columnKey"], "Home|@alice");

        let disabled = LaneBinding {
            enabled: Some(false),
            ..binding
        };
        assert!(!disabled.is_enabled());
        assert_eq!(serde_json::to_value(&disabled).unwrap()["enabled"], false);
    }

    #[test]
    fn test_invalid_json_is_error() {
        assert!(ConfigDocument::parse("not json", NOW).is_err());
    }
}
