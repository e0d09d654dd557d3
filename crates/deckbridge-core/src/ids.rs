//! Identifiers for posts and lanes.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A snowflake-style post identifier.
///
/// The numeric value is kept at full precision so that comparing two ids
/// yields their chronological order. The raw spelling is preserved because it
/// is what the ledger and the destination see.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PostId {
    value: u128,
    raw: String,
}

impl PostId {
    /// Parse a post id from its decimal representation.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(Error::InvalidPostId {
                raw: raw.to_string(),
                reason: "empty identifier",
            });
        }
        if !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidPostId {
                raw: raw.to_string(),
                reason: "contains non-digit characters",
            });
        }
        let value = raw.parse::<u128>().map_err(|_| Error::InvalidPostId {
            raw: raw.to_string(),
            reason: "exceeds 128 bits",
        })?;
        Ok(Self {
            value,
            raw: raw.to_string(),
        })
    }

    /// Numeric value of the id.
    pub fn value(&self) -> u128 {
        self.value
    }

    /// The id as it appeared in the markup.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl Ord for PostId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value
            .cmp(&other.value)
            .then_with(|| self.raw.cmp(&other.raw))
    }
}

impl PartialOrd for PostId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for PostId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Composite key identifying a lane: `heading|attribution`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LaneKey(String);

impl LaneKey {
    /// Build a key from the lane's rendered heading and attribution label.
    pub fn from_parts(heading: &str, attribution: &str) -> Self {
        LaneKey(format!("{}|{}", heading.trim(), attribution.trim()))
    }

    /// Wrap an already-composed key (as stored in configuration).
    pub fn new(key: impl Into<String>) -> Self {
        LaneKey(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LaneKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LaneKey {
    fn from(s: &str) -> Self {
        LaneKey(s.to_string())
    }
}
