//! Recorded page captures, replayed into a [`MemoryPage`].
//!
//! A capture is JSONL, one post per line:
//!
//! ```json
//! {"heading": "Home", "attribution": "@alice", "html": "<article ...>"}
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use deckbridge_core::LaneKey;
use metrics::counter;
use serde::Deserialize;

use super::memory::MemoryPage;
use crate::Result;

/// One captured post and the lane it rendered in.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CaptureRecord {
    pub heading: String,
    pub attribution: String,
    pub html: String,
}

impl CaptureRecord {
    pub fn lane(&self) -> LaneKey {
        LaneKey::from_parts(&self.heading, &self.attribution)
    }
}

/// Line counts from reading a capture.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub total_lines: usize,
    pub records: usize,
    pub malformed: usize,
}

/// A parsed capture file.
#[derive(Debug, Clone, Default)]
pub struct Capture {
    records: Vec<CaptureRecord>,
    stats: CaptureStats,
}

impl Capture {
    /// Read a capture file. Malformed lines are logged and skipped.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::read(BufReader::new(file))
    }

    pub fn read<R: BufRead>(reader: R) -> Result<Self> {
        let mut capture = Capture::default();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            capture.stats.total_lines += 1;
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<CaptureRecord>(&line) {
                Ok(record) => {
                    capture.stats.records += 1;
                    capture.records.push(record);
                }
                Err(e) => {
                    tracing::warn!("Line {}: malformed capture record: {}", line_num + 1, e);
                    capture.stats.malformed += 1;
                    counter!("capture_lines_malformed_total").increment(1);
                }
            }
        }

        Ok(capture)
    }

    pub fn records(&self) -> &[CaptureRecord] {
        &self.records
    }

    pub fn stats(&self) -> &CaptureStats {
        &self.stats
    }

    /// Distinct lanes, in order of first appearance.
    pub fn lanes(&self) -> Vec<(String, String)> {
        let mut seen = Vec::<LaneKey>::new();
        let mut lanes = Vec::new();
        for record in &self.records {
            let key = record.lane();
            if !seen.contains(&key) {
                seen.push(key);
                lanes.push((record.heading.clone(), record.attribution.clone()));
            }
        }
        lanes
    }

    /// Render one lane per distinct heading/attribution pair.
    pub fn render_lanes(&self, page: &MemoryPage) {
        for (heading, attribution) in self.lanes() {
            if page.column(&LaneKey::from_parts(&heading, &attribution)).is_none() {
                page.add_column(&heading, &attribution);
            }
        }
    }

    /// Append every post to its lane. Returns the number appended.
    ///
    /// Lanes must already be rendered; records for a missing lane are
    /// skipped.
    pub fn play(&self, page: &MemoryPage) -> usize {
        let mut appended = 0;
        for record in &self.records {
            let lane = record.lane();
            let Some(column) = page.column(&lane) else {
                tracing::warn!(lane = %lane, "Lane not rendered; skipping captured post");
                continue;
            };
            column.append_post(record.html.clone());
            appended += 1;
        }
        tracing::info!("Replayed {} of {} captured posts", appended, self.records.len());
        appended
    }
}
