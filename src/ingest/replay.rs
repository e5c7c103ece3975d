//! Replay of recorded level histories
//!
//! When the device is unavailable, use this reader to feed a recorded run
//! back through the estimator for testing and development.
//!
//! CSV format, one reading per line, optional header:
//!
//! ```text
//! timestamp,level_m
//! 2025-03-01T12:00:00Z,0.152
//! 1740830460,0.149
//! ```
//!
//! Timestamps may be RFC 3339 or Unix epoch seconds.

use chrono::DateTime;
use std::collections::VecDeque;
use std::fs;
use std::path::Path;

use crate::ingest::SensorReader;
use crate::logging::{self, Component};
use crate::model::{FlowError, LevelSample};

/// Yields recorded samples one per read, in file order.
#[derive(Debug, Clone)]
pub struct ReplayReader {
    name: String,
    samples: VecDeque<LevelSample>,
    served: usize,
}

impl ReplayReader {
    pub fn from_samples(name: &str, samples: Vec<LevelSample>) -> Self {
        ReplayReader {
            name: name.to_string(),
            samples: samples.into(),
            served: 0,
        }
    }

    /// Loads a CSV history from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, FlowError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            FlowError::ConfigFile(format!("cannot read replay file {}: {}", path.display(), e))
        })?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "replay".to_string());
        Ok(Self::from_samples(&name, parse_replay_csv(&text)))
    }

    /// Samples not yet served.
    pub fn remaining(&self) -> usize {
        self.samples.len()
    }
}

impl SensorReader for ReplayReader {
    fn sensor_id(&self) -> &str {
        &self.name
    }

    fn read_level(&mut self) -> Result<LevelSample, FlowError> {
        match self.samples.pop_front() {
            Some(sample) => {
                self.served += 1;
                Ok(sample)
            }
            None => Err(FlowError::SourceExhausted(format!(
                "replay exhausted after {} samples",
                self.served
            ))),
        }
    }
}

/// Parses a replay CSV, skipping the header, blank lines, and malformed rows.
pub fn parse_replay_csv(csv: &str) -> Vec<LevelSample> {
    let mut samples = Vec::new();
    let mut skipped = 0usize;

    for (i, line) in csv.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() < 2 {
            skipped += 1;
            continue;
        }

        let parsed = parse_timestamp(fields[0]).zip(fields[1].parse::<f64>().ok());
        match parsed {
            Some((timestamp_s, level_m)) => samples.push(LevelSample {
                level_m,
                timestamp_s,
            }),
            // A non-numeric first row is the header.
            None if i == 0 => continue,
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        logging::debug(
            Component::Sensor,
            None,
            &format!("replay: skipped {} malformed rows", skipped),
        );
    }

    samples
}

/// RFC 3339 or epoch seconds to epoch seconds.
fn parse_timestamp(field: &str) -> Option<f64> {
    if let Ok(seconds) = field.parse::<f64>() {
        return Some(seconds);
    }
    DateTime::parse_from_rfc3339(field)
        .ok()
        .map(|dt| dt.timestamp_millis() as f64 / 1000.0)
}

// ============================================================================
// Tests
// ============================================================================
