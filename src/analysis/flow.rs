//! Flow estimation by differentiating the tank level over time.
//!
//! Each accepted reading is compared against the previous one: the volume
//! change over the interval is approximated by the mean of the two
//! cross-sectional areas times the level change (trapezoidal rule), and
//! dividing by the elapsed time gives the flow into (positive) or out of
//! (negative) the tank.

use std::collections::VecDeque;

use crate::analysis::tank::TankGeometry;
use crate::logging::{self, Component};
use crate::model::{FlowError, FlowSample, M3_S_TO_L_MIN, Reading, SampleKind};

/// Flows with a smaller magnitude report zero pipe velocity.
pub const MIN_PIPE_FLOW_M3_S: f64 = 1e-6;

/// Number of readings retained when no capacity is configured.
pub const DEFAULT_HISTORY_CAPACITY: usize = 128;

/// Stateful flow estimator owning the recent reading history.
///
/// Only the latest reading takes part in differentiation; older entries are
/// kept in a bounded rolling buffer for diagnostics.
#[derive(Debug, Clone)]
pub struct FlowEstimator {
    tank: TankGeometry,
    pipe_area_m2: f64,
    history: VecDeque<Reading>,
    capacity: usize,
}

impl FlowEstimator {
    /// `pipe_area_m2` is the full bore of the outlet pipe, used to turn
    /// volumetric flow into a mean pipe velocity.
    pub fn new(tank: TankGeometry, pipe_area_m2: f64) -> Self {
        Self::with_capacity(tank, pipe_area_m2, DEFAULT_HISTORY_CAPACITY)
    }

    /// A capacity of zero is raised to one; the previous reading is always kept.
    pub fn with_capacity(tank: TankGeometry, pipe_area_m2: f64, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        FlowEstimator {
            tank,
            pipe_area_m2,
            history: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn tank(&self) -> &TankGeometry {
        &self.tank
    }

    /// Most recent accepted reading, if any.
    pub fn last_reading(&self) -> Option<&Reading> {
        self.history.back()
    }

    /// Retained readings, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &Reading> {
        self.history.iter()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Ingests one level sample and returns the flow since the previous one.
    ///
    /// - First sample: `Bootstrap`, every rate zero, `elapsed_s == 0`.
    /// - `elapsed_s <= 0`: `NonMonotonic`, every rate zero, and the reading is
    ///   still recorded so later samples differentiate against it.
    /// - Otherwise `Differentiated`.
    ///
    /// # Errors
    /// `FlowError::InvalidSample` if the level or timestamp is not finite.
    /// History is left untouched in that case.
    pub fn ingest(&mut self, level_m: f64, timestamp_s: f64) -> Result<FlowSample, FlowError> {
        if !level_m.is_finite() || !timestamp_s.is_finite() {
            return Err(FlowError::InvalidSample {
                level_m,
                timestamp_s,
            });
        }

        if !self.tank.contains_level(level_m) {
            logging::warn(
                Component::Estimator,
                None,
                &format!(
                    "level {:.3} m outside tank height {:.3} m; extrapolating geometry",
                    level_m,
                    self.tank.total_height_m()
                ),
            );
        }

        let area_m2 = self.tank.area_at_level(level_m);

        let sample = match self.history.back() {
            None => FlowSample::at_rest(level_m, area_m2, 0.0, SampleKind::Bootstrap),
            Some(prev) => {
                let elapsed_s = timestamp_s - prev.timestamp_s;
                if elapsed_s <= 0.0 {
                    FlowSample::at_rest(level_m, area_m2, elapsed_s, SampleKind::NonMonotonic)
                } else {
                    self.differentiate(prev, level_m, area_m2, elapsed_s)
                }
            }
        };

        self.record(Reading {
            timestamp_s,
            level_m,
            area_m2,
        });

        Ok(sample)
    }

    fn differentiate(&self, prev: &Reading, level_m: f64, area_m2: f64, elapsed_s: f64) -> FlowSample {
        let area_avg = (area_m2 + prev.area_m2) / 2.0;
        let delta_level = level_m - prev.level_m;

        let flow_m3_s = area_avg * delta_level / elapsed_s;
        let pipe_velocity_m_s = if flow_m3_s.abs() > MIN_PIPE_FLOW_M3_S && self.pipe_area_m2 > 0.0 {
            flow_m3_s.abs() / self.pipe_area_m2
        } else {
            0.0
        };

        FlowSample {
            level_m,
            flow_l_min: flow_m3_s * M3_S_TO_L_MIN,
            level_rate_m_s: delta_level / elapsed_s,
            pipe_velocity_m_s,
            elapsed_s,
            area_m2,
            kind: SampleKind::Differentiated,
        }
    }

    fn record(&mut self, reading: Reading) {
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(reading);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
