//! Core data types for the tank flow monitoring service.
//!
//! This module defines the shared domain model imported by all other modules:
//! the readings kept by the flow estimator, the samples and hydraulic states
//! it emits, and the error type every fallible operation returns.
//! It contains no logic beyond small accessors, and no I/O.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Unit conversions
// ---------------------------------------------------------------------------

/// Cubic metres per second to litres per minute.
pub const M3_S_TO_L_MIN: f64 = 60_000.0;

/// Cubic metres per second to litres per second.
pub const M3_S_TO_L_S: f64 = 1_000.0;

// ---------------------------------------------------------------------------
// Reading types
// ---------------------------------------------------------------------------

/// A level measurement as delivered by a sensor reader.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelSample {
    pub level_m: f64,
    /// Seconds on a clock that is non-decreasing in the common case.
    pub timestamp_s: f64,
}

/// A sample accepted into the flow estimator's history.
///
/// The cross-sectional area is derived once, when the reading is recorded,
/// so that the next differentiation can average it without recomputing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub timestamp_s: f64,
    pub level_m: f64,
    pub area_m2: f64,
}

// ---------------------------------------------------------------------------
// Flow estimator output
// ---------------------------------------------------------------------------

/// How a `FlowSample` was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    /// First reading of a run; nothing to differentiate against.
    Bootstrap,
    /// Flow derived from this reading and the previous one.
    Differentiated,
    /// Elapsed time since the previous reading was zero or negative.
    NonMonotonic,
}

/// Result of ingesting one level reading.
///
/// `flow_l_min` and `level_rate_m_s` are signed: positive while the tank
/// fills, negative while it drains. `pipe_velocity_m_s` is always a magnitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowSample {
    pub level_m: f64,
    pub flow_l_min: f64,
    pub level_rate_m_s: f64,
    pub pipe_velocity_m_s: f64,
    pub elapsed_s: f64,
    pub area_m2: f64,
    pub kind: SampleKind,
}

impl FlowSample {
    /// A sample carrying only level and area; every rate is zero.
    pub fn at_rest(level_m: f64, area_m2: f64, elapsed_s: f64, kind: SampleKind) -> Self {
        FlowSample {
            level_m,
            flow_l_min: 0.0,
            level_rate_m_s: 0.0,
            pipe_velocity_m_s: 0.0,
            elapsed_s,
            area_m2,
            kind,
        }
    }

    /// Volumetric flow in m³/s, derived from the L/min figure.
    pub fn flow_m3_s(&self) -> f64 {
        self.flow_l_min / M3_S_TO_L_MIN
    }

    /// True when the sample carries a meaningful flow estimate.
    pub fn is_differentiated(&self) -> bool {
        self.kind == SampleKind::Differentiated
    }
}

// ---------------------------------------------------------------------------
// Pipe hydraulics output
// ---------------------------------------------------------------------------

/// Fill state of the outlet pipe at the current tank level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeStatus {
    Dry,
    Partial,
    Full,
}

impl std::fmt::Display for PipeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipeStatus::Dry => write!(f, "DRY"),
            PipeStatus::Partial => write!(f, "PARTIAL"),
            PipeStatus::Full => write!(f, "FULL"),
        }
    }
}

/// Partially-filled circular pipe quantities for one water depth.
///
/// Every field except `status` is zero when the pipe is dry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HydraulicState {
    pub status: PipeStatus,
    pub depth_m: f64,
    pub subtended_angle_rad: f64,
    pub wetted_area_m2: f64,
    pub wetted_perimeter_m: f64,
    pub hydraulic_radius_m: f64,
    pub surface_width_m: f64,
    pub shear_stress_pa: f64,
    pub manning_velocity_m_s: f64,
    pub manning_flow_m3_s: f64,
    /// Azevedo Netto full-pipe gravity capacity; independent of depth.
    pub theoretical_max_flow_m3_s: f64,
}

impl HydraulicState {
    pub fn dry() -> Self {
        HydraulicState {
            status: PipeStatus::Dry,
            depth_m: 0.0,
            subtended_angle_rad: 0.0,
            wetted_area_m2: 0.0,
            wetted_perimeter_m: 0.0,
            hydraulic_radius_m: 0.0,
            surface_width_m: 0.0,
            shear_stress_pa: 0.0,
            manning_velocity_m_s: 0.0,
            manning_flow_m3_s: 0.0,
            theoretical_max_flow_m3_s: 0.0,
        }
    }

    pub fn is_dry(&self) -> bool {
        self.status == PipeStatus::Dry
    }

    /// Depth as a fraction of the pipe diameter, 0 when dry and 1 when full.
    pub fn fill_fraction(&self, diameter_m: f64) -> f64 {
        if diameter_m > 0.0 {
            (self.depth_m / diameter_m).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can arise while reading, estimating, or configuring.
///
/// Only `InvalidConfig` and `ConfigFile` are fatal, and only at startup.
/// Everything else is reported by the polling loop and the iteration skipped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FlowError {
    /// The sensor could not deliver a reading.
    #[error("Sensor unavailable: {0}")]
    SensorUnavailable(String),
    /// A finite source (a replay file) has no more samples.
    #[error("Sensor exhausted: {0}")]
    SourceExhausted(String),
    /// The reading carried a non-finite level or timestamp.
    #[error("Invalid sample: level {level_m} m at t={timestamp_s} s")]
    InvalidSample { level_m: f64, timestamp_s: f64 },
    /// Elapsed time since the previous reading was zero or negative.
    #[error("Non-monotonic time: {elapsed_s} s since previous reading")]
    NonMonotonicTime { elapsed_s: f64 },
    /// A configuration value violates a physical invariant.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    /// The configuration file could not be read or parsed.
    #[error("Configuration file error: {0}")]
    ConfigFile(String),
}

impl FlowError {
    /// True for errors that must stop the service.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FlowError::InvalidConfig(_) | FlowError::ConfigFile(_))
    }
}
