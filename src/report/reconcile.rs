//! Reconciliation of measured flow against pipe hydraulics.
//!
//! A report pairs the flow estimated from the level signal with the pipe
//! state computed at the same level, classifies the flow direction, and
//! exposes the gap between measured and Manning-predicted flow as a
//! cross-check. No state is kept between reports.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::model::{FlowSample, HydraulicState, M3_S_TO_L_MIN, M3_S_TO_L_S};

/// Flows within this band of zero are reported as stable.
pub const STABLE_BAND_L_MIN: f64 = 0.01;

/// Direction of the measured flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowDirection {
    Filling,
    Draining,
    Stable,
}

impl FlowDirection {
    /// Classifies a signed flow; the band edges themselves count as stable.
    pub fn classify(flow_l_min: f64) -> Self {
        if flow_l_min > STABLE_BAND_L_MIN {
            FlowDirection::Filling
        } else if flow_l_min < -STABLE_BAND_L_MIN {
            FlowDirection::Draining
        } else {
            FlowDirection::Stable
        }
    }
}

impl fmt::Display for FlowDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowDirection::Filling => write!(f, "FILLING"),
            FlowDirection::Draining => write!(f, "DRAINING"),
            FlowDirection::Stable => write!(f, "STABLE"),
        }
    }
}

/// Flow estimate and pipe hydraulics for one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowReport {
    pub observed_at: DateTime<Utc>,
    pub sample: FlowSample,
    pub hydraulics: HydraulicState,
    pub direction: FlowDirection,
    /// Measured flow minus Manning flow, L/min.
    pub discrepancy_l_min: f64,
    /// Measured flow magnitude as a fraction of the full-pipe capacity.
    /// `None` when the capacity is zero (dry pipe or flat slope).
    pub capacity_utilization: Option<f64>,
}

impl FlowReport {
    /// Combines a flow sample with the hydraulic state at the same level.
    pub fn reconcile(
        observed_at: DateTime<Utc>,
        sample: &FlowSample,
        hydraulics: &HydraulicState,
    ) -> Self {
        let manning_l_min = hydraulics.manning_flow_m3_s * M3_S_TO_L_MIN;
        let capacity = hydraulics.theoretical_max_flow_m3_s;
        let capacity_utilization = if capacity > 0.0 {
            Some(sample.flow_m3_s().abs() / capacity)
        } else {
            None
        };

        FlowReport {
            observed_at,
            sample: *sample,
            hydraulics: *hydraulics,
            direction: FlowDirection::classify(sample.flow_l_min),
            discrepancy_l_min: sample.flow_l_min - manning_l_min,
            capacity_utilization,
        }
    }

    pub fn level_m(&self) -> f64 {
        self.sample.level_m
    }

    pub fn manning_flow_l_min(&self) -> f64 {
        self.hydraulics.manning_flow_m3_s * M3_S_TO_L_MIN
    }
}

impl fmt::Display for FlowReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.sample;
        writeln!(f, "[{}]", self.observed_at.format("%H:%M:%S"))?;
        writeln!(f, "|-- Level: {:.3} m (water area: {:.3} m²)", s.level_m, s.area_m2)?;
        writeln!(f, "|-- Flow ({}): {:.2} L/min", self.direction, s.flow_l_min.abs())?;
        writeln!(f, "|-- Level rate: {:.4} m/min", s.level_rate_m_s * 60.0)?;
        write!(f, "|-- Pipe velocity: {:.2} m/s", s.pipe_velocity_m_s)?;

        let h = &self.hydraulics;
        if h.is_dry() {
            return write!(f, "\n|-- Pipe hydraulics: {}", h.status);
        }

        writeln!(f)?;
        writeln!(f, "|-- Pipe hydraulics ({}):", h.status)?;
        writeln!(f, "    Depth: {:.3} m", h.depth_m)?;
        writeln!(f, "    Subtended angle: {:.3} rad", h.subtended_angle_rad)?;
        writeln!(f, "    Wetted area: {:.4} m²", h.wetted_area_m2)?;
        writeln!(f, "    Hydraulic radius: {:.4} m", h.hydraulic_radius_m)?;
        writeln!(f, "    Surface width: {:.3} m", h.surface_width_m)?;
        writeln!(f, "    Shear stress: {:.2} N/m²", h.shear_stress_pa)?;
        writeln!(f, "    Velocity (Manning): {:.3} m/s", h.manning_velocity_m_s)?;
        writeln!(f, "    Flow (Manning): {:.2} L/s", h.manning_flow_m3_s * M3_S_TO_L_S)?;
        writeln!(
            f,
            "    Flow (Azevedo Netto): {:.2} L/s",
            h.theoretical_max_flow_m3_s * M3_S_TO_L_S
        )?;
        write!(f, "    Measured - Manning: {:+.2} L/min", self.discrepancy_l_min)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
