//! Partially-filled circular pipe hydraulics.
//!
//! The outlet pipe leaves the tank wall with its invert (lowest inner point)
//! at a fixed elevation above the tank bottom. The water depth in the pipe is
//! the tank level measured from that invert, clamped to the pipe diameter.
//! From the depth we derive the circular-segment geometry and run the
//! Manning and Azevedo Netto formulas against it.

use std::f64::consts::PI;

use crate::model::{FlowError, HydraulicState, PipeStatus};

/// Depths at or below this are treated as a dry pipe.
pub const DRY_DEPTH_EPSILON_M: f64 = 1e-6;

/// Depths within this of the diameter count as a full bore. Absorbs the
/// rounding in `centerline - d/2` at the crown.
pub const FULL_DEPTH_TOLERANCE_M: f64 = 1e-9;

/// Slopes at or above this use the sine of the pipe angle for shear stress.
pub const STEEP_SLOPE: f64 = 0.10;

/// Azevedo Netto coefficient and diameter exponent for full-pipe capacity.
const AZEVEDO_NETTO_COEFFICIENT: f64 = 0.375;
const AZEVEDO_NETTO_DIAMETER_EXPONENT: f64 = 2.667;

/// Fixed characteristics of the outlet pipe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipeParameters {
    diameter_m: f64,
    slope_m_per_m: f64,
    invert_elevation_m: f64,
    manning_n: f64,
    specific_weight_n_per_m3: f64,
}

impl PipeParameters {
    /// Builds pipe parameters from the centerline elevation measured from
    /// the tank bottom. The invert sits one radius below it.
    ///
    /// # Errors
    /// `FlowError::InvalidConfig` unless `diameter_m > 0`,
    /// `slope_m_per_m >= 0`, `manning_n > 0`, `specific_weight > 0`, and
    /// every value is finite.
    pub fn new(
        diameter_m: f64,
        slope_m_per_m: f64,
        centerline_elevation_m: f64,
        manning_n: f64,
        specific_weight_n_per_m3: f64,
    ) -> Result<Self, FlowError> {
        let checks = [
            ("diameter", diameter_m, diameter_m > 0.0),
            ("slope", slope_m_per_m, slope_m_per_m >= 0.0),
            ("centerline elevation", centerline_elevation_m, true),
            ("Manning n", manning_n, manning_n > 0.0),
            ("specific weight", specific_weight_n_per_m3, specific_weight_n_per_m3 > 0.0),
        ];
        for (name, value, in_range) in checks {
            if !value.is_finite() || !in_range {
                return Err(FlowError::InvalidConfig(format!(
                    "pipe {} out of range: {}",
                    name, value
                )));
            }
        }

        Ok(PipeParameters {
            diameter_m,
            slope_m_per_m,
            invert_elevation_m: centerline_elevation_m - diameter_m / 2.0,
            manning_n,
            specific_weight_n_per_m3,
        })
    }

    pub fn diameter_m(&self) -> f64 {
        self.diameter_m
    }

    pub fn slope_m_per_m(&self) -> f64 {
        self.slope_m_per_m
    }

    pub fn invert_elevation_m(&self) -> f64 {
        self.invert_elevation_m
    }

    pub fn manning_n(&self) -> f64 {
        self.manning_n
    }

    pub fn specific_weight_n_per_m3(&self) -> f64 {
        self.specific_weight_n_per_m3
    }

    /// Full bore cross-section, π·(d/2)².
    pub fn full_area_m2(&self) -> f64 {
        let radius = self.diameter_m / 2.0;
        PI * radius * radius
    }

    /// Gravity capacity of the pipe flowing full (Azevedo Netto).
    pub fn theoretical_max_flow_m3_s(&self) -> f64 {
        AZEVEDO_NETTO_COEFFICIENT
            * self.diameter_m.powf(AZEVEDO_NETTO_DIAMETER_EXPONENT)
            * self.slope_m_per_m.sqrt()
    }

    /// Bed shear stress for hydraulic radius `r`.
    fn shear_stress_pa(&self, hydraulic_radius_m: f64) -> f64 {
        let slope_term = if self.slope_m_per_m < STEEP_SLOPE {
            self.slope_m_per_m
        } else {
            self.slope_m_per_m.atan().sin()
        };
        self.specific_weight_n_per_m3 * hydraulic_radius_m * slope_term
    }

    /// Hydraulic state of the pipe for a tank water level.
    ///
    /// Pure: the same level always yields the same state.
    pub fn hydraulics_at_level(&self, tank_level_m: f64) -> HydraulicState {
        let raw_depth = tank_level_m - self.invert_elevation_m;
        // NaN compares false, so it lands here too.
        if !(raw_depth > DRY_DEPTH_EPSILON_M) {
            return HydraulicState::dry();
        }

        let d = self.diameter_m;
        let (depth, status) = if raw_depth >= d - FULL_DEPTH_TOLERANCE_M {
            (d, PipeStatus::Full)
        } else {
            (raw_depth, PipeStatus::Partial)
        };

        let cos_half_angle = (1.0 - 2.0 * depth / d).clamp(-1.0, 1.0);
        let theta = 2.0 * cos_half_angle.acos();

        let wetted_area = (d * d / 8.0) * (theta - theta.sin());
        let wetted_perimeter = 0.5 * theta * d;
        let hydraulic_radius = if wetted_perimeter > 0.0 {
            wetted_area / wetted_perimeter
        } else {
            0.0
        };
        let surface_width = d * (theta / 2.0).sin();

        let manning_velocity =
            hydraulic_radius.powf(2.0 / 3.0) * self.slope_m_per_m.sqrt() / self.manning_n;

        HydraulicState {
            status,
            depth_m: depth,
            subtended_angle_rad: theta,
            wetted_area_m2: wetted_area,
            wetted_perimeter_m: wetted_perimeter,
            hydraulic_radius_m: hydraulic_radius,
            surface_width_m: surface_width,
            shear_stress_pa: self.shear_stress_pa(hydraulic_radius),
            manning_velocity_m_s: manning_velocity,
            manning_flow_m3_s: wetted_area * manning_velocity,
            theoretical_max_flow_m3_s: self.theoretical_max_flow_m3_s(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const DIAMETER: f64 = 0.10226;

    /// 4" PVC outlet with its invert 0.10 m above the tank bottom.
    fn pvc_outlet() -> PipeParameters {
        PipeParameters::new(DIAMETER, 0.01, 0.10 + DIAMETER / 2.0, 0.013, 9810.0).unwrap()
    }

    // --- Dry ----------------------------------------------------------------

    #[test]
    fn test_level_at_or_below_invert_is_dry_with_all_zero_fields() {
        let pipe = pvc_outlet();
        for level in [0.10, 0.0999, 0.0, -1.0, 0.10 + 1e-7] {
            let state = pipe.hydraulics_at_level(level);
            assert_eq!(state, HydraulicState::dry(), "level {} should be dry", level);
        }
    }

    #[test]
    fn test_non_finite_level_is_dry() {
        assert!(pvc_outlet().hydraulics_at_level(f64::NAN).is_dry());
    }

    // --- Partial ------------------------------------------------------------

    #[test]
    fn test_half_full_example_geometry() {
        let pipe = pvc_outlet();
        let state = pipe.hydraulics_at_level(0.15);

        assert_eq!(state.status, PipeStatus::Partial);
        assert_relative_eq!(state.depth_m, 0.05, max_relative = 1e-9);

        let expected_theta = 2.0 * (1.0 - 2.0 * 0.05 / DIAMETER).acos();
        assert_relative_eq!(state.subtended_angle_rad, expected_theta, max_relative = 1e-12);
        assert!((state.subtended_angle_rad - 3.0976).abs() < 1e-3);

        // Just under half the bore: slightly less than π·r²/2.
        let half_bore = pipe.full_area_m2() / 2.0;
        assert!(state.wetted_area_m2 < half_bore);
        assert_relative_eq!(state.wetted_area_m2, 0.003991, max_relative = 1e-3);

        assert_relative_eq!(state.wetted_perimeter_m, 0.5 * expected_theta * DIAMETER);
        assert_relative_eq!(
            state.hydraulic_radius_m,
            state.wetted_area_m2 / state.wetted_perimeter_m
        );
        assert!(state.manning_velocity_m_s > 0.0);
        assert_relative_eq!(
            state.manning_flow_m3_s,
            state.wetted_area_m2 * state.manning_velocity_m_s
        );
    }

    #[test]
    fn test_surface_width_is_widest_at_half_depth() {
        let pipe = pvc_outlet();
        let half = pipe.hydraulics_at_level(0.10 + DIAMETER / 2.0);
        assert_relative_eq!(half.surface_width_m, DIAMETER, max_relative = 1e-9);
        let shallow = pipe.hydraulics_at_level(0.11);
        assert!(shallow.surface_width_m < half.surface_width_m);
    }

    #[test]
    fn test_fill_fraction_spans_dry_to_full() {
        let pipe = pvc_outlet();
        assert_eq!(pipe.hydraulics_at_level(0.0).fill_fraction(DIAMETER), 0.0);
        let half = pipe.hydraulics_at_level(0.10 + DIAMETER / 2.0);
        assert_relative_eq!(half.fill_fraction(DIAMETER), 0.5, max_relative = 1e-9);
        assert_eq!(pipe.hydraulics_at_level(1.0).fill_fraction(DIAMETER), 1.0);
    }

    #[test]
    fn test_gentle_slope_shear_stress_uses_slope_directly() {
        let pipe = pvc_outlet();
        let state = pipe.hydraulics_at_level(0.15);
        assert_relative_eq!(state.shear_stress_pa, 9810.0 * state.hydraulic_radius_m * 0.01);
    }

    #[test]
    fn test_steep_slope_shear_stress_uses_sine_of_angle() {
        let pipe = PipeParameters::new(DIAMETER, 0.5, 0.2, 0.013, 9810.0).unwrap();
        let state = pipe.hydraulics_at_level(0.2);
        let expected = 9810.0 * state.hydraulic_radius_m * 0.5_f64.atan().sin();
        assert_relative_eq!(state.shear_stress_pa, expected);
        assert!(state.shear_stress_pa < 9810.0 * state.hydraulic_radius_m * 0.5);
    }

    #[test]
    fn test_zero_slope_gives_zero_velocity_and_capacity() {
        let pipe = PipeParameters::new(DIAMETER, 0.0, 0.2, 0.013, 9810.0).unwrap();
        let state = pipe.hydraulics_at_level(0.2);
        assert_eq!(state.status, PipeStatus::Partial);
        assert_eq!(state.manning_velocity_m_s, 0.0);
        assert_eq!(state.theoretical_max_flow_m3_s, 0.0);
        assert_eq!(state.shear_stress_pa, 0.0);
    }

    // --- Full ---------------------------------------------------------------

    #[test]
    fn test_level_above_crown_is_full_with_full_bore_area() {
        let pipe = pvc_outlet();
        let crown = pipe.invert_elevation_m() + DIAMETER;
        for level in [crown + 1e-9, 0.3, 5.0] {
            let state = pipe.hydraulics_at_level(level);
            assert_eq!(state.status, PipeStatus::Full, "level {} should be full", level);
            assert_relative_eq!(state.depth_m, DIAMETER);
            assert_relative_eq!(state.wetted_area_m2, pipe.full_area_m2(), max_relative = 1e-9);
            assert_relative_eq!(state.wetted_perimeter_m, PI * DIAMETER, max_relative = 1e-9);
            assert_relative_eq!(state.hydraulic_radius_m, DIAMETER / 4.0, max_relative = 1e-9);
            assert!(state.surface_width_m.abs() < 1e-9);
        }
    }

    #[test]
    fn test_level_exactly_at_crown_is_full() {
        // Centerlines whose invert + diameter rounds a hair below the crown.
        for (diameter, centerline) in [(0.3, 0.7), (0.1, 0.33), (DIAMETER, 0.20)] {
            let pipe = PipeParameters::new(diameter, 0.01, centerline, 0.013, 9810.0).unwrap();
            let level = pipe.invert_elevation_m() + diameter;
            let state = pipe.hydraulics_at_level(level);
            assert_eq!(
                state.status,
                PipeStatus::Full,
                "d={} centerline={} level={} should be full",
                diameter,
                centerline,
                level
            );
            assert_eq!(state.depth_m, diameter);
        }
    }

    #[test]
    fn test_level_just_below_crown_stays_partial() {
        let pipe = pvc_outlet();
        let crown = pipe.invert_elevation_m() + DIAMETER;
        assert_eq!(pipe.hydraulics_at_level(crown - 1e-6).status, PipeStatus::Partial);
    }

    // --- Capacity and purity ------------------------------------------------

    #[test]
    fn test_theoretical_max_flow_is_independent_of_depth() {
        let pipe = pvc_outlet();
        let expected = 0.375 * DIAMETER.powf(2.667) * 0.1;
        for level in [0.11, 0.15, 0.19, 0.5] {
            let state = pipe.hydraulics_at_level(level);
            assert_relative_eq!(state.theoretical_max_flow_m3_s, expected, max_relative = 1e-12);
        }
    }

    #[test]
    fn test_repeated_calls_are_bit_identical() {
        let pipe = pvc_outlet();
        let first = pipe.hydraulics_at_level(0.1337);
        let second = pipe.hydraulics_at_level(0.1337);
        assert_eq!(first, second);
        assert_eq!(
            first.wetted_area_m2.to_bits(),
            second.wetted_area_m2.to_bits()
        );
    }

    #[test]
    fn test_wetted_area_increases_with_depth() {
        let pipe = pvc_outlet();
        let mut previous = 0.0;
        for step in 1..=50 {
            let level = 0.10 + DIAMETER * step as f64 / 50.0;
            let area = pipe.hydraulics_at_level(level).wetted_area_m2;
            assert!(area > previous, "wetted area should grow at level {}", level);
            previous = area;
        }
    }

    // --- Construction -------------------------------------------------------

    #[test]
    fn test_invert_is_one_radius_below_centerline() {
        let pipe = PipeParameters::new(0.2, 0.01, 0.5, 0.013, 9810.0).unwrap();
        assert_relative_eq!(pipe.invert_elevation_m(), 0.4);
    }

    #[test]
    fn test_invalid_parameters_are_rejected() {
        let bad = [
            PipeParameters::new(0.0, 0.01, 0.2, 0.013, 9810.0),
            PipeParameters::new(-0.1, 0.01, 0.2, 0.013, 9810.0),
            PipeParameters::new(0.1, -0.01, 0.2, 0.013, 9810.0),
            PipeParameters::new(0.1, 0.01, 0.2, 0.0, 9810.0),
            PipeParameters::new(0.1, 0.01, f64::NAN, 0.013, 9810.0),
            PipeParameters::new(0.1, 0.01, 0.2, 0.013, 0.0),
        ];
        for result in bad {
            assert!(
                matches!(result, Err(FlowError::InvalidConfig(_))),
                "expected InvalidConfig, got {:?}",
                result
            );
        }
    }
}
