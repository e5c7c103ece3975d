//! Frustum (truncated cone) tank geometry.
//!
//! The tank radius varies linearly from the base to the top, so the
//! horizontal cross-section grows quadratically with level. Levels outside
//! `[0, total_height_m]` are not clamped: the linear radius is extrapolated,
//! and callers that care use `contains_level` to flag such readings.

use std::f64::consts::PI;

use crate::model::FlowError;

/// Fixed dimensions of a frustum-shaped tank.
///
/// A non-positive `total_height_m` is accepted and treated as a cylinder of
/// `base_radius_m`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TankGeometry {
    base_radius_m: f64,
    top_radius_m: f64,
    total_height_m: f64,
}

impl TankGeometry {
    /// Returns an error if a radius is negative or any value is non-finite.
    pub fn new(base_radius_m: f64, top_radius_m: f64, total_height_m: f64) -> Result<Self, FlowError> {
        for (name, value) in [("base radius", base_radius_m), ("top radius", top_radius_m)] {
            if !value.is_finite() || value < 0.0 {
                return Err(FlowError::InvalidConfig(format!(
                    "tank {} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        if !total_height_m.is_finite() {
            return Err(FlowError::InvalidConfig(format!(
                "tank height must be finite, got {}",
                total_height_m
            )));
        }

        Ok(TankGeometry {
            base_radius_m,
            top_radius_m,
            total_height_m,
        })
    }

    /// Tanks are specified by diameter on site; this halves both.
    pub fn from_diameters(
        base_diameter_m: f64,
        top_diameter_m: f64,
        total_height_m: f64,
    ) -> Result<Self, FlowError> {
        Self::new(base_diameter_m / 2.0, top_diameter_m / 2.0, total_height_m)
    }

    pub fn base_radius_m(&self) -> f64 {
        self.base_radius_m
    }

    pub fn top_radius_m(&self) -> f64 {
        self.top_radius_m
    }

    pub fn total_height_m(&self) -> f64 {
        self.total_height_m
    }

    /// Change in radius per metre of height. Zero for the cylinder fallback.
    fn radius_slope(&self) -> f64 {
        if self.total_height_m <= 0.0 {
            0.0
        } else {
            (self.top_radius_m - self.base_radius_m) / self.total_height_m
        }
    }

    /// Radius of the water surface at `level_m`.
    ///
    /// May be negative for extreme extrapolation below a widening tank.
    pub fn radius_at_level(&self, level_m: f64) -> f64 {
        self.base_radius_m + self.radius_slope() * level_m
    }

    /// Horizontal cross-sectional area at `level_m`, in m².
    pub fn area_at_level(&self, level_m: f64) -> f64 {
        let radius = self.radius_at_level(level_m);
        PI * radius * radius
    }

    /// Water volume between the tank bottom and `level_m`, in m³.
    ///
    /// Integral of `area_at_level` from zero; negative for negative levels.
    pub fn volume_at_level(&self, level_m: f64) -> f64 {
        let r0 = self.base_radius_m;
        let k = self.radius_slope();
        let h = level_m;
        PI * (r0 * r0 * h + r0 * k * h * h + k * k * h * h * h / 3.0)
    }

    /// True if `level_m` lies within the physical tank.
    pub fn contains_level(&self, level_m: f64) -> bool {
        if self.total_height_m <= 0.0 {
            return level_m >= 0.0;
        }
        (0.0..=self.total_height_m).contains(&level_m)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn widening_tank() -> TankGeometry {
        TankGeometry::new(0.15, 0.25, 0.5).unwrap()
    }

    #[test]
    fn test_cylinder_area_is_constant_at_every_level() {
        let tank = TankGeometry::from_diameters(0.37, 0.37, 0.215).unwrap();
        let expected = PI * 0.185 * 0.185;
        for level in [0.0, 0.05, 0.1, 0.215, 0.4, -0.1] {
            assert_relative_eq!(tank.area_at_level(level), expected, max_relative = 1e-12);
        }
    }

    #[test]
    fn test_area_at_base_and_top_matches_radii() {
        let tank = widening_tank();
        assert_relative_eq!(tank.area_at_level(0.0), PI * 0.15 * 0.15);
        assert_relative_eq!(tank.area_at_level(0.5), PI * 0.25 * 0.25, max_relative = 1e-12);
    }

    #[test]
    fn test_area_grows_monotonically_for_widening_tank() {
        let tank = widening_tank();
        let mut previous = tank.area_at_level(0.0);
        for step in 1..=100 {
            let level = 0.5 * step as f64 / 100.0;
            let area = tank.area_at_level(level);
            assert!(
                area >= previous,
                "area should not shrink with rising level: {} < {} at {} m",
                area,
                previous,
                level
            );
            // Continuity: neighbouring levels give neighbouring areas.
            assert!((area - previous).abs() < 1e-2, "area jumped at {} m", level);
            previous = area;
        }
    }

    #[test]
    fn test_radius_is_interpolated_linearly() {
        let tank = widening_tank();
        assert_relative_eq!(tank.radius_at_level(0.25), 0.20, max_relative = 1e-12);
    }

    #[test]
    fn test_zero_height_falls_back_to_base_cylinder() {
        let tank = TankGeometry::new(0.2, 0.9, 0.0).unwrap();
        assert_relative_eq!(tank.area_at_level(1.0), PI * 0.04, max_relative = 1e-12);
        let tank = TankGeometry::new(0.2, 0.9, -3.0).unwrap();
        assert_relative_eq!(tank.area_at_level(1.0), PI * 0.04, max_relative = 1e-12);
    }

    #[test]
    fn test_levels_outside_tank_extrapolate_without_clamping() {
        let tank = widening_tank();
        // Radius keeps growing at 0.2 m per metre above the top.
        assert_relative_eq!(tank.area_at_level(1.0), PI * 0.35 * 0.35, max_relative = 1e-12);
        assert!(!tank.contains_level(1.0));
        assert!(!tank.contains_level(-0.01));
        assert!(tank.contains_level(0.5));
    }

    #[test]
    fn test_extreme_extrapolation_still_gives_non_negative_area() {
        // Radius crosses zero at -0.75 m and goes negative below it.
        let tank = widening_tank();
        assert!(tank.radius_at_level(-2.0) < 0.0);
        assert!(tank.area_at_level(-2.0) >= 0.0);
    }

    #[test]
    fn test_volume_matches_frustum_formula_at_full_height() {
        let tank = widening_tank();
        let (r1, r2, h) = (0.15_f64, 0.25_f64, 0.5_f64);
        let frustum = PI * h / 3.0 * (r1 * r1 + r1 * r2 + r2 * r2);
        assert_relative_eq!(tank.volume_at_level(h), frustum, max_relative = 1e-12);
    }

    #[test]
    fn test_negative_or_non_finite_radius_is_rejected() {
        assert!(matches!(
            TankGeometry::new(-0.1, 0.2, 1.0),
            Err(FlowError::InvalidConfig(_))
        ));
        assert!(TankGeometry::new(0.1, f64::NAN, 1.0).is_err());
        assert!(TankGeometry::new(0.1, 0.2, f64::INFINITY).is_err());
    }
}
