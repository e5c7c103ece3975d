//! Hydraulic estimation engine for the tank flow monitoring service.
//!
//! Everything in here is pure computation over configured geometry;
//! the only state is the reading history owned by `flow::FlowEstimator`.
//!
//! Submodules:
//! - `tank`: frustum cross-sectional area and volume at a level.
//! - `pipe`: partially-filled circular pipe hydraulics at a level.
//! - `flow`: flow estimation by differentiating successive levels.

pub mod flow;
pub mod pipe;
pub mod tank;
