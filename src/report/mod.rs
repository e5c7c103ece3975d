//! Reporting for the tank flow monitoring service.
//!
//! Submodules:
//! - `reconcile`: pairs a flow sample with the pipe hydraulics at the same
//!   level and derives the direction and Manning cross-check.

pub mod reconcile;

pub use reconcile::{FlowDirection, FlowReport};
