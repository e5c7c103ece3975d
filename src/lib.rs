//! Flow monitoring for a frustum-shaped water tank.
//!
//! Polls a liquid-level sensor, differentiates the level signal into a
//! volumetric flow, and cross-checks it against partially-filled pipe
//! hydraulics for the tank outlet.

pub mod analysis;
pub mod config;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod monitor;
pub mod report;
pub mod verify;
