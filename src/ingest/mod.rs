//! Level sensor sources for the tank flow monitoring service.
//!
//! The estimation engine never talks to a device directly; it asks a
//! `SensorReader` for the next `(level, timestamp)` pair and treats any
//! failure as a skippable poll.
//!
//! Submodules:
//! - `device`: HTTP client for a cloud device-status endpoint.
//! - `replay`: replays a recorded level history from CSV.

pub mod device;
pub mod replay;

use crate::model::{FlowError, LevelSample};

/// A source of level readings.
///
/// Implementations own their own timeout and retry policy. A failed read
/// must return `FlowError::SensorUnavailable` and leave no partial state
/// behind. A finite source with nothing left returns
/// `FlowError::SourceExhausted`, which ends the monitor run.
pub trait SensorReader {
    /// Short identifier used to tag log lines.
    fn sensor_id(&self) -> &str;

    /// Fetches the current level.
    fn read_level(&mut self) -> Result<LevelSample, FlowError>;
}

impl<R: SensorReader + ?Sized> SensorReader for Box<R> {
    fn sensor_id(&self) -> &str {
        (**self).sensor_id()
    }

    fn read_level(&mut self) -> Result<LevelSample, FlowError> {
        (**self).read_level()
    }
}
