//! Service configuration.
//!
//! Loaded from a TOML file (default `./tankflow.toml`), with every field
//! defaulted to the values of the original bench installation: a 0.37 m
//! cylindrical tank, 0.215 m tall, draining through a 102.26 mm PVC pipe.
//! Sensor endpoint settings may be overridden from the environment (and a
//! `.env` file); the bearer token is only ever read from the environment.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::analysis::flow::DEFAULT_HISTORY_CAPACITY;
use crate::analysis::pipe::PipeParameters;
use crate::analysis::tank::TankGeometry;
use crate::ingest::device::{DEFAULT_STATUS_CODE, DEFAULT_VALUE_SCALE};
use crate::logging::LogLevel;
use crate::model::FlowError;

pub const DEFAULT_CONFIG_PATH: &str = "./tankflow.toml";

pub const ENV_CONFIG_PATH: &str = "TANKFLOW_CONFIG";
pub const ENV_SENSOR_URL: &str = "TANKFLOW_SENSOR_URL";
pub const ENV_DEVICE_ID: &str = "TANKFLOW_DEVICE_ID";
pub const ENV_SENSOR_TOKEN: &str = "TANKFLOW_SENSOR_TOKEN";

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TankConfig {
    pub base_diameter_m: f64,
    pub top_diameter_m: f64,
    pub total_height_m: f64,
}

impl Default for TankConfig {
    fn default() -> Self {
        TankConfig {
            base_diameter_m: 0.37,
            top_diameter_m: 0.37,
            total_height_m: 0.215,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PipeConfig {
    pub diameter_m: f64,
    pub slope_m_per_m: f64,
    /// Height of the pipe axis above the tank bottom.
    pub centerline_elevation_m: f64,
    /// PVC 0.009–0.013, concrete 0.013–0.015.
    pub manning_n: f64,
    pub specific_weight_n_per_m3: f64,
}

impl Default for PipeConfig {
    fn default() -> Self {
        PipeConfig {
            diameter_m: 0.10226,
            slope_m_per_m: 0.01,
            centerline_elevation_m: 0.20,
            manning_n: 0.013,
            specific_weight_n_per_m3: 9810.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    Device,
    Replay,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub kind: SensorKind,
    pub base_url: String,
    pub device_id: String,
    pub status_code: String,
    /// Multiplier from the raw status value to metres.
    pub value_scale: f64,
    pub timeout_secs: u64,
    pub replay_path: Option<String>,
    #[serde(skip)]
    pub token: Option<String>,
}

impl Default for SensorConfig {
    fn default() -> Self {
        SensorConfig {
            kind: SensorKind::Device,
            base_url: "https://openapi.tuyaus.com".to_string(),
            device_id: String::new(),
            status_code: DEFAULT_STATUS_CODE.to_string(),
            value_scale: DEFAULT_VALUE_SCALE,
            timeout_secs: 10,
            replay_path: None,
            token: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_secs: u64,
    pub history_capacity: usize,
    /// Stop after this many polls; unset runs until interrupted.
    pub max_iterations: Option<usize>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        PollingConfig {
            interval_secs: 60,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            max_iterations: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    pub timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            file: None,
            timestamps: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Top level
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tank: TankConfig,
    pub pipe: PipeConfig,
    pub sensor: SensorConfig,
    pub polling: PollingConfig,
    pub logging: LoggingConfig,
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self, FlowError> {
        toml::from_str(text).map_err(|e| FlowError::ConfigFile(format!("invalid TOML: {}", e)))
    }

    /// Reads and parses a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FlowError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| FlowError::ConfigFile(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Applies sensor overrides from an environment lookup.
    ///
    /// Takes the lookup as a closure so tests need not touch process state.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let present = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = present(ENV_SENSOR_URL) {
            self.sensor.base_url = url;
        }
        if let Some(device_id) = present(ENV_DEVICE_ID) {
            self.sensor.device_id = device_id;
        }
        if let Some(token) = present(ENV_SENSOR_TOKEN) {
            self.sensor.token = Some(token);
        }
    }

    pub fn tank_geometry(&self) -> Result<TankGeometry, FlowError> {
        TankGeometry::from_diameters(
            self.tank.base_diameter_m,
            self.tank.top_diameter_m,
            self.tank.total_height_m,
        )
    }

    pub fn pipe_parameters(&self) -> Result<PipeParameters, FlowError> {
        PipeParameters::new(
            self.pipe.diameter_m,
            self.pipe.slope_m_per_m,
            self.pipe.centerline_elevation_m,
            self.pipe.manning_n,
            self.pipe.specific_weight_n_per_m3,
        )
    }

    pub fn poll_interval(&self) -> Result<Duration, FlowError> {
        if self.polling.interval_secs == 0 {
            return Err(FlowError::InvalidConfig(
                "polling interval must be at least one second".to_string(),
            ));
        }
        Ok(Duration::from_secs(self.polling.interval_secs))
    }

    pub fn log_level(&self) -> Result<LogLevel, FlowError> {
        self.logging.level.parse().map_err(FlowError::InvalidConfig)
    }

    /// Checks every section so configuration errors surface at startup.
    pub fn validate(&self) -> Result<(), FlowError> {
        self.tank_geometry()?;
        self.pipe_parameters()?;
        self.poll_interval()?;
        self.log_level()?;

        if !self.sensor.value_scale.is_finite() || self.sensor.value_scale <= 0.0 {
            return Err(FlowError::InvalidConfig(format!(
                "sensor value_scale must be positive, got {}",
                self.sensor.value_scale
            )));
        }

        match self.sensor.kind {
            SensorKind::Device => {
                if self.sensor.device_id.trim().is_empty() {
                    return Err(FlowError::InvalidConfig(format!(
                        "sensor.device_id is required (or set {})",
                        ENV_DEVICE_ID
                    )));
                }
                if self.sensor.base_url.trim().is_empty() {
                    return Err(FlowError::InvalidConfig("sensor.base_url is empty".to_string()));
                }
            }
            SensorKind::Replay => {
                if self.sensor.replay_path.is_none() {
                    return Err(FlowError::InvalidConfig(
                        "sensor.replay_path is required for replay".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::collections::HashMap;

    #[test]
    fn test_empty_file_uses_bench_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.tank.base_diameter_m, 0.37);
        assert_eq!(config.pipe.diameter_m, 0.10226);
        assert_eq!(config.polling.interval_secs, 60);
        assert_eq!(config.sensor.status_code, "liquid_depth");
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config = Config::from_toml_str(
            r#"
            [tank]
            top_diameter_m = 0.5

            [pipe]
            slope_m_per_m = 0.02

            [sensor]
            kind = "replay"
            replay_path = "runs/bench.csv"
            "#,
        )
        .unwrap();

        assert_eq!(config.tank.top_diameter_m, 0.5);
        assert_eq!(config.tank.base_diameter_m, 0.37);
        assert_eq!(config.pipe.slope_m_per_m, 0.02);
        assert_eq!(config.pipe.manning_n, 0.013);
        assert_eq!(config.sensor.kind, SensorKind::Replay);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_pipe_invert_sits_one_radius_below_axis() {
        let pipe = Config::default().pipe_parameters().unwrap();
        assert_relative_eq!(pipe.invert_elevation_m(), 0.20 - 0.05113, max_relative = 1e-12);
    }

    #[test]
    fn test_invalid_toml_is_config_file_error() {
        let result = Config::from_toml_str("[tank\nbase_diameter_m = ");
        assert!(matches!(result, Err(FlowError::ConfigFile(_))));
    }

    #[test]
    fn test_non_positive_pipe_diameter_fails_validation() {
        let mut config = Config::default();
        config.sensor.device_id = "eb1234".to_string();
        assert!(config.validate().is_ok());

        config.pipe.diameter_m = 0.0;
        assert!(matches!(config.validate(), Err(FlowError::InvalidConfig(_))));
    }

    #[test]
    fn test_device_sensor_requires_device_id() {
        let err = Config::default().validate().unwrap_err();
        assert!(err.to_string().contains("device_id"), "unexpected error: {}", err);
    }

    #[test]
    fn test_zero_interval_and_unknown_log_level_are_rejected() {
        let mut config = Config::default();
        config.polling.interval_secs = 0;
        assert!(config.poll_interval().is_err());

        let mut config = Config::default();
        config.logging.level = "chatty".to_string();
        assert!(config.log_level().is_err());
    }

    #[test]
    fn test_env_overrides_replace_sensor_settings() {
        let env: HashMap<&str, &str> = [
            (ENV_SENSOR_URL, "http://localhost:8080"),
            (ENV_DEVICE_ID, "eb1234"),
            (ENV_SENSOR_TOKEN, "secret"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.sensor.base_url, "http://localhost:8080");
        assert_eq!(config.sensor.device_id, "eb1234");
        assert_eq!(config.sensor.token.as_deref(), Some("secret"));
    }

    #[test]
    fn test_blank_env_values_are_ignored() {
        let mut config = Config::default();
        config.apply_env_overrides(|_| Some("   ".to_string()));
        assert_eq!(config.sensor.base_url, SensorConfig::default().base_url);
        assert_eq!(config.sensor.token, None);
    }

    #[test]
    fn test_token_is_not_read_from_file() {
        let config = Config::from_toml_str("[sensor]\ntoken = \"leaked\"\n").unwrap();
        assert_eq!(config.sensor.token, None);
    }
}
