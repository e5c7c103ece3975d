//! Device status API client
//!
//! Retrieves the current liquid depth from a cloud IoT device-status
//! endpoint. The endpoint returns every data point the device reports; we
//! pick the configured status code (e.g. `liquid_depth`) and scale its raw
//! value to metres.
//!
//! Request signing for vendor clouds is not handled here: the endpoint is
//! expected to accept a plain bearer token, or to sit behind a local bridge.
//!
//! Response shape:
//! `{"success": true, "t": 1700000000000, "result": [{"code": "liquid_depth", "value": 57}]}`

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::Deserialize;
use std::time::Duration;

use crate::ingest::SensorReader;
use crate::logging::{self, Component};
use crate::model::{FlowError, LevelSample};

/// Status code the level sensor reports its depth under.
pub const DEFAULT_STATUS_CODE: &str = "liquid_depth";

/// Raw depth is reported in centimetres.
pub const DEFAULT_VALUE_SCALE: f64 = 0.01;

// ============================================================================
// API Response Structures
// ============================================================================

/// Device status response envelope
#[derive(Debug, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub success: bool,
    pub msg: Option<String>,
    /// Server time, milliseconds since the Unix epoch
    pub t: Option<i64>,
    #[serde(default)]
    pub result: Vec<StatusEntry>,
}

/// One reported data point
#[derive(Debug, Deserialize)]
pub struct StatusEntry {
    pub code: String,
    pub value: serde_json::Value,
}

// ============================================================================
// URL construction and parsing
// ============================================================================

/// Builds the status URL for a device.
pub fn build_status_url(base_url: &str, device_id: &str) -> String {
    format!(
        "{}/v1.0/iot-03/devices/{}/status",
        base_url.trim_end_matches('/'),
        device_id
    )
}

/// A decoded status response: the scaled level and the cloud's clock.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReading {
    pub level_m: f64,
    pub server_time: Option<DateTime<Utc>>,
}

/// Extracts the level in metres from a status response body.
///
/// Accepts numeric values and numeric strings.
pub fn parse_status_response(body: &str, status_code: &str, value_scale: f64) -> Result<f64, FlowError> {
    parse_status(body, status_code, value_scale).map(|reading| reading.level_m)
}

/// Like `parse_status_response`, also returning the server time `t`.
pub fn parse_status(body: &str, status_code: &str, value_scale: f64) -> Result<StatusReading, FlowError> {
    let response: StatusResponse = serde_json::from_str(body)
        .map_err(|e| FlowError::SensorUnavailable(format!("Parse error: {}", e)))?;

    if !response.success {
        return Err(FlowError::SensorUnavailable(format!(
            "device reported failure: {}",
            response.msg.as_deref().unwrap_or("unknown error")
        )));
    }

    let entry = response
        .result
        .iter()
        .find(|entry| entry.code == status_code)
        .ok_or_else(|| {
            FlowError::SensorUnavailable(format!("no status entry '{}' in response", status_code))
        })?;

    let raw = match &entry.value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| {
        FlowError::SensorUnavailable(format!(
            "Parse error: status '{}' is not numeric: {}",
            status_code, entry.value
        ))
    })?;

    Ok(StatusReading {
        level_m: raw * value_scale,
        server_time: response.t.and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
    })
}

// ============================================================================
// Reader
// ============================================================================

/// Polls a device-status endpoint over HTTP.
pub struct DeviceStatusReader {
    client: reqwest::blocking::Client,
    device_id: String,
    url: String,
    token: Option<String>,
    status_code: String,
    value_scale: f64,
}

impl DeviceStatusReader {
    pub fn new(
        base_url: &str,
        device_id: &str,
        token: Option<String>,
        status_code: &str,
        value_scale: f64,
        timeout: Duration,
    ) -> Result<Self, FlowError> {
        if device_id.trim().is_empty() {
            return Err(FlowError::InvalidConfig("sensor device_id is empty".to_string()));
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FlowError::InvalidConfig(format!("HTTP client: {}", e)))?;

        Ok(DeviceStatusReader {
            client,
            device_id: device_id.to_string(),
            url: build_status_url(base_url, device_id),
            token,
            status_code: status_code.to_string(),
            value_scale,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn fetch_body(&self) -> Result<String, FlowError> {
        let mut request = self.client.get(&self.url).header("Accept", "application/json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .map_err(|e| FlowError::SensorUnavailable(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(FlowError::SensorUnavailable(format!(
                "HTTP error: {}",
                response.status().as_u16()
            )));
        }

        response
            .text()
            .map_err(|e| FlowError::SensorUnavailable(format!("Request failed: {}", e)))
    }
}

impl SensorReader for DeviceStatusReader {
    fn sensor_id(&self) -> &str {
        &self.device_id
    }

    fn read_level(&mut self) -> Result<LevelSample, FlowError> {
        let body = self.fetch_body()?;
        let reading = parse_status(&body, &self.status_code, self.value_scale)?;

        if let Some(server_time) = reading.server_time {
            logging::debug(
                Component::Sensor,
                Some(&self.device_id),
                &format!(
                    "Server time: {} UTC ({} local)",
                    server_time.format("%Y-%m-%d %H:%M:%S"),
                    server_time.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
                ),
            );
        }

        // Stamp on receipt; the server time `t` reflects the cloud, not the sample.
        let timestamp_s = Utc::now().timestamp_millis() as f64 / 1000.0;

        Ok(LevelSample {
            level_m: reading.level_m,
            timestamp_s,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
