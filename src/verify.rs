//! Sensor Verification Module
//!
//! Probes the configured level sensor before monitoring starts to confirm
//! it is reachable and reporting plausible readings. The report serializes
//! to JSON for `--verify` runs.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;

use crate::analysis::tank::TankGeometry;
use crate::ingest::SensorReader;

// ============================================================================
// Verification Results
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum VerificationStatus {
    Success,
    PartialSuccess,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorVerification {
    pub timestamp: String,
    pub sensor_id: String,
    pub status: VerificationStatus,
    pub attempts: usize,
    pub successful_reads: usize,
    pub failed_reads: usize,
    pub last_level_m: Option<f64>,
    /// Set when the last level lies outside the tank height.
    pub level_out_of_range: bool,
    pub error_message: Option<String>,
}

// ============================================================================
// Sensor Verification
// ============================================================================

/// Reads the sensor `attempts` times, pausing between reads.
///
/// `Success` when every read succeeded and the last level fits the tank,
/// `PartialSuccess` when some reads failed or the level is out of range,
/// `Failed` when nothing was read.
pub fn verify_sensor(
    reader: &mut dyn SensorReader,
    tank: &TankGeometry,
    attempts: usize,
    pause: Duration,
) -> SensorVerification {
    let mut result = SensorVerification {
        timestamp: Utc::now().to_rfc3339(),
        sensor_id: reader.sensor_id().to_string(),
        status: VerificationStatus::Failed,
        attempts,
        successful_reads: 0,
        failed_reads: 0,
        last_level_m: None,
        level_out_of_range: false,
        error_message: None,
    };

    for attempt in 0..attempts {
        if attempt > 0 && !pause.is_zero() {
            thread::sleep(pause);
        }
        match reader.read_level() {
            Ok(sample) => {
                result.successful_reads += 1;
                result.last_level_m = Some(sample.level_m);
            }
            Err(e) => {
                result.failed_reads += 1;
                result.error_message = Some(e.to_string());
            }
        }
    }

    if let Some(level) = result.last_level_m {
        result.level_out_of_range = !level.is_finite() || !tank.contains_level(level);
    }

    // Determine status
    if result.successful_reads > 0 {
        if result.failed_reads == 0 && !result.level_out_of_range {
            result.status = VerificationStatus::Success;
        } else {
            result.status = VerificationStatus::PartialSuccess;
        }
    }

    result
}

pub fn print_summary(report: &SensorVerification) {
    println!("\n═══════════════════════════════════════════════════════════");
    println!("📊 SENSOR VERIFICATION: {}", report.sensor_id);
    println!("═══════════════════════════════════════════════════════════");
    println!(
        "Reads: {}/{} successful  ({} failed)",
        report.successful_reads, report.attempts, report.failed_reads
    );
    match report.last_level_m {
        Some(level) if report.level_out_of_range => {
            println!("Last level: {:.3} m  ⚠ outside tank height", level)
        }
        Some(level) => println!("Last level: {:.3} m", level),
        None => println!("Last level: none"),
    }
    if let Some(error) = &report.error_message {
        println!("Last error: {}", error);
    }
    println!("Status: {:?}", report.status);
    println!("═══════════════════════════════════════════════════════════");
}

// ============================================================================
// Tests
// ============================================================================
