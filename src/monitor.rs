//! Polling loop.
//!
//! One iteration is one sensor read, one ingest, one hydraulics evaluation,
//! and one report, followed by a fixed sleep. Iterations never share state
//! other than the estimator's history, and every failure is logged and
//! skipped. The loop ends when the stop flag is set, the iteration cap is
//! reached, the source runs out of samples, or configuration is invalid.
//!
//! # Clock injection
//! `poll_once` takes `now: DateTime<Utc>` for the report timestamp rather
//! than calling `Utc::now()`, so reports are deterministic in tests.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::analysis::flow::FlowEstimator;
use crate::analysis::pipe::PipeParameters;
use crate::ingest::SensorReader;
use crate::logging::{self, Component};
use crate::model::{FlowError, FlowSample, SampleKind};
use crate::report::FlowReport;

/// Longest uninterrupted sleep between stop-flag checks.
const STOP_CHECK_SLICE: Duration = Duration::from_millis(250);

/// What a successful poll produced.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// First reading; nothing to report until the next one.
    Bootstrap(FlowSample),
    Report(FlowReport),
}

/// Counters for one monitor run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub polls: usize,
    pub reported: usize,
    pub bootstrapped: usize,
    pub skipped: usize,
}

/// Performs one poll.
///
/// # Errors
/// - `SensorUnavailable` / `InvalidSample`: nothing was recorded.
/// - `NonMonotonicTime`: the reading was recorded but no flow can be reported.
/// - `SourceExhausted`: the reader has nothing more to deliver.
pub fn poll_once(
    reader: &mut dyn SensorReader,
    estimator: &mut FlowEstimator,
    pipe: &PipeParameters,
    now: DateTime<Utc>,
) -> Result<PollOutcome, FlowError> {
    let reading = reader.read_level()?;
    let sample = estimator.ingest(reading.level_m, reading.timestamp_s)?;

    match sample.kind {
        SampleKind::Bootstrap => Ok(PollOutcome::Bootstrap(sample)),
        SampleKind::NonMonotonic => Err(FlowError::NonMonotonicTime {
            elapsed_s: sample.elapsed_s,
        }),
        SampleKind::Differentiated => {
            let hydraulics = pipe.hydraulics_at_level(sample.level_m);
            Ok(PollOutcome::Report(FlowReport::reconcile(now, &sample, &hydraulics)))
        }
    }
}

/// Polls until `stop` is set, `max_iterations` polls have run, or the
/// reader is exhausted.
///
/// A configuration error also ends the run.
pub fn run(
    reader: &mut dyn SensorReader,
    estimator: &mut FlowEstimator,
    pipe: &PipeParameters,
    interval: Duration,
    max_iterations: Option<usize>,
    stop: &AtomicBool,
) -> RunStats {
    let mut stats = RunStats::default();
    let sensor_id = reader.sensor_id().to_string();

    while !stop.load(Ordering::Relaxed) {
        if max_iterations.is_some_and(|max| stats.polls >= max) {
            break;
        }
        stats.polls += 1;

        match poll_once(reader, estimator, pipe, Utc::now()) {
            Ok(PollOutcome::Report(report)) => {
                stats.reported += 1;
                logging::info(Component::Estimator, Some(&sensor_id), &report.to_string());
                if let Some(utilization) = report.capacity_utilization {
                    if utilization > 1.0 {
                        logging::warn(
                            Component::Hydraulics,
                            Some(&sensor_id),
                            &format!(
                                "measured flow is {:.0}% of full-pipe capacity",
                                utilization * 100.0
                            ),
                        );
                    }
                }
            }
            Ok(PollOutcome::Bootstrap(sample)) => {
                stats.bootstrapped += 1;
                logging::info(
                    Component::Estimator,
                    Some(&sensor_id),
                    &format!(
                        "Level: {:.3} m | waiting for a second reading to estimate flow",
                        sample.level_m
                    ),
                );
            }
            Err(err) => {
                stats.skipped += 1;
                if !handle_poll_error(&sensor_id, &err) {
                    break;
                }
            }
        }

        if max_iterations.is_some_and(|max| stats.polls >= max) {
            break;
        }
        sleep_unless_stopped(interval, stop);
    }

    stats
}

/// Logs a poll error. Returns false if the loop must stop.
fn handle_poll_error(sensor_id: &str, err: &FlowError) -> bool {
    match err {
        FlowError::SensorUnavailable(_) => {
            logging::log_sensor_failure(sensor_id, "read_level", err);
            true
        }
        FlowError::InvalidSample { .. } => {
            logging::warn(Component::Estimator, Some(sensor_id), &format!("{}; sample discarded", err));
            true
        }
        FlowError::NonMonotonicTime { .. } => {
            logging::warn(Component::Estimator, Some(sensor_id), &format!("{}; flow not reported", err));
            true
        }
        FlowError::SourceExhausted(_) => {
            logging::info(Component::Sensor, Some(sensor_id), &format!("{}; ending run", err));
            false
        }
        FlowError::InvalidConfig(_) | FlowError::ConfigFile(_) => {
            logging::error(Component::Config, Some(sensor_id), &err.to_string());
            false
        }
    }
}

fn sleep_unless_stopped(interval: Duration, stop: &AtomicBool) {
    let deadline = Instant::now() + interval;
    loop {
        if stop.load(Ordering::Relaxed) {
            return;
        }
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        thread::sleep((deadline - now).min(STOP_CHECK_SLICE));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
