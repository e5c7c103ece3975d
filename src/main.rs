use std::env;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tankflow_service::analysis::flow::FlowEstimator;
use tankflow_service::config::{self, Config, SensorKind};
use tankflow_service::ingest::SensorReader;
use tankflow_service::ingest::device::DeviceStatusReader;
use tankflow_service::ingest::replay::ReplayReader;
use tankflow_service::logging::{self, Component};
use tankflow_service::model::FlowError;
use tankflow_service::{monitor, verify};

const VERIFY_ATTEMPTS: usize = 3;

fn main() -> ExitCode {
    dotenv::dotenv().ok();

    let args: Vec<String> = env::args().skip(1).collect();
    let verify_only = args.iter().any(|a| a == "--verify");
    let explicit_path = args
        .iter()
        .find(|a| !a.starts_with("--"))
        .cloned()
        .or_else(|| env::var(config::ENV_CONFIG_PATH).ok());

    let config = match load_config(explicit_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("✗ {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(&config, verify_only) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            logging::error(Component::System, None, &e.to_string());
            ExitCode::FAILURE
        }
    }
}

/// Explicit paths must exist; the default path falls back to built-in values.
fn load_config(explicit_path: Option<&str>) -> Result<Config, FlowError> {
    let mut config = match explicit_path {
        Some(path) => Config::load(path)?,
        None if Path::new(config::DEFAULT_CONFIG_PATH).exists() => {
            Config::load(config::DEFAULT_CONFIG_PATH)?
        }
        None => Config::default(),
    };
    config.apply_env_overrides(|key| env::var(key).ok());
    config.validate()?;
    Ok(config)
}

fn build_reader(config: &Config) -> Result<Box<dyn SensorReader>, FlowError> {
    let sensor = &config.sensor;
    match sensor.kind {
        SensorKind::Device => Ok(Box::new(DeviceStatusReader::new(
            &sensor.base_url,
            &sensor.device_id,
            sensor.token.clone(),
            &sensor.status_code,
            sensor.value_scale,
            Duration::from_secs(sensor.timeout_secs),
        )?)),
        SensorKind::Replay => {
            let path = sensor
                .replay_path
                .as_deref()
                .ok_or_else(|| FlowError::InvalidConfig("sensor.replay_path is required".into()))?;
            Ok(Box::new(ReplayReader::from_path(path)?))
        }
    }
}

fn run(config: &Config, verify_only: bool) -> Result<(), FlowError> {
    logging::init_logger(
        config.log_level()?,
        config.logging.file.as_deref(),
        config.logging.timestamps,
    );

    let tank = config.tank_geometry()?;
    let pipe = config.pipe_parameters()?;
    let interval = config.poll_interval()?;
    let mut reader = build_reader(config)?;

    if verify_only {
        let report = verify::verify_sensor(reader.as_mut(), &tank, VERIFY_ATTEMPTS, Duration::from_secs(2));
        verify::print_summary(&report);
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => logging::warn(Component::System, None, &format!("JSON encoding failed: {}", e)),
        }
        return match report.status {
            verify::VerificationStatus::Failed => Err(FlowError::SensorUnavailable(
                report.error_message.unwrap_or_else(|| "no readings".to_string()),
            )),
            _ => Ok(()),
        };
    }

    // Replay runs consume samples, so only live devices are probed up front.
    if config.sensor.kind == SensorKind::Device {
        let probe = verify::verify_sensor(reader.as_mut(), &tank, 1, Duration::ZERO);
        if probe.status == verify::VerificationStatus::Failed {
            return Err(FlowError::SensorUnavailable(format!(
                "startup probe failed: {}",
                probe.error_message.unwrap_or_default()
            )));
        }
        logging::info(Component::Sensor, Some(reader.sensor_id()), "Sensor reachable");
    }

    logging::info(Component::System, None, "--- Tank flow monitor started (frustum tank) ---");
    logging::info(
        Component::Config,
        None,
        &format!(
            "Geometry: base {} m | top {} m | height {} m",
            config.tank.base_diameter_m, config.tank.top_diameter_m, config.tank.total_height_m
        ),
    );
    logging::info(
        Component::Config,
        None,
        &format!(
            "Outlet pipe: {:.2} mm, slope {}, invert at {:.3} m",
            pipe.diameter_m() * 1000.0,
            pipe.slope_m_per_m(),
            pipe.invert_elevation_m()
        ),
    );

    let mut estimator =
        FlowEstimator::with_capacity(tank, pipe.full_area_m2(), config.polling.history_capacity);
    let stop = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&stop);
    if let Err(e) = ctrlc::set_handler(move || handler_flag.store(true, Ordering::SeqCst)) {
        logging::warn(
            Component::System,
            None,
            &format!("Interrupt handler not installed, Ctrl-C will kill the process: {}", e),
        );
    }

    let stats = monitor::run(
        reader.as_mut(),
        &mut estimator,
        &pipe,
        interval,
        config.polling.max_iterations,
        &stop,
    );
    if stop.load(Ordering::SeqCst) {
        logging::info(Component::System, None, "Monitor stopped by user");
    }
    logging::log_run_summary(stats.polls, stats.reported + stats.bootstrapped, stats.skipped);

    Ok(())
}
