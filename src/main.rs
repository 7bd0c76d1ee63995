//! # Sensor Bridge
//!
//! Ingest environmental sensor telemetry from a serial feed into storage
//! and a live view.
//!
//! This binary wires the ingestion pipeline together and runs it until
//! interrupted.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Load configuration (falling back to built-in defaults)
//!    - Set up logging with tracing subscriber (stdout or rolling file)
//!    - Build the JSONL storage sink when enabled
//!
//! 2. **Acquisition**
//!    - Auto-detect and open the sensor serial device
//!    - Start live acquisition, or fall back to demo mode when no device
//!      is available
//!    - The worker task polls, parses, merges, publishes and persists one
//!      cycle per second
//!
//! 3. **Graceful Shutdown**
//!    - Handle Ctrl+C
//!    - Stop the worker with a bounded join and exit

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod acquisition;
mod config;
mod error;
mod parser;
mod reading;
mod storage;
mod transport;
mod view;

use acquisition::AcquisitionService;
use config::{Config, LoggingConfig};
use storage::{JsonlStorage, NormalizingSink};
use transport::SensorSerial;
use view::TracingView;

/// Configuration file read when no path is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Initialize the tracing subscriber; returns the appender guard that must
/// stay alive for file logging to flush
fn init_logging(config: &LoggingConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    if config.file_enabled {
        let appender = tracing_appender::rolling::daily(&config.dir, "sensor-bridge.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_ansi(false)
            .init();
        Some(guard)
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        None
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let (config, config_note) = match Config::load(&config_path) {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(format!("{}: {}", config_path, e))),
    };

    let _log_guard = init_logging(&config.logging);

    info!("Sensor Bridge v{} starting...", env!("CARGO_PKG_VERSION"));
    if let Some(note) = config_note {
        warn!("Using default configuration ({})", note);
    }

    let mut service = AcquisitionService::new(config.acquisition.clone());
    service.add_observer(Arc::new(TracingView));

    if config.storage.enabled {
        let storage = Arc::new(JsonlStorage::new(
            &config.storage.data_dir,
            config.storage.max_records_per_file,
            config.storage.max_files_to_keep,
        ));
        service.attach_sink(Arc::new(NormalizingSink::new(storage)));
        info!("Telemetry storage enabled in {}", config.storage.data_dir);
    }

    let serial = if config.serial.port.is_empty() {
        SensorSerial::open(config.serial.baud_rate)
    } else {
        SensorSerial::open_with_paths(&[config.serial.port.as_str()], config.serial.baud_rate)
    };

    match serial {
        Ok(serial) => {
            info!("Sensor device opened at {}", serial.device_path());
            service.start(Box::new(serial)).await?;
        }
        Err(e) => {
            warn!("No sensor device available ({}), falling back to demo mode", e);
            service.start_demo().await?;
        }
    }

    info!("Press Ctrl+C to exit");
    tokio::signal::ctrl_c().await?;

    info!("Received Ctrl+C, shutting down...");
    service.stop().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_path() {
        assert_eq!(DEFAULT_CONFIG_PATH, "config/default.toml");
    }

    #[test]
    fn test_fallback_config_is_usable() {
        // The binary must be able to run without a config file present
        let config = Config::default();
        assert!(config.storage.enabled);
        assert_eq!(config.acquisition.cycle_interval_ms, 1000);
    }
}
