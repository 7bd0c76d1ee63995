//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,

    #[serde(default)]
    pub acquisition: AcquisitionConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    /// Device path; empty means auto-detect across the common paths
    #[serde(default)]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

/// Acquisition scheduling configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AcquisitionConfig {
    /// Live cycle period
    #[serde(default = "default_cycle_interval_ms")]
    pub cycle_interval_ms: u64,

    /// Demo cycle period
    #[serde(default = "default_demo_interval_ms")]
    pub demo_interval_ms: u64,

    /// How long one cycle waits for the first line
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,

    /// Bound on the synchronous persistence call within a cycle
    #[serde(default = "default_persist_timeout_ms")]
    pub persist_timeout_ms: u64,

    /// Bound on joining the worker during stop
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,

    /// Cap on lines drained in one cycle
    #[serde(default = "default_max_lines_per_cycle")]
    pub max_lines_per_cycle: usize,
}

/// Telemetry storage configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_storage_enabled")]
    pub enabled: bool,

    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,

    #[serde(default = "default_storage_format")]
    pub format: String,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Write logs to rotating files in `dir` instead of stdout
    #[serde(default)]
    pub file_enabled: bool,

    #[serde(default = "default_log_dir")]
    pub dir: String,
}

// Default value functions
fn default_baud_rate() -> u32 { 9600 }

fn default_cycle_interval_ms() -> u64 { 1000 }
fn default_demo_interval_ms() -> u64 { 2000 }
fn default_poll_timeout_ms() -> u64 { 200 }
fn default_persist_timeout_ms() -> u64 { 500 }
fn default_stop_timeout_ms() -> u64 { 2000 }
fn default_max_lines_per_cycle() -> usize { 32 }

fn default_storage_enabled() -> bool { true }
fn default_data_dir() -> String { "./data".to_string() }
fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }
fn default_storage_format() -> String { "jsonl".to_string() }

fn default_log_dir() -> String { "./logs".to_string() }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: default_baud_rate(),
        }
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            cycle_interval_ms: default_cycle_interval_ms(),
            demo_interval_ms: default_demo_interval_ms(),
            poll_timeout_ms: default_poll_timeout_ms(),
            persist_timeout_ms: default_persist_timeout_ms(),
            stop_timeout_ms: default_stop_timeout_ms(),
            max_lines_per_cycle: default_max_lines_per_cycle(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: default_storage_enabled(),
            data_dir: default_data_dir(),
            max_records_per_file: default_max_records_per_file(),
            max_files_to_keep: default_max_files_to_keep(),
            format: default_storage_format(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file_enabled: false,
            dir: default_log_dir(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            serial: SerialConfig::default(),
            acquisition: AcquisitionConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AcquisitionConfig {
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_millis(self.cycle_interval_ms)
    }

    pub fn demo_interval(&self) -> Duration {
        Duration::from_millis(self.demo_interval_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn persist_timeout(&self) -> Duration {
        Duration::from_millis(self.persist_timeout_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        // Validate serial configuration; an empty port means auto-detect
        if ![4800, 9600, 19200, 38400, 57600, 115200].contains(&self.serial.baud_rate) {
            return Err(crate::error::SensorBridgeError::Config(
                toml::de::Error::custom(
                    "baud_rate must be one of: 4800, 9600, 19200, 38400, 57600, 115200",
                ),
            ));
        }

        // Validate timing fields
        if self.acquisition.cycle_interval_ms == 0 || self.acquisition.cycle_interval_ms > 60000 {
            return Err(crate::error::SensorBridgeError::Config(
                toml::de::Error::custom("cycle_interval_ms must be between 1 and 60000"),
            ));
        }

        if self.acquisition.demo_interval_ms == 0 || self.acquisition.demo_interval_ms > 60000 {
            return Err(crate::error::SensorBridgeError::Config(
                toml::de::Error::custom("demo_interval_ms must be between 1 and 60000"),
            ));
        }

        if self.acquisition.poll_timeout_ms == 0 || self.acquisition.poll_timeout_ms > 10000 {
            return Err(crate::error::SensorBridgeError::Config(
                toml::de::Error::custom("poll_timeout_ms must be between 1 and 10000"),
            ));
        }

        if self.acquisition.persist_timeout_ms == 0 || self.acquisition.persist_timeout_ms > 10000 {
            return Err(crate::error::SensorBridgeError::Config(
                toml::de::Error::custom("persist_timeout_ms must be between 1 and 10000"),
            ));
        }

        if self.acquisition.stop_timeout_ms == 0 || self.acquisition.stop_timeout_ms > 60000 {
            return Err(crate::error::SensorBridgeError::Config(
                toml::de::Error::custom("stop_timeout_ms must be between 1 and 60000"),
            ));
        }

        if self.acquisition.max_lines_per_cycle == 0 || self.acquisition.max_lines_per_cycle > 1000
        {
            return Err(crate::error::SensorBridgeError::Config(
                toml::de::Error::custom("max_lines_per_cycle must be between 1 and 1000"),
            ));
        }

        // Validate storage configuration
        if self.storage.enabled && self.storage.data_dir.is_empty() {
            return Err(crate::error::SensorBridgeError::Config(
                toml::de::Error::custom("storage data_dir cannot be empty when enabled"),
            ));
        }

        if self.storage.max_records_per_file == 0 {
            return Err(crate::error::SensorBridgeError::Config(
                toml::de::Error::custom("max_records_per_file must be greater than 0"),
            ));
        }

        if self.storage.max_files_to_keep == 0 {
            return Err(crate::error::SensorBridgeError::Config(
                toml::de::Error::custom("max_files_to_keep must be greater than 0"),
            ));
        }

        if self.storage.format != "jsonl" {
            return Err(crate::error::SensorBridgeError::Config(
                toml::de::Error::custom("storage format must be 'jsonl' (only supported format)"),
            ));
        }

        // Validate logging configuration
        if self.logging.file_enabled && self.logging.dir.is_empty() {
            return Err(crate::error::SensorBridgeError::Config(
                toml::de::Error::custom("logging dir cannot be empty when file_enabled"),
            ));
        }

        Ok(())
    }
}
