//! # Error Types
//!
//! Custom error types for Sensor Bridge using `thiserror`.

use thiserror::Error;

/// Main error type for Sensor Bridge
#[derive(Debug, Error)]
pub enum SensorBridgeError {
    /// Serial port could not be located on any candidate path
    #[error("No serial device found (tried: {0})")]
    SerialPortNotFound(String),

    /// Transport read failure or device gone
    #[error("Transport error: {0}")]
    Transport(String),

    /// Storage collaborator rejected or could not accept a record
    #[error("Storage error: {0}")]
    Storage(String),

    /// Illegal acquisition mode transition
    #[error("State error: {0}")]
    State(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Sensor Bridge
pub type Result<T> = std::result::Result<T, SensorBridgeError>;
