//! Error types for Linux GPIO ICSP operations

use thiserror::Error;

/// Linux GPIO ICSP specific errors
#[derive(Debug, Error)]
pub enum LinuxGpioError {
    /// Failed to request GPIO lines
    #[error("Failed to request GPIO lines: {0}")]
    LineRequestFailed(#[source] gpiocdev::Error),

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Missing required parameter
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    /// GPIO chip or device not specified
    #[error("No GPIO chip specified. Use dev=/dev/gpiochipN or gpiochip=N")]
    NoDevice,

    /// Both a device path and a chip number were given
    #[error("Only one of 'dev' or 'gpiochip' can be specified")]
    ConflictingDevice,

    /// Invalid GPIO line number
    #[error("Invalid GPIO line number for {name}: {value}")]
    InvalidLineNumber { name: &'static str, value: String },

    /// Two signals were assigned the same GPIO line
    #[error("GPIO line {0} is assigned to more than one signal")]
    DuplicateLine(u32),
}

/// Result type for Linux GPIO ICSP operations
pub type Result<T> = std::result::Result<T, LinuxGpioError>;
