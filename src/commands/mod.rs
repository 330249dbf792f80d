//! Command implementations

pub mod erase;
pub mod info;
pub mod list;
pub mod program;

use crate::programmers;
use hexdrop_core::device::{DeviceProfile, ProfileDatabase};
use hexdrop_core::icsp::{IcspBackend, IcspLines};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Errors raised by the command layer itself
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// No loaded or built-in profile has this name
    #[error("unknown device '{0}' (see 'hexdrop list-devices')")]
    UnknownDevice(String),
    /// The image does not fit in the data area of the volume
    #[error("image is {size} bytes but the volume holds only {capacity} bytes")]
    ImageTooLarge {
        /// Image size in bytes
        size: u64,
        /// Bytes available to file data
        capacity: u64,
    },
    /// The target does not implement the requested operation
    #[error("{0} is not supported on this device")]
    Unsupported(&'static str),
    /// Error from the loader
    #[error(transparent)]
    Core(#[from] hexdrop_core::Error),
}

/// Backend type shared by all commands
pub type Backend = IcspBackend<Box<dyn IcspLines + Send>>;

/// Resolve a device name against the database and the built-in profiles
pub fn resolve_device(db: &ProfileDatabase, name: &str) -> Result<DeviceProfile, CommandError> {
    db.find(name)
        .ok_or_else(|| CommandError::UnknownDevice(name.to_string()))
}

/// Open the programmer and wrap its lines in a backend for `profile`
pub fn open_backend(
    programmer: &str,
    profile: DeviceProfile,
) -> Result<Backend, Box<dyn std::error::Error>> {
    let lines = programmers::open_lines(programmer, &profile)?;
    Ok(IcspBackend::new(lines, profile))
}

/// Byte progress bar in the house style
pub fn create_progress_bar(total: u64) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Spinner for operations without a measurable length
pub fn create_spinner(msg: &'static str) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(msg);
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}
