//! Linux GPIO ICSP bitbanging device implementation
//!
//! This module provides the `LinuxGpioIcsp` struct that implements the
//! `IcspLines` trait using Linux's GPIO character device interface
//! (gpiocdev).
//!
//! Clock and data are switched between output and input to release them.
//! MCLR is always driven; it is active low unless `mclr_inverted` is set
//! for adapters with an inverting transistor stage.

use crate::error::{LinuxGpioError, Result};

use gpiocdev::line::{Offset, Value};
use gpiocdev::request::{Config, Request};

use hexdrop_core::icsp::IcspLines;

/// Configuration for opening a Linux GPIO ICSP adapter
#[derive(Debug, Clone, Default)]
pub struct LinuxGpioIcspConfig {
    /// Device path (e.g., "/dev/gpiochip0")
    pub device: String,
    /// ICSPCLK (PGC) GPIO line offset
    pub clk: Offset,
    /// ICSPDAT (PGD) GPIO line offset
    pub dat: Offset,
    /// MCLR GPIO line offset
    pub mclr: Offset,
    /// Drive MCLR high to hold the target in reset
    pub mclr_inverted: bool,
}

impl LinuxGpioIcspConfig {
    /// Create a new configuration with the given device path and pins
    pub fn new(device: impl Into<String>, clk: Offset, dat: Offset, mclr: Offset) -> Self {
        Self {
            device: device.into(),
            clk,
            dat,
            mclr,
            mclr_inverted: false,
        }
    }

    /// Hold reset by driving MCLR high
    pub fn with_inverted_mclr(mut self, inverted: bool) -> Self {
        self.mclr_inverted = inverted;
        self
    }
}

fn level(high: bool) -> Value {
    if high {
        Value::Active
    } else {
        Value::Inactive
    }
}

/// Linux GPIO ICSP adapter using bitbanging
pub struct LinuxGpioIcsp {
    request: Request,
    config: LinuxGpioIcspConfig,
    clock: bool,
    clock_driven: bool,
    data: bool,
    data_driven: bool,
    reset: bool,
}

impl LinuxGpioIcsp {
    /// Open the adapter with the given configuration
    ///
    /// Clock and data start released and the target is left running.
    pub fn open(config: &LinuxGpioIcspConfig) -> Result<Self> {
        if config.device.is_empty() {
            return Err(LinuxGpioError::NoDevice);
        }
        if config.clk == config.dat || config.clk == config.mclr {
            return Err(LinuxGpioError::DuplicateLine(config.clk));
        }
        if config.dat == config.mclr {
            return Err(LinuxGpioError::DuplicateLine(config.dat));
        }

        log::debug!("linux_gpio: Opening device {}", config.device);

        let mut req_config = Config::default();
        req_config.with_line(config.clk).as_input();
        req_config.with_line(config.dat).as_input();
        req_config
            .with_line(config.mclr)
            .as_output(level(!config.mclr_inverted));

        let request = Request::from_config(req_config)
            .on_chip(&config.device)
            .with_consumer("hexdrop")
            .request()
            .map_err(LinuxGpioError::LineRequestFailed)?;

        log::info!(
            "linux_gpio: Opened {} (clk={}, dat={}, mclr={}{})",
            config.device,
            config.clk,
            config.dat,
            config.mclr,
            if config.mclr_inverted { ", inverted" } else { "" }
        );

        Ok(Self {
            request,
            config: config.clone(),
            clock: false,
            clock_driven: false,
            data: false,
            data_driven: false,
            reset: false,
        })
    }

    fn mclr_level(&self) -> Value {
        // active low unless inverted
        level(self.reset == self.config.mclr_inverted)
    }

    /// Push the current line directions to the kernel
    fn reconfigure(&mut self) {
        let mut cfg = Config::default();
        if self.clock_driven {
            cfg.with_line(self.config.clk).as_output(level(self.clock));
        } else {
            cfg.with_line(self.config.clk).as_input();
        }
        if self.data_driven {
            cfg.with_line(self.config.dat).as_output(level(self.data));
        } else {
            cfg.with_line(self.config.dat).as_input();
        }
        cfg.with_line(self.config.mclr).as_output(self.mclr_level());

        if let Err(e) = self.request.reconfigure(&cfg) {
            log::error!("Failed to reconfigure ICSP lines: {}", e);
        }
    }

    fn set_line(&self, offset: Offset, value: Value, name: &str) {
        if let Err(e) = self.request.set_value(offset, value) {
            log::error!("Failed to set {}: {}", name, e);
        }
    }
}

impl IcspLines for LinuxGpioIcsp {
    fn set_clock(&mut self, high: bool) {
        self.clock = high;
        if self.clock_driven {
            self.set_line(self.config.clk, level(high), "CLK");
        }
    }

    fn set_data(&mut self, high: bool) {
        self.data = high;
        if self.data_driven {
            self.set_line(self.config.dat, level(high), "DAT");
        }
    }

    fn drive_clock(&mut self, output: bool) {
        if self.clock_driven != output {
            self.clock_driven = output;
            self.reconfigure();
        }
    }

    fn drive_data(&mut self, output: bool) {
        if self.data_driven != output {
            self.data_driven = output;
            self.reconfigure();
        }
    }

    fn data(&mut self) -> bool {
        match self.request.value(self.config.dat) {
            Ok(Value::Active) => true,
            Ok(Value::Inactive) => false,
            Err(e) => {
                log::error!("Failed to get DAT: {}", e);
                false
            }
        }
    }

    fn hold_reset(&mut self) {
        self.reset = true;
        self.set_line(self.config.mclr, self.mclr_level(), "MCLR");
    }

    fn release_reset(&mut self) {
        self.reset = false;
        self.set_line(self.config.mclr, self.mclr_level(), "MCLR");
    }

    fn reset_held(&self) -> bool {
        self.reset
    }

    fn delay_us(&mut self, us: u32) {
        std::thread::sleep(std::time::Duration::from_micros(us as u64));
    }
}

fn parse_line(name: &'static str, value: &str) -> Result<Offset> {
    value
        .parse()
        .map_err(|_| LinuxGpioError::InvalidLineNumber {
            name,
            value: value.to_string(),
        })
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value {
        "1" | "yes" | "true" | "on" => Ok(true),
        "0" | "no" | "false" | "off" => Ok(false),
        _ => Err(LinuxGpioError::InvalidParameter(format!(
            "{}={} (expected a boolean)",
            key, value
        ))),
    }
}

/// Parse programmer options from a list of key-value pairs
///
/// # Supported Options
///
/// - `dev=/dev/gpiochipN` - GPIO chip device path (required, or use gpiochip)
/// - `gpiochip=N` - GPIO chip number (alternative to dev)
/// - `clk=N` or `pgc=N` - ICSPCLK GPIO line offset (required)
/// - `dat=N` or `pgd=N` - ICSPDAT GPIO line offset (required)
/// - `mclr=N` - MCLR GPIO line offset (required)
/// - `mclr_inverted=1` - MCLR is driven through an inverter (optional)
pub fn parse_options(options: &[(&str, &str)]) -> Result<LinuxGpioIcspConfig> {
    let mut config = LinuxGpioIcspConfig::default();
    let mut clk = None;
    let mut dat = None;
    let mut mclr = None;
    let mut gpiochip: Option<u32> = None;

    for (key, value) in options {
        match *key {
            "dev" => config.device = value.to_string(),
            "gpiochip" => {
                gpiochip = Some(value.parse().map_err(|_| {
                    LinuxGpioError::InvalidParameter(format!("gpiochip={}", value))
                })?);
            }
            "clk" | "pgc" => clk = Some(parse_line("clk", value)?),
            "dat" | "pgd" => dat = Some(parse_line("dat", value)?),
            "mclr" => mclr = Some(parse_line("mclr", value)?),
            "mclr_inverted" => config.mclr_inverted = parse_flag(key, value)?,
            _ => {
                log::warn!("linux_gpio: Unknown option: {}={}", key, value);
            }
        }
    }

    match (config.device.is_empty(), gpiochip) {
        (true, Some(n)) => config.device = format!("/dev/gpiochip{}", n),
        (true, None) => return Err(LinuxGpioError::NoDevice),
        (false, Some(_)) => return Err(LinuxGpioError::ConflictingDevice),
        (false, None) => {}
    }

    config.clk = clk.ok_or(LinuxGpioError::MissingParameter("clk"))?;
    config.dat = dat.ok_or(LinuxGpioError::MissingParameter("dat"))?;
    config.mclr = mclr.ok_or(LinuxGpioError::MissingParameter("mclr"))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_options() {
        let config = parse_options(&[
            ("dev", "/dev/gpiochip0"),
            ("clk", "11"),
            ("dat", "10"),
            ("mclr", "25"),
        ])
        .unwrap();
        assert_eq!(config.device, "/dev/gpiochip0");
        assert_eq!((config.clk, config.dat, config.mclr), (11, 10, 25));
        assert!(!config.mclr_inverted);
    }

    #[test]
    fn test_parse_gpiochip_and_aliases() {
        let config = parse_options(&[
            ("gpiochip", "1"),
            ("pgc", "3"),
            ("pgd", "4"),
            ("mclr", "5"),
            ("mclr_inverted", "yes"),
        ])
        .unwrap();
        assert_eq!(config.device, "/dev/gpiochip1");
        assert_eq!((config.clk, config.dat), (3, 4));
        assert!(config.mclr_inverted);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse_options(&[("clk", "1"), ("dat", "2"), ("mclr", "3")]),
            Err(LinuxGpioError::NoDevice)
        ));
        assert!(matches!(
            parse_options(&[("dev", "/dev/gpiochip0"), ("gpiochip", "0")]),
            Err(LinuxGpioError::ConflictingDevice)
        ));
        assert!(matches!(
            parse_options(&[("gpiochip", "0"), ("clk", "1"), ("dat", "2")]),
            Err(LinuxGpioError::MissingParameter("mclr"))
        ));
        assert!(matches!(
            parse_options(&[("gpiochip", "0"), ("clk", "x")]),
            Err(LinuxGpioError::InvalidLineNumber { name: "clk", .. })
        ));
        assert!(matches!(
            parse_options(&[("gpiochip", "0"), ("mclr_inverted", "maybe")]),
            Err(LinuxGpioError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_open_without_device() {
        let config = LinuxGpioIcspConfig::default();
        assert!(matches!(
            LinuxGpioIcsp::open(&config),
            Err(LinuxGpioError::NoDevice)
        ));
    }

    #[test]
    fn test_open_rejects_shared_line() {
        let config = LinuxGpioIcspConfig::new("/dev/gpiochip0", 4, 4, 5);
        assert!(matches!(
            LinuxGpioIcsp::open(&config),
            Err(LinuxGpioError::DuplicateLine(4))
        ));
    }
}
