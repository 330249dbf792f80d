//! hexdrop-linux-gpio - Linux GPIO bitbang ICSP lines
//!
//! This crate drives the three ICSP signals of a PIC target from GPIO pins
//! using the Linux character device GPIO interface (gpiocdev).
//!
//! # Example
//!
//! ```no_run
//! use hexdrop_core::device::builtin;
//! use hexdrop_core::icsp::{IcspBackend, ProgrammingBackend};
//! use hexdrop_linux_gpio::{LinuxGpioIcsp, LinuxGpioIcspConfig};
//!
//! let config = LinuxGpioIcspConfig::new("/dev/gpiochip0", 11, 10, 25);
//! //                                     device          CLK DAT MCLR
//! let lines = LinuxGpioIcsp::open(&config)?;
//! let mut backend = IcspBackend::new(lines, builtin::PIC16F1);
//! backend.enter()?;
//! backend.bulk_erase()?;
//! backend.exit()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Usage with hexdrop CLI
//!
//! ```bash
//! hexdrop program -p linux_gpio:dev=/dev/gpiochip0,clk=11,dat=10,mclr=25 -d pic16f1 -i app.hex
//!
//! # Using gpiochip number instead of device path
//! hexdrop info -p linux_gpio:gpiochip=0,clk=11,dat=10,mclr=25 -d pic18fq10
//! ```
//!
//! # GPIO Pin Wiring
//!
//! | Target Pin | Option | Description |
//! |------------|--------|-------------|
//! | ICSPCLK    | `clk`  | Clock, released when idle |
//! | ICSPDAT    | `dat`  | Bidirectional data |
//! | MCLR       | `mclr` | Reset, active low (`mclr_inverted=1` for an inverting driver) |
//! | VDD        | -      | 3.3V |
//! | VSS        | -      | Ground |
//!
//! Only low-voltage programming is supported, MCLR never exceeds VDD.

pub mod device;
pub mod error;

// Re-exports
pub use device::{parse_options, LinuxGpioIcsp, LinuxGpioIcspConfig};
pub use error::{LinuxGpioError, Result};

/// Open a Linux GPIO ICSP adapter and return boxed lines
///
/// This is a convenience function for use in the CLI programmer dispatch.
pub fn open_linux_gpio(
    options: &[(&str, &str)],
) -> std::result::Result<Box<dyn hexdrop_core::icsp::IcspLines + Send>, Box<dyn std::error::Error>>
{
    let config = parse_options(options)?;
    let lines = LinuxGpioIcsp::open(&config)?;
    Ok(Box::new(lines))
}
