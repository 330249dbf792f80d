//! In-circuit serial programming
//!
//! The target is driven through three signals: a clock line, a bidirectional
//! data line and the reset (MCLR) line. [`IcspLines`] abstracts the pins so
//! the protocol code runs unchanged on a microcontroller, a Linux GPIO chip
//! or an emulated target in tests.
//!
//! [`IcspBackend`] is the single [`ProgrammingBackend`] implementation. The
//! family specific encodings live in private submodules selected by
//! [`CommandSet`](crate::device::CommandSet).

mod backend;
pub mod bitbang;
mod dspic;
mod midrange;
mod pic18;

pub use backend::{IcspBackend, ProgrammingBackend, ProgrammingSession};

/// Trait for the physical ICSP signal lines
///
/// Implementations only toggle pins and wait; all framing is done by the
/// helpers in [`bitbang`].
pub trait IcspLines {
    /// Set the clock line level
    fn set_clock(&mut self, high: bool);

    /// Set the data line level (only meaningful while driven)
    fn set_data(&mut self, high: bool);

    /// Switch the clock line between driven output and high impedance
    fn drive_clock(&mut self, output: bool);

    /// Switch the data line between driven output and high impedance
    fn drive_data(&mut self, output: bool);

    /// Sample the data line
    fn data(&mut self) -> bool;

    /// Drive the target reset line active
    fn hold_reset(&mut self);

    /// Release the target reset line so the target runs
    fn release_reset(&mut self);

    /// Whether the reset line is currently held
    fn reset_held(&self) -> bool;

    /// Busy-wait for `us` microseconds
    fn delay_us(&mut self, us: u32);

    /// Busy-wait for `ms` milliseconds
    fn delay_ms(&mut self, ms: u32) {
        self.delay_us(ms.saturating_mul(1000));
    }
}

/// Blanket implementation for boxed line drivers
///
/// This allows `Box<dyn IcspLines + Send>` to be used where a generic
/// `L: IcspLines` is expected, so the driver can be chosen at runtime.
#[cfg(feature = "alloc")]
impl IcspLines for alloc::boxed::Box<dyn IcspLines + Send> {
    fn set_clock(&mut self, high: bool) {
        (**self).set_clock(high)
    }

    fn set_data(&mut self, high: bool) {
        (**self).set_data(high)
    }

    fn drive_clock(&mut self, output: bool) {
        (**self).drive_clock(output)
    }

    fn drive_data(&mut self, output: bool) {
        (**self).drive_data(output)
    }

    fn data(&mut self) -> bool {
        (**self).data()
    }

    fn hold_reset(&mut self) {
        (**self).hold_reset()
    }

    fn release_reset(&mut self) {
        (**self).release_reset()
    }

    fn reset_held(&self) -> bool {
        (**self).reset_held()
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }

    fn delay_ms(&mut self, ms: u32) {
        (**self).delay_ms(ms)
    }
}
