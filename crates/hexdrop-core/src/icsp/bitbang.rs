//! Bit-level ICSP helpers
//!
//! These are standalone functions usable with any [`IcspLines`]
//! implementation. The target latches data on the falling edge and presents
//! read data after the rising edge, so the helpers set data, raise the clock,
//! wait, then lower the clock.

use super::IcspLines;
use crate::device::BitOrder;

/// Minimum clock half period in microseconds
pub const HALF_PERIOD_US: u32 = 1;

/// Shift out the low `width` bits of `value` (at most 32)
pub fn write_bits<L: IcspLines + ?Sized>(lines: &mut L, value: u32, width: u8, order: BitOrder) {
    lines.drive_data(true);
    for i in 0..width {
        let shift = match order {
            BitOrder::LsbFirst => i,
            BitOrder::MsbFirst => width - 1 - i,
        };
        lines.set_data((value >> shift) & 1 != 0);
        lines.set_clock(true);
        lines.delay_us(HALF_PERIOD_US);
        lines.set_clock(false);
        lines.delay_us(HALF_PERIOD_US);
    }
}

/// Clock in `width` bits (at most 32) with the data line released
pub fn read_bits<L: IcspLines + ?Sized>(lines: &mut L, width: u8, order: BitOrder) -> u32 {
    lines.drive_data(false);
    let mut value = 0u32;
    for i in 0..width {
        lines.set_clock(true);
        lines.delay_us(HALF_PERIOD_US);
        let bit = lines.data() as u32;
        lines.set_clock(false);
        lines.delay_us(HALF_PERIOD_US);
        match order {
            BitOrder::LsbFirst => value |= bit << i,
            BitOrder::MsbFirst => value = (value << 1) | bit,
        }
    }
    value
}

/// Emit `count` bare clock cycles
pub fn clock_pulses<L: IcspLines + ?Sized>(lines: &mut L, count: usize) {
    for _ in 0..count {
        lines.set_clock(true);
        lines.delay_us(HALF_PERIOD_US);
        lines.set_clock(false);
        lines.delay_us(HALF_PERIOD_US);
    }
}
