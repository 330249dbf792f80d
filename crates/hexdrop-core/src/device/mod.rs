//! Target device profiles
//!
//! A [`DeviceProfile`] describes everything that differs between target
//! families: row width, memory map, opcodes, bit framing and timing.

pub mod builtin;
#[cfg(feature = "std")]
mod database;
mod profile;

#[cfg(feature = "std")]
pub use database::{ProfileDatabase, ProfileDbError, ProfileEntry};
pub use profile::{
    BitOrder, Capabilities, CommandSet, CommitMode, DeviceProfile, DspicOpcodes, EntryStyle,
    MemoryRegion, MidrangeOpcodes, Pic18Opcodes, Timing, MAX_ROW_WORDS, MIN_ROW_WORDS,
};
