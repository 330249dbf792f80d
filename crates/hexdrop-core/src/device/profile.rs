//! Device profile type definitions

use bitflags::bitflags;

use crate::error::{Error, Result};

/// Smallest supported row width in words
///
/// A 16-byte record must never span more than two rows.
pub const MIN_ROW_WORDS: u16 = 8;

/// Largest supported row width in words
pub const MAX_ROW_WORDS: usize = 128;

bitflags! {
    /// Optional operations a device family supports
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u8 {
        /// Configuration words can be programmed
        const CONFIG_WRITE  = 1 << 0;
        /// User ID words can be programmed
        const USER_ID_WRITE = 1 << 1;
        /// Memory can be read back over ICSP
        const READ_ID       = 1 << 2;
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Capabilities::empty()
    }
}

/// Bit order on the data line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitOrder {
    /// Least significant bit first
    LsbFirst,
    /// Most significant bit first
    MsbFirst,
}

/// How the target is switched into programming mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStyle {
    /// Reset stays asserted for the whole session; the key is clocked in
    /// while the target is held in reset
    HeldReset {
        /// Emit one extra clock after the key
        trailing_clock: bool,
    },
    /// Reset is pulsed, the key is clocked in and reset is released again;
    /// the target stays in programming mode until the next reset
    PulsedReset,
}

/// Flash commit granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitMode {
    /// Every word is programmed on its own
    PerWord,
    /// The whole row is latched, then programmed with one begin command
    PerRow,
}

/// Mandated delays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Time the reset line is held before the key is sent
    pub reset_hold_ms: u32,
    /// Settle time after the key
    pub entry_settle_ms: u32,
    /// Bulk erase time
    pub bulk_erase_ms: u32,
    /// Program time of a word (per-word) or a row (per-row)
    pub write_us: u32,
    /// Program time of a configuration word
    pub config_write_us: u32,
}

/// Mid-range (PIC16F1) command opcodes, 6 bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidrangeOpcodes {
    /// Load configuration: moves the pointer to the config area
    pub load_config: u8,
    /// Reset the address pointer to zero
    pub reset_address: u8,
    /// Increment the address pointer
    pub increment_address: u8,
    /// Load a word into the write latch
    pub load_data: u8,
    /// Read the word at the pointer
    pub read_data: u8,
    /// Begin internally timed programming
    pub begin_programming: u8,
    /// Bulk erase program memory
    pub bulk_erase: u8,
}

/// PIC18 command opcodes, 8 bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pic18Opcodes {
    /// Load the address pointer (24-bit payload)
    pub load_address: u8,
    /// Increment the address pointer
    pub increment_address: u8,
    /// Read the word at the pointer
    pub read_data: u8,
    /// Read the word at the pointer, then increment
    pub read_data_increment: u8,
    /// Program one word (per-word families)
    pub program_data: u8,
    /// Load a write latch (per-row families)
    pub load_latch: u8,
    /// Load a write latch, then increment (per-row families)
    pub load_latch_increment: u8,
    /// Begin programming the latched row (per-row families)
    pub begin_programming: u8,
    /// Bulk erase
    pub bulk_erase: u8,
}

/// dsPIC serial control codes, 4 bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DspicOpcodes {
    /// Execute the following 24-bit instruction
    pub six: u8,
    /// Shift out the VISI register
    pub regout: u8,
}

/// Command set of a device family
///
/// The variant selects the encoding strategy used by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandSet {
    /// Enhanced mid-range cores (PIC16F1)
    Midrange(MidrangeOpcodes),
    /// PIC18 cores with 8-bit commands
    Pic18(Pic18Opcodes),
    /// dsPIC33 cores driven with SIX instructions
    Dspic(DspicOpcodes),
}

/// Memory region a row belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryRegion {
    /// Program flash
    Flash,
    /// User ID words
    UserId,
    /// Configuration words
    Config,
    /// Data EEPROM
    Eeprom,
}

/// Static description of a target device family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceProfile {
    /// Flash write granularity in 16-bit words
    pub row_words: u16,
    /// Device address = row word address << shift
    pub address_shift: u8,
    /// First address of the configuration area (device units)
    pub config_address: u32,
    /// Index of the first configuration word inside the config row
    pub config_offset: u16,
    /// Number of configuration words
    pub config_words: u16,
    /// First address of the user ID area (device units)
    pub user_id_address: Option<u32>,
    /// Number of user ID words
    pub user_id_words: u16,
    /// First address of data EEPROM (device units)
    pub eeprom_address: Option<u32>,
    /// Address of the device ID word (device units)
    pub device_id_address: Option<u32>,
    /// Address of the revision ID word (device units)
    pub revision_id_address: Option<u32>,
    /// Command width in bits
    pub command_bits: u8,
    /// Payload width in bits
    pub payload_bits: u8,
    /// Bit order of commands and payloads
    pub bit_order: BitOrder,
    /// Programming mode entry sequence
    pub entry: EntryStyle,
    /// 32-bit entry signature
    pub entry_key: u32,
    /// Bit order of the entry signature
    pub key_order: BitOrder,
    /// Commit granularity
    pub commit: CommitMode,
    /// Mandated delays
    pub timing: Timing,
    /// Optional operations
    pub capabilities: Capabilities,
    /// Opcodes and encoding strategy
    pub commands: CommandSet,
}

impl DeviceProfile {
    /// Check the profile's structural invariants
    pub fn validate(&self) -> Result<()> {
        if !self.row_words.is_power_of_two()
            || self.row_words < MIN_ROW_WORDS
            || self.row_words as usize > MAX_ROW_WORDS
        {
            return Err(Error::InvalidRowWidth);
        }
        if self.config_offset as u32 + self.config_words as u32 > self.row_words as u32
            || self.user_id_words > self.row_words
        {
            return Err(Error::InvalidConfigLayout);
        }
        Ok(())
    }

    /// Row width in bytes of HEX address space
    pub fn row_bytes(&self) -> u32 {
        self.row_words as u32 * 2
    }

    /// Word address of the row containing `word_address`
    pub fn row_base(&self, word_address: u32) -> u32 {
        word_address & !(self.row_words as u32 - 1)
    }

    /// Index of `word_address` inside its row
    pub fn row_index(&self, word_address: u32) -> usize {
        (word_address & (self.row_words as u32 - 1)) as usize
    }

    /// Convert a row word address into device address units
    pub fn device_address(&self, word_address: u32) -> u32 {
        word_address << self.address_shift
    }

    /// Classify the row starting at `row_word_address`
    ///
    /// The region with the highest base at or below the address wins.
    pub fn region_of(&self, row_word_address: u32) -> MemoryRegion {
        let addr = self.device_address(row_word_address);
        [
            (self.eeprom_address, MemoryRegion::Eeprom),
            (Some(self.config_address), MemoryRegion::Config),
            (self.user_id_address, MemoryRegion::UserId),
        ]
        .into_iter()
        .filter_map(|(base, region)| base.filter(|&b| addr >= b).map(|b| (b, region)))
        .max_by_key(|&(base, _)| base)
        .map_or(MemoryRegion::Flash, |(_, region)| region)
    }

    /// Check whether the profile supports an operation
    pub fn supports(&self, caps: Capabilities) -> bool {
        self.capabilities.contains(caps)
    }
}
