//! Built-in device profiles
//!
//! Values are taken from the family programming specifications:
//! DS40001738 (PIC16F171x), DS40001874 (PIC18FxxQ10),
//! DS40001886 (PIC18FxxK42) and DS70005256 (dsPIC33EP/CK GS706).

use super::profile::{
    BitOrder, Capabilities, CommandSet, CommitMode, DeviceProfile, DspicOpcodes, EntryStyle,
    MidrangeOpcodes, Pic18Opcodes, Timing,
};

/// "MCHP" in ASCII
pub const MCHP_KEY: u32 = 0x4D43_4850;

/// dsPIC ICSP entry key ("MCHQ")
pub const DSPIC_KEY: u32 = 0x4D43_4851;

/// A named built-in profile
#[derive(Debug, Clone, Copy)]
pub struct BuiltinProfile {
    /// Primary name used on the command line
    pub name: &'static str,
    /// Alternative names
    pub aliases: &'static [&'static str],
    /// Short human readable description
    pub description: &'static str,
    /// The profile itself
    pub profile: DeviceProfile,
}

impl BuiltinProfile {
    /// Check whether `name` matches this profile (case-insensitive)
    pub fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
            || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
    }
}

const PIC18_OPCODES: Pic18Opcodes = Pic18Opcodes {
    load_address: 0x80,
    increment_address: 0xF8,
    read_data: 0xFC,
    read_data_increment: 0xFE,
    program_data: 0xC0,
    load_latch: 0x00,
    load_latch_increment: 0x02,
    begin_programming: 0xE0,
    bulk_erase: 0x18,
};

/// Enhanced mid-range PIC16F1 (PIC16F171x, PIC16F1_200k)
pub const PIC16F1: DeviceProfile = DeviceProfile {
    row_words: 32,
    address_shift: 0,
    config_address: 0x8000,
    config_offset: 7,
    config_words: 5,
    user_id_address: None,
    user_id_words: 0,
    eeprom_address: None,
    device_id_address: Some(0x8006),
    revision_id_address: Some(0x8005),
    command_bits: 6,
    payload_bits: 16,
    bit_order: BitOrder::LsbFirst,
    entry: EntryStyle::HeldReset {
        trailing_clock: true,
    },
    entry_key: MCHP_KEY,
    key_order: BitOrder::LsbFirst,
    commit: CommitMode::PerRow,
    timing: Timing {
        reset_hold_ms: 10,
        entry_settle_ms: 5,
        bulk_erase_ms: 6,
        write_us: 3_000,
        config_write_us: 6_000,
    },
    capabilities: Capabilities::CONFIG_WRITE.union(Capabilities::READ_ID),
    commands: CommandSet::Midrange(MidrangeOpcodes {
        load_config: 0x00,
        reset_address: 0x16,
        increment_address: 0x06,
        load_data: 0x02,
        read_data: 0x04,
        begin_programming: 0x08,
        bulk_erase: 0x09,
    }),
};

/// PIC18FxxQ10, word-at-a-time programming
pub const PIC18FQ10: DeviceProfile = DeviceProfile {
    row_words: 128,
    address_shift: 1,
    config_address: 0x30_0000,
    config_offset: 0,
    config_words: 6,
    user_id_address: Some(0x20_0000),
    user_id_words: 8,
    eeprom_address: Some(0x31_0000),
    device_id_address: Some(0x3F_FFFE),
    revision_id_address: Some(0x3F_FFFC),
    command_bits: 8,
    payload_bits: 24,
    bit_order: BitOrder::MsbFirst,
    entry: EntryStyle::HeldReset {
        trailing_clock: false,
    },
    entry_key: MCHP_KEY,
    key_order: BitOrder::MsbFirst,
    commit: CommitMode::PerWord,
    timing: Timing {
        reset_hold_ms: 10,
        entry_settle_ms: 5,
        bulk_erase_ms: 75,
        write_us: 50,
        config_write_us: 50,
    },
    capabilities: Capabilities::CONFIG_WRITE
        .union(Capabilities::USER_ID_WRITE)
        .union(Capabilities::READ_ID),
    commands: CommandSet::Pic18(PIC18_OPCODES),
};

/// PIC18FxxK42, row latch programming
pub const PIC18FK42: DeviceProfile = DeviceProfile {
    row_words: 32,
    config_words: 5,
    user_id_words: 0,
    commit: CommitMode::PerRow,
    timing: Timing {
        reset_hold_ms: 10,
        entry_settle_ms: 5,
        bulk_erase_ms: 26,
        write_us: 3_000,
        config_write_us: 6_000,
    },
    capabilities: Capabilities::CONFIG_WRITE.union(Capabilities::READ_ID),
    ..PIC18FQ10
};

/// dsPIC33 GS706 family
pub const DSPIC33CK: DeviceProfile = DeviceProfile {
    row_words: 64,
    address_shift: 0,
    config_address: 0x01_5780,
    config_offset: 0,
    config_words: 0,
    user_id_address: Some(0x80_0F00),
    user_id_words: 0,
    eeprom_address: None,
    device_id_address: Some(0xFF_0000),
    revision_id_address: Some(0xFF_0002),
    command_bits: 4,
    payload_bits: 24,
    bit_order: BitOrder::LsbFirst,
    entry: EntryStyle::PulsedReset,
    entry_key: DSPIC_KEY,
    key_order: BitOrder::MsbFirst,
    commit: CommitMode::PerRow,
    timing: Timing {
        reset_hold_ms: 2,
        entry_settle_ms: 55,
        bulk_erase_ms: 30,
        write_us: 1_000,
        config_write_us: 1_000,
    },
    capabilities: Capabilities::READ_ID,
    commands: CommandSet::Dspic(DspicOpcodes { six: 0x0, regout: 0x1 }),
};

/// All built-in profiles
pub const PROFILES: &[BuiltinProfile] = &[
    BuiltinProfile {
        name: "pic16f1",
        aliases: &["pic16f171x", "pic16f1_200k"],
        description: "Enhanced mid-range PIC16F1 (32-word rows)",
        profile: PIC16F1,
    },
    BuiltinProfile {
        name: "pic18fq10",
        aliases: &["pic18f25q10", "pic18f67q10"],
        description: "PIC18 Q10 (128-word rows, per-word programming)",
        profile: PIC18FQ10,
    },
    BuiltinProfile {
        name: "pic18fk42",
        aliases: &["pic18f27k42"],
        description: "PIC18 K42 (32-word rows, row latches)",
        profile: PIC18FK42,
    },
    BuiltinProfile {
        name: "dspic33ck",
        aliases: &["dspic33ep_gs706", "gs706"],
        description: "dsPIC33 GS706 (64-word rows)",
        profile: DSPIC33CK,
    },
];

/// Find a built-in profile by name or alias
pub fn find(name: &str) -> Option<&'static BuiltinProfile> {
    PROFILES.iter().find(|p| p.matches(name))
}
