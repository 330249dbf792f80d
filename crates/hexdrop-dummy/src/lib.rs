//! hexdrop-dummy - Emulated ICSP target for testing
//!
//! This crate provides a line driver that behaves like a target
//! microcontroller sitting on the other end of the ICSP lines. It samples
//! the clock and data lines, decodes the entry key and the family command
//! stream of its [`DeviceProfile`] and keeps the programmed words in
//! memory. It's useful for testing and development without real hardware.
//!
//! PIC16F1 and PIC18 command sets are fully emulated. For dsPIC targets the
//! SIX instruction stream is only recorded.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "alloc")]
use alloc::collections::{BTreeMap, VecDeque};
#[cfg(feature = "alloc")]
use alloc::vec::Vec;

use hexdrop_core::device::{BitOrder, CommandSet, DeviceProfile, EntryStyle};
#[cfg(feature = "alloc")]
use hexdrop_core::icsp::IcspLines;

/// Identification words reported by the emulated target
#[derive(Debug, Clone, Copy)]
pub struct SimConfig {
    /// Word returned from the device ID address
    pub device_id: u16,
    /// Word returned from the revision ID address
    pub revision_id: u16,
    /// Word returned by REGOUT on dsPIC targets
    pub visi: u16,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            device_id: 0x3042,
            revision_id: 0x2002,
            visi: 0,
        }
    }
}

/// How far the target is into programming mode entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Running user code
    Idle,
    /// First reset pulse of a pulsed entry
    PulseHeld,
    /// Between the reset pulses of a pulsed entry
    PulseReleased,
    /// Shifting in the entry key
    Key,
    /// Waiting for the clock that follows the key
    Trailer,
    /// Accepting commands
    Programming,
}

/// What the next rising edges on a driven data line carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Command,
    Payload(u8),
    /// dsPIC REGOUT idle clocks before the read-out
    Skip(u8),
}

/// Emulated target on the ICSP lines
#[cfg(feature = "alloc")]
pub struct SimTarget {
    profile: DeviceProfile,
    config: SimConfig,
    clock: bool,
    clock_driven: bool,
    data_out: bool,
    data_driven: bool,
    data_in: bool,
    reset: bool,
    mode: Mode,
    expect: Expect,
    shift: u32,
    shift_count: u8,
    readout: VecDeque<bool>,
    pc: u32,
    latches: BTreeMap<u32, u16>,
    memory: BTreeMap<u32, u16>,
    instructions: Vec<u32>,
    sessions: u32,
    commands: u64,
    elapsed_us: u64,
}

#[cfg(feature = "alloc")]
impl SimTarget {
    /// Create a target for `profile` with the given identification words
    pub fn new(profile: DeviceProfile, config: SimConfig) -> Self {
        Self {
            profile,
            config,
            clock: false,
            clock_driven: false,
            data_out: false,
            data_driven: false,
            data_in: false,
            reset: false,
            mode: Mode::Idle,
            expect: Expect::Command,
            shift: 0,
            shift_count: 0,
            readout: VecDeque::new(),
            pc: 0,
            latches: BTreeMap::new(),
            memory: BTreeMap::new(),
            instructions: Vec::new(),
            sessions: 0,
            commands: 0,
            elapsed_us: 0,
        }
    }

    /// Create a target with default identification words
    pub fn new_default(profile: DeviceProfile) -> Self {
        Self::new(profile, SimConfig::default())
    }

    /// Programmed words keyed by device address
    pub fn memory(&self) -> &BTreeMap<u32, u16> {
        &self.memory
    }

    /// Word at a device address, if programmed
    pub fn word(&self, address: u32) -> Option<u16> {
        self.memory.get(&address).copied()
    }

    /// Instructions received with SIX (dsPIC only)
    pub fn instructions(&self) -> &[u32] {
        &self.instructions
    }

    /// Whether the target is in programming mode
    pub fn programming(&self) -> bool {
        self.mode == Mode::Programming
    }

    /// Number of times programming mode was entered
    pub fn sessions(&self) -> u32 {
        self.sessions
    }

    /// Commands decoded so far
    pub fn commands(&self) -> u64 {
        self.commands
    }

    /// Total time spent in delays
    pub fn elapsed_us(&self) -> u64 {
        self.elapsed_us
    }

    fn blank(&self) -> u16 {
        match self.profile.commands {
            CommandSet::Midrange(_) => 0x3FFF,
            _ => 0xFFFF,
        }
    }

    fn word_mask(&self) -> u32 {
        match self.profile.commands {
            CommandSet::Midrange(_) => 0x3FFF,
            _ => 0xFFFF,
        }
    }

    fn read_memory(&self, address: u32) -> u16 {
        if Some(address) == self.profile.device_id_address {
            return self.config.device_id;
        }
        if Some(address) == self.profile.revision_id_address {
            return self.config.revision_id;
        }
        self.word(address).unwrap_or_else(|| self.blank())
    }

    fn program(&mut self, address: u32, word: u16) {
        // programming only clears bits
        let blank = self.blank();
        let cell = self.memory.entry(address).or_insert(blank);
        *cell &= word;
    }

    fn commit_latches(&mut self) {
        let latches = core::mem::take(&mut self.latches);
        for (address, word) in latches {
            self.program(address, word);
        }
    }

    fn erase(&mut self) {
        log::debug!("Emulated target: bulk erase ({} words)", self.memory.len());
        self.memory.clear();
        self.latches.clear();
    }

    fn begin_session(&mut self) {
        self.mode = Mode::Programming;
        self.expect = Expect::Command;
        self.shift = 0;
        self.shift_count = 0;
        self.readout.clear();
        self.pc = 0;
        self.sessions += 1;
        log::debug!("Emulated target: programming mode entered");
    }

    fn end_session(&mut self) {
        if self.mode == Mode::Programming {
            log::info!(
                "Emulated target: left programming mode, {} words programmed",
                self.memory.len()
            );
        }
        self.mode = Mode::Idle;
        self.latches.clear();
        self.readout.clear();
    }

    fn queue_readout(&mut self, value: u32, width: u8, order: BitOrder) {
        for i in 0..width {
            let shift = match order {
                BitOrder::LsbFirst => i,
                BitOrder::MsbFirst => width - 1 - i,
            };
            self.readout.push_back((value >> shift) & 1 != 0);
        }
    }

    /// Accumulate one bit, returning the value once `width` bits are in
    fn shift_in(&mut self, bit: bool, width: u8, order: BitOrder) -> Option<u32> {
        match order {
            BitOrder::LsbFirst => self.shift |= (bit as u32) << self.shift_count,
            BitOrder::MsbFirst => self.shift = (self.shift << 1) | bit as u32,
        }
        self.shift_count += 1;
        if self.shift_count < width {
            return None;
        }
        let value = self.shift;
        self.shift = 0;
        self.shift_count = 0;
        Some(value)
    }

    fn rising_edge(&mut self) {
        if !self.data_driven {
            if self.mode == Mode::Programming {
                self.data_in = self.readout.pop_front().unwrap_or(false);
            }
            return;
        }
        let bit = self.data_out;
        match self.mode {
            Mode::Key => {
                if let Some(key) = self.shift_in(bit, 32, self.profile.key_order) {
                    self.check_key(key);
                }
            }
            Mode::Trailer => self.begin_session(),
            Mode::Programming => self.protocol_bit(bit),
            _ => {}
        }
    }

    fn check_key(&mut self, key: u32) {
        if key != self.profile.entry_key {
            log::warn!("Emulated target: wrong entry key 0x{:08X}", key);
            self.mode = Mode::Idle;
            return;
        }
        match self.profile.entry {
            EntryStyle::HeldReset {
                trailing_clock: true,
            } => self.mode = Mode::Trailer,
            _ => self.begin_session(),
        }
    }

    fn protocol_bit(&mut self, bit: bool) {
        let order = self.profile.bit_order;
        match self.expect {
            Expect::Command => {
                if let Some(cmd) = self.shift_in(bit, self.profile.command_bits, order) {
                    self.commands += 1;
                    self.command(cmd as u8);
                }
            }
            Expect::Payload(cmd) => {
                if let Some(payload) = self.shift_in(bit, self.profile.payload_bits, order) {
                    self.expect = Expect::Command;
                    self.payload(cmd, payload);
                }
            }
            Expect::Skip(remaining) => {
                self.expect = match remaining {
                    0 | 1 => {
                        let visi = self.config.visi as u32;
                        self.queue_readout(visi, 16, BitOrder::LsbFirst);
                        Expect::Command
                    }
                    n => Expect::Skip(n - 1),
                };
            }
        }
    }

    fn command(&mut self, cmd: u8) {
        let mask = self.word_mask();
        match self.profile.commands {
            CommandSet::Midrange(ops) => {
                if cmd == ops.load_config || cmd == ops.load_data {
                    self.expect = Expect::Payload(cmd);
                } else if cmd == ops.increment_address {
                    self.pc += 1;
                } else if cmd == ops.reset_address {
                    self.pc = 0;
                } else if cmd == ops.read_data {
                    let word = self.read_memory(self.pc) as u32;
                    self.queue_readout((word & mask) << 1, 16, BitOrder::LsbFirst);
                } else if cmd == ops.begin_programming {
                    self.commit_latches();
                } else if cmd == ops.bulk_erase {
                    self.erase();
                } else {
                    log::warn!("Emulated target: unknown command 0x{:02X}", cmd);
                }
            }
            CommandSet::Pic18(ops) => {
                if cmd == ops.load_address
                    || cmd == ops.program_data
                    || cmd == ops.load_latch
                    || cmd == ops.load_latch_increment
                {
                    self.expect = Expect::Payload(cmd);
                } else if cmd == ops.increment_address {
                    self.pc += 2;
                } else if cmd == ops.read_data || cmd == ops.read_data_increment {
                    let word = self.read_memory(self.pc) as u32;
                    self.queue_readout((word & mask) << 1, 24, BitOrder::MsbFirst);
                    if cmd == ops.read_data_increment {
                        self.pc += 2;
                    }
                } else if cmd == ops.begin_programming {
                    self.commit_latches();
                } else if cmd == ops.bulk_erase {
                    self.erase();
                } else {
                    log::warn!("Emulated target: unknown command 0x{:02X}", cmd);
                }
            }
            CommandSet::Dspic(ops) => {
                if cmd == ops.six {
                    self.expect = Expect::Payload(cmd);
                } else if cmd == ops.regout {
                    self.expect = Expect::Skip(8);
                } else {
                    log::warn!("Emulated target: unknown control code 0x{:X}", cmd);
                }
            }
        }
    }

    fn payload(&mut self, cmd: u8, payload: u32) {
        let word = ((payload >> 1) & self.word_mask()) as u16;
        match self.profile.commands {
            CommandSet::Midrange(ops) => {
                if cmd == ops.load_config {
                    self.pc = self.profile.config_address;
                } else {
                    self.latches.insert(self.pc, word);
                }
            }
            CommandSet::Pic18(ops) => {
                if cmd == ops.load_address {
                    self.pc = (payload >> 1) & 0x3F_FFFF;
                } else if cmd == ops.program_data {
                    self.program(self.pc, word);
                } else {
                    self.latches.insert(self.pc, word);
                    if cmd == ops.load_latch_increment {
                        self.pc += 2;
                    }
                }
            }
            CommandSet::Dspic(_) => {
                log::trace!("Emulated target: SIX 0x{:06X}", payload);
                self.instructions.push(payload);
            }
        }
    }
}

#[cfg(feature = "alloc")]
impl IcspLines for SimTarget {
    fn set_clock(&mut self, high: bool) {
        let rising = high && !self.clock;
        self.clock = high;
        if rising && self.clock_driven {
            self.rising_edge();
        }
    }

    fn set_data(&mut self, high: bool) {
        self.data_out = high;
    }

    fn drive_clock(&mut self, output: bool) {
        self.clock_driven = output;
        if !output {
            self.end_session();
        }
    }

    fn drive_data(&mut self, output: bool) {
        self.data_driven = output;
    }

    fn data(&mut self) -> bool {
        self.data_in
    }

    fn hold_reset(&mut self) {
        if self.reset {
            return;
        }
        self.reset = true;
        let previous = self.mode;
        self.end_session();
        self.shift = 0;
        self.shift_count = 0;
        self.mode = match (self.profile.entry, previous) {
            (EntryStyle::HeldReset { .. }, _) => Mode::Key,
            (EntryStyle::PulsedReset, Mode::PulseReleased) => Mode::Key,
            (EntryStyle::PulsedReset, _) => Mode::PulseHeld,
        };
    }

    fn release_reset(&mut self) {
        if !self.reset {
            return;
        }
        self.reset = false;
        match (self.profile.entry, self.mode) {
            (EntryStyle::PulsedReset, Mode::PulseHeld) => self.mode = Mode::PulseReleased,
            // a pulsed entry stays in programming mode after release
            (EntryStyle::PulsedReset, Mode::Programming) => {}
            _ => self.end_session(),
        }
    }

    fn reset_held(&self) -> bool {
        self.reset
    }

    fn delay_us(&mut self, us: u32) {
        self.elapsed_us += us as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hexdrop_core::device::{builtin, DeviceProfile};
    use hexdrop_core::disk::{DiskConfig, NullTables, VirtualDisk, FIRST_IMAGE_SECTOR, SEGMENT_SIZE};
    use hexdrop_core::icsp::{IcspBackend, ProgrammingBackend};
    use hexdrop_core::pipeline::Loader;

    type SimLoader = Loader<IcspBackend<SimTarget>>;

    fn loader(profile: DeviceProfile) -> SimLoader {
        let backend = IcspBackend::new(SimTarget::new_default(profile), profile);
        Loader::new(backend).unwrap()
    }

    fn target(l: &SimLoader) -> &SimTarget {
        l.backend().lines()
    }

    /// Build a data record with a valid checksum
    fn record(address: u16, kind: u8, data: &[u8]) -> String {
        let mut bytes = vec![data.len() as u8, (address >> 8) as u8, address as u8, kind];
        bytes.extend_from_slice(data);
        let sum = bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
        bytes.push(sum.wrapping_neg());
        let hex: String = bytes.iter().map(|b| format!("{:02X}", b)).collect();
        format!(":{}\r\n", hex)
    }

    fn words_le(words: &[u16]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    #[test]
    fn test_pic16f1_flash_and_config() {
        let mut l = loader(builtin::PIC16F1);
        let mut file = String::new();
        file += &record(0x0000, 0, &words_le(&[0x3180, 0x0020, 0x2803, 0x0000]));
        // second row, word 0x20
        file += &record(0x0040, 0, &words_le(&[0x1234]));
        file += &record(0x0000, 4, &[0x00, 0x01]);
        // CONFIG1 and CONFIG2 at words 0x8007 and 0x8008
        file += &record(0x000E, 0, &words_le(&[0x3FE4, 0x1FFF]));
        file += &record(0x0000, 1, &[]);
        l.feed_bytes(file.as_bytes()).unwrap();

        let t = target(&l);
        assert_eq!(t.sessions(), 1);
        assert!(!t.programming());
        assert_eq!(t.word(0x0000), Some(0x3180));
        assert_eq!(t.word(0x0003), Some(0x0000));
        assert_eq!(t.word(0x0020), Some(0x1234));
        assert_eq!(t.word(0x8007), Some(0x3FE4));
        assert_eq!(t.word(0x8008), Some(0x1FFF));
        // untouched words in a written row stay blank
        assert_eq!(t.word(0x0004), Some(0x3FFF));
        assert_eq!(l.stats().packer.config_rows_written, 1);
    }

    #[test]
    fn test_pic18fq10_flash_and_user_id() {
        let mut l = loader(builtin::PIC18FQ10);
        let mut file = String::new();
        file += &record(0x0100, 0, &words_le(&[0xEF12, 0xF000]));
        file += &record(0x0000, 4, &[0x00, 0x20]);
        file += &record(0x0000, 0, &words_le(&[0x0001, 0x0002]));
        file += &record(0x0000, 1, &[]);
        l.feed_bytes(file.as_bytes()).unwrap();

        let t = target(&l);
        assert_eq!(t.word(0x0100), Some(0xEF12));
        assert_eq!(t.word(0x0102), Some(0xF000));
        assert_eq!(t.word(0x20_0000), Some(0x0001));
        assert_eq!(t.word(0x20_0002), Some(0x0002));
        // only the 8 user ID words are written
        assert_eq!(t.word(0x20_0010), None);
    }

    #[test]
    fn test_pic18fk42_row_latches_and_config() {
        let mut l = loader(builtin::PIC18FK42);
        let mut file = String::new();
        let row: Vec<u16> = (0..8).map(|i| 0x0E00 | i).collect();
        file += &record(0x0040, 0, &words_le(&row));
        file += &record(0x0000, 4, &[0x00, 0x30]);
        file += &record(0x0000, 0, &words_le(&[0xFFEC, 0xFFFF, 0xFF9F]));
        file += &record(0x0000, 1, &[]);
        l.feed_bytes(file.as_bytes()).unwrap();

        let t = target(&l);
        assert_eq!(t.word(0x0040), Some(0x0E00));
        assert_eq!(t.word(0x004E), Some(0x0E07));
        assert_eq!(t.word(0x30_0000), Some(0xFFEC));
        assert_eq!(t.word(0x30_0004), Some(0xFF9F));
    }

    #[test]
    fn test_read_device_info() {
        let profile = builtin::PIC18FQ10;
        let config = SimConfig {
            device_id: 0x7440,
            revision_id: 0xA042,
            ..SimConfig::default()
        };
        let backend = IcspBackend::new(SimTarget::new(profile, config), profile);
        let mut l = Loader::new(backend).unwrap();

        let info = l.read_device_info().unwrap();
        assert_eq!(info.device_id, Some(0x7440));
        assert_eq!(info.revision_id, Some(0xA042));
        assert!(!target(&l).programming());
    }

    #[test]
    fn test_midrange_read_is_14_bit() {
        let mut l = loader(builtin::PIC16F1);
        let info = l.read_device_info().unwrap();
        assert_eq!(info.device_id, Some(0x3042));
        assert_eq!(info.revision_id, Some(0x2002));
    }

    #[test]
    fn test_second_session_erases_first() {
        let mut l = loader(builtin::PIC16F1);
        let first = record(0x0000, 0, &words_le(&[0x0000])) + &record(0, 1, &[]);
        let second = record(0x0100, 0, &words_le(&[0x0001])) + &record(0, 1, &[]);
        l.feed_bytes(first.as_bytes()).unwrap();
        l.feed_bytes(second.as_bytes()).unwrap();

        let t = target(&l);
        assert_eq!(t.sessions(), 2);
        assert_eq!(t.word(0x0000), None);
        assert_eq!(t.word(0x0080), Some(0x0001));
    }

    #[test]
    fn test_reset_button_aborts_session() {
        let mut l = loader(builtin::PIC16F1);
        let row: Vec<u16> = vec![0x0100; 32];
        l.feed_bytes(record(0x0000, 0, &words_le(&row[..8])).as_bytes())
            .unwrap();
        l.feed_bytes(record(0x0010, 0, &words_le(&row[8..16])).as_bytes())
            .unwrap();
        l.feed_bytes(record(0x0020, 0, &words_le(&row[16..24])).as_bytes())
            .unwrap();
        l.feed_bytes(record(0x0030, 0, &words_le(&row[24..])).as_bytes())
            .unwrap();
        assert!(target(&l).programming());

        l.target_reset(true);
        assert!(!target(&l).programming());
        assert!(!l.backend().in_progress());
        l.target_reset(false);

        // the next image starts a fresh session
        let image = record(0x0040, 0, &words_le(&[0x2000])) + &record(0, 1, &[]);
        l.feed_bytes(image.as_bytes()).unwrap();
        let t = target(&l);
        assert_eq!(t.sessions(), 2);
        assert_eq!(t.word(0x0000), None);
        assert_eq!(t.word(0x0020), Some(0x2000));
    }

    #[test]
    fn test_wrong_key_is_ignored() {
        let profile = DeviceProfile {
            entry_key: 0x1234_5678,
            ..builtin::PIC16F1
        };
        let sim = SimTarget::new_default(builtin::PIC16F1);
        let mut backend = IcspBackend::new(sim, profile);
        backend.enter().unwrap();
        backend.bulk_erase().unwrap();
        assert_eq!(backend.lines().sessions(), 0);
        assert_eq!(backend.lines().commands(), 0);
    }

    #[test]
    fn test_dspic_records_instructions() {
        let profile = builtin::DSPIC33CK;
        let config = SimConfig {
            visi: 0x6B32,
            ..SimConfig::default()
        };
        let mut backend = IcspBackend::new(SimTarget::new(profile, config), profile);
        backend.enter().unwrap();
        assert!(backend.lines().programming());
        backend.bulk_erase().unwrap();
        assert_eq!(backend.lines().instructions()[3], 0x04_0200);
        assert_eq!(backend.read_word(0xFF_0000).unwrap(), 0x6B32);
        backend.exit().unwrap();
        assert!(!backend.lines().programming());
    }

    #[test]
    fn test_through_virtual_disk() {
        let mut file = String::new();
        for i in 0..64u16 {
            file += &record(i * 16, 0, &words_le(&[i; 8]));
        }
        file += &record(0, 1, &[]);
        let mut bytes = file.into_bytes();
        bytes.resize(bytes.len().next_multiple_of(512), 0);

        let mut disk = VirtualDisk::new(loader(builtin::PIC16F1), NullTables, DiskConfig::default());
        for (n, chunk) in bytes.chunks(SEGMENT_SIZE).enumerate() {
            let mut segment = [0u8; SEGMENT_SIZE];
            segment.copy_from_slice(chunk);
            let sector = FIRST_IMAGE_SECTOR + (n / 8) as u32;
            disk.write_segment(sector, &segment, (n % 8) as u8).unwrap();
        }

        let l = disk.loader();
        let t = target(l);
        assert_eq!(l.stats().data_records, 64);
        assert_eq!(l.stats().packer.rows_written, 16);
        assert_eq!(t.memory().len(), 512);
        assert_eq!(t.word(0x0000), Some(0));
        assert_eq!(t.word(0x01FF), Some(63));
    }
}
