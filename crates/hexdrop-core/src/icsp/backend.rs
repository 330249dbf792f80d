//! Programming backend trait and the generic ICSP implementation

use super::bitbang::{self, HALF_PERIOD_US};
use super::{dspic, midrange, pic18, IcspLines};
use crate::device::{Capabilities, CommandSet, DeviceProfile, EntryStyle, MemoryRegion};
use crate::error::{Error, Result};

/// Erase, program and read operations of one target family
///
/// Every call is blocking and waits out the target's program and erase
/// times before returning.
pub trait ProgrammingBackend {
    /// Profile of the attached target
    fn profile(&self) -> &DeviceProfile;

    /// Switch the target into programming mode
    ///
    /// Does nothing if a session is already in progress.
    fn enter(&mut self) -> Result<()>;

    /// Erase program flash, user IDs and configuration words
    fn bulk_erase(&mut self) -> Result<()>;

    /// Program one full row starting at `word_address`
    fn write_row(&mut self, word_address: u32, words: &[u16]) -> Result<()>;

    /// Program the configuration words held in a full config row
    fn write_config_row(&mut self, words: &[u16]) -> Result<()>;

    /// Release the ICSP lines and let the target run
    fn exit(&mut self) -> Result<()>;

    /// Whether the target is currently in programming mode
    fn in_progress(&self) -> bool;

    /// Read one word at a device address
    fn read_word(&mut self, device_address: u32) -> Result<u16>;

    /// Hold (`true`) or release (`false`) the target in reset
    ///
    /// Holding reset ends any programming session.
    fn reset_target(&mut self, hold: bool);
}

/// State of the link to the target
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgrammingSession {
    /// Programming mode was entered and not exited since
    pub entered: bool,
    /// Last known value of the target's address pointer (device units)
    pub address: u32,
}

/// ICSP backend parameterized by a [`DeviceProfile`]
pub struct IcspBackend<L> {
    pub(super) lines: L,
    pub(super) profile: DeviceProfile,
    pub(super) session: ProgrammingSession,
}

impl<L: IcspLines> IcspBackend<L> {
    /// Create a backend driving `lines` with the given profile
    pub fn new(lines: L, profile: DeviceProfile) -> Self {
        Self {
            lines,
            profile,
            session: ProgrammingSession::default(),
        }
    }

    /// Current session state
    pub fn session(&self) -> ProgrammingSession {
        self.session
    }

    /// Access the underlying line driver
    pub fn lines(&self) -> &L {
        &self.lines
    }

    /// Mutable access to the underlying line driver
    pub fn lines_mut(&mut self) -> &mut L {
        &mut self.lines
    }

    /// Consume the backend and return the line driver
    pub fn into_lines(self) -> L {
        self.lines
    }

    pub(super) fn command(&mut self, opcode: u8) {
        bitbang::write_bits(
            &mut self.lines,
            opcode as u32,
            self.profile.command_bits,
            self.profile.bit_order,
        );
        self.lines.delay_us(HALF_PERIOD_US);
    }

    pub(super) fn payload(&mut self, value: u32) {
        bitbang::write_bits(
            &mut self.lines,
            value,
            self.profile.payload_bits,
            self.profile.bit_order,
        );
    }

    pub(super) fn read_payload(&mut self, width: u8) -> u32 {
        bitbang::read_bits(&mut self.lines, width, self.profile.bit_order)
    }

    fn ensure_active(&self) -> Result<()> {
        if self.in_progress() {
            Ok(())
        } else {
            Err(Error::SessionInactive)
        }
    }

    fn check_row(&self, words: &[u16]) -> Result<()> {
        if words.len() == self.profile.row_words as usize {
            Ok(())
        } else {
            Err(Error::RowSizeMismatch)
        }
    }
}

impl<L: IcspLines> ProgrammingBackend for IcspBackend<L> {
    fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    fn enter(&mut self) -> Result<()> {
        if self.in_progress() {
            return Ok(());
        }
        log::info!("Entering programming mode");

        self.lines.delay_us(1);
        self.lines.drive_data(false);
        self.lines.set_clock(false);
        self.lines.drive_clock(true);

        let timing = self.profile.timing;
        let key = self.profile.entry_key;
        let order = self.profile.key_order;
        match self.profile.entry {
            EntryStyle::HeldReset { trailing_clock } => {
                self.lines.hold_reset();
                self.lines.delay_ms(timing.reset_hold_ms);
                bitbang::write_bits(&mut self.lines, key, 32, order);
                if trailing_clock {
                    bitbang::clock_pulses(&mut self.lines, 1);
                }
                self.lines.delay_ms(timing.entry_settle_ms);
            }
            EntryStyle::PulsedReset => {
                self.lines.hold_reset();
                self.lines.delay_us(1);
                self.lines.release_reset();
                self.lines.delay_us(200);
                self.lines.hold_reset();
                self.lines.delay_ms(timing.reset_hold_ms);
                bitbang::write_bits(&mut self.lines, key, 32, order);
                self.lines.delay_us(1);
                self.lines.release_reset();
                self.lines.delay_ms(timing.entry_settle_ms);
            }
        }

        self.session = ProgrammingSession {
            entered: true,
            address: 0,
        };
        Ok(())
    }

    fn bulk_erase(&mut self) -> Result<()> {
        self.ensure_active()?;
        log::info!("Bulk erasing target");
        match self.profile.commands {
            CommandSet::Midrange(ops) => midrange::bulk_erase(self, &ops),
            CommandSet::Pic18(ops) => pic18::bulk_erase(self, &ops),
            CommandSet::Dspic(ops) => dspic::bulk_erase(self, &ops),
        }
        Ok(())
    }

    fn write_row(&mut self, word_address: u32, words: &[u16]) -> Result<()> {
        self.ensure_active()?;
        self.check_row(words)?;

        let mut words = words;
        match self.profile.region_of(word_address) {
            MemoryRegion::Flash => {}
            MemoryRegion::Config => return self.write_config_row(words),
            MemoryRegion::UserId => {
                if !self.profile.supports(Capabilities::USER_ID_WRITE) {
                    log::warn!(
                        "Skipping user ID row at 0x{:06X}: not supported by this device",
                        self.profile.device_address(word_address)
                    );
                    return Ok(());
                }
                words = &words[..self.profile.user_id_words as usize];
            }
            MemoryRegion::Eeprom => {
                log::warn!(
                    "Skipping EEPROM row at 0x{:06X}: data EEPROM programming is not supported",
                    self.profile.device_address(word_address)
                );
                return Ok(());
            }
        }
        if words.is_empty() {
            return Ok(());
        }

        log::debug!(
            "Writing row 0x{:06X} ({} words)",
            self.profile.device_address(word_address),
            words.len()
        );
        match self.profile.commands {
            CommandSet::Midrange(ops) => midrange::write_row(self, &ops, word_address, words),
            CommandSet::Pic18(ops) => pic18::write_row(self, &ops, word_address, words),
            CommandSet::Dspic(ops) => dspic::write_row(self, &ops, word_address, words),
        }
        Ok(())
    }

    fn write_config_row(&mut self, words: &[u16]) -> Result<()> {
        self.ensure_active()?;
        self.check_row(words)?;

        if !self.profile.supports(Capabilities::CONFIG_WRITE) {
            log::warn!("Skipping configuration words: not supported by this device");
            return Ok(());
        }
        let start = self.profile.config_offset as usize;
        let config = &words[start..start + self.profile.config_words as usize];

        log::debug!("Writing {} configuration words", config.len());
        match self.profile.commands {
            CommandSet::Midrange(ops) => midrange::write_config(self, &ops, config),
            CommandSet::Pic18(ops) => pic18::write_config(self, &ops, config),
            CommandSet::Dspic(_) => return Err(Error::NotSupported),
        }
        Ok(())
    }

    fn exit(&mut self) -> Result<()> {
        if self.session.entered {
            log::info!("Leaving programming mode");
        }
        self.lines.drive_data(false);
        self.lines.drive_clock(false);
        self.lines.release_reset();
        self.session.entered = false;
        Ok(())
    }

    fn in_progress(&self) -> bool {
        match self.profile.entry {
            EntryStyle::HeldReset { .. } => self.session.entered && self.lines.reset_held(),
            EntryStyle::PulsedReset => self.session.entered,
        }
    }

    fn read_word(&mut self, device_address: u32) -> Result<u16> {
        self.ensure_active()?;
        if !self.profile.supports(Capabilities::READ_ID) {
            return Err(Error::NotSupported);
        }
        let word = match self.profile.commands {
            CommandSet::Midrange(ops) => midrange::read_word(self, &ops, device_address),
            CommandSet::Pic18(ops) => pic18::read_word(self, &ops, device_address),
            CommandSet::Dspic(ops) => dspic::read_word(self, &ops, device_address),
        };
        log::trace!("Read 0x{:04X} at 0x{:06X}", word, device_address);
        Ok(word)
    }

    fn reset_target(&mut self, hold: bool) {
        if hold {
            self.lines.drive_data(false);
            self.lines.drive_clock(false);
            self.lines.hold_reset();
            self.session.entered = false;
        } else {
            self.lines.release_reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::builtin;
    use crate::icsp::testing::RecordingLines;
    use std::vec;

    fn backend(profile: DeviceProfile) -> IcspBackend<RecordingLines> {
        IcspBackend::new(RecordingLines::new(), profile)
    }

    #[test]
    fn test_midrange_entry_key() {
        let mut b = backend(builtin::PIC16F1);
        b.enter().unwrap();

        let lines = b.lines();
        assert!(lines.reset);
        assert!(lines.clock_driven);
        // 32 key bits plus the trailing clock
        assert_eq!(lines.bits.len(), 33);
        let mut pos = 0;
        assert_eq!(lines.take_lsb(&mut pos, 16), 0x4850);
        assert_eq!(lines.take_lsb(&mut pos, 16), 0x4D43);
        assert!(b.in_progress());
    }

    #[test]
    fn test_pic18_entry_key() {
        let mut b = backend(builtin::PIC18FQ10);
        b.enter().unwrap();
        let lines = b.lines();
        assert_eq!(lines.bits.len(), 32);
        let mut pos = 0;
        for c in b"MCHP" {
            assert_eq!(lines.take_msb(&mut pos, 8), *c as u32);
        }
    }

    #[test]
    fn test_pulsed_entry_releases_reset() {
        let mut b = backend(builtin::DSPIC33CK);
        b.enter().unwrap();
        assert!(!b.lines().reset);
        assert!(b.in_progress());
        let mut pos = 0;
        assert_eq!(b.lines().take_msb(&mut pos, 16), 0x4D43);
        assert_eq!(b.lines().take_msb(&mut pos, 16), 0x4851);
    }

    #[test]
    fn test_enter_is_noop_while_in_progress() {
        let mut b = backend(builtin::PIC16F1);
        b.enter().unwrap();
        let n = b.lines().bits.len();
        b.enter().unwrap();
        assert_eq!(b.lines().bits.len(), n);
    }

    #[test]
    fn test_operations_need_session() {
        let mut b = backend(builtin::PIC16F1);
        let row = [0u16; 32];
        assert_eq!(b.bulk_erase(), Err(Error::SessionInactive));
        assert_eq!(b.write_row(0, &row), Err(Error::SessionInactive));
        assert_eq!(b.write_config_row(&row), Err(Error::SessionInactive));
        assert_eq!(b.read_word(0x8006), Err(Error::SessionInactive));
    }

    #[test]
    fn test_external_reset_ends_held_session() {
        let mut b = backend(builtin::PIC16F1);
        b.enter().unwrap();
        b.lines_mut().release_reset();
        assert!(!b.in_progress());
    }

    #[test]
    fn test_reset_target() {
        let mut b = backend(builtin::DSPIC33CK);
        b.enter().unwrap();
        b.reset_target(true);
        assert!(!b.in_progress());
        assert!(b.lines().reset);
        b.reset_target(false);
        assert!(!b.lines().reset);
    }

    #[test]
    fn test_exit_releases_lines() {
        let mut b = backend(builtin::PIC18FK42);
        b.enter().unwrap();
        b.exit().unwrap();
        let lines = b.lines();
        assert!(!lines.reset);
        assert!(!lines.clock_driven);
        assert!(!lines.data_driven);
        assert!(!b.in_progress());
    }

    #[test]
    fn test_row_size_checked() {
        let mut b = backend(builtin::PIC16F1);
        b.enter().unwrap();
        assert_eq!(b.write_row(0, &[0u16; 16]), Err(Error::RowSizeMismatch));
    }

    #[test]
    fn test_unsupported_regions_are_skipped() {
        let mut b = backend(builtin::PIC18FK42);
        b.enter().unwrap();
        let before = b.lines().bits.len();
        let row = vec![0x1234u16; 32];
        // user ID row
        b.write_row(0x20_0000 >> 1, &row).unwrap();
        // EEPROM row
        b.write_row(0x31_0000 >> 1, &row).unwrap();
        assert_eq!(b.lines().bits.len(), before);
    }

    #[test]
    fn test_dspic_config_is_skipped() {
        let mut b = backend(builtin::DSPIC33CK);
        b.enter().unwrap();
        let before = b.lines().bits.len();
        b.write_config_row(&[0u16; 64]).unwrap();
        assert_eq!(b.lines().bits.len(), before);
    }

    #[test]
    fn test_read_requires_capability() {
        let mut profile = builtin::PIC16F1;
        profile.capabilities = Capabilities::CONFIG_WRITE;
        let mut b = backend(profile);
        b.enter().unwrap();
        assert_eq!(b.read_word(0x8006), Err(Error::NotSupported));
    }
}
