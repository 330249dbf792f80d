//! Character stream to target flash
//!
//! [`Loader`] owns the one active [`HexDecoder`] and the [`RowPacker`] it
//! feeds. Bytes arrive in file order; records are processed strictly in
//! arrival order and decode errors are absorbed so the stream can
//! resynchronise on the next record.

use crate::error::{DecodeError, Result};
use crate::hex::{HexDecoder, Progress};
use crate::icsp::ProgrammingBackend;
use crate::packer::{PackerStats, RowPacker};

/// Stream counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoaderStats {
    /// Characters fed
    pub bytes: u64,
    /// Data records decoded
    pub data_records: u32,
    /// Extended linear address records decoded
    pub address_records: u32,
    /// End-of-file records decoded
    pub end_of_file: u32,
    /// Records discarded because of a structural or checksum error
    pub decode_errors: u32,
    /// Characters outside any record that were not line endings
    pub stray_bytes: u64,
    /// Row commit counters
    pub packer: PackerStats,
}

/// Identification words read from the target
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Device ID word, if the family has one
    pub device_id: Option<u16>,
    /// Revision ID word, if the family has one
    pub revision_id: Option<u16>,
}

/// Streaming Intel HEX loader
pub struct Loader<B> {
    decoder: HexDecoder,
    packer: RowPacker<B>,
    stats: LoaderStats,
}

impl<B: ProgrammingBackend> Loader<B> {
    /// Create a loader for `backend`, validating its profile
    pub fn new(backend: B) -> Result<Self> {
        Ok(Self {
            decoder: HexDecoder::new(),
            packer: RowPacker::new(backend)?,
            stats: LoaderStats::default(),
        })
    }

    /// Feed one character of the HEX stream
    ///
    /// Decode errors are logged and counted, never returned. Only backend
    /// failures surface as errors.
    pub fn feed(&mut self, byte: u8) -> Result<()> {
        self.stats.bytes += 1;
        match self.decoder.feed(byte) {
            Ok(Progress::Skipped | Progress::Pending) => {}
            Ok(Progress::Data { address, payload }) => {
                self.stats.data_records += 1;
                self.packer.pack(address, &payload)?;
            }
            Ok(Progress::ExtendedAddress(base)) => {
                self.stats.address_records += 1;
                log::trace!("Extended base address 0x{:08X}", base);
            }
            Ok(Progress::EndOfFile) => {
                self.stats.end_of_file += 1;
                self.packer.finish()?;
                let s = self.packer.stats();
                log::info!(
                    "End of file: {} rows, {} config rows written",
                    s.rows_written,
                    s.config_rows_written
                );
            }
            Err(DecodeError::UnexpectedCharacter(c)) => {
                self.stats.stray_bytes += 1;
                log::trace!("Ignoring stray byte 0x{:02X}", c);
            }
            Err(e) => {
                self.stats.decode_errors += 1;
                log::debug!("Discarding record: {}", e);
            }
        }
        Ok(())
    }

    /// Feed a run of characters
    pub fn feed_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        for &b in bytes {
            self.feed(b)?;
        }
        Ok(())
    }

    /// Target reset button
    ///
    /// Pressing it aborts the session: the open row is lost, the target is
    /// held in reset and the decoder starts over. Releasing it lets the
    /// target run.
    pub fn target_reset(&mut self, pressed: bool) {
        if pressed {
            log::info!("Target reset, programming session aborted");
            self.packer.discard();
            self.decoder.reset();
            self.packer.backend_mut().reset_target(true);
        } else {
            self.packer.backend_mut().reset_target(false);
        }
    }

    /// Read the device and revision ID words
    ///
    /// Enters programming mode if needed and leaves it again afterwards
    /// unless a session was already running.
    pub fn read_device_info(&mut self) -> Result<DeviceInfo> {
        let backend = self.packer.backend_mut();
        let was_active = backend.in_progress();

        backend.enter()?;
        let info = read_ids(backend);
        if !was_active {
            backend.exit()?;
        }
        info
    }

    /// Stream and commit counters
    pub fn stats(&self) -> LoaderStats {
        LoaderStats {
            packer: self.packer.stats(),
            ..self.stats
        }
    }

    /// The HEX decoder
    pub fn decoder(&self) -> &HexDecoder {
        &self.decoder
    }

    /// The row packer
    pub fn packer(&self) -> &RowPacker<B> {
        &self.packer
    }

    /// Access the backend
    pub fn backend(&self) -> &B {
        self.packer.backend()
    }

    /// Mutable access to the backend
    pub fn backend_mut(&mut self) -> &mut B {
        self.packer.backend_mut()
    }

    /// Consume the loader and return the backend
    pub fn into_backend(self) -> B {
        self.packer.into_backend()
    }
}

fn read_ids<B: ProgrammingBackend>(backend: &mut B) -> Result<DeviceInfo> {
    let profile = *backend.profile();
    let mut read = |address: Option<u32>| address.map(|a| backend.read_word(a)).transpose();
    Ok(DeviceInfo {
        device_id: read(profile.device_id_address)?,
        revision_id: read(profile.revision_id_address)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{builtin, DeviceProfile};
    use crate::hex::Phase;
    use crate::icsp::testing::{Call, RecordingBackend};
    use std::vec;

    fn loader(profile: DeviceProfile) -> Loader<RecordingBackend> {
        Loader::new(RecordingBackend::new(profile)).unwrap()
    }

    #[test]
    fn test_data_record_reaches_packer() {
        let mut l = loader(builtin::PIC16F1);
        l.feed_bytes(b":10000000010203040506070809101112131415163E\r\n")
            .unwrap();

        let stats = l.stats();
        assert_eq!(stats.data_records, 1);
        assert_eq!(stats.decode_errors, 0);
        assert_eq!(l.packer().open_row(), Some(0));
        let words = l.packer().row().words();
        assert_eq!(words[0], 0x0201);
        assert_eq!(words[7], 0x1615);
        assert_eq!(words[8], 0xFFFF);
        assert!(l.backend().calls.is_empty());
    }

    #[test]
    fn test_bad_checksum_never_packs() {
        let mut l = loader(builtin::PIC16F1);
        l.feed_bytes(b":10000000010203040506070809101112131415166C\r\n")
            .unwrap();
        assert_eq!(l.stats().decode_errors, 1);
        assert_eq!(l.stats().data_records, 0);
        assert_eq!(l.packer().open_row(), None);
        assert_eq!(l.decoder().phase(), Phase::StartOfLine);
    }

    #[test]
    fn test_end_of_file_flushes_and_exits() {
        let mut l = loader(builtin::PIC18FQ10);
        l.feed_bytes(b":020000040001F9\r\n").unwrap();
        assert_eq!(l.decoder().extended_base(), 0x1_0000);
        l.feed_bytes(b":040000000130023099\r\n").unwrap();
        l.feed_bytes(b":00000001FF\r\n").unwrap();

        assert_eq!(l.decoder().extended_base(), 0);
        let calls = &l.backend().calls;
        assert_eq!(calls[..2], [Call::Enter, Call::BulkErase]);
        let rows = l.backend().rows();
        assert_eq!(rows.len(), 1);
        // byte address 0x10000 is word 0x8000
        assert_eq!(rows[0].0, 0x8000);
        assert_eq!(rows[0].1[..2], [0x3001, 0x3002]);
        assert_eq!(calls.last(), Some(&Call::Exit));
        assert_eq!(l.stats().end_of_file, 1);
        assert_eq!(l.packer().open_row(), None);
    }

    #[test]
    fn test_end_of_file_alone_exits() {
        let mut l = loader(builtin::PIC16F1);
        l.feed_bytes(b":00000001FF\r\n").unwrap();
        assert_eq!(l.backend().calls, vec![Call::Exit]);
        assert_eq!(l.decoder().extended_base(), 0);
    }

    #[test]
    fn test_extended_address_into_config_row() {
        // config area mapped at hex byte address 0x8000
        let profile = DeviceProfile {
            config_address: 0x4000,
            ..builtin::PIC16F1
        };
        let mut l = loader(profile);
        l.feed_bytes(b":020000040000FA\r\n").unwrap();
        l.feed_bytes(b":048000000102030472\r\n").unwrap();
        assert_eq!(l.packer().open_row(), Some(0x4000));
        l.feed_bytes(b":00000001FF\r\n").unwrap();

        assert!(l.backend().rows().is_empty());
        let config = l
            .backend()
            .calls
            .iter()
            .find_map(|c| match c {
                Call::WriteConfigRow(words) => Some(words.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config[0], 0x0201);
        assert_eq!(config[1], 0x0403);
        assert_eq!(l.stats().packer.config_rows_written, 1);
    }

    #[test]
    fn test_oversized_record_is_discarded() {
        let mut l = loader(builtin::PIC16F1);
        l.feed_bytes(b":1100000000000000000000000000000000000000EF\r\n")
            .unwrap();
        assert_eq!(l.stats().decode_errors, 1);
        assert!(l.stats().stray_bytes > 0);
        assert_eq!(l.stats().data_records, 0);
        assert_eq!(l.packer().open_row(), None);

        // the stream recovers on the next record
        l.feed_bytes(b":0100000055AA\r\n").unwrap();
        assert_eq!(l.stats().data_records, 1);
    }

    #[test]
    fn test_target_reset_discards_open_row() {
        let mut l = loader(builtin::PIC16F1);
        l.feed_bytes(b":020000040001F9\r\n:0100000055AA\r\n").unwrap();
        l.target_reset(true);
        assert_eq!(l.packer().open_row(), None);
        assert_eq!(l.decoder().extended_base(), 0);
        l.target_reset(false);
        l.feed_bytes(b":00000001FF\r\n").unwrap();

        assert_eq!(
            l.backend().calls,
            vec![Call::Reset(true), Call::Reset(false), Call::Exit]
        );
    }

    #[test]
    fn test_read_device_info() {
        let mut l = loader(builtin::PIC16F1);
        let info = l.read_device_info().unwrap();
        // the recording backend echoes the address
        assert_eq!(info.device_id, Some(0x8006));
        assert_eq!(info.revision_id, Some(0x8005));
        assert_eq!(
            l.backend().calls,
            vec![
                Call::Enter,
                Call::Read(0x8006),
                Call::Read(0x8005),
                Call::Exit
            ]
        );
    }

    #[test]
    fn test_read_device_info_keeps_running_session() {
        let mut l = loader(builtin::PIC18FQ10);
        l.backend_mut().enter().unwrap();
        l.read_device_info().unwrap();
        assert!(l.backend().in_progress());
        assert_eq!(l.backend().count(&Call::Exit), 0);
    }
}
