//! Row alignment and packing
//!
//! Decoded byte runs are reassembled into row buffers that match the
//! target's flash write granularity. A row is committed to the backend when
//! the destination moves to another row, when the row fills up or when the
//! stream ends. Rows that only contain erased words are never sent.

use heapless::Vec;

use crate::device::{MemoryRegion, MAX_ROW_WORDS};
use crate::error::Result;
use crate::icsp::ProgrammingBackend;

/// Value of an erased flash word
pub const BLANK_WORD: u16 = 0xFFFF;

/// Value used to complete a trailing odd byte
pub const PAD_BYTE: u8 = 0xFF;

/// One physical flash row being assembled
#[derive(Debug, Clone)]
pub struct RowBuffer {
    words: Vec<u16, MAX_ROW_WORDS>,
}

impl RowBuffer {
    /// Create a blank buffer of `row_words` words
    pub fn new(row_words: usize) -> Self {
        let mut words = Vec::new();
        // row_words is validated against MAX_ROW_WORDS by the profile
        let _ = words.resize(row_words.min(MAX_ROW_WORDS), BLANK_WORD);
        Self { words }
    }

    /// Row contents
    pub fn words(&self) -> &[u16] {
        &self.words
    }

    /// Row width in words
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Whether the row has zero width
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Whether every word still holds the erased value
    pub fn is_blank(&self) -> bool {
        self.words.iter().fold(BLANK_WORD, |acc, &w| acc & w) == BLANK_WORD
    }

    /// Reset every word to the erased value
    pub fn clear(&mut self) {
        self.words.iter_mut().for_each(|w| *w = BLANK_WORD);
    }

    fn set(&mut self, index: usize, word: u16) {
        self.words[index] = word;
    }
}

/// Commit counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PackerStats {
    /// Flash, user ID and EEPROM rows handed to `write_row`
    pub rows_written: u32,
    /// Rows handed to `write_config_row`
    pub config_rows_written: u32,
    /// Programming sessions started (each with a bulk erase)
    pub sessions: u32,
}

/// Packs decoded byte runs into rows and commits them to a backend
pub struct RowPacker<B> {
    backend: B,
    row: RowBuffer,
    open: Option<u32>,
    stats: PackerStats,
}

impl<B: ProgrammingBackend> RowPacker<B> {
    /// Create a packer for the backend's profile
    pub fn new(backend: B) -> Result<Self> {
        let profile = backend.profile();
        profile.validate()?;
        let row = RowBuffer::new(profile.row_words as usize);
        Ok(Self {
            backend,
            row,
            open: None,
            stats: PackerStats::default(),
        })
    }

    /// Place `data` at byte address `address`
    ///
    /// A run that crosses the end of the open row commits the full row and
    /// continues at index 0 of the next one.
    pub fn pack(&mut self, address: u32, data: &[u8]) -> Result<()> {
        let profile = *self.backend.profile();
        let row_words = profile.row_words as usize;
        let word_address = address >> 1;

        let mut base = profile.row_base(word_address);
        let mut index = profile.row_index(word_address);
        if self.open != Some(base) {
            self.commit()?;
            self.open = Some(base);
        }

        for pair in data.chunks(2) {
            if index == row_words {
                self.commit()?;
                base += row_words as u32;
                self.open = Some(base);
                index = 0;
            }
            let high = pair.get(1).copied().unwrap_or(PAD_BYTE);
            self.row.set(index, u16::from_le_bytes([pair[0], high]));
            index += 1;
        }

        if index == row_words {
            self.commit()?;
        }
        Ok(())
    }

    /// Commit the open row if it holds any programmed word
    pub fn flush(&mut self) -> Result<()> {
        self.commit()
    }

    /// Flush, then leave programming mode
    pub fn finish(&mut self) -> Result<()> {
        self.commit()?;
        self.backend.exit()?;
        self.open = None;
        Ok(())
    }

    /// Drop the open row without committing it
    pub fn discard(&mut self) {
        if !self.row.is_blank() {
            log::debug!("Discarding partially packed row {:?}", self.open);
        }
        self.row.clear();
        self.open = None;
    }

    /// Word address of the open row
    pub fn open_row(&self) -> Option<u32> {
        self.open
    }

    /// The row being assembled
    pub fn row(&self) -> &RowBuffer {
        &self.row
    }

    /// Commit counters
    pub fn stats(&self) -> PackerStats {
        self.stats
    }

    /// Access the backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable access to the backend
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Consume the packer and return the backend
    pub fn into_backend(self) -> B {
        self.backend
    }

    fn commit(&mut self) -> Result<()> {
        let Some(base) = self.open else {
            return Ok(());
        };
        if self.row.is_blank() {
            return Ok(());
        }

        if !self.backend.in_progress() {
            self.backend.enter()?;
            self.backend.bulk_erase()?;
            self.stats.sessions += 1;
        }

        if self.backend.profile().region_of(base) == MemoryRegion::Config {
            log::debug!("Committing config row 0x{:06X}", base);
            self.backend.write_config_row(self.row.words())?;
            self.stats.config_rows_written += 1;
        } else {
            log::debug!("Committing row 0x{:06X}", base);
            self.backend.write_row(base, self.row.words())?;
            self.stats.rows_written += 1;
        }
        self.row.clear();
        Ok(())
    }
}
