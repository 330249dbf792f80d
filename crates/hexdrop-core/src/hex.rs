//! Streaming Intel HEX decoder
//!
//! The decoder consumes one character per call and never buffers more than a
//! single record. Records are validated against their checksum before they
//! are reported; anything malformed drops the record and the decoder waits
//! for the next ':' start marker.
//!
//! Only three record types are understood:
//!
//! | type | meaning |
//! |------|---------|
//! | 00   | data |
//! | 01   | end of file |
//! | 04   | extended linear address (upper 16 bits of a 32-bit address) |

use heapless::Vec;

use crate::error::DecodeError;

/// Maximum payload carried by a single record
pub const MAX_RECORD_BYTES: usize = 16;

/// Record start marker
const START_CODE: u8 = b':';

/// Payload bytes of a single record
pub type Payload = Vec<u8, MAX_RECORD_BYTES>;

/// Parse phase of the decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Waiting for ':' (line endings are ignored)
    #[default]
    StartOfLine,
    /// Reading the 1-byte payload length
    ByteCount,
    /// Reading the 16-bit offset
    Address,
    /// Reading the 1-byte record type
    RecordType,
    /// Reading payload bytes
    Data,
    /// Reading the trailing checksum byte
    Checksum,
}

/// Supported record kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordKind {
    /// Data bytes at `base + offset`
    Data = 0x00,
    /// End of the image
    EndOfFile = 0x01,
    /// New upper 16 address bits
    ExtendedLinearAddress = 0x04,
}

impl RecordKind {
    /// Map a record type byte to a supported kind
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Data),
            0x01 => Some(Self::EndOfFile),
            0x04 => Some(Self::ExtendedLinearAddress),
            _ => None,
        }
    }
}

/// Outcome of feeding a single character
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    /// Character was a line ending between records
    Skipped,
    /// Character was consumed, the record is not complete yet
    Pending,
    /// A data record validated
    Data {
        /// Absolute byte address (extended base plus record offset)
        address: u32,
        /// Payload bytes
        payload: Payload,
    },
    /// An extended linear address record validated; holds the new base
    ExtendedAddress(u32),
    /// An end-of-file record validated; the extended base is back at zero
    EndOfFile,
}

/// Persistent decoder state
///
/// Only the extended base address survives across records. Everything else
/// is rebuilt from scratch at every start marker.
#[derive(Debug, Clone, Default)]
struct DecoderState {
    phase: Phase,
    /// High nibble of the byte being assembled
    high_nibble: Option<u8>,
    /// Bytes consumed in the current field
    field_bytes: u8,
    byte_count: u8,
    address: u16,
    kind: Option<RecordKind>,
    checksum: u8,
    payload: Payload,
    extended_base: u32,
}

/// Character-at-a-time Intel HEX state machine
#[derive(Debug, Clone, Default)]
pub struct HexDecoder {
    state: DecoderState,
}

impl HexDecoder {
    /// Create a decoder waiting for the first start marker
    pub fn new() -> Self {
        Self::default()
    }

    /// Current parse phase
    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    /// Extended base address applied to data records
    pub fn extended_base(&self) -> u32 {
        self.state.extended_base
    }

    /// Return to the start-of-line phase and clear the extended base
    ///
    /// Called when a programming session ends.
    pub fn reset(&mut self) {
        self.state = DecoderState::default();
    }

    /// Consume one input character
    ///
    /// On error the record in flight is discarded and the decoder is back in
    /// [`Phase::StartOfLine`], ready to resynchronise on the next ':'.
    pub fn feed(&mut self, c: u8) -> Result<Progress, DecodeError> {
        if self.state.phase == Phase::StartOfLine {
            return match c {
                b'\r' | b'\n' => Ok(Progress::Skipped),
                START_CODE => {
                    self.begin_record();
                    Ok(Progress::Pending)
                }
                _ => Err(DecodeError::UnexpectedCharacter(c)),
            };
        }

        let nibble = match (c as char).to_digit(16) {
            Some(n) => n as u8,
            None => return Err(self.resync(DecodeError::InvalidDigit(c))),
        };

        match self.state.high_nibble.take() {
            None => {
                self.state.high_nibble = Some(nibble);
                Ok(Progress::Pending)
            }
            Some(high) => self.consume_byte((high << 4) | nibble),
        }
    }

    fn begin_record(&mut self) {
        let base = self.state.extended_base;
        self.state = DecoderState {
            phase: Phase::ByteCount,
            extended_base: base,
            ..DecoderState::default()
        };
    }

    fn resync(&mut self, err: DecodeError) -> DecodeError {
        self.state.phase = Phase::StartOfLine;
        self.state.high_nibble = None;
        err
    }

    fn consume_byte(&mut self, byte: u8) -> Result<Progress, DecodeError> {
        let st = &mut self.state;
        st.checksum = st.checksum.wrapping_add(byte);

        match st.phase {
            Phase::StartOfLine => unreachable!("start of line never assembles bytes"),
            Phase::ByteCount => {
                if byte as usize > MAX_RECORD_BYTES {
                    return Err(self.resync(DecodeError::ByteCountTooLarge(byte)));
                }
                st.byte_count = byte;
                st.phase = Phase::Address;
            }
            Phase::Address => {
                st.address = (st.address << 8) | byte as u16;
                st.field_bytes += 1;
                if st.field_bytes == 2 {
                    st.field_bytes = 0;
                    st.phase = Phase::RecordType;
                }
            }
            Phase::RecordType => {
                let Some(kind) = RecordKind::from_u8(byte) else {
                    return Err(self.resync(DecodeError::UnsupportedRecordType(byte)));
                };
                st.kind = Some(kind);
                st.phase = if st.byte_count == 0 {
                    Phase::Checksum
                } else {
                    Phase::Data
                };
            }
            Phase::Data => {
                // Capacity is guaranteed by the byte count check
                let _ = st.payload.push(byte);
                if st.payload.len() == st.byte_count as usize {
                    st.phase = Phase::Checksum;
                }
            }
            Phase::Checksum => {
                if st.checksum != 0 {
                    let residual = st.checksum;
                    return Err(self.resync(DecodeError::ChecksumMismatch { residual }));
                }
                st.phase = Phase::StartOfLine;
                return Ok(self.dispatch());
            }
        }

        Ok(Progress::Pending)
    }

    fn dispatch(&mut self) -> Progress {
        let st = &mut self.state;
        match st.kind {
            Some(RecordKind::Data) => Progress::Data {
                address: st.extended_base.wrapping_add(st.address as u32),
                payload: core::mem::take(&mut st.payload),
            },
            Some(RecordKind::ExtendedLinearAddress) => {
                let hi = st.payload.first().copied().unwrap_or(0) as u32;
                let lo = st.payload.get(1).copied().unwrap_or(0) as u32;
                st.extended_base = (hi << 24) | (lo << 16);
                Progress::ExtendedAddress(st.extended_base)
            }
            Some(RecordKind::EndOfFile) => {
                st.extended_base = 0;
                Progress::EndOfFile
            }
            None => Progress::Skipped,
        }
    }
}
