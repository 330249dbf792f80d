//! Error types for hexdrop-core
//!
//! This module provides a no_std compatible error type that can be used
//! throughout the crate.

use core::fmt;

/// Structural violation found while decoding an Intel HEX record
///
/// Every variant resets the decoder to the start-of-line phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// A character other than ':' or a line ending appeared between records
    UnexpectedCharacter(u8),
    /// A non-hexadecimal character appeared inside a record
    InvalidDigit(u8),
    /// The byte count field exceeds the maximum payload size
    ByteCountTooLarge(u8),
    /// The record type is not data, end-of-file or extended linear address
    UnsupportedRecordType(u8),
    /// The record bytes do not sum to zero
    ChecksumMismatch {
        /// Residual of the 8-bit sum (zero for a valid record)
        residual: u8,
    },
}

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A HEX record could not be decoded
    Decode(DecodeError),

    // Session errors
    /// A programming operation was issued while the target is not in programming mode
    SessionInactive,
    /// The device profile does not support the requested operation
    NotSupported,

    // Profile errors
    /// Row width is not a power of two or is out of range
    InvalidRowWidth,
    /// Configuration words do not fit inside one row
    InvalidConfigLayout,
    /// Row data does not match the profile's row width
    RowSizeMismatch,

    // Disk errors
    /// Sector number is beyond the configured capacity
    SectorOutOfRange,
    /// Segment index is beyond the end of a sector
    SegmentOutOfRange,
    /// The sector cannot be written by the host
    ReadOnlySector,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedCharacter(c) => {
                write!(f, "unexpected character 0x{:02X} outside a record", c)
            }
            Self::InvalidDigit(c) => write!(f, "invalid hex digit 0x{:02X}", c),
            Self::ByteCountTooLarge(n) => write!(f, "byte count {} exceeds 16", n),
            Self::UnsupportedRecordType(t) => write!(f, "unsupported record type 0x{:02X}", t),
            Self::ChecksumMismatch { residual } => {
                write!(f, "checksum mismatch (residual 0x{:02X})", residual)
            }
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode(e) => write!(f, "decode error: {}", e),
            Self::SessionInactive => write!(f, "target is not in programming mode"),
            Self::NotSupported => write!(f, "operation not supported by device profile"),
            Self::InvalidRowWidth => write!(f, "invalid row width"),
            Self::InvalidConfigLayout => write!(f, "configuration words overflow the row"),
            Self::RowSizeMismatch => write!(f, "row size does not match device profile"),
            Self::SectorOutOfRange => write!(f, "sector out of range"),
            Self::SegmentOutOfRange => write!(f, "segment index out of range"),
            Self::ReadOnlySector => write!(f, "sector is read-only"),
        }
    }
}

impl From<DecodeError> for Error {
    fn from(e: DecodeError) -> Self {
        Error::Decode(e)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DecodeError {}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
