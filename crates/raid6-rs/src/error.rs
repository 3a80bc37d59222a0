//! Error kinds shared across the engine.

use std::fmt;

/// `RaidError` enumerates the failure kinds surfaced by engine operations.
///
/// Device-level `DiskMissing`/`BlockMissing` are normally absorbed by one
/// stripe-recovery attempt; the kinds that survive to a caller describe
/// either invalid input or genuine data loss.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RaidError {
    /// Division, inverse or logarithm of zero in GF(2⁸).
    ArithmeticDomain,
    /// Malformed argument: bad range, bad name, unsorted failure list.
    InvalidArgument,
    /// A file with this name already exists.
    NameExists,
    /// No file with this name exists.
    NameNotFound,
    /// Not enough free data blocks for the request.
    OutOfSpace,
    /// Every file-table slot is occupied.
    TableFull,
    /// The disk namespace is gone.
    DiskMissing,
    /// The block is absent or mis-sized.
    BlockMissing,
    /// More members failed than two syndromes can reconstruct.
    TooManyFailures,
    /// Corruption implicates more than one member of a stripe.
    MultiCorruption,
    /// Recovery was attempted and the data is still unreadable.
    Unrecoverable,
}

pub type RaidResult<T> = Result<T, RaidError>;

impl fmt::Display for RaidError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::ArithmeticDomain => "arithmetic domain error in GF(2^8)",
            Self::InvalidArgument => "invalid argument",
            Self::NameExists => "file name already exists",
            Self::NameNotFound => "file name not found",
            Self::OutOfSpace => "out of space",
            Self::TableFull => "file table is full",
            Self::DiskMissing => "disk is missing",
            Self::BlockMissing => "block is missing",
            Self::TooManyFailures => "more than two members failed",
            Self::MultiCorruption => "more than one member corrupted",
            Self::Unrecoverable => "data is unrecoverable",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for RaidError {}
