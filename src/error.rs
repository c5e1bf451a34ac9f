//! Error types shared by every record format.
//!
//! All errors are rejected-input or invariant-violation errors.  Nothing here
//! is transient: retrying the same operation on the same input fails the same
//! way.

use std::io;
use thiserror::Error;

// ── Sequence grammar ─────────────────────────────────────────────────────────

/// A whole record sequence is not well formed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SequenceError {
    #[error("overlapping records")]
    OverlappingRecords,
    #[error("unsorted records")]
    UnsortedRecords,
    #[error("missing header")]
    MissingHeader,
    #[error("duplicate header")]
    DuplicateHeader,
    #[error("missing count")]
    MissingCount,
    #[error("misplaced count")]
    MisplacedCount,
    #[error("record count error: expected {expected}, found {found}")]
    RecordCount { expected: u64, found: u64 },
    #[error("data tag error: expected {expected}, found {found}")]
    DataTag { expected: u8, found: u8 },
    #[error("missing start")]
    MissingStart,
    #[error("start tag error: found {0}")]
    StartTag(u8),
    #[error("matching tag error: expected {expected}, found {found}")]
    MatchingTag { expected: u8, found: u8 },
    #[error("sequence length error: records after the terminator")]
    TrailingRecords,
    #[error("missing terminator")]
    MissingTerminator,
    #[error("misplaced terminator at index {0}")]
    MisplacedTerminator(usize),
    #[error("wrong terminator")]
    WrongTerminator,
}

// ── Record errors ────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("address overflow")]
    AddressOverflow,
    #[error("size overflow")]
    SizeOverflow,
    #[error("column overflow: {0}")]
    ColumnOverflow(usize),
    #[error("count overflow: {0}")]
    CountOverflow(u64),
    #[error("checksum overflow: {0:#x}")]
    ChecksumOverflow(u32),
    /// The line does not match the physical grammar of the format.
    #[error("parse error: {0}")]
    Parse(String),
    #[error("count error: expected {expected}, found {found}")]
    CountMismatch { expected: u32, found: u32 },
    #[error("checksum error: expected {expected:#04x}, found {found:#04x}")]
    ChecksumMismatch { expected: u32, found: u32 },
    #[error("tag error: {0}")]
    Tag(String),
    #[error("address error: {0}")]
    AddressField(String),
    #[error(transparent)]
    Sequence(#[from] SequenceError),
    #[error("unsupported extension: {0:?}")]
    UnsupportedExtension(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, RecordError>;
