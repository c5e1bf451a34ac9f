//! The record entity shared by every hex file format.
//!
//! A [`Record`] is one physical unit of a hex file: a text line for the
//! line-oriented formats, or the whole payload for raw binary.  It carries
//! five fields (address, tag, data, count, checksum) whose meaning is fixed
//! by the [`Format`] it belongs to.
//!
//! # Format contract
//! Each format is a zero-sized marker type implementing [`Format`].  The trait
//! bundles the per-format formulas (count, checksum), the physical grammar
//! (`parse_record`, `marshal`), the record builders used by `split` and
//! `build_standalone`, and the whole-sequence grammar (`check_sequence`).
//! A sequence check is two passes: each record on its own ([`check_each`]),
//! then the layout of the sequence ([`Format::check_layout`]).  Only the
//! second pass needs flat addresses.
//! Tags are a closed enum per format; formats without tags use `()`.
//!
//! # Checksums
//! A record's checksum is tri-state, chosen at construction with
//! [`Checksum`]: computed immediately, stored verbatim for later
//! verification, or absent (never verified).

use std::cmp::Ordering;
use std::fmt::Debug;
use std::hash::Hash;

use crate::error::{RecordError, Result, SequenceError};
use crate::range::{do_overlap, ADDRESS_SPACE};

// ── Checksum mode ────────────────────────────────────────────────────────────

/// How [`Record::new`] fills the `checksum` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Checksum {
    /// Compute from the other fields now.
    #[default]
    Auto,
    /// Store this value; `check()` compares it with the computed one.
    Explicit(u32),
    /// No checksum; `check()` skips the comparison.
    Absent,
}

// ── Split options ────────────────────────────────────────────────────────────

/// Options for [`Format::split`] and the block-to-record bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitOptions {
    /// Maximum data bytes per record.  `None` picks the format default.
    pub columns:    Option<usize>,
    /// Align chunk boundaries to multiples of `columns`.
    pub align:      bool,
    /// Append the framing records the format needs to be loadable alone.
    pub standalone: bool,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            columns:    None,
            align:      true,
            standalone: true,
        }
    }
}

impl SplitOptions {
    /// Resolve the column count for format `F` and a payload of `data_len`
    /// bytes, rejecting widths the format cannot encode.
    pub fn resolve_columns<F: Format>(&self, data_len: usize) -> Result<usize> {
        let columns = match self.columns.or(F::DEFAULT_COLUMNS) {
            Some(columns) => columns,
            None          => data_len.max(1),
        };
        if columns == 0 || columns > F::MAX_COLUMNS {
            return Err(RecordError::ColumnOverflow(columns));
        }
        Ok(columns)
    }
}

// ── Format trait ─────────────────────────────────────────────────────────────

pub trait Format: Copy + Debug + Default + PartialEq + Eq + Hash + Send + Sync + 'static {
    type Tag: Copy + Debug + PartialEq + Eq + Hash + Send + Sync;
    /// Options for the framing records appended by `build_standalone`.
    type Framing: Debug + Clone + Default;

    /// Diagnostic name.
    const NAME: &'static str;
    /// Column count used when [`SplitOptions::columns`] is `None`.
    /// `None` means "the whole buffer in one record".
    const DEFAULT_COLUMNS: Option<usize>;
    const MAX_COLUMNS: usize;
    /// Separator written after each marshalled record; `None` for formats
    /// without line framing.
    const LINE_SEP: Option<&'static str>;
    /// Byte written into address gaps by formats without line framing.
    const FILL_BYTE: u8 = 0xFF;

    /// Bounds enforced at construction.  Defaults to the 32-bit space.
    fn check_bounds(address: u32, data: &[u8]) -> Result<()> {
        if address as u64 + data.len() as u64 > ADDRESS_SPACE {
            return Err(RecordError::SizeOverflow);
        }
        Ok(())
    }

    fn compute_count(record: &Record<Self>) -> u32;
    fn compute_checksum(record: &Record<Self>) -> u32;
    fn check(record: &Record<Self>) -> Result<()>;
    fn is_data(record: &Record<Self>) -> bool;

    fn parse_record(line: &str) -> Result<Record<Self>>;
    fn marshal(record: &Record<Self>) -> Result<Vec<u8>>;

    fn unmarshal(data: &[u8]) -> Result<Record<Self>> {
        let line = std::str::from_utf8(data)
            .map_err(|e| RecordError::Parse(e.to_string()))?;
        Self::parse_record(line)
    }

    /// Chop `data` (starting at `address`) into data records, plus the
    /// framing records when `options.standalone` is set.
    fn split(
        data:    &[u8],
        address: u32,
        options: &SplitOptions,
        framing: &Self::Framing,
    ) -> Result<Vec<Record<Self>>>;

    /// Wrap already chunked data records with the framing records.
    fn build_standalone(
        data_records: Vec<Record<Self>>,
        framing:      &Self::Framing,
    ) -> Result<Vec<Record<Self>>>;

    /// Whole-sequence check: every record, then the layout.
    fn check_sequence(records: &[Record<Self>]) -> Result<()> {
        check_each(records)?;
        Self::check_layout(records)
    }

    /// Ordering and grammar of the sequence, without the per-record checks.
    /// Addresses must be flat.
    fn check_layout(records: &[Record<Self>]) -> Result<()> {
        check_order(records)
    }

    /// Convert to flat addressing, in place.  Only formats with segmented
    /// addressing override this.
    fn readdress(_records: &mut [Record<Self>]) {}
}

/// Checks shared by every format: each record is valid, and data records are
/// sorted by address without overlapping each other.
pub fn check_records<F: Format>(records: &[Record<F>]) -> Result<()> {
    check_each(records)?;
    check_order(records)
}

/// Every record passes its own check, in order.
pub fn check_each<F: Format>(records: &[Record<F>]) -> Result<()> {
    records.iter().try_for_each(Record::check)
}

/// Data records are sorted by address and do not overlap.
pub fn check_order<F: Format>(records: &[Record<F>]) -> Result<()> {
    let mut last: Option<(u64, u64)> = None;

    for record in records.iter().filter(|r| r.is_data()) {
        let start = record.address as u64;
        let endex = record.endex();
        if let Some((last_start, last_endex)) = last {
            if start < last_endex {
                if do_overlap(last_start, last_endex, start, endex) {
                    return Err(SequenceError::OverlappingRecords.into());
                }
                return Err(SequenceError::UnsortedRecords.into());
            }
        }
        last = Some((start, endex));
    }
    Ok(())
}

// ── Record ───────────────────────────────────────────────────────────────────

/// One record of format `F`.
///
/// Equality and hashing cover all five fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Record<F: Format> {
    pub address:  u32,
    pub tag:      F::Tag,
    pub data:     Vec<u8>,
    pub count:    u32,
    pub checksum: Option<u32>,
}

impl<F: Format> Record<F> {
    /// Build a record, rejecting addresses and sizes outside the format's
    /// address space.  `count` is always computed.
    pub fn new(address: u32, tag: F::Tag, data: Vec<u8>, checksum: Checksum) -> Result<Self> {
        F::check_bounds(address, &data)?;
        let mut record = Self { address, tag, data, count: 0, checksum: None };
        record.update_count();
        record.checksum = match checksum {
            Checksum::Auto           => Some(record.compute_checksum()),
            Checksum::Explicit(value) => Some(value),
            Checksum::Absent         => None,
        };
        Ok(record)
    }

    /// Build a record whose bounds the caller already guarantees.
    pub(crate) fn build(address: u32, tag: F::Tag, data: Vec<u8>) -> Self {
        let mut record = Self { address, tag, data, count: 0, checksum: None };
        record.update_count();
        record.update_checksum();
        record
    }

    pub fn compute_count(&self) -> u32 { F::compute_count(self) }

    pub fn compute_checksum(&self) -> u32 { F::compute_checksum(self) }

    pub fn update_count(&mut self) {
        self.count = self.compute_count();
    }

    pub fn update_checksum(&mut self) {
        self.checksum = Some(self.compute_checksum());
    }

    /// The stored checksum, or the computed one when absent.
    pub fn effective_checksum(&self) -> u32 {
        self.checksum.unwrap_or_else(|| self.compute_checksum())
    }

    pub fn check(&self) -> Result<()> { F::check(self) }

    pub fn is_data(&self) -> bool { F::is_data(self) }

    /// Exclusive end address of `data`.
    #[inline]
    pub fn endex(&self) -> u64 {
        self.address as u64 + self.data.len() as u64
    }

    /// Order by address only.
    pub fn cmp_address(&self, other: &Record<F>) -> Ordering {
        self.address.cmp(&other.address)
    }

    /// Whether the data of both records share an address.
    pub fn overlaps(&self, other: &Record<F>) -> bool {
        do_overlap(self.address as u64, self.endex(), other.address as u64, other.endex())
    }

    pub fn parse(line: &str) -> Result<Self> { F::parse_record(line) }

    pub fn marshal(&self) -> Result<Vec<u8>> { F::marshal(self) }

    pub fn unmarshal(data: &[u8]) -> Result<Self> { F::unmarshal(data) }

    /// The marshalled record as text.  Fails for payloads that are not UTF-8,
    /// which only binary records can produce.
    pub fn to_text(&self) -> Result<String> {
        String::from_utf8(self.marshal()?).map_err(|e| RecordError::Parse(e.to_string()))
    }

    /// Verify the stored checksum, if any, against `width_mask`.
    pub(crate) fn check_checksum(&self, width_mask: u32) -> Result<()> {
        if let Some(checksum) = self.checksum {
            if checksum > width_mask {
                return Err(RecordError::ChecksumOverflow(checksum));
            }
            let expected = self.compute_checksum();
            if checksum != expected {
                return Err(RecordError::ChecksumMismatch { expected, found: checksum });
            }
        }
        Ok(())
    }

    pub(crate) fn check_count(&self, max: u32) -> Result<()> {
        if self.count > max {
            return Err(RecordError::CountOverflow(self.count as u64));
        }
        let expected = self.compute_count();
        if self.count != expected {
            return Err(RecordError::CountMismatch { expected, found: self.count });
        }
        Ok(())
    }
}

// ── Shared codec helpers ─────────────────────────────────────────────────────

pub(crate) fn sum_bytes(data: &[u8]) -> u32 {
    data.iter().map(|&b| b as u32).sum()
}

/// Strip the one-character record mark and decode the hex body.
pub(crate) fn decode_line(line: &str, mark: char) -> Result<Vec<u8>> {
    let body = line
        .trim()
        .strip_prefix(mark)
        .ok_or_else(|| RecordError::Parse(format!("missing {mark:?} record mark")))?;
    hex::decode(body).map_err(|e| RecordError::Parse(e.to_string()))
}

/// Big-endian integer from up to 8 bytes.
pub(crate) fn be_value(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}
