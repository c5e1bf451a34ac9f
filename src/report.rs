//! Validation report for a loaded record file.
//!
//! A [`SequenceReport`] combines the per-record check (which records are
//! corrupted) with the whole-sequence grammar check, and summarises the data
//! the file carries.  It serialises to JSON for the `check --json` command.
//!
//! ## Verdicts
//!
//! | Verdict | Meaning |
//! |---------|---------|
//! | `Valid` | Every record checks and the sequence grammar holds |
//! | `CorruptRecords` | At least one record fails its own check |
//! | `MalformedSequence` | Records check, but the sequence grammar does not |

use log::warn;
use serde::{Deserialize, Serialize};

use crate::io_stream::RecordSeq;
use crate::range::Block;
use crate::registry::FormatId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Valid,
    CorruptRecords,
    MalformedSequence,
}

/// Span of one data block, for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSpan {
    pub start: u32,
    pub endex: u64,
    pub size:  usize,
}

impl From<&Block> for BlockSpan {
    fn from(block: &Block) -> Self {
        Self { start: block.start, endex: block.endex(), size: block.len() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceReport {
    pub format:         FormatId,
    pub total_records:  usize,
    pub data_records:   usize,
    /// Indices of records failing their own check.
    pub corrupted:      Vec<usize>,
    /// Grammar violation, if any.
    pub sequence_error: Option<String>,
    pub blocks:         Vec<BlockSpan>,
    pub data_bytes:     u64,
    pub verdict:        Verdict,
}

impl SequenceReport {
    pub fn scan(records: &RecordSeq) -> Self {
        let corrupted = records.find_corrupted();
        let sequence_error = records.check_sequence().err().map(|e| e.to_string());
        let blocks: Vec<BlockSpan> = records.to_blocks().iter().map(BlockSpan::from).collect();
        let data_bytes = blocks.iter().map(|b| b.size as u64).sum();

        let verdict = if !corrupted.is_empty() {
            Verdict::CorruptRecords
        } else if sequence_error.is_some() {
            Verdict::MalformedSequence
        } else {
            Verdict::Valid
        };
        if verdict != Verdict::Valid {
            warn!(
                "{} sequence: {} corrupted record(s), grammar: {}",
                records.format(),
                corrupted.len(),
                sequence_error.as_deref().unwrap_or("ok")
            );
        }

        Self {
            format: records.format(),
            total_records: records.len(),
            data_records: records.data_count(),
            corrupted,
            sequence_error,
            blocks,
            data_bytes,
            verdict,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.verdict == Verdict::Valid
    }

    /// Summary line for display.
    pub fn summary(&self) -> String {
        format!(
            "{:?}: {} record(s), {} data, {} corrupted; {} block(s), {} byte(s){}",
            self.verdict,
            self.total_records,
            self.data_records,
            self.corrupted.len(),
            self.blocks.len(),
            self.data_bytes,
            match &self.sequence_error {
                Some(e) => format!("; {e}"),
                None    => String::new(),
            },
        )
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::Mos;
    use crate::record::{Format, SplitOptions};

    fn mos(data: &[u8]) -> Vec<crate::record::Record<Mos>> {
        Mos::split(data, 0x200, &SplitOptions::default(), &()).unwrap()
    }

    #[test]
    fn valid_sequence() {
        let report = SequenceReport::scan(&RecordSeq::Mos(mos(&[9; 20])));
        assert!(report.is_valid());
        assert_eq!((report.total_records, report.data_records), (3, 2));
        assert_eq!(report.blocks, vec![BlockSpan { start: 0x200, endex: 0x214, size: 20 }]);
        assert_eq!(report.data_bytes, 20);
        assert!(report.summary().starts_with("Valid: 3 record(s)"));
    }

    #[test]
    fn corrupted_record_wins_over_grammar() {
        let mut records = mos(&[9; 20]);
        records[0].data[0] = 0;
        let report = SequenceReport::scan(&RecordSeq::Mos(records));
        assert_eq!(report.verdict, Verdict::CorruptRecords);
        assert_eq!(report.corrupted, vec![0]);
        assert!(report.sequence_error.is_some());
    }

    #[test]
    fn malformed_sequence() {
        let mut records = mos(&[9; 20]);
        records.pop();
        let report = SequenceReport::scan(&RecordSeq::Mos(records));
        assert_eq!(report.verdict, Verdict::MalformedSequence);
        assert_eq!(report.sequence_error.as_deref(), Some("missing terminator"));
    }

    #[test]
    fn json_round_trip() {
        let report = SequenceReport::scan(&RecordSeq::Mos(mos(&[1, 2, 3])));
        let json = report.to_json().unwrap();
        assert!(json.contains("\"format\": \"mos\""));
        assert_eq!(SequenceReport::from_json(&json).unwrap(), report);
    }
}
