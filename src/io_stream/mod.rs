//! Stream and file layer.
//!
//! # Streams
//! [`read_records`] and [`write_records`] move one format's records through
//! any `Read`/`Write`.  Text formats are one record per line, each followed by
//! `\n`; blank lines are skipped on read.  Binary streams are a single record
//! holding the whole payload.  Unframed streams lay records out by address:
//! gaps between records are filled with [`Format::FILL_BYTE`], so the stream
//! is the image from the first record's address onwards.  [`read_blocks`] and
//! [`write_blocks`] add the block bridge on top, readdressing records on the
//! way in.
//!
//! # Files
//! Path-level functions take an optional explicit [`FormatId`] and otherwise
//! resolve the format from the file extension through a [`Registry`].  The
//! free functions use the built-in table; the same operations are methods on
//! [`Registry`] for tables extended with [`Registry::register`].  Because the
//! format is only known at run time, record-level file access goes through
//! [`RecordSeq`], which holds one sequence of any built-in format.

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::convert::{blocks_to_records, find_corrupted_records, records_to_blocks};
use crate::error::{RecordError, Result};
use crate::formats::{Binary, Intel, Mos, Motorola};
use crate::memory::SparseMemory;
use crate::range::{merge_blocks, Block, ADDRESS_SPACE};
use crate::record::{check_each, check_order, Format, Record, SplitOptions};
use crate::registry::{with_format, FormatId, Registry};

// ── Streams ──────────────────────────────────────────────────────────────────

pub fn read_records<F: Format, R: Read>(mut reader: R) -> Result<Vec<Record<F>>> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf)?;

    if F::LINE_SEP.is_none() {
        return Ok(vec![F::unmarshal(&buf)?]);
    }

    let text = String::from_utf8(buf).map_err(|e| RecordError::Parse(e.to_string()))?;
    let mut records = Vec::new();
    for (number, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record = F::parse_record(line).map_err(|e| {
            warn!("{} line {}: {}", F::NAME, number + 1, e);
            e
        })?;
        records.push(record);
    }
    debug!("read {} {} records", records.len(), F::NAME);
    Ok(records)
}

pub fn write_records<F: Format, W: Write>(mut writer: W, records: &[Record<F>]) -> Result<()> {
    if F::LINE_SEP.is_none() {
        check_order(records)?;
    }
    let mut cursor: Option<u64> = None;
    for record in records {
        match F::LINE_SEP {
            Some(sep) => {
                writer.write_all(&record.marshal()?)?;
                writer.write_all(sep.as_bytes())?;
            }
            None => {
                if let Some(at) = cursor {
                    let gap = record.address as u64 - at;
                    if gap > 0 {
                        debug!("filling {gap} byte gap at {at:#x}");
                        io::copy(&mut io::repeat(F::FILL_BYTE).take(gap), &mut writer)?;
                    }
                }
                writer.write_all(&record.marshal()?)?;
                cursor = Some(record.endex());
            }
        }
    }
    writer.flush()?;
    debug!("wrote {} {} records", records.len(), F::NAME);
    Ok(())
}

/// Read records and return their data as a block sequence.
pub fn read_blocks<F: Format, R: Read>(reader: R) -> Result<Vec<Block>> {
    let mut records = read_records::<F, _>(reader)?;
    F::readdress(&mut records);
    Ok(records_to_blocks(&records))
}

pub fn write_blocks<F: Format, W: Write>(
    writer:  W,
    blocks:  &[Block],
    options: &SplitOptions,
    framing: &F::Framing,
) -> Result<()> {
    let records = blocks_to_records::<F>(blocks, options, framing)?;
    write_records(writer, &records)
}

// ── Any-format record sequence ───────────────────────────────────────────────

/// A record sequence of a format chosen at run time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordSeq {
    Intel(Vec<Record<Intel>>),
    Motorola(Vec<Record<Motorola>>),
    Mos(Vec<Record<Mos>>),
    Binary(Vec<Record<Binary>>),
}

macro_rules! on_records {
    ($seq:expr, |$records:ident| $body:expr) => {
        match $seq {
            RecordSeq::Intel($records)    => $body,
            RecordSeq::Motorola($records) => $body,
            RecordSeq::Mos($records)      => $body,
            RecordSeq::Binary($records)   => $body,
        }
    };
}

fn flat_copy<F: Format>(records: &[Record<F>]) -> Vec<Record<F>> {
    let mut copy = records.to_vec();
    F::readdress(&mut copy);
    copy
}

impl RecordSeq {
    pub fn read<R: Read>(reader: R, format: FormatId) -> Result<Self> {
        Ok(match format {
            FormatId::Intel    => RecordSeq::Intel(read_records(reader)?),
            FormatId::Motorola => RecordSeq::Motorola(read_records(reader)?),
            FormatId::Mos      => RecordSeq::Mos(read_records(reader)?),
            FormatId::Binary   => RecordSeq::Binary(read_records(reader)?),
        })
    }

    pub fn write<W: Write>(&self, writer: W) -> Result<()> {
        on_records!(self, |records| write_records(writer, records))
    }

    pub fn format(&self) -> FormatId {
        match self {
            RecordSeq::Intel(_)    => FormatId::Intel,
            RecordSeq::Motorola(_) => FormatId::Motorola,
            RecordSeq::Mos(_)      => FormatId::Mos,
            RecordSeq::Binary(_)   => FormatId::Binary,
        }
    }

    pub fn len(&self) -> usize {
        on_records!(self, |records| records.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn data_count(&self) -> usize {
        on_records!(self, |records| records.iter().filter(|r| r.is_data()).count())
    }

    pub fn find_corrupted(&self) -> Vec<usize> {
        on_records!(self, |records| find_corrupted_records(records))
    }

    /// Sequence check: each record as written, then ordering and grammar on
    /// flat addresses.
    pub fn check_sequence(&self) -> Result<()> {
        on_records!(self, |records| check_flat(records))
    }

    /// Data as a block sequence, on flat addresses.
    pub fn to_blocks(&self) -> Vec<Block> {
        on_records!(self, |records| records_to_blocks(&flat_copy(records)))
    }

    /// Marshalled records, one string per record.  Binary payloads are shown
    /// as upper-case hex.
    pub fn lines(&self) -> Result<Vec<String>> {
        match self {
            RecordSeq::Binary(records) => Ok(records.iter().map(|r| hex::encode_upper(&r.data)).collect()),
            RecordSeq::Intel(records)    => records.iter().map(Record::to_text).collect(),
            RecordSeq::Motorola(records) => records.iter().map(Record::to_text).collect(),
            RecordSeq::Mos(records)      => records.iter().map(Record::to_text).collect(),
        }
    }
}

fn check_flat<F: Format>(records: &[Record<F>]) -> Result<()> {
    // Checksums cover the written offsets, not the flat addresses.
    check_each(records)?;
    F::check_layout(&flat_copy(records))
}

// ── Input descriptor ─────────────────────────────────────────────────────────

/// A file to load, with an optional explicit format and a load offset added
/// to every address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    pub path:   PathBuf,
    pub format: Option<FormatId>,
    pub offset: u32,
}

impl InputFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), format: None, offset: 0 }
    }

    pub fn with_format(mut self, format: Option<FormatId>) -> Self {
        self.format = format;
        self
    }

    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    pub fn resolve_format(&self, registry: &Registry) -> Result<FormatId> {
        registry.resolve(&self.path, self.format)
    }

    /// Load with the built-in registry.
    pub fn load_blocks(&self) -> Result<Vec<Block>> {
        self.load_blocks_in(&Registry::default())
    }

    pub fn load_blocks_in(&self, registry: &Registry) -> Result<Vec<Block>> {
        let blocks = registry.load_blocks(&self.path, self.format)?;
        if self.offset == 0 {
            return Ok(blocks);
        }
        blocks
            .into_iter()
            .map(|block| {
                let start = block.start as u64 + self.offset as u64;
                if start + block.len() as u64 > ADDRESS_SPACE {
                    return Err(RecordError::SizeOverflow);
                }
                Ok(Block::new(start as u32, block.data))
            })
            .collect()
    }
}

// ── Files ────────────────────────────────────────────────────────────────────

fn create(path: &Path) -> Result<BufWriter<File>> {
    Ok(BufWriter::new(File::create(path)?))
}

impl Registry {
    /// The explicit format, or the one registered for the path's extension.
    pub fn resolve(&self, path: &Path, format: Option<FormatId>) -> Result<FormatId> {
        match format {
            Some(format) => Ok(format),
            None         => self.find(path),
        }
    }

    /// Load the records of a file as they are written, without readdressing.
    pub fn load_records(&self, path: impl AsRef<Path>, format: Option<FormatId>) -> Result<RecordSeq> {
        let path = path.as_ref();
        let format = self.resolve(path, format)?;
        let seq = RecordSeq::read(File::open(path)?, format)?;
        debug!("loaded {} {} records from {}", seq.len(), format, path.display());
        Ok(seq)
    }

    /// Save records.  When the target format differs from the sequence's own,
    /// the data is converted through blocks and the framing is rebuilt.
    pub fn save_records(
        &self,
        path:    impl AsRef<Path>,
        records: &RecordSeq,
        format:  Option<FormatId>,
        options: &SplitOptions,
    ) -> Result<()> {
        let path = path.as_ref();
        let format = self.resolve(path, format)?;
        if format == records.format() {
            records.write(create(path)?)
        } else {
            info!("converting {} records to {} for {}", records.format(), format, path.display());
            self.save_blocks(path, &records.to_blocks(), Some(format), options)
        }
    }

    pub fn load_blocks(&self, path: impl AsRef<Path>, format: Option<FormatId>) -> Result<Vec<Block>> {
        let path = path.as_ref();
        let format = self.resolve(path, format)?;
        let file = File::open(path)?;
        let blocks = with_format!(format, |F| read_blocks::<F, _>(file))?;
        debug!("loaded {} blocks from {}", blocks.len(), path.display());
        Ok(blocks)
    }

    pub fn save_blocks(
        &self,
        path:    impl AsRef<Path>,
        blocks:  &[Block],
        format:  Option<FormatId>,
        options: &SplitOptions,
    ) -> Result<()> {
        let path = path.as_ref();
        let format = self.resolve(path, format)?;
        let writer = create(path)?;
        with_format!(format, |F| write_blocks::<F, _>(writer, blocks, options, &Default::default()))?;
        debug!("saved {} blocks to {}", blocks.len(), path.display());
        Ok(())
    }

    pub fn load_memory(&self, path: impl AsRef<Path>, format: Option<FormatId>) -> Result<SparseMemory> {
        Ok(SparseMemory::from_blocks(&self.load_blocks(path, format)?))
    }

    pub fn save_memory(
        &self,
        path:    impl AsRef<Path>,
        memory:  &SparseMemory,
        format:  Option<FormatId>,
        options: &SplitOptions,
    ) -> Result<()> {
        self.save_blocks(path, memory.blocks(), format, options)
    }

    /// Save one contiguous chunk of data at `address`.
    pub fn save_chunk(
        &self,
        path:    impl AsRef<Path>,
        data:    &[u8],
        address: u32,
        format:  Option<FormatId>,
        options: &SplitOptions,
    ) -> Result<()> {
        let path = path.as_ref();
        let format = self.resolve(path, format)?;
        let writer = create(path)?;
        with_format!(format, |F| {
            let records = F::split(data, address, options, &Default::default())?;
            write_records::<F, _>(writer, &records)
        })
    }

    /// Merge files in order into `output`; later inputs win where they overlap.
    pub fn merge_files(
        &self,
        inputs:        &[InputFile],
        output:        impl AsRef<Path>,
        output_format: Option<FormatId>,
        options:       &SplitOptions,
    ) -> Result<()> {
        let output = output.as_ref();
        info!("merging {} file(s) into {}", inputs.len(), output.display());

        let sources = inputs
            .iter()
            .map(|input| input.load_blocks_in(self))
            .collect::<Result<Vec<_>>>()?;
        let merged = merge_blocks(&sources);
        self.save_blocks(output, &merged, output_format, options)
    }

    pub fn convert_file(
        &self,
        input:         &InputFile,
        output:        impl AsRef<Path>,
        output_format: Option<FormatId>,
        options:       &SplitOptions,
    ) -> Result<()> {
        self.merge_files(std::slice::from_ref(input), output, output_format, options)
    }
}

pub fn load_records(path: impl AsRef<Path>, format: Option<FormatId>) -> Result<RecordSeq> {
    Registry::default().load_records(path, format)
}

pub fn save_records(
    path:    impl AsRef<Path>,
    records: &RecordSeq,
    format:  Option<FormatId>,
    options: &SplitOptions,
) -> Result<()> {
    Registry::default().save_records(path, records, format, options)
}

pub fn load_blocks(path: impl AsRef<Path>, format: Option<FormatId>) -> Result<Vec<Block>> {
    Registry::default().load_blocks(path, format)
}

pub fn save_blocks(
    path:    impl AsRef<Path>,
    blocks:  &[Block],
    format:  Option<FormatId>,
    options: &SplitOptions,
) -> Result<()> {
    Registry::default().save_blocks(path, blocks, format, options)
}

pub fn load_memory(path: impl AsRef<Path>, format: Option<FormatId>) -> Result<SparseMemory> {
    Registry::default().load_memory(path, format)
}

pub fn save_memory(
    path:    impl AsRef<Path>,
    memory:  &SparseMemory,
    format:  Option<FormatId>,
    options: &SplitOptions,
) -> Result<()> {
    Registry::default().save_memory(path, memory, format, options)
}

pub fn save_chunk(
    path:    impl AsRef<Path>,
    data:    &[u8],
    address: u32,
    format:  Option<FormatId>,
    options: &SplitOptions,
) -> Result<()> {
    Registry::default().save_chunk(path, data, address, format, options)
}

pub fn merge_files(
    inputs:        &[InputFile],
    output:        impl AsRef<Path>,
    output_format: Option<FormatId>,
    options:       &SplitOptions,
) -> Result<()> {
    Registry::default().merge_files(inputs, output, output_format, options)
}

pub fn convert_file(
    input:         &InputFile,
    output:        impl AsRef<Path>,
    output_format: Option<FormatId>,
    options:       &SplitOptions,
) -> Result<()> {
    Registry::default().convert_file(input, output, output_format, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SequenceError;
    use crate::formats::IntelFraming;
    use std::io::Cursor;

    #[test]
    fn text_stream_skips_blank_lines() {
        let text = ":0400100001020304E2\n\n  \r\n:00000001FF\n";
        let records = read_records::<Intel, _>(Cursor::new(text)).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn text_stream_round_trip() {
        let records = Intel::split(b"stream me", 0x8000, &SplitOptions::default(), &IntelFraming::default()).unwrap();
        let mut out = Vec::new();
        write_records(&mut out, &records).unwrap();

        let text = String::from_utf8(out.clone()).unwrap();
        assert!(text.ends_with(":00000001FF\n"));
        assert_eq!(text.lines().count(), records.len());
        assert_eq!(read_records::<Intel, _>(Cursor::new(out)).unwrap(), records);
    }

    #[test]
    fn binary_stream_is_one_record() {
        let records = read_records::<Binary, _>(Cursor::new(vec![1u8, 2, 3])).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].data, vec![1, 2, 3]);

        let mut out = Vec::new();
        let parts = vec![Binary::build_data(0, vec![1]).unwrap(), Binary::build_data(1, vec![2, 3]).unwrap()];
        write_records(&mut out, &parts).unwrap();
        assert_eq!(out, vec![1, 2, 3]);
    }

    #[test]
    fn binary_stream_fills_gaps() {
        let mut out = Vec::new();
        let parts = vec![Binary::build_data(0x100, vec![1, 2]).unwrap(), Binary::build_data(0x105, vec![3]).unwrap()];
        write_records(&mut out, &parts).unwrap();
        assert_eq!(out, vec![1, 2, 0xFF, 0xFF, 0xFF, 3]);

        let reversed = vec![parts[1].clone(), parts[0].clone()];
        assert!(matches!(
            write_records(&mut Vec::new(), &reversed),
            Err(RecordError::Sequence(SequenceError::UnsortedRecords))
        ));
    }

    #[test]
    fn unaligned_segment_base_checks_clean() {
        let text = ":020000020123D8\n:0400100001020304E2\n:00000001FF\n";
        let seq = RecordSeq::read(Cursor::new(text), FormatId::Intel).unwrap();
        assert!(seq.find_corrupted().is_empty());
        seq.check_sequence().unwrap();
        assert_eq!(seq.to_blocks(), vec![Block::new(0x1240, vec![1, 2, 3, 4])]);

        let mut corrupted = seq.clone();
        if let RecordSeq::Intel(records) = &mut corrupted {
            records[1].data[0] = 0x09;
        }
        assert!(matches!(corrupted.check_sequence(), Err(RecordError::ChecksumMismatch { .. })));
    }

    #[test]
    fn read_blocks_readdresses() {
        let text = ":020000040001F9\n:0400100001020304E2\n:00000001FF\n";
        let blocks = read_blocks::<Intel, _>(Cursor::new(text)).unwrap();
        assert_eq!(blocks, vec![Block::new(0x10010, vec![1, 2, 3, 4])]);
    }

    #[test]
    fn parse_error_surfaces() {
        let text = ":0400100001020304E2\nnot a record\n";
        assert!(matches!(read_records::<Intel, _>(Cursor::new(text)), Err(RecordError::Parse(_))));
    }

    #[test]
    fn record_seq_dispatch() {
        let text = "S00300FC\nS1071000DEADBEEFB0\nS5030001FB\nS9031000EC\n";
        let seq = RecordSeq::read(Cursor::new(text), FormatId::Motorola).unwrap();
        assert_eq!(seq.format(), FormatId::Motorola);
        assert_eq!((seq.len(), seq.data_count()), (4, 1));
        assert!(seq.find_corrupted().is_empty());
        seq.check_sequence().unwrap();
        assert_eq!(seq.to_blocks(), vec![Block::new(0x1000, vec![0xDE, 0xAD, 0xBE, 0xEF])]);
        assert_eq!(seq.lines().unwrap()[1], "S1071000DEADBEEFB0");
    }
}
