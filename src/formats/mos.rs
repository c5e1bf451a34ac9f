//! MOS Technology paper-tape format.
//!
//! Each line is `;CCAAAA[DD...]SSSS` with a 16-bit address and a 16-bit
//! additive checksum.  A record with no data terminates the file; its address
//! field and checksum both hold the number of data records before it.

use byteorder::{BigEndian, ByteOrder};

use crate::error::{RecordError, Result, SequenceError};
use crate::range::chop;
use crate::record::{check_order, decode_line, sum_bytes, Checksum, Format, Record, SplitOptions};

const MOS_SPACE: u64 = 1 << 16;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Mos;

impl Mos {
    pub fn build_data(address: u32, data: impl Into<Vec<u8>>) -> Result<Record<Mos>> {
        Record::new(address, (), data.into(), Checksum::Auto)
    }

    pub fn build_terminator(record_count: u32) -> Result<Record<Mos>> {
        Record::new(record_count, (), Vec::new(), Checksum::Auto)
    }
}

impl Format for Mos {
    type Tag     = ();
    type Framing = ();

    const NAME: &'static str = "mos";
    const DEFAULT_COLUMNS: Option<usize> = Some(16);
    const MAX_COLUMNS: usize = 128;
    const LINE_SEP: Option<&'static str> = Some("\n");

    fn check_bounds(address: u32, data: &[u8]) -> Result<()> {
        if address as u64 >= MOS_SPACE {
            return Err(RecordError::AddressOverflow);
        }
        if address as u64 + data.len() as u64 > MOS_SPACE {
            return Err(RecordError::SizeOverflow);
        }
        Ok(())
    }

    fn compute_count(record: &Record<Self>) -> u32 {
        record.data.len() as u32
    }

    fn compute_checksum(record: &Record<Self>) -> u32 {
        if record.count == 0 {
            return record.address;
        }
        let sum = record.count
            .wrapping_add(record.address >> 8)
            .wrapping_add(record.address & 0xFF)
            .wrapping_add(sum_bytes(&record.data));
        sum & 0xFFFF
    }

    fn check(record: &Record<Self>) -> Result<()> {
        Self::check_bounds(record.address, &record.data)?;
        record.check_count(0xFF)?;
        record.check_checksum(0xFFFF)
    }

    fn is_data(record: &Record<Self>) -> bool {
        record.count > 0
    }

    fn parse_record(line: &str) -> Result<Record<Self>> {
        let body = decode_line(line, ';')?;
        if body.len() < 5 {
            return Err(RecordError::Parse(format!("MOS record too short: {} bytes", body.len())));
        }
        let count = body[0] as u32;
        let address = BigEndian::read_u16(&body[1..3]) as u32;
        let data = body[3..body.len() - 2].to_vec();
        let checksum = BigEndian::read_u16(&body[body.len() - 2..]) as u32;

        if data.len() as u32 != count {
            return Err(RecordError::CountMismatch { expected: count, found: data.len() as u32 });
        }
        Record::new(address, (), data, Checksum::Explicit(checksum))
    }

    fn marshal(record: &Record<Self>) -> Result<Vec<u8>> {
        record.check()?;
        let text = format!(
            ";{:02X}{:04X}{}{:04X}",
            record.count,
            record.address,
            hex::encode_upper(&record.data),
            record.effective_checksum(),
        );
        Ok(text.into_bytes())
    }

    fn split(
        data:    &[u8],
        address: u32,
        options: &SplitOptions,
        _:       &(),
    ) -> Result<Vec<Record<Self>>> {
        if address as u64 + data.len() as u64 > MOS_SPACE {
            return Err(RecordError::SizeOverflow);
        }
        let columns = options.resolve_columns::<Self>(data.len())?;
        let align_base = if options.align { address as usize % columns } else { 0 };

        let mut records = Vec::with_capacity(data.len() / columns + 1);
        let mut cursor = address;
        for chunk in chop(data, columns, align_base) {
            records.push(Record::build(cursor, (), chunk.to_vec()));
            cursor += chunk.len() as u32;
        }

        if options.standalone {
            records.push(Self::build_terminator(records.len() as u32)?);
        }
        Ok(records)
    }

    fn build_standalone(mut data_records: Vec<Record<Self>>, _: &()) -> Result<Vec<Record<Self>>> {
        let count = data_records.iter().filter(|r| r.is_data()).count();
        data_records.push(Self::build_terminator(count as u32)?);
        Ok(data_records)
    }

    fn check_layout(records: &[Record<Self>]) -> Result<()> {
        let (last, body) = records.split_last().ok_or(SequenceError::MissingTerminator)?;
        if let Some(index) = body.iter().position(|r| !r.is_data()) {
            return Err(SequenceError::MisplacedTerminator(index).into());
        }
        if last.is_data() {
            return Err(SequenceError::MissingTerminator.into());
        }
        let expected = body.len() as u32;
        if last.address != expected || last.checksum.is_some_and(|c| c != expected) {
            return Err(SequenceError::WrongTerminator.into());
        }
        check_order(records)
    }
}
