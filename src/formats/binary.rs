//! Raw binary images.
//!
//! There is no framing: a record is a run of bytes at an address, every
//! record is data, and a file is the concatenation of its records' payloads.
//! The checksum is the low byte of the payload sum, for diagnostics only.

use crate::error::{RecordError, Result};
use crate::range::{chop, ADDRESS_SPACE};
use crate::record::{sum_bytes, Checksum, Format, Record, SplitOptions};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Binary;

impl Binary {
    pub fn build_data(address: u32, data: impl Into<Vec<u8>>) -> Result<Record<Binary>> {
        Record::new(address, (), data.into(), Checksum::Auto)
    }
}

impl Format for Binary {
    type Tag     = ();
    type Framing = ();

    const NAME: &'static str = "binary";
    const DEFAULT_COLUMNS: Option<usize> = None;
    const MAX_COLUMNS: usize = usize::MAX;
    const LINE_SEP: Option<&'static str> = None;

    fn compute_count(record: &Record<Self>) -> u32 {
        record.data.len() as u32
    }

    fn compute_checksum(record: &Record<Self>) -> u32 {
        sum_bytes(&record.data) & 0xFF
    }

    fn check(record: &Record<Self>) -> Result<()> {
        if record.endex() > ADDRESS_SPACE {
            return Err(RecordError::SizeOverflow);
        }
        let expected = record.compute_count();
        if record.count != expected {
            return Err(RecordError::CountMismatch { expected, found: record.count });
        }
        record.check_checksum(0xFF)
    }

    fn is_data(_: &Record<Self>) -> bool {
        true
    }

    /// Parse a hex dump; whitespace anywhere is ignored.
    fn parse_record(line: &str) -> Result<Record<Self>> {
        let digits: String = line.split_whitespace().collect();
        let data = hex::decode(digits).map_err(|e| RecordError::Parse(e.to_string()))?;
        Record::new(0, (), data, Checksum::Auto)
    }

    fn marshal(record: &Record<Self>) -> Result<Vec<u8>> {
        record.check()?;
        Ok(record.data.clone())
    }

    fn unmarshal(data: &[u8]) -> Result<Record<Self>> {
        Record::new(0, (), data.to_vec(), Checksum::Auto)
    }

    fn split(
        data:    &[u8],
        address: u32,
        options: &SplitOptions,
        _:       &(),
    ) -> Result<Vec<Record<Self>>> {
        if address as u64 + data.len() as u64 > ADDRESS_SPACE {
            return Err(RecordError::SizeOverflow);
        }
        let columns = options.resolve_columns::<Self>(data.len())?;
        // Without explicit columns the whole buffer is one record.
        let align_base = match options.columns {
            Some(_) if options.align => address as usize % columns,
            _ => 0,
        };

        let mut records = Vec::new();
        let mut cursor = address;
        for chunk in chop(data, columns, align_base) {
            records.push(Record::build(cursor, (), chunk.to_vec()));
            cursor = cursor.wrapping_add(chunk.len() as u32);
        }
        Ok(records)
    }

    fn build_standalone(data_records: Vec<Record<Self>>, _: &()) -> Result<Vec<Record<Self>>> {
        Ok(data_records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_is_low_byte_of_sum() {
        let record = Binary::build_data(0, vec![0xFF, 0x02]).unwrap();
        assert_eq!(record.checksum, Some(0x01));
        assert_eq!(record.count, 2);
        record.check().unwrap();
    }

    #[test]
    fn parse_hex_dump() {
        let record = Record::<Binary>::parse("de ad\n be\tEF").unwrap();
        assert_eq!(record.data, vec![0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(record.address, 0);
        assert!(Record::<Binary>::parse("abc").is_err());
    }

    #[test]
    fn marshal_is_raw_payload() {
        let record = Record::<Binary>::unmarshal(&[0, 1, 0xFF]).unwrap();
        assert_eq!(record.marshal().unwrap(), vec![0, 1, 0xFF]);
    }

    #[test]
    fn split_whole_buffer_by_default() {
        let data: Vec<u8> = (0..100).collect();
        let records = Binary::split(&data, 0x40, &SplitOptions::default(), &()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].address, 0x40);
        assert_eq!(records[0].data, data);
    }

    #[test]
    fn split_in_columns() {
        let data: Vec<u8> = (0..10).collect();
        let options = SplitOptions { columns: Some(4), ..Default::default() };
        let records = Binary::split(&data, 2, &options, &()).unwrap();
        let layout: Vec<(u32, usize)> = records.iter().map(|r| (r.address, r.data.len())).collect();
        assert_eq!(layout, vec![(2, 2), (4, 4), (8, 4)]);
        Binary::check_sequence(&records).unwrap();
    }

    #[test]
    fn empty_split_has_no_records() {
        let records = Binary::split(&[], 0, &SplitOptions::default(), &()).unwrap();
        assert!(records.is_empty());
    }
}
