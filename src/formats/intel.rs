//! Intel HEX.
//!
//! Each line is `:CCAAAATT[DD...]SS`: byte count, 16-bit offset, record
//! type, payload and a two's-complement checksum.  Addresses above 64 KiB are
//! reached through extended address records, so parsed data records hold a
//! 16-bit offset until [`Format::readdress`] folds the running base in.
//! Records produced by `split` and the builders carry flat addresses; only
//! their low 16 bits are written.  Their bases are all linear and 64 KiB
//! aligned, so readdressing them again leaves them unchanged.  That does not
//! hold for already readdressed records under a segment base that is not a
//! multiple of 64 KiB: readdress parsed records once.

use byteorder::{BigEndian, ByteOrder};

use crate::error::{RecordError, Result};
use crate::range::{chop, ADDRESS_SPACE};
use crate::record::{decode_line, sum_bytes, Checksum, Format, Record, SplitOptions};

// ── Tags ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum IntelTag {
    Data                   = 0,
    EndOfFile              = 1,
    ExtendedSegmentAddress = 2,
    StartSegmentAddress    = 3,
    ExtendedLinearAddress  = 4,
    StartLinearAddress     = 5,
}

impl IntelTag {
    /// Payload length required by the metadata tags.
    fn payload_len(self) -> Option<usize> {
        match self {
            IntelTag::Data                   => None,
            IntelTag::EndOfFile              => Some(0),
            IntelTag::ExtendedSegmentAddress => Some(2),
            IntelTag::ExtendedLinearAddress  => Some(2),
            IntelTag::StartSegmentAddress    => Some(4),
            IntelTag::StartLinearAddress     => Some(4),
        }
    }
}

impl TryFrom<u8> for IntelTag {
    type Error = RecordError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(IntelTag::Data),
            1 => Ok(IntelTag::EndOfFile),
            2 => Ok(IntelTag::ExtendedSegmentAddress),
            3 => Ok(IntelTag::StartSegmentAddress),
            4 => Ok(IntelTag::ExtendedLinearAddress),
            5 => Ok(IntelTag::StartLinearAddress),
            other => Err(RecordError::Tag(format!("unknown Intel HEX record type {other:#04x}"))),
        }
    }
}

// ── Framing ──────────────────────────────────────────────────────────────────

/// Framing for standalone Intel HEX output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntelFraming {
    /// Start linear address.  Defaults to the lowest data address.
    pub start: Option<u32>,
}

// ── Format ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Intel;

fn be16(value: u16) -> Vec<u8> {
    let mut buf = [0u8; 2];
    BigEndian::write_u16(&mut buf, value);
    buf.to_vec()
}

fn be32(value: u32) -> Vec<u8> {
    let mut buf = [0u8; 4];
    BigEndian::write_u32(&mut buf, value);
    buf.to_vec()
}

impl Intel {
    pub fn build_data(address: u32, data: impl Into<Vec<u8>>) -> Result<Record<Intel>> {
        Record::new(address, IntelTag::Data, data.into(), Checksum::Auto)
    }

    /// The 20 least significant bits of `address` are dropped.
    pub fn build_extended_segment_address(address: u32) -> Record<Intel> {
        Record::build(0, IntelTag::ExtendedSegmentAddress, be16((address >> 20) as u16))
    }

    pub fn build_start_segment_address(address: u32) -> Record<Intel> {
        Record::build(0, IntelTag::StartSegmentAddress, be32(address))
    }

    pub fn build_end_of_file() -> Record<Intel> {
        Record::build(0, IntelTag::EndOfFile, Vec::new())
    }

    /// The 16 least significant bits of `address` are dropped.
    pub fn build_extended_linear_address(address: u32) -> Record<Intel> {
        Record::build(0, IntelTag::ExtendedLinearAddress, be16((address >> 16) as u16))
    }

    pub fn build_start_linear_address(address: u32) -> Record<Intel> {
        Record::build(0, IntelTag::StartLinearAddress, be32(address))
    }

    /// `[ELA(0), SLA(start), EOF]`.
    pub fn terminate(start: u32) -> Vec<Record<Intel>> {
        vec![
            Self::build_extended_linear_address(0),
            Self::build_start_linear_address(start),
            Self::build_end_of_file(),
        ]
    }
}

impl Format for Intel {
    type Tag     = IntelTag;
    type Framing = IntelFraming;

    const NAME: &'static str = "intel";
    const DEFAULT_COLUMNS: Option<usize> = Some(16);
    const MAX_COLUMNS: usize = 255;
    const LINE_SEP: Option<&'static str> = Some("\n");

    fn compute_count(record: &Record<Self>) -> u32 {
        record.data.len() as u32
    }

    fn compute_checksum(record: &Record<Self>) -> u32 {
        let offset = record.address & 0xFFFF;
        let sum = record.count
            .wrapping_add(offset >> 8)
            .wrapping_add(offset & 0xFF)
            .wrapping_add(record.tag as u32)
            .wrapping_add(sum_bytes(&record.data));
        (0x100 - (sum & 0xFF)) & 0xFF
    }

    fn check(record: &Record<Self>) -> Result<()> {
        if record.endex() > ADDRESS_SPACE {
            return Err(RecordError::SizeOverflow);
        }
        record.check_count(0xFF)?;
        if let Some(len) = record.tag.payload_len() {
            if record.data.len() != len {
                return Err(RecordError::Tag(format!(
                    "{:?} record needs {len} data bytes, found {}",
                    record.tag,
                    record.data.len()
                )));
            }
        }
        record.check_checksum(0xFF)
    }

    fn is_data(record: &Record<Self>) -> bool {
        record.tag == IntelTag::Data
    }

    fn parse_record(line: &str) -> Result<Record<Self>> {
        let body = decode_line(line, ':')?;
        if body.len() < 5 {
            return Err(RecordError::Parse(format!("Intel HEX record too short: {} bytes", body.len())));
        }
        let count = body[0] as u32;
        let address = BigEndian::read_u16(&body[1..3]) as u32;
        let tag = IntelTag::try_from(body[3])?;
        let data = body[4..body.len() - 1].to_vec();
        let checksum = body[body.len() - 1] as u32;

        if data.len() as u32 != count {
            return Err(RecordError::CountMismatch { expected: count, found: data.len() as u32 });
        }
        Record::new(address, tag, data, Checksum::Explicit(checksum))
    }

    fn marshal(record: &Record<Self>) -> Result<Vec<u8>> {
        record.check()?;
        let text = format!(
            ":{:02X}{:04X}{:02X}{}{:02X}",
            record.count,
            record.address & 0xFFFF,
            record.tag as u8,
            hex::encode_upper(&record.data),
            record.effective_checksum(),
        );
        Ok(text.into_bytes())
    }

    fn split(
        data:    &[u8],
        address: u32,
        options: &SplitOptions,
        framing: &IntelFraming,
    ) -> Result<Vec<Record<Self>>> {
        if address as u64 + data.len() as u64 > ADDRESS_SPACE {
            return Err(RecordError::SizeOverflow);
        }
        let columns = options.resolve_columns::<Self>(data.len())?;
        let align_base = if options.align { address as usize % columns } else { 0 };

        let mut records = Vec::with_capacity(data.len() / columns + 4);
        let mut address_old: u64 = 0;
        let mut cursor = address as u64;

        for chunk in chop(data, columns, align_base) {
            let length = chunk.len() as u64;
            let endex = cursor + length;
            let overflow = endex & 0xFFFF;

            if (cursor ^ address_old) & 0xFFFF_0000 != 0 {
                records.push(Self::build_extended_linear_address(cursor as u32));
            }

            if overflow != 0 && (cursor ^ endex) & 0xFFFF_0000 != 0 {
                // The chunk crosses a 64 KiB boundary: cut it there.
                let pivot = (length - overflow) as usize;
                records.push(Record::build(cursor as u32, IntelTag::Data, chunk[..pivot].to_vec()));
                cursor += pivot as u64;
                records.push(Self::build_extended_linear_address(cursor as u32));
                records.push(Record::build(cursor as u32, IntelTag::Data, chunk[pivot..].to_vec()));
                address_old = cursor;
                cursor += overflow;
            } else {
                records.push(Record::build(cursor as u32, IntelTag::Data, chunk.to_vec()));
                address_old = cursor;
                cursor += length;
            }
        }

        if options.standalone {
            records.extend(Self::terminate(framing.start.unwrap_or(address)));
        }
        Ok(records)
    }

    fn build_standalone(
        mut data_records: Vec<Record<Self>>,
        framing:          &IntelFraming,
    ) -> Result<Vec<Record<Self>>> {
        let start = framing.start.unwrap_or_else(|| {
            data_records
                .iter()
                .filter(|r| r.is_data())
                .map(|r| r.address)
                .min()
                .unwrap_or(0)
        });
        data_records.extend(Self::terminate(start));
        Ok(data_records)
    }

    fn readdress(records: &mut [Record<Self>]) {
        let mut base: u32 = 0;
        for record in records.iter_mut() {
            match record.tag {
                IntelTag::ExtendedSegmentAddress | IntelTag::ExtendedLinearAddress => {
                    if let Some(value) = record.data.get(..2).map(BigEndian::read_u16) {
                        base = if record.tag == IntelTag::ExtendedSegmentAddress {
                            (value as u32) << 4
                        } else {
                            (value as u32) << 16
                        };
                    }
                    record.address = base;
                }
                _ => record.address = base.wrapping_add(record.address & 0xFFFF),
            }
        }
    }
}
