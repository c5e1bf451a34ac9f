//! Motorola S-record.
//!
//! Each line is `Stcc[address][data]ss`.  The tag digit `t` fixes the width of
//! the address field (see [`MotorolaTag::address_length`]), `cc` counts the
//! address, data and checksum bytes, and `ss` is the one's complement of the
//! low byte of the sum of every byte after the tag.
//!
//! A standalone sequence is one header, data records sharing one data tag, a
//! count record, then the start record matching the data tag.

use crate::error::{RecordError, Result, SequenceError};
use crate::range::{chop, ADDRESS_SPACE};
use crate::record::{be_value, check_order, sum_bytes, Checksum, Format, Record, SplitOptions};

// ── Tags ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum MotorolaTag {
    Header   = 0,
    Data16   = 1,
    Data24   = 2,
    Data32   = 3,
    Reserved = 4,
    Count16  = 5,
    Count24  = 6,
    Start32  = 7,
    Start24  = 8,
    Start16  = 9,
}

impl MotorolaTag {
    /// Width of the address field, in bytes.
    pub fn address_length(self) -> usize {
        const LENGTHS: [usize; 10] = [2, 2, 3, 4, 0, 0, 0, 4, 3, 2];
        LENGTHS[self as usize]
    }

    pub fn is_data(self) -> bool {
        matches!(self, MotorolaTag::Data16 | MotorolaTag::Data24 | MotorolaTag::Data32)
    }

    pub fn is_start(self) -> bool {
        matches!(self, MotorolaTag::Start16 | MotorolaTag::Start24 | MotorolaTag::Start32)
    }

    pub fn is_count(self) -> bool {
        matches!(self, MotorolaTag::Count16 | MotorolaTag::Count24)
    }

    /// The data tag a start tag terminates.
    pub fn matching_data_tag(self) -> Option<MotorolaTag> {
        match self {
            MotorolaTag::Start32 => Some(MotorolaTag::Data32),
            MotorolaTag::Start24 => Some(MotorolaTag::Data24),
            MotorolaTag::Start16 => Some(MotorolaTag::Data16),
            _ => None,
        }
    }

    /// The start tag terminating a data tag.
    pub fn start_tag(self) -> Option<MotorolaTag> {
        match self {
            MotorolaTag::Data32 => Some(MotorolaTag::Start32),
            MotorolaTag::Data24 => Some(MotorolaTag::Start24),
            MotorolaTag::Data16 => Some(MotorolaTag::Start16),
            _ => None,
        }
    }
}

impl TryFrom<u8> for MotorolaTag {
    type Error = RecordError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(MotorolaTag::Header),
            1 => Ok(MotorolaTag::Data16),
            2 => Ok(MotorolaTag::Data24),
            3 => Ok(MotorolaTag::Data32),
            4 => Ok(MotorolaTag::Reserved),
            5 => Ok(MotorolaTag::Count16),
            6 => Ok(MotorolaTag::Count24),
            7 => Ok(MotorolaTag::Start32),
            8 => Ok(MotorolaTag::Start24),
            9 => Ok(MotorolaTag::Start16),
            other => Err(RecordError::Tag(format!("unknown S-record type {other}"))),
        }
    }
}

// ── Framing ──────────────────────────────────────────────────────────────────

/// Framing for standalone S-record output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MotorolaFraming {
    /// Start address.  Defaults to the split address, or the lowest data
    /// address when wrapping existing records.
    pub start:  Option<u32>,
    /// Data tag for every data record.  Defaults to the narrowest tag that
    /// fits.
    pub tag:    Option<MotorolaTag>,
    /// Header payload.
    pub header: Vec<u8>,
}

// ── Format ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Motorola;

impl Motorola {
    /// Narrowest data tag able to address up to `endex` (exclusive).
    pub fn fit_data_tag(endex: u64) -> Result<MotorolaTag> {
        if endex <= 1 << 16 {
            Ok(MotorolaTag::Data16)
        } else if endex <= 1 << 24 {
            Ok(MotorolaTag::Data24)
        } else if endex <= ADDRESS_SPACE {
            Ok(MotorolaTag::Data32)
        } else {
            Err(RecordError::AddressOverflow)
        }
    }

    /// Narrowest count tag able to hold `count`.
    pub fn fit_count_tag(count: u64) -> Result<MotorolaTag> {
        if count < 1 << 16 {
            Ok(MotorolaTag::Count16)
        } else if count < 1 << 24 {
            Ok(MotorolaTag::Count24)
        } else {
            Err(RecordError::CountOverflow(count))
        }
    }

    pub fn build_header(data: impl Into<Vec<u8>>) -> Record<Motorola> {
        Record::build(0, MotorolaTag::Header, data.into())
    }

    /// Data record with an explicit data tag, or the narrowest one fitting
    /// the record when `tag` is `None`.
    pub fn build_data(
        address: u32,
        data:    impl Into<Vec<u8>>,
        tag:     Option<MotorolaTag>,
    ) -> Result<Record<Motorola>> {
        let data = data.into();
        let tag = match tag {
            Some(tag) if tag.is_data() => tag,
            Some(tag) => return Err(RecordError::Tag(format!("{tag:?} is not a data tag"))),
            None => Self::fit_data_tag(address as u64 + data.len() as u64)?,
        };
        Record::new(address, tag, data, Checksum::Auto)
    }

    /// Start record terminating data records tagged `data_tag`.
    pub fn build_terminator(start: u32, data_tag: MotorolaTag) -> Result<Record<Motorola>> {
        let tag = data_tag
            .start_tag()
            .ok_or_else(|| RecordError::Tag(format!("{data_tag:?} is not a data tag")))?;
        Record::new(start, tag, Vec::new(), Checksum::Auto)
    }

    /// Count record holding `count`, as 16 or 24 bits.
    pub fn build_count(count: u64) -> Result<Record<Motorola>> {
        let tag = Self::fit_count_tag(count)?;
        let bytes = (count as u32).to_be_bytes();
        let data = match tag {
            MotorolaTag::Count16 => bytes[2..].to_vec(),
            _                    => bytes[1..].to_vec(),
        };
        Ok(Record::build(0, tag, data))
    }

    /// Re-tag a whole sequence after its contents changed: every data record
    /// gets the narrowest common data tag, start records follow it, and a
    /// 16-bit count record is widened when the count no longer fits.
    pub fn fix_tags(records: &mut [Record<Motorola>]) -> Result<()> {
        let max_endex = records.iter().map(Record::endex).max().unwrap_or(0);
        let tag = Self::fit_data_tag(max_endex)?;
        let mut start_ids = Vec::new();
        let mut has_data = false;

        for (index, record) in records.iter_mut().enumerate() {
            if record.tag == MotorolaTag::Count16 {
                let count = be_value(&record.data);
                if count >= 1 << 16 {
                    record.tag = MotorolaTag::Count24;
                    record.data = (count as u32).to_be_bytes()[1..].to_vec();
                    record.update_count();
                    record.update_checksum();
                }
            } else if record.is_data() {
                record.tag = tag;
                record.update_count();
                record.update_checksum();
                has_data = true;
            } else if record.tag.is_start() {
                start_ids.push(index);
            }
        }

        let data_tag = if has_data { tag } else { MotorolaTag::Data16 };
        if let Some(start_tag) = data_tag.start_tag() {
            for index in start_ids {
                let record = &mut records[index];
                record.tag = start_tag;
                record.update_count();
                record.update_checksum();
            }
        }
        Ok(())
    }
}

impl Format for Motorola {
    type Tag     = MotorolaTag;
    type Framing = MotorolaFraming;

    const NAME: &'static str = "motorola";
    const DEFAULT_COLUMNS: Option<usize> = Some(16);
    const MAX_COLUMNS: usize = 128;
    const LINE_SEP: Option<&'static str> = Some("\n");

    fn compute_count(record: &Record<Self>) -> u32 {
        (record.tag.address_length() + record.data.len() + 1) as u32
    }

    fn compute_checksum(record: &Record<Self>) -> u32 {
        let sum = record.count
            .wrapping_add(sum_bytes(&record.address.to_be_bytes()))
            .wrapping_add(sum_bytes(&record.data));
        (sum & 0xFF) ^ 0xFF
    }

    fn check(record: &Record<Self>) -> Result<()> {
        let tag = record.tag;
        if matches!(tag, MotorolaTag::Header | MotorolaTag::Reserved) || tag.is_count() {
            if record.address != 0 {
                return Err(RecordError::AddressField(format!(
                    "{tag:?} record needs address 0, found {:#x}",
                    record.address
                )));
            }
        }
        let address_length = tag.address_length();
        if address_length < 4 && (record.address as u64) >> (8 * address_length) != 0 {
            return Err(RecordError::AddressOverflow);
        }
        if record.endex() > ADDRESS_SPACE {
            return Err(RecordError::SizeOverflow);
        }
        record.check_count(0xFF)?;
        record.check_checksum(0xFF)
    }

    fn is_data(record: &Record<Self>) -> bool {
        record.tag.is_data()
    }

    fn parse_record(line: &str) -> Result<Record<Self>> {
        let line = line.trim();
        let rest = line
            .strip_prefix('S')
            .ok_or_else(|| RecordError::Parse("missing 'S' record mark".to_string()))?;
        let digit = rest
            .chars()
            .next()
            .and_then(|c| c.to_digit(10))
            .ok_or_else(|| RecordError::Parse(format!("bad S-record type in {line:?}")))?;
        let tag = MotorolaTag::try_from(digit as u8)?;
        let body = hex::decode(&rest[1..]).map_err(|e| RecordError::Parse(e.to_string()))?;

        if body.len() < 4 {
            return Err(RecordError::Parse(format!("S-record too short: {} bytes", body.len())));
        }
        let count = body[0] as u32;
        let found = (body.len() - 1) as u32;
        if count != found {
            return Err(RecordError::CountMismatch { expected: count, found });
        }
        let address_length = tag.address_length();
        if body.len() < address_length + 2 {
            return Err(RecordError::Parse(format!("{tag:?} address field truncated")));
        }
        let address = be_value(&body[1..1 + address_length]) as u32;
        let data = body[1 + address_length..body.len() - 1].to_vec();
        let checksum = body[body.len() - 1] as u32;

        Record::new(address, tag, data, Checksum::Explicit(checksum))
    }

    fn marshal(record: &Record<Self>) -> Result<Vec<u8>> {
        record.check()?;
        let width = 2 * record.tag.address_length();
        let address = if width > 0 {
            format!("{:0width$X}", record.address, width = width)
        } else {
            String::new()
        };
        let text = format!(
            "S{}{:02X}{}{}{:02X}",
            record.tag as u8,
            record.count,
            address,
            hex::encode_upper(&record.data),
            record.effective_checksum(),
        );
        Ok(text.into_bytes())
    }

    fn split(
        data:    &[u8],
        address: u32,
        options: &SplitOptions,
        framing: &MotorolaFraming,
    ) -> Result<Vec<Record<Self>>> {
        let endex = address as u64 + data.len() as u64;
        if endex > ADDRESS_SPACE {
            return Err(RecordError::SizeOverflow);
        }
        let columns = options.resolve_columns::<Self>(data.len())?;
        let tag = match framing.tag {
            Some(tag) if tag.is_data() => tag,
            Some(tag) => return Err(RecordError::Tag(format!("{tag:?} is not a data tag"))),
            None => Self::fit_data_tag(endex)?,
        };
        let align_base = if options.align { address as usize % columns } else { 0 };

        let mut records = Vec::with_capacity(data.len() / columns + 4);
        if options.standalone {
            records.push(Self::build_header(framing.header.clone()));
        }

        let mut cursor = address;
        let mut data_count: u64 = 0;
        for chunk in chop(data, columns, align_base) {
            records.push(Record::build(cursor, tag, chunk.to_vec()));
            cursor = cursor.wrapping_add(chunk.len() as u32);
            data_count += 1;
        }

        if options.standalone {
            records.push(Self::build_count(data_count)?);
            records.push(Self::build_terminator(framing.start.unwrap_or(address), tag)?);
        }
        Ok(records)
    }

    fn build_standalone(
        data_records: Vec<Record<Self>>,
        framing:      &MotorolaFraming,
    ) -> Result<Vec<Record<Self>>> {
        let tag = match framing.tag {
            Some(tag) if tag.is_data() => tag,
            Some(tag) => return Err(RecordError::Tag(format!("{tag:?} is not a data tag"))),
            None => data_records
                .iter()
                .filter(|r| r.is_data())
                .map(|r| r.tag)
                .max()
                .unwrap_or(MotorolaTag::Data16),
        };
        let start = framing.start.unwrap_or_else(|| {
            data_records
                .iter()
                .filter(|r| r.is_data())
                .map(|r| r.address)
                .min()
                .unwrap_or(0)
        });

        let mut records = Vec::with_capacity(data_records.len() + 3);
        records.push(Self::build_header(framing.header.clone()));

        let mut data_count: u64 = 0;
        for mut record in data_records {
            if record.is_data() {
                if record.tag != tag {
                    record.tag = tag;
                    record.update_count();
                    record.update_checksum();
                }
                data_count += 1;
            }
            records.push(record);
        }

        records.push(Self::build_count(data_count)?);
        records.push(Self::build_terminator(start, tag)?);
        Ok(records)
    }

    fn check_layout(records: &[Record<Self>]) -> Result<()> {
        check_order(records)?;

        let mut header_found = false;
        let mut count_found = false;
        let mut first_tag: Option<MotorolaTag> = None;
        let mut data_count: u64 = 0;
        let mut terminal = None;
        let mut iter = records.iter();

        for record in iter.by_ref() {
            let tag = record.tag;
            if tag == MotorolaTag::Header {
                if header_found {
                    return Err(SequenceError::DuplicateHeader.into());
                }
                header_found = true;
            } else if tag.is_data() {
                match first_tag {
                    None => first_tag = Some(tag),
                    Some(first) if first != tag => {
                        return Err(SequenceError::DataTag { expected: first as u8, found: tag as u8 }.into());
                    }
                    Some(_) => {}
                }
                data_count += 1;
            } else if tag.is_count() {
                if count_found {
                    return Err(SequenceError::MisplacedCount.into());
                }
                count_found = true;
                let declared = be_value(&record.data);
                if declared != data_count {
                    return Err(SequenceError::RecordCount { expected: data_count, found: declared }.into());
                }
            } else {
                terminal = Some(record);
                break;
            }
        }

        if !count_found {
            return Err(SequenceError::MissingCount.into());
        }
        if !header_found {
            return Err(SequenceError::MissingHeader.into());
        }
        let terminal = terminal.ok_or(SequenceError::MissingStart)?;
        let matching = terminal
            .tag
            .matching_data_tag()
            .ok_or(SequenceError::StartTag(terminal.tag as u8))?;
        if let Some(first) = first_tag {
            if first != matching {
                return Err(SequenceError::MatchingTag { expected: matching as u8, found: first as u8 }.into());
            }
        }
        if iter.next().is_some() {
            return Err(SequenceError::TrailingRecords.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(record: &Record<Motorola>) -> String {
        record.to_text().unwrap()
    }

    fn standalone(data: &[u8], address: u32) -> Vec<Record<Motorola>> {
        Motorola::split(data, address, &SplitOptions::default(), &MotorolaFraming::default()).unwrap()
    }

    fn sequence_error(records: &[Record<Motorola>]) -> SequenceError {
        match Motorola::check_sequence(records) {
            Err(RecordError::Sequence(err)) => err,
            other => panic!("expected a sequence error, got {other:?}"),
        }
    }

    #[test]
    fn builder_lines() {
        let data = Motorola::build_data(0x1234, b"Hello, World!".to_vec(), None).unwrap();
        assert_eq!(text(&data), "S110123448656C6C6F2C20576F726C642140");
        assert_eq!(text(&Motorola::build_count(0x1234).unwrap()), "S5031234B6");
        assert_eq!(text(&Motorola::build_header(b"HDR".to_vec())), "S00600004844521B");
        assert_eq!(
            text(&Motorola::build_terminator(0x1234, MotorolaTag::Data16).unwrap()),
            "S9031234B6"
        );
    }

    #[test]
    fn fit_tags() {
        assert_eq!(Motorola::fit_data_tag(0x10000).unwrap(), MotorolaTag::Data16);
        assert_eq!(Motorola::fit_data_tag(0x10001).unwrap(), MotorolaTag::Data24);
        assert_eq!(Motorola::fit_data_tag(1 << 32).unwrap(), MotorolaTag::Data32);
        assert!(matches!(Motorola::fit_data_tag((1 << 32) + 1), Err(RecordError::AddressOverflow)));

        assert_eq!(Motorola::fit_count_tag(0xFFFF).unwrap(), MotorolaTag::Count16);
        assert_eq!(Motorola::fit_count_tag(0x10000).unwrap(), MotorolaTag::Count24);
        assert!(matches!(Motorola::fit_count_tag(1 << 24), Err(RecordError::CountOverflow(_))));
        assert_eq!(Motorola::build_count(0x123456).unwrap().data, vec![0x12, 0x34, 0x56]);
    }

    #[test]
    fn build_data_rejects_non_data_tag() {
        assert!(matches!(
            Motorola::build_data(0, vec![1], Some(MotorolaTag::Header)),
            Err(RecordError::Tag(_))
        ));
        let wide = Motorola::build_data(0x10, vec![1], Some(MotorolaTag::Data32)).unwrap();
        assert_eq!(text(&wide), "S3060000001001E8");
    }

    #[test]
    fn parse_round_trip() {
        for line in [
            "S110123448656C6C6F2C20576F726C642140",
            "S3060000001001E8",
            "S5031234B6",
            "S9031234B6",
        ] {
            let record = Record::<Motorola>::parse(line).unwrap();
            record.check().unwrap();
            assert_eq!(text(&record), line);
        }
    }

    #[test]
    fn parse_rejects_bad_lines() {
        assert!(matches!(Record::<Motorola>::parse("X1031234B6"), Err(RecordError::Parse(_))));
        assert!(matches!(Record::<Motorola>::parse("SX031234B6"), Err(RecordError::Parse(_))));
        assert!(matches!(Record::<Motorola>::parse("S503B6"), Err(RecordError::Parse(_))));
        assert!(matches!(
            Record::<Motorola>::parse("S5041234B6"),
            Err(RecordError::CountMismatch { expected: 4, found: 3 })
        ));
        assert!(matches!(Record::<Motorola>::parse("S3030000FC"), Err(RecordError::Parse(_))));
    }

    #[test]
    fn check_address_rules() {
        let mut header = Motorola::build_header(Vec::new());
        header.address = 1;
        header.update_checksum();
        assert!(matches!(header.check(), Err(RecordError::AddressField(_))));

        let mut data = Motorola::build_data(0xFFFF, vec![1], None).unwrap();
        data.address = 0x10000;
        data.update_checksum();
        assert!(matches!(data.check(), Err(RecordError::AddressOverflow)));
    }

    #[test]
    fn split_standalone_layout() {
        let records = standalone(&[0xAA; 20], 0x100);
        let tags: Vec<MotorolaTag> = records.iter().map(|r| r.tag).collect();
        assert_eq!(tags, vec![
            MotorolaTag::Header,
            MotorolaTag::Data16,
            MotorolaTag::Data16,
            MotorolaTag::Count16,
            MotorolaTag::Start16,
        ]);
        assert_eq!(records[3].data, vec![0x00, 0x02]);
        assert_eq!(records[4].address, 0x100);
        Motorola::check_sequence(&records).unwrap();

        let high = standalone(&[0xAA; 4], 0x0100_0000);
        assert_eq!(high[1].tag, MotorolaTag::Data32);
        assert_eq!(high[3].tag, MotorolaTag::Start32);
    }

    #[test]
    fn sequence_grammar_errors() {
        let good = standalone(&[0x55; 40], 0x2000);
        Motorola::check_sequence(&good).unwrap();

        let mut no_count = good.clone();
        no_count.retain(|r| !r.tag.is_count());
        assert_eq!(sequence_error(&no_count), SequenceError::MissingCount);

        assert_eq!(sequence_error(&good[1..]), SequenceError::MissingHeader);

        let mut twice = good.clone();
        twice.insert(1, Motorola::build_header(Vec::new()));
        assert_eq!(sequence_error(&twice), SequenceError::DuplicateHeader);

        let mut wrong_count = good.clone();
        let count_at = wrong_count.len() - 2;
        wrong_count[count_at] = Motorola::build_count(7).unwrap();
        assert_eq!(sequence_error(&wrong_count), SequenceError::RecordCount { expected: 3, found: 7 });

        let mut mixed = good.clone();
        mixed[2] = Motorola::build_data(mixed[2].address, mixed[2].data.clone(), Some(MotorolaTag::Data24)).unwrap();
        assert_eq!(sequence_error(&mixed), SequenceError::DataTag { expected: 1, found: 2 });

        let mut unmatched = good.clone();
        let last = unmatched.len() - 1;
        unmatched[last] = Motorola::build_terminator(0x2000, MotorolaTag::Data24).unwrap();
        assert_eq!(sequence_error(&unmatched), SequenceError::MatchingTag { expected: 2, found: 1 });

        let unterminated = &good[..good.len() - 1];
        assert_eq!(sequence_error(unterminated), SequenceError::MissingStart);

        let mut trailing = good.clone();
        trailing.push(Motorola::build_terminator(0, MotorolaTag::Data16).unwrap());
        assert_eq!(sequence_error(&trailing), SequenceError::TrailingRecords);

        let mut reserved = good.clone();
        reserved[last] = Record::new(0, MotorolaTag::Reserved, Vec::new(), Checksum::Auto).unwrap();
        assert_eq!(sequence_error(&reserved), SequenceError::StartTag(4));
    }

    #[test]
    fn empty_sequence_skips_matching_tag() {
        let records = standalone(&[], 0);
        assert_eq!(records.len(), 3);
        Motorola::check_sequence(&records).unwrap();
    }

    #[test]
    fn build_standalone_retags_to_widest() {
        let data = vec![
            Motorola::build_data(0x10, vec![1, 2], None).unwrap(),
            Motorola::build_data(0x20000, vec![3, 4], None).unwrap(),
        ];
        let records = Motorola::build_standalone(data, &MotorolaFraming::default()).unwrap();
        assert!(records[1..3].iter().all(|r| r.tag == MotorolaTag::Data24));
        assert_eq!(records[1].count, 3 + 2 + 1);
        assert_eq!(records.last().unwrap().tag, MotorolaTag::Start24);
        assert_eq!(records.last().unwrap().address, 0x10);
        Motorola::check_sequence(&records).unwrap();
    }

    #[test]
    fn fix_tags_widens_after_edit() {
        let mut records = standalone(&[0x11; 4], 0xFF00);
        records[1].address = 0x0100_0000;
        assert!(matches!(records[1].check(), Err(RecordError::AddressOverflow)));

        Motorola::fix_tags(&mut records).unwrap();
        assert_eq!(records[1].tag, MotorolaTag::Data32);
        assert_eq!(records.last().unwrap().tag, MotorolaTag::Start32);
        Motorola::check_sequence(&records).unwrap();
    }

    #[test]
    fn fix_tags_widens_count() {
        let mut records = vec![
            Motorola::build_header(Vec::new()),
            Record::new(0, MotorolaTag::Count16, vec![0x01, 0x00, 0x00], Checksum::Auto).unwrap(),
        ];
        Motorola::fix_tags(&mut records).unwrap();
        assert_eq!(records[1].tag, MotorolaTag::Count24);
        assert_eq!(records[1].data, vec![0x01, 0x00, 0x00]);
        records[1].check().unwrap();
    }
}
