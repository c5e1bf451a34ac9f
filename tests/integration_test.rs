use hexrec::io_stream::{
    convert_file, load_blocks, load_memory, load_records, merge_files, save_blocks, save_chunk,
    save_memory, save_records, InputFile,
};
use hexrec::report::{SequenceReport, Verdict};
use hexrec::{Block, FormatId, RecordError, RecordSeq, Registry, SparseMemory, SplitOptions};
use std::fs;
use tempfile::tempdir;

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + 3) as u8).collect()
}

#[test]
fn test_convert_chain_preserves_data() {
    let dir = tempdir().unwrap();
    let hex = dir.path().join("fw.hex");
    let srec = dir.path().join("fw.s19");
    let mos = dir.path().join("fw.mos");
    let bin = dir.path().join("fw.bin");
    let data = payload(300);

    save_chunk(&hex, &data, 0x8000, None, &SplitOptions::default()).unwrap();
    let expected = vec![Block::new(0x8000, data.clone())];
    assert_eq!(load_blocks(&hex, None).unwrap(), expected);

    convert_file(&InputFile::new(&hex), &srec, None, &SplitOptions::default()).unwrap();
    assert_eq!(load_blocks(&srec, None).unwrap(), expected);

    convert_file(&InputFile::new(&srec), &mos, None, &SplitOptions::default()).unwrap();
    assert_eq!(load_blocks(&mos, None).unwrap(), expected);

    convert_file(&InputFile::new(&mos), &bin, None, &SplitOptions::default()).unwrap();
    assert_eq!(fs::read(&bin).unwrap(), data);

    let rebased = InputFile::new(&bin).with_offset(0x8000);
    assert_eq!(rebased.load_blocks().unwrap(), expected);
}

#[test]
fn test_intel_output_above_64k() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("high.hex");
    let data = payload(100);

    save_chunk(&path, &data, 0x0001_FFE0, None, &SplitOptions::default()).unwrap();
    let text = fs::read_to_string(&path).unwrap();
    assert!(text.starts_with(":020000040001F9\n"));
    assert!(text.contains(":020000040002F8\n"));
    assert!(text.ends_with(":00000001FF\n"));

    assert_eq!(load_blocks(&path, None).unwrap(), vec![Block::new(0x0001_FFE0, data)]);
    let report = SequenceReport::scan(&load_records(&path, None).unwrap());
    assert!(report.is_valid(), "{}", report.summary());
}

#[test]
fn test_merge_later_file_wins() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.hex");
    let b = dir.path().join("b.srec");
    let out = dir.path().join("merged.hex");

    save_chunk(&a, &[0xAA; 16], 0, None, &SplitOptions::default()).unwrap();
    save_chunk(&b, &[0xBB; 16], 8, None, &SplitOptions::default()).unwrap();

    let inputs = vec![InputFile::new(&a), InputFile::new(&b)];
    merge_files(&inputs, &out, None, &SplitOptions::default()).unwrap();

    let mut expected = vec![0xAA; 8];
    expected.extend([0xBB; 16]);
    assert_eq!(load_blocks(&out, None).unwrap(), vec![Block::new(0, expected)]);

    let reversed = vec![InputFile::new(&b), InputFile::new(&a)];
    merge_files(&reversed, &out, None, &SplitOptions::default()).unwrap();
    let mut expected = vec![0xAA; 16];
    expected.extend([0xBB; 8]);
    assert_eq!(load_blocks(&out, None).unwrap(), vec![Block::new(0, expected)]);
}

#[test]
fn test_merge_keeps_gaps() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.mot");
    let b = dir.path().join("b.mot");
    let out = dir.path().join("out.mot");

    save_chunk(&a, b"low", 0x100, None, &SplitOptions::default()).unwrap();
    save_chunk(&b, b"high", 0x0100_0000, None, &SplitOptions::default()).unwrap();
    merge_files(&[InputFile::new(&a), InputFile::new(&b)], &out, None, &SplitOptions::default()).unwrap();

    assert_eq!(
        load_blocks(&out, None).unwrap(),
        vec![Block::new(0x100, b"low".to_vec()), Block::new(0x0100_0000, b"high".to_vec())]
    );
    let records = load_records(&out, None).unwrap();
    assert!(records.check_sequence().is_ok());
    let text = fs::read_to_string(&out).unwrap();
    assert!(text.lines().filter(|l| l.starts_with("S3")).count() == 2);
    assert!(text.lines().last().unwrap().starts_with("S7"));
}

#[test]
fn test_merge_to_binary_fills_gaps() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.hex");
    let b = dir.path().join("b.hex");
    let out = dir.path().join("o.bin");

    save_chunk(&a, &[1, 2, 3, 4], 0x8000, None, &SplitOptions::default()).unwrap();
    save_chunk(&b, &[5, 6, 7, 8], 0x8010, None, &SplitOptions::default()).unwrap();
    merge_files(&[InputFile::new(&a), InputFile::new(&b)], &out, None, &SplitOptions::default()).unwrap();

    let mut expected = vec![1, 2, 3, 4];
    expected.extend([0xFF; 12]);
    expected.extend([5, 6, 7, 8]);
    assert_eq!(fs::read(&out).unwrap(), expected);

    let reloaded = InputFile::new(&out).with_offset(0x8000).load_blocks().unwrap();
    assert_eq!(reloaded, vec![Block::new(0x8000, expected)]);
    assert_eq!(reloaded[0].data[0x10..], [5, 6, 7, 8]);
}

#[test]
fn test_registered_extension_reaches_file_api() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("boot.rom");
    let blocks = vec![Block::new(0x100, b"boot".to_vec())];

    assert!(matches!(
        save_blocks(&path, &blocks, None, &SplitOptions::default()),
        Err(RecordError::UnsupportedExtension(_))
    ));

    let mut registry = Registry::default();
    registry.register(".rom", FormatId::Motorola);
    registry.save_blocks(&path, &blocks, None, &SplitOptions::default()).unwrap();
    assert!(fs::read_to_string(&path).unwrap().starts_with("S0"));
    assert_eq!(registry.load_blocks(&path, None).unwrap(), blocks);
    assert_eq!(registry.load_records(&path, None).unwrap().format(), FormatId::Motorola);

    let copy = dir.path().join("copy.rom");
    registry.convert_file(&InputFile::new(&path), &copy, None, &SplitOptions::default()).unwrap();
    assert_eq!(InputFile::new(&copy).load_blocks_in(&registry).unwrap(), blocks);
}

#[test]
fn test_check_reports_corrupted_records() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.hex");
    fs::write(
        &path,
        ":0400100001020304E2\n:0400140005060708D0\n:00000001FF\n",
    )
    .unwrap();

    let records = load_records(&path, None).unwrap();
    assert_eq!(records.format(), FormatId::Intel);
    let report = SequenceReport::scan(&records);
    assert_eq!(report.verdict, Verdict::CorruptRecords);
    assert_eq!(report.corrupted, vec![1]);
}

#[test]
fn test_save_records_same_and_other_format() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src.hex");
    let copy = dir.path().join("copy.hex");
    let other = dir.path().join("other.s37");

    save_chunk(&src, &payload(40), 0x400, None, &SplitOptions::default()).unwrap();
    let records = load_records(&src, None).unwrap();

    save_records(&copy, &records, None, &SplitOptions::default()).unwrap();
    assert_eq!(fs::read(&copy).unwrap(), fs::read(&src).unwrap());

    save_records(&other, &records, None, &SplitOptions::default()).unwrap();
    let converted = load_records(&other, None).unwrap();
    assert!(matches!(converted, RecordSeq::Motorola(_)));
    assert_eq!(converted.to_blocks(), records.to_blocks());
}

#[test]
fn test_memory_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("image.hex");

    let mut memory = SparseMemory::new();
    memory.write(0x1000, payload(64)).unwrap();
    memory.write(0x2000, b"tail".to_vec()).unwrap();
    save_memory(&path, &memory, None, &SplitOptions { columns: Some(32), ..Default::default() }).unwrap();

    let loaded = load_memory(&path, None).unwrap();
    assert_eq!(loaded, memory);
    assert_eq!(loaded.read(0x2000, 4).unwrap(), b"tail");
}

#[test]
fn test_explicit_format_overrides_extension() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("data.txt");

    assert!(matches!(
        save_blocks(&path, &[Block::new(0, vec![1, 2, 3])], None, &SplitOptions::default()),
        Err(RecordError::UnsupportedExtension(_))
    ));
    save_blocks(&path, &[Block::new(0, vec![1, 2, 3])], Some(FormatId::Mos), &SplitOptions::default()).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), ";0300000102030009\n;0000010001\n");
    assert_eq!(load_blocks(&path, Some(FormatId::Mos)).unwrap(), vec![Block::new(0, vec![1, 2, 3])]);
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempdir().unwrap();
    assert!(matches!(
        load_blocks(dir.path().join("absent.hex"), None),
        Err(RecordError::Io(_))
    ));
}
