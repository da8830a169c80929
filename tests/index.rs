use anyhow::Result;
use dumpshard::io::compression::DynRead;
use dumpshard::testing::write_index;
use dumpshard::{ConvertError, IndexReader, IndexRecord, parse_index_line};

fn reader_over(text: &str) -> IndexReader {
    let bytes = text.as_bytes().to_vec();
    IndexReader::from_reader("mem", Box::new(std::io::Cursor::new(bytes)) as DynRead)
}

#[test]
fn parses_basic_line() -> Result<()> {
    let rec = parse_index_line(b"616:10:AccessibleComputing\n", 1)?;
    assert_eq!(
        rec,
        IndexRecord {
            file_offset: 616,
            record_id: 10,
            title: "AccessibleComputing".into(),
            line: 1,
        }
    );
    Ok(())
}

#[test]
fn title_may_contain_colons() -> Result<()> {
    let rec = parse_index_line(b"100:42:Wikipedia:Village pump: archive\r\n", 3)?;
    assert_eq!(rec.file_offset, 100);
    assert_eq!(rec.record_id, 42);
    assert_eq!(rec.title, "Wikipedia:Village pump: archive");
    Ok(())
}

#[test]
fn empty_title_is_allowed() -> Result<()> {
    let rec = parse_index_line(b"5:6:", 1)?;
    assert_eq!(rec.title, "");
    Ok(())
}

#[test]
fn missing_second_colon_is_format_error() {
    let err = parse_index_line(b"100:42\n", 7).unwrap_err();
    assert!(matches!(err, ConvertError::Format { line: 7, .. }), "{err}");
    assert!(err.is_format_error());
}

#[test]
fn non_numeric_fields_are_format_errors() {
    for line in [&b"abc:1:T"[..], b"1:x:T", b":1:T", b"1::T", b"-1:1:T"] {
        let err = parse_index_line(line, 2).unwrap_err();
        assert!(matches!(err, ConvertError::Format { line: 2, .. }), "{err}");
    }
}

#[test]
fn reader_preserves_order_and_line_numbers() -> Result<()> {
    let records: Vec<IndexRecord> =
        reader_over("100:1:A\n100:2:B\n4096:3:C\n").collect::<dumpshard::Result<_>>()?;
    let ids: Vec<u64> = records.iter().map(|r| r.record_id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(records[2].file_offset, 4096);
    assert_eq!(records.iter().map(|r| r.line).collect::<Vec<_>>(), vec![1, 2, 3]);
    Ok(())
}

#[test]
fn blank_line_is_format_error() {
    let mut reader = reader_over("100:1:A\n\n4096:3:C\n");
    assert!(reader.next().unwrap().is_ok());
    let err = reader.next().unwrap().unwrap_err();
    assert!(matches!(err, ConvertError::Format { line: 2, .. }), "{err}");
    assert!(reader.next().is_none());
}

#[test]
fn whitespace_only_line_is_format_error() {
    let err = reader_over("1:1:A\n   \n2:3:C\n")
        .collect::<dumpshard::Result<Vec<_>>>()
        .unwrap_err();
    assert!(matches!(err, ConvertError::Format { line: 2, .. }), "{err}");
}

#[test]
fn single_empty_line_at_end_is_tolerated() -> Result<()> {
    let records: Vec<IndexRecord> =
        reader_over("1:1:A\n2:2:B\n\n").collect::<dumpshard::Result<_>>()?;
    assert_eq!(records.len(), 2);

    let err = reader_over("1:1:A\n\n\n")
        .collect::<dumpshard::Result<Vec<_>>>()
        .unwrap_err();
    assert!(matches!(err, ConvertError::Format { line: 2, .. }), "{err}");
    Ok(())
}

#[test]
fn reader_reports_physical_line_number_and_stops() {
    let mut reader = reader_over("1:1:A\n2:2:B\n1:2\n2:3:C\n");
    assert!(reader.next().unwrap().is_ok());
    assert!(reader.next().unwrap().is_ok());
    let err = reader.next().unwrap().unwrap_err();
    assert!(matches!(err, ConvertError::Format { line: 3, .. }), "{err}");
    assert!(reader.next().is_none());
}

#[test]
fn reads_bzip2_index_from_disk() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("index.txt.bz2");
    write_index(&path, "10:1:One\n10:2:Two\n99:3:Three\n")?;

    let mut reader = IndexReader::open(&path)?;
    let titles: Vec<String> = reader
        .by_ref()
        .map(|r| r.map(|r| r.title))
        .collect::<dumpshard::Result<_>>()?;
    assert_eq!(titles, vec!["One", "Two", "Three"]);
    assert_eq!(reader.lines_read(), 3);
    Ok(())
}

#[test]
fn reads_plain_index_from_disk() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("index.txt");
    std::fs::write(&path, "7:1:Plain\n")?;
    let records: Vec<IndexRecord> = IndexReader::open(&path)?.collect::<dumpshard::Result<_>>()?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].title, "Plain");
    Ok(())
}

#[test]
fn missing_index_is_io_error() {
    let err = IndexReader::open("/definitely/not/here.txt.bz2")
        .err()
        .expect("open should fail");
    assert!(matches!(err, ConvertError::Io { .. }), "{err}");
}
