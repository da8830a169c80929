use anyhow::Result;
use dumpshard::io::compression::DynRead;
use dumpshard::{Chunk, ConvertError, IndexReader, IndexRecord, plan_chunks};
use std::io::Cursor;

fn records(offsets: &[u64]) -> Vec<dumpshard::Result<IndexRecord>> {
    offsets
        .iter()
        .enumerate()
        .map(|(i, &file_offset)| {
            Ok(IndexRecord {
                file_offset,
                record_id: i as u64 + 1,
                title: format!("T{i}"),
                line: i as u64 + 1,
            })
        })
        .collect()
}

#[test]
fn scenario_two_chunks() -> Result<()> {
    let plan = plan_chunks(records(&[100, 100, 4096]), 5000)?;
    assert_eq!(
        plan.chunks,
        vec![
            Chunk { offset: 100, size: 3996 },
            Chunk { offset: 4096, size: 904 },
        ]
    );
    assert_eq!(plan.record_count, 3);
    Ok(())
}

#[test]
fn single_offset_spans_whole_file() -> Result<()> {
    let plan = plan_chunks(records(&[0, 0, 0]), 1234)?;
    assert_eq!(plan.chunks, vec![Chunk { offset: 0, size: 1234 }]);
    Ok(())
}

#[test]
fn chunks_partition_the_indexed_range() -> Result<()> {
    let offsets = [3u64, 3, 17, 40, 40, 40, 41, 900, 12_000];
    let file_len = 20_000;
    let plan = plan_chunks(records(&offsets), file_len)?;

    assert_eq!(plan.chunks.first().map(|c| c.offset), Some(3));
    assert_eq!(plan.chunks.last().map(Chunk::end), Some(file_len));
    for pair in plan.chunks.windows(2) {
        assert_eq!(pair[0].end(), pair[1].offset);
        assert!(pair[0].size > 0);
    }
    let covered: u64 = plan.chunks.iter().map(|c| c.size).sum();
    assert_eq!(covered, file_len - 3);
    Ok(())
}

#[test]
fn last_offset_at_file_length_is_format_error() {
    let err = plan_chunks(records(&[0, 5000]), 5000).unwrap_err();
    assert!(
        matches!(err, ConvertError::ChunkBeyondEnd { offset: 5000, file_len: 5000 }),
        "{err}"
    );
    assert!(err.is_format_error());
}

#[test]
fn offset_past_end_is_format_error() {
    let err = plan_chunks(records(&[10, 9000]), 5000).unwrap_err();
    assert!(matches!(err, ConvertError::ChunkBeyondEnd { .. }), "{err}");
}

#[test]
fn decreasing_offset_is_rejected() {
    let err = plan_chunks(records(&[100, 200, 150]), 5000).unwrap_err();
    assert!(
        matches!(
            err,
            ConvertError::NonMonotonic { line: 3, offset: 150, previous: 200 }
        ),
        "{err}"
    );
}

#[test]
fn reappearing_earlier_offset_is_rejected() {
    let err = plan_chunks(records(&[100, 200, 100]), 5000).unwrap_err();
    assert!(matches!(err, ConvertError::NonMonotonic { .. }), "{err}");
}

#[test]
fn empty_index_is_rejected() {
    let err = plan_chunks(Vec::<dumpshard::Result<IndexRecord>>::new(), 5000).unwrap_err();
    assert!(matches!(err, ConvertError::EmptyIndex), "{err}");
}

#[test]
fn reader_errors_propagate() {
    let input = vec![
        Ok(IndexRecord {
            file_offset: 0,
            record_id: 1,
            title: "A".into(),
            line: 1,
        }),
        Err(ConvertError::Format {
            line: 2,
            message: "bad".into(),
        }),
    ];
    let err = plan_chunks(input, 100).unwrap_err();
    assert!(matches!(err, ConvertError::Format { line: 2, .. }), "{err}");
}

#[test]
fn non_monotonic_error_names_the_index_line() {
    let reader = IndexReader::from_reader(
        "idx",
        Box::new(Cursor::new(b"100:1:A\n100:2:B\n4096:3:C\n200:4:D\n".to_vec())) as DynRead,
    );
    let err = plan_chunks(reader, 5000).unwrap_err();
    assert!(
        matches!(err, ConvertError::NonMonotonic { line: 4, offset: 200, previous: 4096 }),
        "{err}"
    );
}

#[test]
fn blank_index_line_fails_planning() {
    let reader = IndexReader::from_reader(
        "idx",
        Box::new(Cursor::new(b"100:1:A\n\n   \n4096:3:C\n".to_vec())) as DynRead,
    );
    let err = plan_chunks(reader, 5000).unwrap_err();
    assert!(matches!(err, ConvertError::Format { line: 2, .. }), "{err}");
}
