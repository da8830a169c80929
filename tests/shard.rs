use anyhow::Result;
use dumpshard::shard::{final_name, provisional_name};
use dumpshard::testing::{list_shards, read_all_shards, read_shard, shard_row_groups};
use dumpshard::{Batches, ConvertError, RawRecord, ShardCompression, ShardWriter, SplitSize};

fn records(n: usize, body_len: usize) -> Vec<RawRecord> {
    (0..n)
        .map(|i| RawRecord::from(format!("<page><id>{i}</id>{}</page>", "x".repeat(body_len))))
        .collect()
}

fn batches(records: Vec<RawRecord>, size: usize) -> Vec<Vec<RawRecord>> {
    Batches::new(records.into_iter().map(Ok), size)
        .collect::<dumpshard::Result<_>>()
        .unwrap()
}

#[test]
fn split_size_units() -> Result<()> {
    assert_eq!("1k".parse::<SplitSize>()?.bytes(), 1024);
    assert_eq!("3M".parse::<SplitSize>()?.bytes(), 3 * 1024 * 1024);
    assert_eq!("1g".parse::<SplitSize>()?.bytes(), 1024 * 1024 * 1024);
    assert_eq!("2048".parse::<SplitSize>()?.bytes(), 2048);
    assert_eq!(SplitSize::default().bytes(), 1 << 30);
    Ok(())
}

#[test]
fn split_size_rejects_garbage() {
    for bad in ["", "k", "1t", "-1k", "0k", "1.5g", "99999999999999999999g"] {
        assert!(
            matches!(bad.parse::<SplitSize>(), Err(ConvertError::InvalidSplitSize(_))),
            "{bad:?} should be rejected"
        );
    }
}

#[test]
fn split_size_display_uses_largest_unit() -> Result<()> {
    assert_eq!("512m".parse::<SplitSize>()?.to_string(), "512m");
    assert_eq!("2048k".parse::<SplitSize>()?.to_string(), "2m");
    assert_eq!("1000".parse::<SplitSize>()?.to_string(), "1000");
    Ok(())
}

#[test]
fn compression_names() -> Result<()> {
    assert_eq!("ZSTD".parse::<ShardCompression>()?, ShardCompression::Zstd);
    assert_eq!("none".parse::<ShardCompression>()?, ShardCompression::None);
    assert!("lz4".parse::<ShardCompression>().is_err());
    Ok(())
}

#[test]
fn batches_keep_short_tail() {
    let b = batches(records(10, 1), 4);
    assert_eq!(b.iter().map(Vec::len).collect::<Vec<_>>(), vec![4, 4, 2]);
}

#[test]
fn batches_stop_at_error_and_drop_partial_batch() {
    let input = vec![
        Ok(RawRecord::from("<page>1</page>")),
        Ok(RawRecord::from("<page>2</page>")),
        Ok(RawRecord::from("<page>3</page>")),
        Err(ConvertError::EmptyIndex),
        Ok(RawRecord::from("<page>4</page>")),
    ];
    let mut it = Batches::new(input.into_iter(), 2);
    assert_eq!(it.next().unwrap().unwrap().len(), 2);
    assert!(matches!(it.next(), Some(Err(ConvertError::EmptyIndex))));
    assert!(it.next().is_none());
}

#[test]
fn names_are_zero_padded() {
    assert_eq!(provisional_name(3), "part-00003.parquet");
    assert_eq!(final_name(3, 7), "part-00003-of-00007.parquet");
}

#[test]
fn tiny_threshold_puts_one_batch_in_each_shard() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let out = tmp.path().join("out");
    // Incompressible-enough bodies so a batch is well over 1 KiB on disk.
    let input: Vec<RawRecord> = (0..40)
        .map(|i| {
            let body: String = (0..400).map(|j| char::from(b'a' + ((i * 31 + j * 7) % 26) as u8)).collect();
            RawRecord::from(format!("<page><id>{i}</id>{body}</page>"))
        })
        .collect();
    let expected: Vec<String> = input.iter().map(|r| r.as_str().to_owned()).collect();

    let mut writer = ShardWriter::create(&out, "1k".parse()?, ShardCompression::None)?;
    for batch in batches(input, 8) {
        writer.write_batch(&batch)?;
    }
    let shards = writer.finish()?;

    assert_eq!(shards.len(), 5);
    for (i, shard) in shards.iter().enumerate() {
        assert_eq!(shard.rows, 8);
        assert_eq!(shard.batches, 1);
        assert_eq!(shard_row_groups(&shard.path)?, 1);
        assert_eq!(
            shard.path.file_name().unwrap().to_str().unwrap(),
            final_name(i, 5)
        );
    }
    assert_eq!(read_all_shards(&out)?, expected);
    Ok(())
}

#[test]
fn rotation_happens_only_between_batches() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let out = tmp.path().join("out");
    let input = records(1000, 50);
    let expected: Vec<String> = input.iter().map(|r| r.as_str().to_owned()).collect();

    let mut writer = ShardWriter::create(&out, "16k".parse()?, ShardCompression::None)?;
    for batch in batches(input, 64) {
        writer.write_batch(&batch)?;
    }
    let shards = writer.finish()?;

    assert!(shards.len() > 1, "expected rotation, got {} shard(s)", shards.len());
    let (last, sealed_early) = shards.split_last().unwrap();
    for shard in sealed_early {
        assert_eq!(shard.rows % 64, 0, "shard {} split a batch", shard.index);
        assert_eq!(shard_row_groups(&shard.path)? as u64, shard.batches);
    }
    assert!(last.rows > 0);
    assert_eq!(shards.iter().map(|s| s.rows).sum::<u64>(), 1000);
    assert_eq!(read_all_shards(&out)?, expected);
    Ok(())
}

#[test]
fn large_threshold_keeps_everything_in_one_shard() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let out = tmp.path().join("out");
    let mut writer = ShardWriter::create(&out, SplitSize::default(), ShardCompression::Zstd)?;
    for batch in batches(records(100, 10), 30) {
        writer.write_batch(&batch)?;
    }
    let shards = writer.finish()?;
    assert_eq!(shards.len(), 1);
    assert_eq!(shards[0].batches, 4);
    assert_eq!(shards[0].path, out.join("part-00000-of-00001.parquet"));
    assert_eq!(read_shard(&shards[0].path)?.len(), 100);
    Ok(())
}

#[test]
fn no_batches_means_no_shards() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let out = tmp.path().join("nested").join("out");
    let mut writer = ShardWriter::create(&out, "1m".parse()?, ShardCompression::Zstd)?;
    writer.write_batch(&[])?;
    assert!(writer.finish()?.is_empty());
    assert!(out.is_dir());
    assert!(list_shards(&out)?.is_empty());
    Ok(())
}

#[test]
fn provisional_names_until_finish() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let out = tmp.path().join("out");
    let mut writer = ShardWriter::create(&out, "1k".parse()?, ShardCompression::None)?;
    for batch in batches(records(20, 200), 10) {
        writer.write_batch(&batch)?;
    }
    assert_eq!(writer.sealed().len(), 2);
    assert!(out.join("part-00000.parquet").exists());
    assert!(out.join("part-00001.parquet").exists());

    writer.finish()?;
    assert!(!out.join("part-00000.parquet").exists());
    assert!(out.join("part-00000-of-00002.parquet").exists());
    assert!(out.join("part-00001-of-00002.parquet").exists());
    Ok(())
}
