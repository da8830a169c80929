//! Reading shards back for assertions.

use crate::shard::XML_COLUMN;
use anyhow::{Context, Result, anyhow};
use arrow::array::{Array, StringArray};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::file::reader::{FileReader, SerializedFileReader};
use std::fs::File;
use std::path::{Path, PathBuf};

/// All `xml` values of one shard, in row order.
///
/// # Errors
/// Returns an error if the file is not a readable shard.
pub fn read_shard(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("open ParquetRecordBatchReader")?
        .build()
        .context("build ParquetRecordBatchReader")?;

    let mut out = Vec::new();
    for batch in reader {
        let batch = batch.context("read batch")?;
        let column = batch
            .column_by_name(XML_COLUMN)
            .ok_or_else(|| anyhow!("{} has no {XML_COLUMN} column", path.display()))?;
        let strings = column
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| anyhow!("{XML_COLUMN} column is not Utf8"))?;
        out.extend((0..strings.len()).map(|i| strings.value(i).to_owned()));
    }
    Ok(out)
}

/// Number of row groups (one per written batch) in a shard.
///
/// # Errors
/// Returns an error if the file metadata cannot be read.
pub fn shard_row_groups(path: impl AsRef<Path>) -> Result<usize> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = SerializedFileReader::new(file).context("open SerializedFileReader")?;
    Ok(reader.metadata().num_row_groups())
}

/// Shard files in `dir`, sorted by name.
///
/// # Errors
/// Returns an error if the directory cannot be listed.
pub fn list_shards(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "parquet") {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Concatenated rows of every shard in `dir`, in shard-name order.
///
/// # Errors
/// Returns an error if any shard cannot be read.
pub fn read_all_shards(dir: impl AsRef<Path>) -> Result<Vec<String>> {
    let mut rows = Vec::new();
    for path in list_shards(dir)? {
        rows.extend(read_shard(&path)?);
    }
    Ok(rows)
}
