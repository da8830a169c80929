//! Size-bounded Parquet shard output.
//!
//! Records are grouped into fixed-size [`Batches`] and each batch is appended
//! to the open shard as one row group. After every batch the shard's byte
//! count is checked against the [`SplitSize`]; once it reaches the threshold
//! the shard is sealed and the next batch opens a new one. Shards therefore
//! always hold whole batches, and a threshold smaller than one batch simply
//! yields one batch per shard.
//!
//! While the run is in progress shards are named `part-00000.parquet`,
//! `part-00001.parquet`, ... Once everything is sealed [`ShardWriter::finish`]
//! renames them to `part-00000-of-00002.parquet` style names.

use crate::chunk::RawRecord;
use crate::error::{ConvertError, Result};
use arrow::array::{ArrayRef, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel, ZstdLevel};
use parquet::file::properties::WriterProperties;
use std::fmt;
use std::fs::{File, create_dir_all, rename};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

/// Name of the single output column.
pub const XML_COLUMN: &str = "xml";

/// Default number of records per batch.
pub const DEFAULT_BATCH_SIZE: usize = 1024;

/// Shard rotation threshold in bytes.
///
/// Parsed from `<number><unit>` where the unit is `k`, `m` or `g`
/// (case-insensitive, powers of 1024). A bare number is taken as bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SplitSize(u64);

impl SplitSize {
    /// # Errors
    /// Returns [`ConvertError::InvalidSplitSize`] for zero.
    pub fn from_bytes(bytes: u64) -> Result<Self> {
        if bytes == 0 {
            return Err(ConvertError::InvalidSplitSize("0".into()));
        }
        Ok(Self(bytes))
    }

    #[must_use]
    pub const fn bytes(self) -> u64 {
        self.0
    }
}

impl Default for SplitSize {
    fn default() -> Self {
        Self(1024 * 1024 * 1024)
    }
}

impl FromStr for SplitSize {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ConvertError::InvalidSplitSize(s.to_owned());
        let trimmed = s.trim();
        let (digits, multiplier) = match trimmed.chars().last().map(|c| c.to_ascii_lowercase()) {
            Some('k') => (&trimmed[..trimmed.len() - 1], 1024u64),
            Some('m') => (&trimmed[..trimmed.len() - 1], 1024u64.pow(2)),
            Some('g') => (&trimmed[..trimmed.len() - 1], 1024u64.pow(3)),
            Some(c) if c.is_ascii_digit() => (trimmed, 1),
            _ => return Err(invalid()),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let value: u64 = digits.parse().map_err(|_| invalid())?;
        let bytes = value.checked_mul(multiplier).ok_or_else(invalid)?;
        Self::from_bytes(bytes).map_err(|_| invalid())
    }
}

impl fmt::Display for SplitSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const UNITS: [(u64, &str); 3] = [(1024 * 1024 * 1024, "g"), (1024 * 1024, "m"), (1024, "k")];
        for (unit, suffix) in UNITS {
            if self.0 % unit == 0 {
                return write!(f, "{}{suffix}", self.0 / unit);
            }
        }
        write!(f, "{}", self.0)
    }
}

/// Column compression used inside shard files.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ShardCompression {
    #[default]
    Zstd,
    Snappy,
    Gzip,
    None,
}

impl ShardCompression {
    fn codec(self) -> Compression {
        match self {
            Self::Zstd => Compression::ZSTD(ZstdLevel::default()),
            Self::Snappy => Compression::SNAPPY,
            Self::Gzip => Compression::GZIP(GzipLevel::default()),
            Self::None => Compression::UNCOMPRESSED,
        }
    }
}

impl FromStr for ShardCompression {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "zstd" => Ok(Self::Zstd),
            "snappy" => Ok(Self::Snappy),
            "gzip" => Ok(Self::Gzip),
            "none" | "uncompressed" => Ok(Self::None),
            other => Err(ConvertError::InvalidConfig(format!(
                "unknown shard compression {other:?} (expected zstd, snappy, gzip or none)"
            ))),
        }
    }
}

impl fmt::Display for ShardCompression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Zstd => "zstd",
            Self::Snappy => "snappy",
            Self::Gzip => "gzip",
            Self::None => "none",
        })
    }
}

/// Schema of every shard: one non-null string column.
#[must_use]
pub fn shard_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![Field::new(XML_COLUMN, DataType::Utf8, false)]))
}

/// File name of shard `index` while the run is in progress.
#[must_use]
pub fn provisional_name(index: usize) -> String {
    format!("part-{index:05}.parquet")
}

/// File name of shard `index` once the total count is known.
#[must_use]
pub fn final_name(index: usize, total: usize) -> String {
    format!("part-{index:05}-of-{total:05}.parquet")
}

/// Groups a record stream into batches of `size`; the last batch may be
/// shorter. An error ends the stream, dropping the partial batch.
pub struct Batches<I> {
    records: I,
    size: usize,
    failed: bool,
}

impl<I> Batches<I>
where
    I: Iterator<Item = Result<RawRecord>>,
{
    /// A `size` of zero is treated as 1.
    pub fn new(records: I, size: usize) -> Self {
        Self {
            records,
            size: size.max(1),
            failed: false,
        }
    }
}

impl<I> Iterator for Batches<I>
where
    I: Iterator<Item = Result<RawRecord>>,
{
    type Item = Result<Vec<RawRecord>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let mut batch = Vec::with_capacity(self.size);
        while batch.len() < self.size {
            match self.records.next() {
                Some(Ok(record)) => batch.push(record),
                Some(Err(e)) => {
                    self.failed = true;
                    return Some(Err(e));
                }
                None => break,
            }
        }
        (!batch.is_empty()).then_some(Ok(batch))
    }
}

/// A sealed shard.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShardInfo {
    pub index: usize,
    pub path: PathBuf,
    pub rows: u64,
    pub batches: u64,
    /// Size of the closed file, footer included.
    pub bytes: u64,
}

struct OpenShard {
    index: usize,
    path: PathBuf,
    writer: ArrowWriter<File>,
    rows: u64,
    batches: u64,
}

/// Owns the output directory and the single open shard.
pub struct ShardWriter {
    dir: PathBuf,
    split_size: SplitSize,
    props: WriterProperties,
    schema: SchemaRef,
    current: Option<OpenShard>,
    sealed: Vec<ShardInfo>,
}

impl ShardWriter {
    /// Prepare to write shards into `dir`, creating it if needed.
    ///
    /// # Errors
    /// Returns [`ConvertError::Io`] if the directory cannot be created.
    pub fn create(
        dir: impl AsRef<Path>,
        split_size: SplitSize,
        compression: ShardCompression,
    ) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        create_dir_all(&dir).map_err(|e| ConvertError::io(&dir, e))?;
        let props = WriterProperties::builder()
            .set_compression(compression.codec())
            .build();
        Ok(Self {
            dir,
            split_size,
            props,
            schema: shard_schema(),
            current: None,
            sealed: Vec::new(),
        })
    }

    /// Shards sealed so far, under their provisional names.
    #[must_use]
    pub fn sealed(&self) -> &[ShardInfo] {
        &self.sealed
    }

    /// Append one batch to the open shard (opening one if needed), then
    /// seal the shard if it has reached the split size. Empty batches are
    /// ignored.
    ///
    /// # Errors
    /// Returns [`ConvertError::Io`], [`ConvertError::Parquet`] or
    /// [`ConvertError::Arrow`] if the shard cannot be created or written.
    pub fn write_batch(&mut self, batch: &[RawRecord]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let column = StringArray::from_iter_values(batch.iter().map(RawRecord::as_str));
        let record_batch =
            RecordBatch::try_new(Arc::clone(&self.schema), vec![Arc::new(column) as ArrayRef])?;

        let shard = match self.current.take() {
            Some(shard) => shard,
            None => self.open_shard()?,
        };
        let shard = self.current.insert(shard);

        shard
            .writer
            .write(&record_batch)
            .and_then(|()| shard.writer.flush())
            .map_err(|e| ConvertError::parquet(&shard.path, e))?;
        shard.rows += batch.len() as u64;
        shard.batches += 1;

        let written = shard.writer.bytes_written() as u64;
        debug!(
            shard = shard.index,
            rows = batch.len(),
            payload = batch.iter().map(RawRecord::len).sum::<usize>(),
            bytes = written,
            "appended batch"
        );
        if written >= self.split_size.bytes() {
            self.seal()?;
        }
        Ok(())
    }

    fn open_shard(&self) -> Result<OpenShard> {
        let index = self.sealed.len();
        let path = self.dir.join(provisional_name(index));
        let file = File::create(&path).map_err(|e| ConvertError::io(&path, e))?;
        let writer = ArrowWriter::try_new(file, Arc::clone(&self.schema), Some(self.props.clone()))
            .map_err(|e| ConvertError::parquet(&path, e))?;
        info!(shard = index, path = %path.display(), "opened shard");
        Ok(OpenShard {
            index,
            path,
            writer,
            rows: 0,
            batches: 0,
        })
    }

    /// Close the open shard, if any. It is never reopened.
    ///
    /// # Errors
    /// Returns [`ConvertError::Parquet`] if the footer cannot be written, or
    /// [`ConvertError::Io`] if the closed file cannot be inspected.
    pub fn seal(&mut self) -> Result<()> {
        let Some(shard) = self.current.take() else {
            return Ok(());
        };
        let OpenShard {
            index,
            path,
            writer,
            rows,
            batches,
        } = shard;
        writer
            .close()
            .map_err(|e| ConvertError::parquet(&path, e))?;
        let bytes = std::fs::metadata(&path)
            .map_err(|e| ConvertError::io(&path, e))?
            .len();
        info!(shard = index, rows, batches, bytes, "sealed shard");
        self.sealed.push(ShardInfo {
            index,
            path,
            rows,
            batches,
            bytes,
        });
        Ok(())
    }

    /// Seal the open shard and rename every shard to embed the total count.
    /// Returns the shards under their final names.
    ///
    /// # Errors
    /// Returns [`ConvertError::Io`] if a rename fails; shards renamed before
    /// the failure keep their new names.
    pub fn finish(mut self) -> Result<Vec<ShardInfo>> {
        self.seal()?;
        let total = self.sealed.len();
        let mut shards = std::mem::take(&mut self.sealed);
        for shard in &mut shards {
            let dest = self.dir.join(final_name(shard.index, total));
            rename(&shard.path, &dest).map_err(|e| ConvertError::io(&shard.path, e))?;
            shard.path = dest;
        }
        info!(shards = total, dir = %self.dir.display(), "finalized shards");
        Ok(shards)
    }
}
