//! Error taxonomy for a conversion run.
//!
//! Every failure is fatal: the pipeline never retries and never skips input.
//! Variants carry the index line, dump offset or path that triggered them so
//! the offending spot in the source files can be inspected by hand.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while converting a dump into shards.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// A malformed index line.
    #[error("index line {line}: {message}")]
    Format { line: u64, message: String },

    /// The index produced no records, so there is nothing to plan.
    #[error("index contains no records")]
    EmptyIndex,

    /// A distinct offset lower than the one before it.
    #[error("index line {line}: offset {offset} is lower than previous offset {previous}")]
    NonMonotonic { line: u64, offset: u64, previous: u64 },

    /// The last distinct offset leaves no bytes (or lies past the end of the dump).
    #[error("chunk at offset {offset} is empty or starts past the end of the dump ({file_len} bytes)")]
    ChunkBeyondEnd { offset: u64, file_len: u64 },

    /// Decompressing a chunk failed.
    #[error("failed to decode chunk at offset {offset} ({size} bytes): {source}")]
    ChunkDecode {
        offset: u64,
        size: u64,
        #[source]
        source: std::io::Error,
    },

    /// The bytes after the last record marker hold the start of another record.
    #[error("chunk at offset {offset} ends inside a record ({trailing} trailing bytes)")]
    TruncatedRecord { offset: u64, trailing: usize },

    /// A record is not valid UTF-8 and cannot be stored in the string column.
    #[error("record #{record} of chunk at offset {offset} is not valid UTF-8")]
    RecordEncoding { offset: u64, record: usize },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parquet error on {}: {source}", path.display())]
    Parquet {
        path: PathBuf,
        #[source]
        source: parquet::errors::ParquetError,
    },

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("invalid split size {0:?}: expected <number>[k|m|g]")]
    InvalidSplitSize(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl ConvertError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parquet(path: impl Into<PathBuf>, source: parquet::errors::ParquetError) -> Self {
        Self::Parquet {
            path: path.into(),
            source,
        }
    }

    /// True for errors caused by a malformed or inconsistent index.
    #[must_use]
    pub const fn is_format_error(&self) -> bool {
        matches!(
            self,
            Self::Format { .. }
                | Self::EmptyIndex
                | Self::NonMonotonic { .. }
                | Self::ChunkBeyondEnd { .. }
        )
    }
}

pub type Result<T, E = ConvertError> = std::result::Result<T, E>;
