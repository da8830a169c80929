//! Settings for one conversion run.

use crate::error::{ConvertError, Result};
use crate::pool::ExecMode;
use crate::shard::{DEFAULT_BATCH_SIZE, ShardCompression, SplitSize};
use std::path::PathBuf;

/// Everything a [`crate::Converter`] needs. Build with [`ConvertConfig::new`]
/// and adjust with the `with_*` methods.
#[derive(Clone, Debug)]
pub struct ConvertConfig {
    /// Compressed `offset:id:title` index.
    pub index_file: PathBuf,
    /// Multistream-compressed XML dump.
    pub dump_file: PathBuf,
    /// Directory that receives the shards; created if missing.
    pub output_dir: PathBuf,
    /// Rotate to a new shard once the current one reaches this size.
    pub split_size: SplitSize,
    /// Records per batch (one row group each).
    pub batch_size: usize,
    pub mode: ExecMode,
    pub compression: ShardCompression,
    /// Hide progress bars.
    pub quiet: bool,
}

impl ConvertConfig {
    /// Defaults: `1g` split size, batches of 1024, one worker per CPU, zstd
    /// shards, no progress bars.
    pub fn new(
        index_file: impl Into<PathBuf>,
        dump_file: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            index_file: index_file.into(),
            dump_file: dump_file.into(),
            output_dir: output_dir.into(),
            split_size: SplitSize::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            mode: ExecMode::default(),
            compression: ShardCompression::default(),
            quiet: true,
        }
    }

    #[must_use]
    pub const fn with_split_size(mut self, split_size: SplitSize) -> Self {
        self.split_size = split_size;
        self
    }

    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub const fn with_mode(mut self, mode: ExecMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub const fn with_compression(mut self, compression: ShardCompression) -> Self {
        self.compression = compression;
        self
    }

    #[must_use]
    pub const fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Reject settings that cannot produce output.
    ///
    /// # Errors
    /// Returns [`ConvertError::InvalidConfig`] for a zero batch size or zero
    /// worker count.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(ConvertError::InvalidConfig(
                "batch size must be at least 1".into(),
            ));
        }
        if let ExecMode::Parallel {
            workers: Some(0), ..
        } = self.mode
        {
            return Err(ConvertError::InvalidConfig(
                "worker count must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
