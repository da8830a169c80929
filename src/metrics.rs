//! Run report for a finished conversion.
//!
//! [`ConversionReport`] is returned by [`crate::convert::Converter::run`]. It
//! can be printed as a human-readable summary or saved as pretty JSON.
//!
//! ```no_run
//! use dumpshard::{ConvertConfig, Converter};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = ConvertConfig::new("index.txt.bz2", "dump.xml.bz2", "out");
//! let report = Converter::new(config).run()?;
//! report.print();
//! report.save_to_file("report.json")?;
//! # Ok(())
//! # }
//! ```

use crate::error::{ConvertError, Result};
use crate::shard::ShardInfo;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Per-shard entry of the report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ShardSummary {
    pub path: PathBuf,
    pub rows: u64,
    pub batches: u64,
    pub bytes: u64,
}

impl From<&ShardInfo> for ShardSummary {
    fn from(info: &ShardInfo) -> Self {
        Self {
            path: info.path.clone(),
            rows: info.rows,
            batches: info.batches,
            bytes: info.bytes,
        }
    }
}

/// Counters collected over one conversion run.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ConversionReport {
    /// Records listed in the index.
    pub index_records: u64,
    pub chunks: u64,
    /// Compressed dump bytes read by the workers.
    pub bytes_read: u64,
    pub records_written: u64,
    pub shards: Vec<ShardSummary>,
    pub elapsed_secs: f64,
}

impl ConversionReport {
    pub(crate) fn set_elapsed(&mut self, elapsed: Duration) {
        self.elapsed_secs = elapsed.as_secs_f64();
    }

    /// Records per second over the whole run.
    #[must_use]
    pub fn records_per_sec(&self) -> f64 {
        if self.elapsed_secs > 0.0 {
            self.records_written as f64 / self.elapsed_secs
        } else {
            0.0
        }
    }

    /// True when every indexed record ended up in a shard.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.records_written == self.index_records
    }

    /// Print the report to stdout.
    pub fn print(&self) {
        println!("\n========== Conversion Summary ==========");
        println!("Elapsed:          {:.1}s", self.elapsed_secs);
        println!("Index records:    {}", self.index_records);
        println!("Chunks decoded:   {}", self.chunks);
        println!("Dump bytes read:  {} MiB", self.bytes_read / (1024 * 1024));
        println!("Records written:  {}", self.records_written);
        println!("Rate:             {:.1} records/s", self.records_per_sec());
        println!("Shards:           {}", self.shards.len());
        for shard in &self.shards {
            println!(
                "  {} ({} rows, {} bytes)",
                shard.path.display(),
                shard.rows,
                shard.bytes
            );
        }
        println!("========================================\n");
    }

    /// Save the report as pretty-printed JSON.
    ///
    /// # Errors
    /// Returns [`ConvertError::Io`] if the file cannot be created or written.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| ConvertError::io(path, e))?;
        let mut w = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut w, self)
            .map_err(|e| ConvertError::io(path, e.into()))?;
        w.write_all(b"\n")
            .and_then(|()| w.flush())
            .map_err(|e| ConvertError::io(path, e))
    }
}
