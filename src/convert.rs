//! Run driver: index → chunk plan → ordered chunk decoding → shards.
//!
//! Loading, planning, aggregation and writing all happen on the calling
//! thread; only chunk decoding fans out to the worker pool. The shard writer
//! is the single owner of output state.

use crate::aggregate::Records;
use crate::chunk::{RawRecord, decode_chunk};
use crate::config::ConvertConfig;
use crate::error::{ConvertError, Result};
use crate::index::IndexReader;
use crate::io::compression::detect_codec;
use crate::metrics::{ConversionReport, ShardSummary};
use crate::plan::{ChunkPlan, plan_chunks};
use crate::pool::{ExecMode, WorkerPool};
use crate::progress::Progress;
use crate::shard::{Batches, ShardInfo, ShardWriter};
use std::time::Instant;
use tracing::info;

type ChunkResults = Box<dyn Iterator<Item = Result<Vec<RawRecord>>>>;

pub struct Converter {
    config: ConvertConfig,
}

impl Converter {
    #[must_use]
    pub const fn new(config: ConvertConfig) -> Self {
        Self { config }
    }

    /// Read the index and derive the dump's chunk layout.
    ///
    /// # Errors
    /// Returns I/O errors for either input and any index format error.
    pub fn plan(&self) -> Result<ChunkPlan> {
        let dump = &self.config.dump_file;
        let file_len = std::fs::metadata(dump)
            .map_err(|e| ConvertError::io(dump, e))?
            .len();

        let progress = Progress::index_scan(self.config.quiet);
        let records = IndexReader::open(&self.config.index_file)?.inspect(|_| progress.inc(1));
        let plan = plan_chunks(records, file_len);
        match &plan {
            Ok(plan) => progress.finish(format!("{} records", plan.record_count)),
            Err(_) => progress.abandon(),
        }
        plan
    }

    /// Convert the dump into finalized shards.
    ///
    /// # Errors
    /// Any index, decode, or output error aborts the run. Shards sealed
    /// before the failure stay on disk under their provisional names; the
    /// output directory must then be treated as incomplete.
    pub fn run(&self) -> Result<ConversionReport> {
        self.config.validate()?;
        let start = Instant::now();

        let plan = self.plan()?;
        info!(
            records = plan.record_count,
            chunks = plan.chunks.len(),
            index = %self.config.index_file.display(),
            "loaded index"
        );

        let mut report = ConversionReport {
            index_records: plan.record_count,
            ..ConversionReport::default()
        };

        let progress = Progress::records(plan.record_count, self.config.quiet);
        let written = self.write_shards(&plan, &progress, &mut report);
        let shards = match written {
            Ok(shards) => shards,
            Err(e) => {
                progress.abandon();
                return Err(e);
            }
        };
        progress.finish(format!("{} shards", shards.len()));

        report.shards = shards.iter().map(ShardSummary::from).collect();
        report.set_elapsed(start.elapsed());
        info!(
            records = report.records_written,
            shards = report.shards.len(),
            elapsed_secs = report.elapsed_secs,
            "conversion finished"
        );
        Ok(report)
    }

    fn write_shards(
        &self,
        plan: &ChunkPlan,
        progress: &Progress,
        report: &mut ConversionReport,
    ) -> Result<Vec<ShardInfo>> {
        let mut writer = ShardWriter::create(
            &self.config.output_dir,
            self.config.split_size,
            self.config.compression,
        )?;

        let mut decoded = 0usize;
        {
            let results = self
                .chunk_results(plan)?
                .inspect(|r| decoded += usize::from(r.is_ok()));
            for batch in Batches::new(Records::new(results), self.config.batch_size) {
                let batch = batch?;
                writer.write_batch(&batch)?;
                report.records_written += batch.len() as u64;
                progress.inc(batch.len() as u64);
            }
        }

        report.chunks = decoded as u64;
        report.bytes_read = plan.chunks[..decoded].iter().map(|c| c.size).sum();
        writer.finish()
    }

    fn chunk_results(&self, plan: &ChunkPlan) -> Result<ChunkResults> {
        let dump = self.config.dump_file.clone();
        let codec = detect_codec(&dump)?;
        info!(codec = codec.name(), dump = %dump.display(), "decoding dump chunks");

        match self.config.mode {
            ExecMode::Sequential => {
                let chunks = plan.chunks.clone();
                Ok(Box::new(
                    chunks
                        .into_iter()
                        .map(move |chunk| decode_chunk(&dump, chunk, codec)),
                ))
            }
            ExecMode::Parallel { workers, window } => {
                let pool = WorkerPool::new(workers, window)?;
                info!(workers = pool.workers(), window = pool.window(), "decoding in parallel");
                Ok(Box::new(pool.map_ordered(plan.chunks.clone(), move |chunk| {
                    decode_chunk(&dump, chunk, codec)
                })))
            }
        }
    }
}
