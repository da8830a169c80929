//! # dumpshard
//!
//! Converts a **multistream-compressed XML dump** and its companion index into
//! a set of size-bounded **Parquet shards**, one `<page>` record per row in a
//! single string column named `xml`.
//!
//! ## Pipeline
//!
//! 1. [`index`] - read `offset:id:title` lines lazily from the compressed index
//! 2. [`plan`] - turn the distinct offsets into [`Chunk`] byte ranges
//! 3. [`pool`] + [`chunk`] - decompress chunks in parallel and cut them into records
//! 4. [`aggregate`] - restore submission order with a reorder buffer
//! 5. [`shard`] - batch records, rotate shards by size, rename with the total count
//!
//! Output order is always the index's offset order, whatever order the
//! workers finish in.
//!
//! ## Quick Start
//!
//! ```no_run
//! use dumpshard::{ConvertConfig, Converter, SplitSize};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = ConvertConfig::new(
//!     "enwiki-multistream-index.txt.bz2",
//!     "enwiki-multistream.xml.bz2",
//!     "shards",
//! )
//! .with_split_size("512m".parse::<SplitSize>()?);
//!
//! let report = Converter::new(config).run()?;
//! println!("{} records in {} shards", report.records_written, report.shards.len());
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod chunk;
pub mod config;
pub mod convert;
pub mod error;
pub mod index;
pub mod io;
pub mod metrics;
pub mod plan;
pub mod pool;
pub mod progress;
pub mod shard;
pub mod testing;

pub use aggregate::{Records, ReorderBuffer};
pub use chunk::{RawRecord, decode_chunk, split_records};
pub use config::ConvertConfig;
pub use convert::Converter;
pub use error::{ConvertError, Result};
pub use index::{IndexReader, IndexRecord, parse_index_line};
pub use metrics::ConversionReport;
pub use plan::{Chunk, ChunkPlan, plan_chunks};
pub use pool::{ExecMode, WorkerPool};
pub use shard::{Batches, ShardCompression, ShardInfo, ShardWriter, SplitSize};
