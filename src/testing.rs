//! Testing utilities for conversions.
//!
//! - **Fixtures**: [`DumpBuilder`] writes a synthetic multistream dump (one
//!   bzip2 stream per chunk) together with its index.
//! - **Shard readers**: [`read_shard`], [`read_all_shards`] and friends read
//!   the Parquet output back.
//!
//! # Quick Start
//!
//! ```no_run
//! use dumpshard::testing::*;
//! use dumpshard::{ConvertConfig, Converter};
//!
//! # fn main() -> anyhow::Result<()> {
//! let fixture = DumpBuilder::new().generated_chunks(4, 10).build()?;
//! let config = ConvertConfig::new(&fixture.index_path, &fixture.dump_path, fixture.output_dir());
//! Converter::new(config).run()?;
//! assert_eq!(read_all_shards(fixture.output_dir())?, fixture.expected_records());
//! # Ok(())
//! # }
//! ```

pub mod fixtures;
pub mod shards;

pub use fixtures::*;
pub use shards::*;
