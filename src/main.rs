//! dumpshard: convert a multistream XML dump into Parquet shards.

use anyhow::{Context, Result};
use clap::Parser;
use dumpshard::{ConvertConfig, Converter, ExecMode, ShardCompression, SplitSize};
use std::path::PathBuf;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "dumpshard")]
#[command(about = "Convert a multistream-compressed XML dump into size-bounded Parquet shards")]
#[command(version)]
struct Cli {
    /// Compressed index file (`offset:id:title` per line)
    #[arg(long, env = "DUMPSHARD_INDEX_FILE")]
    index_file: PathBuf,

    /// Multistream-compressed XML dump
    #[arg(long, env = "DUMPSHARD_MS_FILE")]
    ms_file: PathBuf,

    /// Directory that receives the shards
    #[arg(long, env = "DUMPSHARD_OUTPUT_DIR")]
    output_dir: PathBuf,

    /// Rotate shards once they reach this size (k, m or g suffix)
    #[arg(long, env = "DUMPSHARD_SPLIT_SIZE", default_value = "1g")]
    split_size: SplitSize,

    /// Records per batch
    #[arg(long, default_value_t = dumpshard::shard::DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Decode workers (defaults to the number of CPUs)
    #[arg(long)]
    workers: Option<usize>,

    /// Shard column compression: zstd, snappy, gzip or none
    #[arg(long, default_value = "zstd")]
    compression: ShardCompression,

    /// Decode chunks one at a time on the main thread
    #[arg(long, conflicts_with = "workers")]
    sequential: bool,

    /// Write a JSON run report to this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Hide progress bars
    #[arg(short, long)]
    quiet: bool,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mode = if cli.sequential {
        ExecMode::Sequential
    } else {
        ExecMode::Parallel {
            workers: cli.workers,
            window: None,
        }
    };

    let config = ConvertConfig::new(&cli.index_file, &cli.ms_file, &cli.output_dir)
        .with_split_size(cli.split_size)
        .with_batch_size(cli.batch_size)
        .with_mode(mode)
        .with_compression(cli.compression)
        .with_quiet(cli.quiet);

    info!(
        index = %cli.index_file.display(),
        dump = %cli.ms_file.display(),
        output = %cli.output_dir.display(),
        split_size = %cli.split_size,
        "starting conversion"
    );

    let report = Converter::new(config).run().with_context(|| {
        format!(
            "conversion of {} failed; {} is incomplete",
            cli.ms_file.display(),
            cli.output_dir.display()
        )
    })?;

    if !cli.quiet {
        report.print();
    }
    if let Some(path) = &cli.report {
        report
            .save_to_file(path)
            .with_context(|| format!("write report {}", path.display()))?;
    }
    Ok(())
}
