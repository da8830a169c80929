//! Terminal progress for the two long phases of a run: scanning the index
//! and writing records.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// The spinner advances once per parsed index record.
const INDEX_SCAN_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] Parsing index file: {pos} records ({per_sec})";

/// Progress display; every method is a no-op when quiet.
pub struct Progress {
    bar: Option<ProgressBar>,
}

impl Progress {
    /// Spinner counting parsed index records, for when the total is unknown.
    #[must_use]
    pub fn index_scan(quiet: bool) -> Self {
        if quiet {
            return Self { bar: None };
        }
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template(INDEX_SCAN_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        Self { bar: Some(pb) }
    }

    /// Bar over the number of records the index promises.
    #[must_use]
    pub fn records(total: u64, quiet: bool) -> Self {
        if quiet {
            return Self { bar: None };
        }
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb.set_message("Writing rows");
        Self { bar: Some(pb) }
    }

    pub fn inc(&self, delta: u64) {
        if let Some(ref pb) = self.bar {
            pb.inc(delta);
        }
    }

    pub fn finish(&self, msg: String) {
        if let Some(ref pb) = self.bar {
            pb.finish_with_message(msg);
        }
    }

    /// Leave the bar where it stopped, for runs that fail.
    pub fn abandon(&self) {
        if let Some(ref pb) = self.bar {
            pb.abandon();
        }
    }
}
