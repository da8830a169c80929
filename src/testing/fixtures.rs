//! Synthetic multistream dumps for tests.
//!
//! A dump is built from a list of chunks; every chunk becomes its own bzip2
//! stream, exactly like the blocks of a real multistream dump, and every page
//! gets an index line pointing at the start of its stream.

use crate::io::compression::create_encoded;
use anyhow::{Context, Result};
use bzip2::Compression;
use bzip2::write::BzEncoder;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// One page in a synthetic dump.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FixturePage {
    pub id: u64,
    pub title: String,
    pub xml: String,
}

impl FixturePage {
    /// Page with a small body derived from its id.
    pub fn new(id: u64, title: impl Into<String>) -> Self {
        let title = title.into();
        let body = format!("Body of page {id}.");
        let xml = page_xml(id, &title, &body);
        Self { id, title, xml }
    }

    /// Page whose text is `body`.
    pub fn with_body(id: u64, title: impl Into<String>, body: &str) -> Self {
        let title = title.into();
        let xml = page_xml(id, &title, body);
        Self { id, title, xml }
    }
}

/// Render a minimal `<page>` element.
#[must_use]
pub fn page_xml(id: u64, title: &str, body: &str) -> String {
    format!(
        "<page>\n    <title>{title}</title>\n    <ns>0</ns>\n    <id>{id}</id>\n    <revision>\n      <text>{body}</text>\n    </revision>\n  </page>"
    )
}

/// Compress `data` as one complete bzip2 stream.
///
/// # Errors
/// Returns an error if compression fails.
pub fn bzip2_stream(data: &[u8]) -> Result<Vec<u8>> {
    let mut enc = BzEncoder::new(Vec::new(), Compression::fast());
    enc.write_all(data).context("compress stream")?;
    enc.finish().context("finish bzip2 stream")
}

/// Builder for a dump + index pair.
#[derive(Clone, Debug)]
pub struct DumpBuilder {
    preamble: Option<String>,
    chunks: Vec<Vec<FixturePage>>,
    epilogue: Option<String>,
    index_name: String,
}

impl Default for DumpBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DumpBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            preamble: None,
            chunks: Vec::new(),
            epilogue: None,
            index_name: "index.txt.bz2".into(),
        }
    }

    /// Leading stream that no index line points at (the site header).
    #[must_use]
    pub fn preamble(mut self, xml: impl Into<String>) -> Self {
        self.preamble = Some(xml.into());
        self
    }

    /// Append one compressed block holding `pages`.
    #[must_use]
    pub fn chunk(mut self, pages: Vec<FixturePage>) -> Self {
        self.chunks.push(pages);
        self
    }

    /// Append `count` chunks of `per_chunk` generated pages, ids counting up
    /// from the next free id.
    #[must_use]
    pub fn generated_chunks(mut self, count: usize, per_chunk: usize) -> Self {
        let mut next_id = self.chunks.iter().map(Vec::len).sum::<usize>() as u64 + 1;
        for _ in 0..count {
            let pages = (0..per_chunk)
                .map(|_| {
                    let page = FixturePage::new(next_id, format!("Page {next_id}"));
                    next_id += 1;
                    page
                })
                .collect();
            self.chunks.push(pages);
        }
        self
    }

    /// Trailing stream after the last block, inside the last chunk.
    #[must_use]
    pub fn epilogue(mut self, xml: impl Into<String>) -> Self {
        self.epilogue = Some(xml.into());
        self
    }

    /// Index file name; its extension selects the index compression.
    #[must_use]
    pub fn index_name(mut self, name: impl Into<String>) -> Self {
        self.index_name = name.into();
        self
    }

    /// Write `dump.xml.bz2` and the index into a fresh temporary directory.
    ///
    /// # Errors
    /// Returns an error if any file cannot be written.
    pub fn build(self) -> Result<DumpFixture> {
        let dir = tempfile::tempdir().context("create fixture dir")?;
        let dump_path = dir.path().join("dump.xml.bz2");
        let index_path = dir.path().join(&self.index_name);

        let mut dump = Vec::new();
        if let Some(preamble) = &self.preamble {
            dump.extend(bzip2_stream(preamble.as_bytes())?);
        }

        let mut offsets = Vec::with_capacity(self.chunks.len());
        let mut index_lines = String::new();
        for pages in &self.chunks {
            let offset = dump.len() as u64;
            offsets.push(offset);
            let mut text = String::new();
            for page in pages {
                text.push_str("  ");
                text.push_str(&page.xml);
                text.push('\n');
                index_lines.push_str(&format!("{offset}:{}:{}\n", page.id, page.title));
            }
            dump.extend(bzip2_stream(text.as_bytes())?);
        }

        if let Some(epilogue) = &self.epilogue {
            dump.extend(bzip2_stream(epilogue.as_bytes())?);
        }

        fs::write(&dump_path, &dump).context("write dump")?;
        write_index(&index_path, &index_lines)?;

        Ok(DumpFixture {
            dir,
            dump_path,
            index_path,
            offsets,
            dump_len: dump.len() as u64,
            chunks: self.chunks,
        })
    }
}

/// Write index text through the compressor matching the file extension.
///
/// # Errors
/// Returns an error if the file cannot be written.
pub fn write_index(path: &Path, text: &str) -> Result<()> {
    let mut w = create_encoded(path)?;
    w.write_all(text.as_bytes())
        .with_context(|| format!("write {}", path.display()))?;
    w.flush()?;
    // Dropping the encoder finishes the compressed stream.
    drop(w);
    Ok(())
}

/// A dump and index on disk, removed when dropped.
pub struct DumpFixture {
    dir: TempDir,
    pub dump_path: PathBuf,
    pub index_path: PathBuf,
    /// Start offset of every indexed block.
    pub offsets: Vec<u64>,
    pub dump_len: u64,
    pub chunks: Vec<Vec<FixturePage>>,
}

impl DumpFixture {
    /// Scratch directory holding the inputs.
    #[must_use]
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Fresh output directory path inside the scratch directory.
    #[must_use]
    pub fn output_dir(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    /// Every page's XML in dump order.
    #[must_use]
    pub fn expected_records(&self) -> Vec<String> {
        self.chunks
            .iter()
            .flatten()
            .map(|page| page.xml.clone())
            .collect()
    }
}
