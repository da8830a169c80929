//! Per-chunk work: read one byte range of the dump, decompress it as a
//! self-contained block and cut the result into page records.

use crate::error::{ConvertError, Result};
use crate::io::compression::CompressionCodec;
use crate::plan::Chunk;
use memchr::memmem::Finder;
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

/// Closing tag that terminates every record.
pub const RECORD_END: &[u8] = b"</page>";

/// Opening tag of a record; finding it after the last [`RECORD_END`] means
/// the chunk was cut inside a record.
pub const RECORD_START: &[u8] = b"<page";

static END_FINDER: LazyLock<Finder<'static>> = LazyLock::new(|| Finder::new(RECORD_END));
static START_FINDER: LazyLock<Finder<'static>> = LazyLock::new(|| Finder::new(RECORD_START));

/// One extracted record, trimmed of surrounding whitespace.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RawRecord(String);

impl RawRecord {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for RawRecord {
    fn from(xml: String) -> Self {
        Self(xml)
    }
}

impl From<&str> for RawRecord {
    fn from(xml: &str) -> Self {
        Self(xml.to_owned())
    }
}

/// Records cut from a decompressed block, plus whatever followed the last
/// end marker.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Split<'a> {
    pub records: Vec<&'a [u8]>,
    pub trailing: &'a [u8],
}

/// Scan `data` left to right for [`RECORD_END`]. Each match closes a record
/// running from the scan cursor through the end of the marker; the record is
/// trimmed of ASCII whitespace on both sides.
#[must_use]
pub fn split_records(data: &[u8]) -> Split<'_> {
    let mut records = Vec::new();
    let mut pos = 0;
    for found in END_FINDER.find_iter(data) {
        let end = found + RECORD_END.len();
        records.push(data[pos..end].trim_ascii());
        pos = end;
    }
    Split {
        records,
        trailing: &data[pos..],
    }
}

/// Decode one chunk of the dump into its records.
///
/// Opens the dump, seeks to `chunk.offset`, reads exactly `chunk.size` bytes
/// and decompresses them with `codec`. Bytes after the last record marker are
/// dropped when they hold only padding or closing markup.
///
/// # Errors
/// - [`ConvertError::Io`] if the dump cannot be opened, seeked, or is shorter
///   than the chunk.
/// - [`ConvertError::ChunkDecode`] if the chunk cannot be buffered in memory
///   or decompression fails.
/// - [`ConvertError::TruncatedRecord`] if a record starts after the last end
///   marker.
/// - [`ConvertError::RecordEncoding`] if a record is not UTF-8.
pub fn decode_chunk(
    dump: &Path,
    chunk: Chunk,
    codec: &dyn CompressionCodec,
) -> Result<Vec<RawRecord>> {
    let compressed = read_range(dump, chunk)?;
    let decompressed = decompress(compressed, codec).map_err(|source| {
        ConvertError::ChunkDecode {
            offset: chunk.offset,
            size: chunk.size,
            source,
        }
    })?;

    let Split { records, trailing } = split_records(&decompressed);
    check_trailing(chunk, trailing)?;

    let records = records
        .into_iter()
        .enumerate()
        .map(|(i, bytes)| {
            std::str::from_utf8(bytes)
                .map(|s| RawRecord(s.to_owned()))
                .map_err(|_| ConvertError::RecordEncoding {
                    offset: chunk.offset,
                    record: i,
                })
        })
        .collect::<Result<Vec<_>>>()?;

    debug!(
        offset = chunk.offset,
        size = chunk.size,
        decompressed = decompressed.len(),
        records = records.len(),
        "decoded chunk"
    );
    Ok(records)
}

fn read_range(dump: &Path, chunk: Chunk) -> Result<Vec<u8>> {
    let mut buf = chunk_buffer(chunk)?;
    let io_err = |e| ConvertError::io(dump, e);
    let mut file = File::open(dump).map_err(io_err)?;
    file.seek(SeekFrom::Start(chunk.offset)).map_err(io_err)?;
    file.read_exact(&mut buf).map_err(io_err)?;
    Ok(buf)
}

/// Zeroed buffer of exactly `chunk.size` bytes, allocated fallibly.
fn chunk_buffer(chunk: Chunk) -> Result<Vec<u8>> {
    let too_large = || ConvertError::ChunkDecode {
        offset: chunk.offset,
        size: chunk.size,
        source: std::io::Error::new(ErrorKind::OutOfMemory, "chunk does not fit in memory"),
    };
    let size = usize::try_from(chunk.size).map_err(|_| too_large())?;
    let mut buf = Vec::new();
    buf.try_reserve_exact(size).map_err(|_| too_large())?;
    buf.resize(size, 0);
    Ok(buf)
}

fn decompress(compressed: Vec<u8>, codec: &dyn CompressionCodec) -> std::io::Result<Vec<u8>> {
    // Wikipedia blocks expand roughly fivefold.
    let mut out = Vec::with_capacity(compressed.len().saturating_mul(5));
    let mut reader = codec.wrap_reader(Box::new(std::io::Cursor::new(compressed)))?;
    reader.read_to_end(&mut out)?;
    Ok(out)
}

fn check_trailing(chunk: Chunk, trailing: &[u8]) -> Result<()> {
    if trailing.trim_ascii().is_empty() {
        return Ok(());
    }
    if START_FINDER.find(trailing).is_some() {
        return Err(ConvertError::TruncatedRecord {
            offset: chunk.offset,
            trailing: trailing.len(),
        });
    }
    debug!(
        offset = chunk.offset,
        trailing = trailing.len(),
        "discarding trailing bytes after last record"
    );
    Ok(())
}
