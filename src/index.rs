//! Index loader.
//!
//! The index maps byte offsets in the dump to record ids and titles, one
//! `<offset>:<id>:<title>` line per record. It is read in a single forward
//! pass; [`IndexReader`] yields records lazily and in file order, which the
//! chunk planner relies on to rebuild the dump's block layout.

use crate::error::{ConvertError, Result};
use crate::io::compression::{DynRead, open_decoded};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// One parsed index line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexRecord {
    /// Byte offset in the dump of the compressed block holding this record.
    pub file_offset: u64,
    pub record_id: u64,
    pub title: String,
    /// 1-based line of the index this record was parsed from.
    pub line: u64,
}

/// Parse one index line. `line_no` is 1-based and only used in errors.
///
/// The line is split at its first and second `:`; the title is everything
/// after the second one and may itself contain colons. A trailing `\n` or
/// `\r\n` is stripped.
///
/// # Errors
/// Returns [`ConvertError::Format`] when the second separator is missing, the
/// offset or id is not an unsigned decimal integer, or the title is not UTF-8.
pub fn parse_index_line(line: &[u8], line_no: u64) -> Result<IndexRecord> {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    let line = line.strip_suffix(b"\r").unwrap_or(line);

    let format_err = |message: String| ConvertError::Format {
        line: line_no,
        message,
    };

    let first = line
        .iter()
        .position(|&b| b == b':')
        .ok_or_else(|| format_err("missing ':' after offset".into()))?;
    let second = line[first + 1..]
        .iter()
        .position(|&b| b == b':')
        .map(|p| first + 1 + p)
        .ok_or_else(|| format_err("missing ':' after record id".into()))?;

    let file_offset = parse_u64(&line[..first])
        .ok_or_else(|| format_err(format!("offset {:?} is not a number", lossy(&line[..first]))))?;
    let record_id = parse_u64(&line[first + 1..second]).ok_or_else(|| {
        format_err(format!(
            "record id {:?} is not a number",
            lossy(&line[first + 1..second])
        ))
    })?;
    let title = std::str::from_utf8(&line[second + 1..])
        .map_err(|_| format_err("title is not valid UTF-8".into()))?
        .to_owned();

    Ok(IndexRecord {
        file_offset,
        record_id,
        title,
        line: line_no,
    })
}

fn parse_u64(digits: &[u8]) -> Option<u64> {
    // `u64::from_str` would also accept a leading '+'.
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Lazy, single-pass reader over an index file.
///
/// Every line must parse; a blank line is a format error unless it is the
/// very last line of the file. Restart by opening a new reader. After the
/// first error the iterator is fused and yields `None`.
pub struct IndexReader {
    path: PathBuf,
    reader: BufReader<DynRead>,
    buf: Vec<u8>,
    line_no: u64,
    done: bool,
}

impl IndexReader {
    /// Open an index file, decompressing it according to its extension or
    /// magic bytes (multistream bzip2 for the usual `.txt.bz2` index).
    ///
    /// # Errors
    /// Returns [`ConvertError::Io`] if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = open_decoded(path)?;
        Ok(Self::from_reader(path, reader))
    }

    /// Read index lines from an already decompressed stream. `path` is only
    /// used in error messages.
    pub fn from_reader(path: impl Into<PathBuf>, reader: DynRead) -> Self {
        Self {
            path: path.into(),
            reader: BufReader::with_capacity(1024 * 1024, reader),
            buf: Vec::with_capacity(256),
            line_no: 0,
            done: false,
        }
    }

    /// Number of lines consumed so far.
    #[must_use]
    pub const fn lines_read(&self) -> u64 {
        self.line_no
    }

    fn read_record(&mut self) -> Result<Option<IndexRecord>> {
        self.buf.clear();
        let n = self
            .reader
            .read_until(b'\n', &mut self.buf)
            .map_err(|e| ConvertError::io(&self.path, e))?;
        if n == 0 {
            return Ok(None);
        }
        self.line_no += 1;
        // A single empty line closing the file is tolerated.
        if matches!(self.buf.as_slice(), b"\n" | b"\r\n") && self.at_eof()? {
            return Ok(None);
        }
        parse_index_line(&self.buf, self.line_no).map(Some)
    }

    fn at_eof(&mut self) -> Result<bool> {
        self.reader
            .fill_buf()
            .map(<[u8]>::is_empty)
            .map_err(|e| ConvertError::io(&self.path, e))
    }
}

impl Iterator for IndexReader {
    type Item = Result<IndexRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_u64_rejects_signs_and_blanks() {
        assert_eq!(parse_u64(b"42"), Some(42));
        assert_eq!(parse_u64(b"+42"), None);
        assert_eq!(parse_u64(b""), None);
        assert_eq!(parse_u64(b" 1"), None);
        assert_eq!(parse_u64(b"99999999999999999999999"), None);
    }
}
