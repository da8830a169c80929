//! Chunk planner.
//!
//! The dump is a concatenation of independently compressed blocks and every
//! block start appears as an offset in the index. Taking the distinct offsets
//! in first-seen order and pairing each with the next one (or with the dump
//! length, for the last) recovers the block layout as a list of [`Chunk`]s
//! that partition `[first_offset, file_len)`.

use crate::error::{ConvertError, Result};
use crate::index::IndexRecord;
use tracing::debug;

/// One independently decompressible byte range of the dump.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Chunk {
    pub offset: u64,
    pub size: u64,
}

impl Chunk {
    /// Exclusive end offset.
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.offset + self.size
    }
}

/// Result of planning: the ordered chunks plus how many index records
/// they cover.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChunkPlan {
    pub chunks: Vec<Chunk>,
    pub record_count: u64,
}

/// Derive the chunk list from index records in file order.
///
/// Titles are dropped as records stream past; only distinct offsets are kept.
///
/// # Errors
/// - Any error yielded by `records` is returned as is.
/// - [`ConvertError::EmptyIndex`] if there are no records.
/// - [`ConvertError::NonMonotonic`] if an offset is lower than the previous
///   distinct offset.
/// - [`ConvertError::ChunkBeyondEnd`] if the last offset is at or past
///   `file_len`, which would make the final chunk empty.
pub fn plan_chunks<I>(records: I, file_len: u64) -> Result<ChunkPlan>
where
    I: IntoIterator<Item = Result<IndexRecord>>,
{
    let mut offsets: Vec<u64> = Vec::new();
    let mut record_count = 0u64;

    for record in records {
        let record = record?;
        record_count += 1;
        match offsets.last() {
            Some(&last) if record.file_offset == last => {}
            Some(&last) if record.file_offset < last => {
                return Err(ConvertError::NonMonotonic {
                    line: record.line,
                    offset: record.file_offset,
                    previous: last,
                });
            }
            _ => offsets.push(record.file_offset),
        }
    }

    let chunks = chunks_from_offsets(&offsets, file_len)?;
    debug!(
        chunks = chunks.len(),
        records = record_count,
        "planned dump chunks"
    );
    Ok(ChunkPlan {
        chunks,
        record_count,
    })
}

/// Pair strictly increasing block offsets into chunks ending at `file_len`.
fn chunks_from_offsets(offsets: &[u64], file_len: u64) -> Result<Vec<Chunk>> {
    let Some(&last) = offsets.last() else {
        return Err(ConvertError::EmptyIndex);
    };

    let mut chunks = Vec::with_capacity(offsets.len());
    for pair in offsets.windows(2) {
        let (offset, next) = (pair[0], pair[1]);
        debug_assert!(offset < next, "offsets must strictly increase");
        chunks.push(Chunk {
            offset,
            size: next - offset,
        });
    }

    if last >= file_len {
        return Err(ConvertError::ChunkBeyondEnd {
            offset: last,
            file_len,
        });
    }
    chunks.push(Chunk {
        offset: last,
        size: file_len - last,
    });
    Ok(chunks)
}
