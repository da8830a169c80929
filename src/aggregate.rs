//! Ordered aggregation of chunk results.
//!
//! Workers finish chunks in any order. [`ReorderBuffer`] holds finished
//! results keyed by submission sequence number and releases them strictly in
//! sequence; [`Records`] flattens the released per-chunk record lists into a
//! single record stream.

use crate::chunk::RawRecord;
use crate::error::Result;
use std::collections::BTreeMap;

/// Results keyed by sequence number, released only when their turn comes.
#[derive(Debug)]
pub struct ReorderBuffer<T> {
    next: usize,
    pending: BTreeMap<usize, T>,
}

impl<T> Default for ReorderBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ReorderBuffer<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: 0,
            pending: BTreeMap::new(),
        }
    }

    /// Store the result for `seq`.
    ///
    /// Returns `false` (and drops `item`) if `seq` was already released or is
    /// already buffered.
    pub fn insert(&mut self, seq: usize, item: T) -> bool {
        if seq < self.next || self.pending.contains_key(&seq) {
            return false;
        }
        self.pending.insert(seq, item);
        true
    }

    /// Release the result for the next expected sequence number, if it has
    /// arrived.
    pub fn pop_ready(&mut self) -> Option<T> {
        let item = self.pending.remove(&self.next)?;
        self.next += 1;
        Some(item)
    }

    /// Sequence number the buffer is waiting for.
    #[must_use]
    pub const fn next_seq(&self) -> usize {
        self.next
    }

    /// Number of results held back waiting for an earlier one.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }
}

/// Flattens ordered per-chunk results into one record stream.
///
/// A failed chunk yields its error once, after which the stream ends.
pub struct Records<I> {
    chunks: I,
    current: std::vec::IntoIter<RawRecord>,
    failed: bool,
}

impl<I> Records<I>
where
    I: Iterator<Item = Result<Vec<RawRecord>>>,
{
    pub fn new(chunks: I) -> Self {
        Self {
            chunks,
            current: Vec::new().into_iter(),
            failed: false,
        }
    }
}

impl<I> Iterator for Records<I>
where
    I: Iterator<Item = Result<Vec<RawRecord>>>,
{
    type Item = Result<RawRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.current.next() {
                return Some(Ok(record));
            }
            if self.failed {
                return None;
            }
            match self.chunks.next()? {
                Ok(records) => self.current = records.into_iter(),
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
