//! Fixed-size worker pool with in-order result delivery.
//!
//! Tasks run on a dedicated rayon thread pool (OS threads). Completions come
//! back over a channel tagged with their submission sequence number and pass
//! through a [`ReorderBuffer`], so the consumer sees results in submission
//! order no matter which worker finishes first. The consumer only blocks when
//! the next expected result has not arrived yet.

use crate::aggregate::ReorderBuffer;
use crate::error::Result;
use crossbeam_channel::{Receiver, Sender, unbounded};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// How chunks are decoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecMode {
    /// Decode every chunk on the calling thread, one after another.
    Sequential,
    /// Decode on a worker pool. `None` picks the defaults: one worker per CPU
    /// and a window of twice the worker count.
    Parallel {
        workers: Option<usize>,
        window: Option<usize>,
    },
}

impl Default for ExecMode {
    fn default() -> Self {
        Self::Parallel {
            workers: None,
            window: None,
        }
    }
}

/// A bounded pool of OS threads.
pub struct WorkerPool {
    pool: Arc<ThreadPool>,
    workers: usize,
    window: usize,
}

impl WorkerPool {
    /// Build a pool of `workers` threads (default: CPU count) that keeps at
    /// most `window` tasks outstanding (default: `2 * workers`).
    ///
    /// # Errors
    /// Returns [`crate::ConvertError::WorkerPool`] if the threads cannot be spawned.
    pub fn new(workers: Option<usize>, window: Option<usize>) -> Result<Self> {
        let workers = workers.unwrap_or_else(num_cpus::get).max(1);
        let window = window.unwrap_or(2 * workers).max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("dumpshard-worker-{i}"))
            .build()?;
        debug!(workers, window, "started worker pool");
        Ok(Self {
            pool: Arc::new(pool),
            workers,
            window,
        })
    }

    #[must_use]
    pub const fn workers(&self) -> usize {
        self.workers
    }

    #[must_use]
    pub const fn window(&self) -> usize {
        self.window
    }

    /// Run `task` over `inputs` and return the results in input order.
    ///
    /// Tasks are submitted lazily as the consumer advances. After the first
    /// failure no further tasks are submitted and queued tasks past the
    /// failing one return without running; the failing result is yielded in
    /// its turn and the iterator then ends.
    pub fn map_ordered<I, T, F>(&self, inputs: Vec<I>, task: F) -> Ordered<I, T, F>
    where
        I: Send + 'static,
        T: Send + 'static,
        F: Fn(I) -> Result<T> + Send + Sync + 'static,
    {
        let (tx, rx) = unbounded();
        Ordered {
            pool: Arc::clone(&self.pool),
            total: inputs.len(),
            inputs: inputs.into_iter().enumerate(),
            task: Arc::new(task),
            tx,
            rx,
            reorder: ReorderBuffer::new(),
            submitted: 0,
            window: self.window,
            cancel_after: Arc::new(AtomicUsize::new(usize::MAX)),
            done: false,
        }
    }
}

/// In-order iterator over the results of [`WorkerPool::map_ordered`].
pub struct Ordered<I, T, F> {
    pool: Arc<ThreadPool>,
    inputs: std::iter::Enumerate<std::vec::IntoIter<I>>,
    task: Arc<F>,
    tx: Sender<(usize, Result<T>)>,
    rx: Receiver<(usize, Result<T>)>,
    reorder: ReorderBuffer<Result<T>>,
    submitted: usize,
    total: usize,
    window: usize,
    /// Tasks with a higher sequence number skip their work.
    cancel_after: Arc<AtomicUsize>,
    done: bool,
}

impl<I, T, F> Ordered<I, T, F>
where
    I: Send + 'static,
    T: Send + 'static,
    F: Fn(I) -> Result<T> + Send + Sync + 'static,
{
    fn halted(&self) -> bool {
        self.cancel_after.load(Ordering::Acquire) != usize::MAX
    }

    fn dispatch(&mut self) {
        while !self.halted() && self.submitted - self.reorder.next_seq() < self.window {
            let Some((seq, input)) = self.inputs.next() else {
                break;
            };
            let task = Arc::clone(&self.task);
            let tx = self.tx.clone();
            let cancel_after = Arc::clone(&self.cancel_after);
            self.pool.spawn(move || {
                if seq > cancel_after.load(Ordering::Acquire) {
                    return;
                }
                let result = task(input);
                if result.is_err() {
                    cancel_after.fetch_min(seq, Ordering::AcqRel);
                }
                // The receiver is gone only when the consumer was dropped.
                let _ = tx.send((seq, result));
            });
            self.submitted += 1;
        }
    }
}

impl<I, T, F> Iterator for Ordered<I, T, F>
where
    I: Send + 'static,
    T: Send + 'static,
    F: Fn(I) -> Result<T> + Send + Sync + 'static,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.reorder.next_seq() >= self.total {
            return None;
        }
        self.dispatch();
        loop {
            if let Some(result) = self.reorder.pop_ready() {
                if result.is_err() {
                    self.done = true;
                } else {
                    self.dispatch();
                }
                return Some(result);
            }
            // `self.tx` keeps the channel open, and every task at or below
            // the cancel point sends exactly once, so this cannot hang on a
            // sequence number that will never arrive.
            let (seq, result) = self.rx.recv().ok()?;
            self.reorder.insert(seq, result);
        }
    }
}

impl<I, T, F> Drop for Ordered<I, T, F> {
    fn drop(&mut self) {
        self.cancel_after.store(0, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_defaults_to_twice_the_workers() -> Result<()> {
        let pool = WorkerPool::new(Some(3), None)?;
        assert_eq!(pool.workers(), 3);
        assert_eq!(pool.window(), 6);
        let pool = WorkerPool::new(Some(0), Some(0))?;
        assert_eq!((pool.workers(), pool.window()), (1, 1));
        Ok(())
    }
}
