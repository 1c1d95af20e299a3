//! Fixed-size worker pool with a blocking range-parallel-for
//!
//! Workers are started once and reused for every step. A parallel-for splits
//! `[0, n)` into one contiguous chunk per worker and returns only after every
//! chunk has finished; there is no rebalancing of uneven chunks. A panic in
//! any chunk propagates to the caller.

use std::ops::Range;

use crate::error::Result;

pub struct ThreadPool {
    pool: rayon::ThreadPool,
    workers: usize,
}

impl ThreadPool {
    pub fn new(workers: usize) -> Result<Self> {
        let workers = workers.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("particle-worker-{i}"))
            .build()?;
        log::debug!("Started thread pool with {} workers", workers);
        Ok(Self { pool, workers })
    }

    /// Pool sized at `multiplier` workers per hardware thread
    pub fn with_multiplier(multiplier: usize) -> Result<Self> {
        let hw = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self::new(hw * multiplier)
    }

    #[inline]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Chunk length used to split `n` items across the workers
    #[inline]
    pub fn chunk_len(&self, n: usize) -> usize {
        n.div_ceil(self.workers).max(1)
    }

    /// Run `f` once per contiguous chunk of `[0, n)` and wait for all of them
    pub fn parallel_for<F>(&self, n: usize, f: F)
    where
        F: Fn(Range<usize>) + Sync,
    {
        if n == 0 {
            return;
        }
        let chunk = self.chunk_len(n);
        let f = &f;
        self.pool.scope(|s| {
            for start in (0..n).step_by(chunk) {
                let end = (start + chunk).min(n);
                s.spawn(move |_| f(start..end));
            }
        });
    }

    /// Run `f` on disjoint mutable chunks of `items`, passing each chunk's start index
    pub fn for_each_chunk_mut<T, F>(&self, items: &mut [T], f: F)
    where
        T: Send,
        F: Fn(usize, &mut [T]) + Sync,
    {
        if items.is_empty() {
            return;
        }
        let chunk = self.chunk_len(items.len());
        let f = &f;
        self.pool.scope(|s| {
            for (i, part) in items.chunks_mut(chunk).enumerate() {
                s.spawn(move |_| f(i * chunk, part));
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[test]
    fn parallel_for_covers_range_once() {
        let pool = ThreadPool::new(4).unwrap();
        let hits: Vec<AtomicUsize> = (0..103).map(|_| AtomicUsize::new(0)).collect();
        pool.parallel_for(hits.len(), |range| {
            for i in range {
                hits[i].fetch_add(1, Ordering::Relaxed);
            }
        });
        assert!(hits.iter().all(|h| h.load(Ordering::Relaxed) == 1));
    }

    #[test]
    fn one_contiguous_chunk_per_worker() {
        let pool = ThreadPool::new(4).unwrap();
        let chunks = Mutex::new(Vec::new());
        pool.parallel_for(10, |range| chunks.lock().unwrap().push(range));

        let mut chunks = chunks.into_inner().unwrap();
        chunks.sort_by_key(|r| r.start);
        assert_eq!(chunks, vec![0..3, 3..6, 6..9, 9..10]);
    }

    #[test]
    fn fewer_items_than_workers() {
        let pool = ThreadPool::new(8).unwrap();
        let calls = AtomicUsize::new(0);
        pool.parallel_for(3, |range| {
            assert_eq!(range.len(), 1);
            calls.fetch_add(1, Ordering::Relaxed);
        });
        assert_eq!(calls.load(Ordering::Relaxed), 3);

        pool.parallel_for(0, |_| panic!("no work expected"));
    }

    #[test]
    fn chunked_mutation_sees_start_offsets() {
        let pool = ThreadPool::new(3).unwrap();
        let mut values = vec![0usize; 50];
        pool.for_each_chunk_mut(&mut values, |start, chunk| {
            for (k, v) in chunk.iter_mut().enumerate() {
                *v = start + k;
            }
        });
        assert!(values.iter().enumerate().all(|(i, &v)| i == v));
    }

    #[test]
    fn blocks_until_all_chunks_finish() {
        let pool = ThreadPool::new(4).unwrap();
        let done = AtomicUsize::new(0);
        pool.parallel_for(4, |_| {
            std::thread::sleep(std::time::Duration::from_millis(10));
            done.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(done.load(Ordering::SeqCst), 4);
    }
}
