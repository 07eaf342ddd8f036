//! Fixed-size worker pool used by the parallel clustering stages.

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::cluster::types::ClusteringError;

/// A rayon pool with exactly `workers` threads plus the chunking rule the
/// stages share.
///
/// Input indices are split into contiguous chunks of `ceil(n / workers)`, so
/// there are never more chunks than workers.
pub struct WorkerPool {
    pool: ThreadPool,
    workers: usize,
}

impl WorkerPool {
    /// Builds a pool with `workers` threads (at least one).
    pub fn new(workers: usize) -> Result<Self, ClusteringError> {
        let workers = workers.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|index| format!("kmeans-worker-{index}"))
            .build()?;

        Ok(Self { pool, workers })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Chunk length for `len` items. Never zero.
    pub fn chunk_size(&self, len: usize) -> usize {
        chunk_size(len, self.workers)
    }

    /// Runs `op` inside the pool. Blocks until it returns.
    pub fn install<OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers)
            .finish()
    }
}

/// `ceil(len / workers)`, with a floor of one.
pub fn chunk_size(len: usize, workers: usize) -> usize {
    len.div_ceil(workers.max(1)).max(1)
}
