//! Bounded worker pool and nested-parallelism policy
//!
//! Every parallel region of a scan runs inside one [`WorkerPool`]. The pool
//! owns a fixed number of rayon threads; regions are fork-join, so no worker
//! leaves a region before all of its chunks are done, and writes made in one
//! region are visible to the next.
//!
//! Nested regions (a parallel divisor sum inside a parallel field sweep) are
//! governed by [`NestPolicy`]. Rayon schedules nested work onto the threads
//! of the pool that is already running, so `SharedPool` never grows the
//! number of live workers beyond the pool size.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ScanError;
use crate::partition::{
    plan, AutotuneConfig, ChunkSize, PartitionError, Schedule, SchedulePlan, Segment,
};

/// Whether a region may open another parallel region inside itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NestPolicy {
    /// Inner computations run sequentially on the worker that owns the element
    #[default]
    Disabled,

    /// Inner computations fork onto the same pool; total concurrency stays
    /// capped at the pool size
    SharedPool,
}

/// A fixed-size pool of worker threads
#[derive(Debug)]
pub struct WorkerPool {
    pool: rayon::ThreadPool,
    nested: NestPolicy,
}

impl WorkerPool {
    /// Build a pool with `workers` threads, or rayon's default (available
    /// parallelism) when `None`
    pub fn new(workers: Option<usize>, nested: NestPolicy) -> Result<Self, ScanError> {
        if workers == Some(0) {
            return Err(PartitionError::NoWorkers.into());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.unwrap_or(0))
            .thread_name(|i| format!("rangescan-worker-{}", i))
            .build()
            .map_err(|e| ScanError::Pool(e.to_string()))?;

        debug!(
            workers = pool.current_num_threads(),
            ?nested,
            "worker pool created"
        );

        Ok(Self { pool, nested })
    }

    /// Number of worker threads
    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Nested-parallelism policy of this pool
    pub fn nested(&self) -> NestPolicy {
        self.nested
    }

    /// Autotuning bounds for this pool's worker count
    pub fn autotune(&self) -> AutotuneConfig {
        AutotuneConfig::with_workers(self.workers())
    }

    /// Plan `n` slots for this pool
    pub fn plan(
        &self,
        n: usize,
        schedule: Schedule,
        chunk_size: ChunkSize,
    ) -> Result<SchedulePlan, ScanError> {
        Ok(plan(n, schedule, chunk_size, &self.autotune())?)
    }

    /// Run `op` inside the pool
    pub fn install<OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }

    /// Run `f` once per chunk of `plan`, one task per chunk
    ///
    /// Returns after every chunk has finished. The first error stops
    /// further chunks from being picked up.
    pub fn try_for_each_chunk<F, E>(&self, plan: &SchedulePlan, f: F) -> Result<(), E>
    where
        F: Fn(&Segment) -> Result<(), E> + Sync + Send,
        E: Send,
    {
        self.pool.install(|| {
            plan.chunks
                .par_iter()
                .with_max_len(1)
                .try_for_each(|chunk| f(chunk))
        })
    }

    /// Run `f` once per chunk of `plan`, one task per chunk
    pub fn for_each_chunk<F>(&self, plan: &SchedulePlan, f: F)
    where
        F: Fn(&Segment) + Sync + Send,
    {
        self.pool.install(|| {
            plan.chunks
                .par_iter()
                .with_max_len(1)
                .for_each(|chunk| f(chunk))
        })
    }
}
