//! Range-scan engine
//!
//! [`RangeScanEngine`] owns a worker pool and a [`ScanConfig`] and runs the
//! three scans:
//!
//! - [`RangeScanEngine::compute_abundance_field`]: partition the interval,
//!   compute every abundance in parallel into a [`SharedField`].
//! - [`RangeScanEngine::find_equal_abundance_pairs`]: the above, followed by
//!   an equality scan over the completed field.
//! - [`RangeScanEngine::sieve_of_eratosthenes`]: seed a primality field and
//!   mark it.
//!
//! All preconditions are checked before the first parallel region starts.
//! Scans cannot be cancelled once started.
//!
//! # Example
//!
//! ```
//! use rangescan::{Interval, RangeScanEngine, ScanConfig};
//!
//! let engine = RangeScanEngine::new(ScanConfig::with_workers(4)).unwrap();
//!
//! let pairs = engine
//!     .find_equal_abundance_pairs(Interval::new(1, 30).unwrap())
//!     .unwrap();
//! assert_eq!(pairs, vec![(6, 28)]);
//!
//! let primes = engine.sieve_of_eratosthenes(20).unwrap();
//! assert_eq!(primes, vec![2, 3, 5, 7, 11, 13, 17, 19]);
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::abundance::{AbundanceComputer, ScalarFieldComputer};
use crate::config::ScanConfig;
use crate::equality::EqualityScanner;
use crate::error::ScanError;
use crate::field::{Fetchable, SharedField};
use crate::partition::Interval;
use crate::pool::WorkerPool;
use crate::report::{Collector, Sink};
use crate::sieve::{Primes, SegmentedSieveMarker};

/// Summary of one reporting scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanStats {
    /// Integers covered by the scan
    pub items: usize,

    /// Results handed to the sink
    pub results: usize,

    /// Wall-clock time of the scan
    pub elapsed: Duration,
}

/// Parallel range-scan engine
#[derive(Debug)]
pub struct RangeScanEngine {
    config: ScanConfig,
    pool: WorkerPool,
}

impl RangeScanEngine {
    /// Build an engine and its worker pool
    pub fn new(config: ScanConfig) -> Result<Self, ScanError> {
        config.validate()?;
        let pool = WorkerPool::new(config.workers, config.nested)?;
        Ok(Self { config, pool })
    }

    /// Build an engine with `workers` threads and default options
    pub fn with_workers(workers: usize) -> Result<Self, ScanError> {
        Self::new(ScanConfig::with_workers(workers))
    }

    /// Configuration in use
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Number of worker threads
    pub fn workers(&self) -> usize {
        self.pool.workers()
    }

    /// The worker pool every region runs on
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Compute `computer` for every integer of `interval`
    pub fn compute_field<C>(
        &self,
        interval: Interval,
        computer: &C,
    ) -> Result<SharedField<C::Value>, ScanError>
    where
        C: ScalarFieldComputer,
        C::Value: Default,
    {
        computer.check(&interval)?;
        let plan = self
            .pool
            .plan(interval.len(), self.config.schedule, self.config.chunk_size)?;

        debug!(
            start = interval.start(),
            end = interval.end(),
            schedule = ?plan.schedule,
            chunks = plan.num_chunks(),
            workers = self.pool.workers(),
            "field sweep started"
        );
        let started = Instant::now();

        let mut field = SharedField::filled(interval, C::Value::default());
        field.fill_with(&self.pool, &plan, |n| computer.compute(n))?;

        debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "field sweep finished"
        );
        Ok(field)
    }

    /// Abundance of every integer of `interval`
    pub fn compute_abundance_field(&self, interval: Interval) -> Result<SharedField<f64>, ScanError> {
        let started = Instant::now();
        let field = self.compute_field(interval, &AbundanceComputer::new(self.config.nested))?;
        info!(
            items = field.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "abundance field computed"
        );
        Ok(field)
    }

    /// Report every equal pair of an abundance field to `sink`
    ///
    /// Pairs are `(a, b)` integers with `a < b`, in no particular order.
    pub fn report_equal_pairs<S>(&self, field: &SharedField<f64>, sink: &S) -> Result<usize, ScanError>
    where
        S: Sink<(u64, u64)>,
    {
        let scanner = EqualityScanner::new(self.config.equality, self.config.pair_search);
        let view = field.fetch();
        scanner.scan(view.as_slice(), field.interval().start(), &self.pool, sink)
    }

    /// Stream every pair of integers in `interval` with equal abundance to
    /// `sink`
    pub fn report_equal_abundance_pairs<S>(
        &self,
        interval: Interval,
        sink: &S,
    ) -> Result<ScanStats, ScanError>
    where
        S: Sink<(u64, u64)>,
    {
        let started = Instant::now();
        let field = self.compute_abundance_field(interval)?;
        let results = self.report_equal_pairs(&field, sink)?;
        let stats = ScanStats {
            items: field.len(),
            results,
            elapsed: started.elapsed(),
        };

        info!(
            start = interval.start(),
            end = interval.end(),
            pairs = stats.results,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "equal-abundance scan finished"
        );
        Ok(stats)
    }

    /// Every pair of integers in `interval` with equal abundance, sorted
    pub fn find_equal_abundance_pairs(&self, interval: Interval) -> Result<Vec<(u64, u64)>, ScanError> {
        let sink = Collector::new();
        self.report_equal_abundance_pairs(interval, &sink)?;
        Ok(sink.into_sorted())
    }

    /// Run the sieve up to and including `limit`
    pub fn primes(&self, limit: u64) -> Result<Primes, ScanError> {
        let started = Instant::now();
        let primes = SegmentedSieveMarker::new(limit, &self.pool)?
            .with_schedule(self.config.schedule, self.config.chunk_size)
            .run(self.config.marking)?;

        info!(
            limit,
            marking = ?self.config.marking,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "sieve finished"
        );
        Ok(primes)
    }

    /// Primes up to and including `limit`, ascending
    pub fn sieve_of_eratosthenes(&self, limit: u64) -> Result<Vec<u64>, ScanError> {
        Ok(self.primes(limit)?.to_vec())
    }

    /// Stream the primes up to `limit` to `sink`
    ///
    /// Emission runs in parallel, so primes arrive in no particular order.
    pub fn report_primes<S>(&self, limit: u64, sink: &S) -> Result<ScanStats, ScanError>
    where
        S: Sink<u64>,
    {
        let started = Instant::now();
        let primes = self.primes(limit)?;
        let flags = primes.as_flags();

        let plan = self
            .pool
            .plan(flags.len(), self.config.schedule, self.config.chunk_size)?;
        let found = AtomicUsize::new(0);
        self.pool.try_for_each_chunk(&plan, |segment| {
            for n in segment.indices().filter(|&n| flags[n]) {
                sink.accept(n as u64)?;
                found.fetch_add(1, Ordering::Relaxed);
            }
            Ok::<(), ScanError>(())
        })?;

        Ok(ScanStats {
            items: flags.len(),
            results: found.into_inner(),
            elapsed: started.elapsed(),
        })
    }
}

/// Abundance of every integer of `interval` with `workers` threads (or the
/// available parallelism)
pub fn compute_abundance_field(
    interval: Interval,
    workers: Option<usize>,
) -> Result<SharedField<f64>, ScanError> {
    engine_for(workers)?.compute_abundance_field(interval)
}

/// Every pair of integers in `interval` with equal abundance, sorted
pub fn find_equal_abundance_pairs(
    interval: Interval,
    workers: Option<usize>,
) -> Result<Vec<(u64, u64)>, ScanError> {
    engine_for(workers)?.find_equal_abundance_pairs(interval)
}

/// Primes up to and including `limit`, ascending
pub fn sieve_of_eratosthenes(limit: u64, workers: Option<usize>) -> Result<Vec<u64>, ScanError> {
    engine_for(workers)?.sieve_of_eratosthenes(limit)
}

fn engine_for(workers: Option<usize>) -> Result<RangeScanEngine, ScanError> {
    RangeScanEngine::new(ScanConfig {
        workers,
        ..Default::default()
    })
}
