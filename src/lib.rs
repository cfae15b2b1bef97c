//! Rangescan: parallel range scans over integer intervals
//!
//! This crate provides an engine that partitions an integer interval, computes
//! one scalar per integer in parallel into a shared field, and then queries the
//! field: an equal-value pair search (numbers of equal abundance) or in-place
//! sieve marking (primes). Every parallel region is fork-join on a bounded
//! worker pool, and every shared write is either disjoint or idempotent.

pub mod abundance;
pub mod config;
pub mod engine;
pub mod equality;
pub mod error;
pub mod field;
pub mod partition;
pub mod pool;
pub mod report;
pub mod sieve;

// Re-export main types at crate root
pub use abundance::{abundance, sum_of_divisors, AbundanceComputer, ScalarFieldComputer};
pub use config::{ConfigError, ScanConfig};
pub use engine::{
    compute_abundance_field, find_equal_abundance_pairs, sieve_of_eratosthenes, RangeScanEngine,
    ScanStats,
};
pub use equality::{EqualityPolicy, EqualityScanner, PairSearch};
pub use error::ScanError;
pub use field::{Fetchable, Materializable, SharedField, SharedView, StrikeField};
pub use partition::{partition, plan, ChunkSize, Interval, Schedule, SchedulePlan, Segment};
pub use pool::{NestPolicy, WorkerPool};
pub use report::{Collector, SerializedWriter, Sink};
pub use sieve::{MarkingMode, Primes, SegmentedSieveMarker, SieveState};
