//! Interval partitioning and chunk scheduling
//!
//! Splits an integer interval into contiguous segments for parallel execution.
//! Two layers are provided:
//!
//! - [`partition`] cuts an [`Interval`] into exactly `w` balanced, contiguous
//!   segments (one per worker). Segment sizes differ by at most one element;
//!   surplus workers receive empty segments.
//! - [`plan`] turns a slot count into a [`SchedulePlan`]: the ordered list of
//!   chunks that workers pick up, shaped by a [`Schedule`] (static, dynamic or
//!   guided). Chunks are always ascending, contiguous and disjoint, so a plan
//!   can be used to split a mutable slice into per-task windows.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while building intervals and plans
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PartitionError {
    #[error("interval start must be at least 1, got 0")]
    ZeroStart,

    #[error("interval is inverted: start {start} > end {end}")]
    Inverted { start: u64, end: u64 },

    #[error("interval [{start}, {end}] is too large to index")]
    Overflow { start: u64, end: u64 },

    #[error("worker count must be greater than 0")]
    NoWorkers,

    #[error("chunk_size must be greater than 0, got {0}")]
    InvalidChunkSize(usize),
}

/// A closed integer interval `[start, end]` with `1 <= start <= end`
///
/// Slot `i` of any field built over the interval holds the value for the
/// integer `start + i`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval {
    start: u64,
    end: u64,
}

impl Interval {
    /// Create an interval, rejecting zero starts, inverted bounds and spans
    /// that cannot be indexed by `usize`
    pub fn new(start: u64, end: u64) -> Result<Self, PartitionError> {
        if start == 0 {
            return Err(PartitionError::ZeroStart);
        }
        if start > end {
            return Err(PartitionError::Inverted { start, end });
        }
        // One past the end must stay representable so segment bounds never wrap
        let fits = end.checked_add(1).is_some()
            && usize::try_from(end - start)
                .ok()
                .and_then(|span| span.checked_add(1))
                .is_some();
        if !fits {
            return Err(PartitionError::Overflow { start, end });
        }
        Ok(Self { start, end })
    }

    /// First integer in the interval
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Last integer in the interval (inclusive)
    pub fn end(&self) -> u64 {
        self.end
    }

    /// Number of integers in the interval
    pub fn len(&self) -> usize {
        (self.end - self.start) as usize + 1
    }

    /// Always false; an interval holds at least one integer
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Returns true if `n` lies inside the interval
    pub fn contains(&self, n: u64) -> bool {
        (self.start..=self.end).contains(&n)
    }

    /// Slot index of integer `n`, if it lies inside the interval
    pub fn index_of(&self, n: u64) -> Option<usize> {
        self.contains(n).then(|| (n - self.start) as usize)
    }

    /// Integer held by slot `index`
    ///
    /// `index` must be below `len()`.
    pub fn value_at(&self, index: usize) -> u64 {
        self.start + index as u64
    }

    /// Integers covered by a segment of this interval
    pub fn values(&self, segment: &Segment) -> std::ops::Range<u64> {
        self.value_at(segment.start)..self.value_at(segment.end)
    }
}

/// How chunks are assigned to workers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Schedule {
    /// One balanced segment per worker, decided up front.
    /// Cheapest when per-element cost is uniform.
    Static,

    /// Fixed-size chunks handed to whichever worker is idle
    Dynamic,

    /// Chunks that shrink as the remaining work shrinks, so expensive tails
    /// are spread over all workers
    #[default]
    Guided,
}

/// Chunk size for dynamic and guided schedules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkSize {
    /// Determine chunk size from worker count and heuristics
    #[default]
    Auto,

    /// Explicit chunk size. For guided schedules this is the minimum chunk.
    Explicit(usize),
}

/// Configuration for autotuning dynamic chunk sizes
#[derive(Debug, Clone, Copy)]
pub struct AutotuneConfig {
    /// Number of workers available
    pub worker_count: usize,

    /// Target minimum chunks per worker (for load balancing)
    /// Default: 4
    pub min_chunks_per_worker: usize,

    /// Target maximum chunks per worker (to limit dispatch overhead)
    /// Default: 64
    pub max_chunks_per_worker: usize,
}

impl Default for AutotuneConfig {
    fn default() -> Self {
        Self {
            worker_count: 1,
            min_chunks_per_worker: 4,
            max_chunks_per_worker: 64,
        }
    }
}

impl AutotuneConfig {
    /// Create a new autotuning configuration with the given worker count
    pub fn with_workers(worker_count: usize) -> Self {
        Self {
            worker_count,
            ..Default::default()
        }
    }
}

/// A contiguous, half-open range of slot indices `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Segment {
    pub start: usize,
    pub end: usize,
}

impl Segment {
    /// Returns the number of slots in this segment
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns true if this segment has no slots
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Returns an iterator over the slot indices in this segment
    pub fn indices(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }
}

/// Split `n` slots into exactly `workers` contiguous segments whose sizes
/// differ by at most one
fn split_even(n: usize, workers: usize) -> Vec<Segment> {
    let base = n / workers;
    let rem = n % workers;

    let mut segments = Vec::with_capacity(workers);
    let mut start = 0;
    for w in 0..workers {
        let len = if w < rem { base + 1 } else { base };
        segments.push(Segment {
            start,
            end: start + len,
        });
        start += len;
    }
    segments
}

/// Partition an interval into one contiguous segment per worker
///
/// Segments are disjoint, ascending and their union is the whole interval.
/// When the interval holds fewer integers than there are workers, the
/// trailing segments are empty.
///
/// # Example
///
/// ```
/// use rangescan::partition::{partition, Interval};
///
/// let interval = Interval::new(1, 10).unwrap();
/// let segments = partition(&interval, 3).unwrap();
/// let sizes: Vec<_> = segments.iter().map(|s| s.len()).collect();
/// assert_eq!(sizes, vec![4, 3, 3]);
/// assert_eq!(interval.values(&segments[1]), 5..8);
/// ```
pub fn partition(interval: &Interval, workers: usize) -> Result<Vec<Segment>, PartitionError> {
    if workers == 0 {
        return Err(PartitionError::NoWorkers);
    }
    Ok(split_even(interval.len(), workers))
}

/// Compute a dynamic chunk size using autotuning heuristics
///
/// The autotuning considers:
/// 1. Worker count: more workers = smaller chunks
/// 2. Load balancing: at least min_chunks_per_worker so idle workers can steal
/// 3. Dispatch overhead: at most max_chunks_per_worker
fn autotune_chunk_size(n: usize, config: &AutotuneConfig) -> usize {
    if config.worker_count == 0 {
        return n.max(1);
    }

    let min_chunks = config.worker_count * config.min_chunks_per_worker.max(1);
    let max_chunks = config.worker_count * config.max_chunks_per_worker.max(1);

    let mut chunk = n.div_ceil(min_chunks).max(1);

    // Too many chunks would spend more time dispatching than computing
    if n.div_ceil(chunk) > max_chunks {
        chunk = n.div_ceil(max_chunks);
    }

    chunk.max(1)
}

/// Create fixed-size contiguous chunks covering [0, n)
fn create_fixed_chunks(n: usize, chunk_size: usize) -> Vec<Segment> {
    let mut chunks = Vec::with_capacity(n.div_ceil(chunk_size));

    let mut start = 0;
    while start < n {
        let end = (start + chunk_size).min(n);
        chunks.push(Segment { start, end });
        start = end;
    }

    chunks
}

/// Create guided chunks covering [0, n)
///
/// Each chunk takes `ceil(remaining / workers)` slots, never less than
/// `min_chunk`, so chunk sizes decrease towards the end of the range.
fn create_guided_chunks(n: usize, workers: usize, min_chunk: usize) -> Vec<Segment> {
    let mut chunks = Vec::new();

    let mut start = 0;
    while start < n {
        let remaining = n - start;
        let len = remaining.div_ceil(workers).max(min_chunk).min(remaining);
        chunks.push(Segment {
            start,
            end: start + len,
        });
        start += len;
    }

    chunks
}

/// An ordered list of chunks to be executed by a worker pool
#[derive(Debug, Clone)]
pub struct SchedulePlan {
    /// Total number of slots being scheduled
    pub n: usize,

    /// Schedule used to shape the chunks
    pub schedule: Schedule,

    /// Chunk size (static: largest segment; guided: first and largest chunk)
    pub chunk_size: usize,

    /// The chunks, ascending and contiguous
    pub chunks: Vec<Segment>,
}

impl SchedulePlan {
    /// Returns the number of chunks
    pub fn num_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Returns an iterator over the chunks
    pub fn iter(&self) -> std::slice::Iter<'_, Segment> {
        self.chunks.iter()
    }

    /// Verify that all indices from 0 to n-1 are covered exactly once
    #[cfg(test)]
    pub(crate) fn verify_coverage(&self) -> bool {
        let mut seen = vec![false; self.n];
        for chunk in &self.chunks {
            for idx in chunk.indices() {
                if idx >= self.n || seen[idx] {
                    return false;
                }
                seen[idx] = true;
            }
        }
        seen.iter().all(|&b| b)
    }
}

impl<'a> IntoIterator for &'a SchedulePlan {
    type Item = &'a Segment;
    type IntoIter = std::slice::Iter<'a, Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Create a chunk plan for `n` slots
///
/// # Arguments
///
/// * `n` - Total number of slots (zero yields a plan with nothing to do)
/// * `schedule` - How chunks are shaped
/// * `chunk_size` - Explicit chunk size, or Auto for autotuning
/// * `config` - Worker count and autotuning bounds
///
/// # Example
///
/// ```
/// use rangescan::partition::{plan, AutotuneConfig, ChunkSize, Schedule};
///
/// let config = AutotuneConfig::with_workers(4);
/// let plan = plan(100, Schedule::Guided, ChunkSize::Explicit(5), &config).unwrap();
///
/// // First chunk is a quarter of the work, later chunks shrink towards the minimum
/// assert_eq!(plan.chunks[0].len(), 25);
/// assert_eq!(plan.chunks[1].len(), 19);
/// assert_eq!(plan.chunks[7].len(), 5);
/// ```
pub fn plan(
    n: usize,
    schedule: Schedule,
    chunk_size: ChunkSize,
    config: &AutotuneConfig,
) -> Result<SchedulePlan, PartitionError> {
    if config.worker_count == 0 {
        return Err(PartitionError::NoWorkers);
    }
    if let ChunkSize::Explicit(0) = chunk_size {
        return Err(PartitionError::InvalidChunkSize(0));
    }

    let (chunk, chunks) = match schedule {
        Schedule::Static => {
            let segments = split_even(n, config.worker_count);
            (n.div_ceil(config.worker_count), segments)
        }
        Schedule::Dynamic => {
            let chunk = match chunk_size {
                ChunkSize::Auto => autotune_chunk_size(n, config),
                ChunkSize::Explicit(size) => size,
            };
            (chunk, create_fixed_chunks(n, chunk))
        }
        Schedule::Guided => {
            let min_chunk = match chunk_size {
                ChunkSize::Auto => 1,
                ChunkSize::Explicit(size) => size,
            };
            let chunks = create_guided_chunks(n, config.worker_count, min_chunk);
            let first = chunks.first().map_or(0, Segment::len);
            (first, chunks)
        }
    };

    Ok(SchedulePlan {
        n,
        schedule,
        chunk_size: chunk,
        chunks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn covers(interval: &Interval, segments: &[Segment]) -> bool {
        let mut next = 0;
        for segment in segments {
            if segment.start != next || segment.end < segment.start {
                return false;
            }
            next = segment.end;
        }
        next == interval.len()
    }

    #[test]
    fn test_interval_rejects_bad_bounds() {
        assert_eq!(Interval::new(0, 5), Err(PartitionError::ZeroStart));
        assert_eq!(
            Interval::new(7, 3),
            Err(PartitionError::Inverted { start: 7, end: 3 })
        );
        assert!(matches!(
            Interval::new(1, u64::MAX),
            Err(PartitionError::Overflow { .. })
        ));
    }

    #[test]
    fn test_interval_indexing() {
        let interval = Interval::new(10, 19).unwrap();
        assert_eq!(interval.len(), 10);
        assert_eq!(interval.index_of(10), Some(0));
        assert_eq!(interval.index_of(19), Some(9));
        assert_eq!(interval.index_of(20), None);
        assert_eq!(interval.index_of(9), None);
        assert_eq!(interval.value_at(3), 13);
    }

    #[test]
    fn test_single_element_interval() {
        let interval = Interval::new(5, 5).unwrap();
        assert_eq!(interval.len(), 1);
        let segments = partition(&interval, 1).unwrap();
        assert_eq!(segments, vec![Segment { start: 0, end: 1 }]);
    }

    #[test]
    fn test_partition_simple() {
        let interval = Interval::new(1, 10).unwrap();
        let segments = partition(&interval, 4).unwrap();

        assert_eq!(segments.len(), 4);
        assert_eq!(segments[0], Segment { start: 0, end: 3 });
        assert_eq!(segments[1], Segment { start: 3, end: 6 });
        assert_eq!(segments[2], Segment { start: 6, end: 8 });
        assert_eq!(segments[3], Segment { start: 8, end: 10 });
        assert!(covers(&interval, &segments));
    }

    #[test]
    fn test_partition_more_workers_than_items() {
        let interval = Interval::new(3, 5).unwrap();
        let segments = partition(&interval, 5).unwrap();

        assert_eq!(segments.len(), 5);
        assert_eq!(segments.iter().filter(|s| s.is_empty()).count(), 2);
        assert!(covers(&interval, &segments));
    }

    #[test]
    fn test_partition_exhaustive() {
        for (start, end) in [(1, 1), (1, 2), (1, 7), (5, 14), (1, 100), (37, 1000)] {
            let interval = Interval::new(start, end).unwrap();
            for workers in 1..=interval.len() + 5 {
                let segments = partition(&interval, workers).unwrap();
                assert_eq!(segments.len(), workers);
                assert!(
                    covers(&interval, &segments),
                    "coverage failed for [{}, {}] with {} workers",
                    start,
                    end,
                    workers
                );

                let max = segments.iter().map(Segment::len).max().unwrap();
                let min = segments.iter().map(Segment::len).min().unwrap();
                assert!(max - min <= 1, "imbalance {} for {} workers", max - min, workers);
            }
        }
    }

    #[test]
    fn test_static_plan_matches_partition() {
        let config = AutotuneConfig::with_workers(3);
        let plan = plan(10, Schedule::Static, ChunkSize::Auto, &config).unwrap();

        let interval = Interval::new(1, 10).unwrap();
        assert_eq!(plan.chunks, partition(&interval, 3).unwrap());
        assert_eq!(plan.chunk_size, 4);
        assert!(plan.verify_coverage());
    }

    #[test]
    fn test_dynamic_explicit() {
        let config = AutotuneConfig::with_workers(2);
        let plan = plan(10, Schedule::Dynamic, ChunkSize::Explicit(3), &config).unwrap();

        assert_eq!(plan.num_chunks(), 4);
        assert_eq!(plan.chunks[3], Segment { start: 9, end: 10 });
        assert!(plan.verify_coverage());
    }

    #[test]
    fn test_dynamic_autotuning() {
        let config = AutotuneConfig::with_workers(8);
        let plan = plan(1000, Schedule::Dynamic, ChunkSize::Auto, &config).unwrap();

        let num_chunks = plan.num_chunks();
        assert!(num_chunks >= 32, "Too few chunks: {}", num_chunks);
        assert!(num_chunks <= 512, "Too many chunks: {}", num_chunks);
        assert!(plan.verify_coverage());
    }

    #[test]
    fn test_guided_chunks_shrink() {
        let config = AutotuneConfig::with_workers(4);
        let plan = plan(1000, Schedule::Guided, ChunkSize::Auto, &config).unwrap();

        assert!(plan.verify_coverage());
        assert_eq!(plan.chunks[0].len(), 250);
        for pair in plan.chunks.windows(2) {
            assert!(pair[0].len() >= pair[1].len());
        }
        assert_eq!(plan.chunks.last().unwrap().len(), 1);
    }

    #[test]
    fn test_guided_respects_min_chunk() {
        let config = AutotuneConfig::with_workers(4);
        let plan = plan(103, Schedule::Guided, ChunkSize::Explicit(10), &config).unwrap();

        assert!(plan.verify_coverage());
        // Every chunk but the tail honours the minimum
        let (tail, body) = plan.chunks.split_last().unwrap();
        assert!(body.iter().all(|c| c.len() >= 10));
        assert!(tail.len() <= 10 || body.is_empty());
    }

    #[test]
    fn test_coverage_all_schedules() {
        for n in [0, 1, 2, 7, 10, 100, 1000] {
            for workers in [1, 2, 3, 8] {
                for chunk in [ChunkSize::Auto, ChunkSize::Explicit(1), ChunkSize::Explicit(7)] {
                    for schedule in [Schedule::Static, Schedule::Dynamic, Schedule::Guided] {
                        let config = AutotuneConfig::with_workers(workers);
                        let plan = plan(n, schedule, chunk, &config).unwrap();
                        assert!(
                            plan.verify_coverage(),
                            "{:?} coverage failed for n={}, workers={}, chunk={:?}",
                            schedule,
                            n,
                            workers,
                            chunk
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_error_cases() {
        let config = AutotuneConfig::with_workers(1);
        assert!(matches!(
            plan(10, Schedule::Dynamic, ChunkSize::Explicit(0), &config),
            Err(PartitionError::InvalidChunkSize(0))
        ));

        let zero_config = AutotuneConfig::with_workers(0);
        assert!(matches!(
            plan(10, Schedule::Guided, ChunkSize::Auto, &zero_config),
            Err(PartitionError::NoWorkers)
        ));

        let interval = Interval::new(1, 10).unwrap();
        assert_eq!(partition(&interval, 0), Err(PartitionError::NoWorkers));
    }

    #[test]
    fn test_segment_values() {
        let interval = Interval::new(100, 109).unwrap();
        let segment = Segment { start: 2, end: 5 };
        assert_eq!(interval.values(&segment).collect::<Vec<_>>(), vec![102, 103, 104]);
        assert_eq!(segment.indices().len(), 3);
    }
}
