//! Equal-value pair search over a completed field
//!
//! Every unordered pair `(i, j)`, `i < j`, whose values compare equal under an
//! [`EqualityPolicy`] is reported exactly once. Two algorithms are available
//! and report the same set of pairs; only the order differs:
//!
//! - [`PairSearch::AllPairs`] compares every pair, O(n^2). The outer index is
//!   spread over the worker pool with a guided plan since early rows carry
//!   more comparisons than late ones.
//! - [`PairSearch::Hashed`] groups equal values in one pass and enumerates
//!   pairs inside each group. Under a tolerance it sorts instead and sweeps a
//!   window, since near-equal values do not share a hash bucket.
//!
//! Abundances are compared exactly by default. Both sides of a comparison are
//! correctly rounded quotients of exact integers, so equal rationals always
//! produce identical floats as long as the divisor sums stay below 2^53.
//! Tolerance comparison is opt-in.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ScanError;
use crate::partition::{ChunkSize, Schedule};
use crate::pool::WorkerPool;
use crate::report::Sink;

/// The one place where two field values are judged equal
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EqualityPolicy {
    /// Bitwise-exact float equality (`a == b`)
    #[default]
    Exact,

    /// `|a - b| <= eps`
    Tolerance(f64),
}

impl EqualityPolicy {
    /// Returns true if `a` and `b` count as equal
    #[inline]
    pub fn matches(&self, a: f64, b: f64) -> bool {
        match *self {
            EqualityPolicy::Exact => a == b,
            EqualityPolicy::Tolerance(eps) => (a - b).abs() <= eps,
        }
    }
}

/// Pair search algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairSearch {
    /// One pass, grouping equal values
    #[default]
    Hashed,

    /// Compare every pair
    AllPairs,
}

/// Reports pairs of equal values in a slice
#[derive(Debug, Clone, Copy, Default)]
pub struct EqualityScanner {
    policy: EqualityPolicy,
    search: PairSearch,
}

impl EqualityScanner {
    /// Create a scanner
    pub fn new(policy: EqualityPolicy, search: PairSearch) -> Self {
        Self { policy, search }
    }

    /// Comparison in use
    pub fn policy(&self) -> EqualityPolicy {
        self.policy
    }

    /// Report every equal pair of `values` to `sink`
    ///
    /// Slot `i` is reported as `base + i`, so a field over `[start, end]`
    /// passes `start` to get integer pairs and `0` gives plain indices.
    /// Returns the number of pairs reported.
    pub fn scan<S>(
        &self,
        values: &[f64],
        base: u64,
        pool: &WorkerPool,
        sink: &S,
    ) -> Result<usize, ScanError>
    where
        S: Sink<(u64, u64)>,
    {
        debug!(
            len = values.len(),
            search = ?self.search,
            policy = ?self.policy,
            "equality scan"
        );
        match (self.search, self.policy) {
            (PairSearch::AllPairs, _) => self.scan_all_pairs(values, base, pool, sink),
            (PairSearch::Hashed, EqualityPolicy::Exact) => scan_buckets(values, base, sink),
            (PairSearch::Hashed, EqualityPolicy::Tolerance(eps)) => {
                scan_sorted_window(values, base, eps, sink)
            }
        }
    }

    fn scan_all_pairs<S>(
        &self,
        values: &[f64],
        base: u64,
        pool: &WorkerPool,
        sink: &S,
    ) -> Result<usize, ScanError>
    where
        S: Sink<(u64, u64)>,
    {
        let plan = pool.plan(values.len(), Schedule::Guided, ChunkSize::Auto)?;
        let found = AtomicUsize::new(0);

        pool.try_for_each_chunk(&plan, |rows| {
            for i in rows.indices() {
                for j in i + 1..values.len() {
                    if self.policy.matches(values[i], values[j]) {
                        sink.accept((base + i as u64, base + j as u64))?;
                        found.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
            Ok::<(), ScanError>(())
        })?;

        Ok(found.into_inner())
    }
}

/// Bucket key for exact comparison; `-0.0` and `0.0` compare equal so they
/// share a key
fn exact_key(v: f64) -> u64 {
    if v == 0.0 {
        0
    } else {
        v.to_bits()
    }
}

fn scan_buckets<S>(values: &[f64], base: u64, sink: &S) -> Result<usize, ScanError>
where
    S: Sink<(u64, u64)>,
{
    let mut buckets: HashMap<u64, Vec<usize>> = HashMap::new();
    for (i, &v) in values.iter().enumerate() {
        // NaN equals nothing, itself included
        if v.is_nan() {
            continue;
        }
        buckets.entry(exact_key(v)).or_default().push(i);
    }

    let mut found = 0;
    for indices in buckets.values().filter(|b| b.len() >= 2) {
        for (k, &i) in indices.iter().enumerate() {
            for &j in &indices[k + 1..] {
                sink.accept((base + i as u64, base + j as u64))?;
                found += 1;
            }
        }
    }
    Ok(found)
}

fn scan_sorted_window<S>(values: &[f64], base: u64, eps: f64, sink: &S) -> Result<usize, ScanError>
where
    S: Sink<(u64, u64)>,
{
    let mut order: Vec<usize> = (0..values.len()).filter(|&i| !values[i].is_nan()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]).then(a.cmp(&b)));

    let mut found = 0;
    for (k, &i) in order.iter().enumerate() {
        for &j in &order[k + 1..] {
            // Same predicate as `EqualityPolicy::matches`, so a NaN eps
            // matches nothing
            if !(values[j] - values[i] <= eps) {
                break;
            }
            sink.accept((base + i.min(j) as u64, base + i.max(j) as u64))?;
            found += 1;
        }
    }
    Ok(found)
}
