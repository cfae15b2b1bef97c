//! Divisor sums and abundance
//!
//! The abundance of `n` is `sigma(n) / n`, where `sigma(n)` is the sum of all
//! positive divisors of `n` including 1 and `n`. Divisors are found by trial
//! division over `1..=n`, so one element costs O(n) and a field over
//! `[start, end]` costs O(end^2) overall. Scans beyond
//! [`ABUNDANCE_SOFT_LIMIT`] are allowed but logged as a performance ceiling.
//!
//! Overflow is ruled out before any parallel region starts:
//! `sigma(n) <= n(n+1)/2`, so a field whose `end(end+1)/2` fits in `u64`
//! can never overflow a divisor sum.

use rayon::prelude::*;
use tracing::warn;

use crate::error::ScanError;
use crate::partition::Interval;
use crate::pool::NestPolicy;

/// Largest `end` an abundance scan handles without a latency warning
pub const ABUNDANCE_SOFT_LIMIT: u64 = 10_000_000;

/// Computes one scalar per integer of an interval
///
/// `compute` must be a pure function of `n`; it is called from many workers
/// at once, exactly once per slot. An error from any slot fails the sweep.
pub trait ScalarFieldComputer: Sync {
    /// Scalar stored in each slot
    type Value: Clone + Send;

    /// Reject intervals `compute` cannot handle, before any work starts
    fn check(&self, interval: &Interval) -> Result<(), ScanError>;

    /// Value for the integer `n`
    fn compute(&self, n: u64) -> Result<Self::Value, ScanError>;
}

/// Sum of all positive divisors of `n`
///
/// # Example
///
/// ```
/// use rangescan::abundance::sum_of_divisors;
///
/// assert_eq!(sum_of_divisors(1).unwrap(), 1);
/// assert_eq!(sum_of_divisors(12).unwrap(), 28);
/// ```
pub fn sum_of_divisors(n: u64) -> Result<u64, ScanError> {
    if n == 0 {
        return Err(ScanError::ZeroElement);
    }
    (1..=n)
        .filter(|i| n % i == 0)
        .try_fold(0u64, |acc, d| {
            acc.checked_add(d).ok_or(ScanError::Overflow {
                what: "divisor sum",
                value: n,
            })
        })
}

/// Sum of all positive divisors of `n`, as a parallel reduction
///
/// Runs on whichever rayon pool the caller is inside of; called from a
/// [`crate::pool::WorkerPool`] region it shares that pool's workers.
pub fn sum_of_divisors_parallel(n: u64) -> Result<u64, ScanError> {
    if n == 0 {
        return Err(ScanError::ZeroElement);
    }
    (1..=n)
        .into_par_iter()
        .filter(|i| n % i == 0)
        .map(Ok::<u64, ScanError>)
        .try_reduce(
            || 0u64,
            |a, b| {
                a.checked_add(b).ok_or(ScanError::Overflow {
                    what: "divisor sum",
                    value: n,
                })
            },
        )
}

/// Abundance of `n`: `sigma(n) / n`
///
/// # Example
///
/// ```
/// use rangescan::abundance::abundance;
///
/// assert_eq!(abundance(1).unwrap(), 1.0);
/// assert_eq!(abundance(6).unwrap(), 2.0);
/// assert_eq!(abundance(7).unwrap(), 8.0 / 7.0);
/// ```
pub fn abundance(n: u64) -> Result<f64, ScanError> {
    Ok(sum_of_divisors(n)? as f64 / n as f64)
}

/// Reject intervals whose divisor sums could overflow `u64`
pub fn check_divisor_bound(interval: &Interval) -> Result<(), ScanError> {
    let end = interval.end();
    end.checked_mul(end + 1)
        .ok_or(ScanError::Overflow {
            what: "divisor sum bound",
            value: end,
        })?;
    if end > ABUNDANCE_SOFT_LIMIT {
        warn!(
            end,
            limit = ABUNDANCE_SOFT_LIMIT,
            "abundance scan exceeds soft limit; trial division is O(n) per element"
        );
    }
    Ok(())
}

/// Abundance field computer
#[derive(Debug, Clone, Copy, Default)]
pub struct AbundanceComputer {
    nested: NestPolicy,
}

impl AbundanceComputer {
    /// Create a computer whose divisor sums follow `nested`
    pub fn new(nested: NestPolicy) -> Self {
        Self { nested }
    }

    fn divisor_sum(&self, n: u64) -> Result<u64, ScanError> {
        match self.nested {
            NestPolicy::Disabled => sum_of_divisors(n),
            NestPolicy::SharedPool => sum_of_divisors_parallel(n),
        }
    }
}

impl ScalarFieldComputer for AbundanceComputer {
    type Value = f64;

    fn check(&self, interval: &Interval) -> Result<(), ScanError> {
        check_divisor_bound(interval)
    }

    fn compute(&self, n: u64) -> Result<f64, ScanError> {
        Ok(self.divisor_sum(n)? as f64 / n as f64)
    }
}
