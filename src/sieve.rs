//! Sieve of Eratosthenes with parallel marking
//!
//! [`SegmentedSieveMarker`] walks the states
//!
//! ```text
//! Seed -> Marking(2) -> Marking(3) -> ... -> Marking(floor(sqrt(limit))) -> Done
//! ```
//!
//! In `Marking(p)`, if `p` is still unstruck, every multiple of `p` from
//! `p*p` to `limit` is struck. The multiples are cut into segments and struck
//! by the whole worker pool; the region joins before the next state begins.
//!
//! [`MarkingMode::OuterIdempotent`] instead runs the candidate primes
//! themselves in parallel. A worker may then read a composite `p` as still
//! unstruck and strike its multiples too. That is harmless: multiples of `p`
//! from `p*p` on are composite, every strike stores the same `false`, and the
//! smallest prime factor of each composite is never struck, so its own pass
//! always runs. The final field is the same as in `InnerOnly` mode.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ScanError;
use crate::field::StrikeField;
use crate::partition::{ChunkSize, Schedule};
use crate::pool::WorkerPool;

/// Progressions shorter than this are struck on the calling worker
const PARALLEL_STRIKE_THRESHOLD: usize = 1 << 14;

/// How sieve marking is spread over the worker pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkingMode {
    /// Candidate primes in ascending order; the multiples of each are struck
    /// in parallel
    #[default]
    InnerOnly,

    /// Candidate primes in parallel; each strikes its multiples sequentially
    OuterIdempotent,
}

/// Position of a [`SegmentedSieveMarker`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SieveState {
    Seed,
    Marking(usize),
    Done,
}

/// Largest `r` with `r * r <= n`
pub fn integer_sqrt(n: usize) -> usize {
    let mut r = (n as f64).sqrt() as usize;
    while r.checked_mul(r).map_or(true, |sq| sq > n) {
        r -= 1;
    }
    while (r + 1).checked_mul(r + 1).is_some_and(|sq| sq <= n) {
        r += 1;
    }
    r
}

/// Strike every multiple of `p` from `p*p` up to the end of `field`
///
/// Long progressions are split into segments over `pool`; the call returns
/// once every multiple is struck. Striking a progression twice leaves the
/// field unchanged.
pub fn strike_multiples(
    pool: &WorkerPool,
    field: &StrikeField,
    p: usize,
    schedule: Schedule,
    chunk_size: ChunkSize,
) -> Result<(), ScanError> {
    let limit = field.len().saturating_sub(1);
    let first = match p.checked_mul(p) {
        Some(first) if p >= 2 && first <= limit => first,
        _ => return Ok(()),
    };
    let count = (limit - first) / p + 1;

    if count < PARALLEL_STRIKE_THRESHOLD {
        for k in 0..count {
            field.strike(first + k * p)?;
        }
        return Ok(());
    }

    let plan = pool.plan(count, schedule, chunk_size)?;
    pool.try_for_each_chunk(&plan, |segment| {
        for k in segment.indices() {
            field.strike(first + k * p)?;
        }
        Ok::<(), ScanError>(())
    })
}

/// Sieve state machine over `0..=limit`
#[derive(Debug)]
pub struct SegmentedSieveMarker<'p> {
    pool: &'p WorkerPool,
    field: StrikeField,
    root: usize,
    state: SieveState,
    schedule: Schedule,
    chunk_size: ChunkSize,
}

impl<'p> SegmentedSieveMarker<'p> {
    /// Seed a sieve for all integers up to and including `limit`
    pub fn new(limit: u64, pool: &'p WorkerPool) -> Result<Self, ScanError> {
        let overflow = ScanError::Overflow {
            what: "sieve limit",
            value: limit,
        };
        let limit = usize::try_from(limit).map_err(|_| overflow.clone())?;
        let field = StrikeField::seeded(limit).map_err(|_| overflow)?;

        Ok(Self {
            pool,
            field,
            root: integer_sqrt(limit),
            state: SieveState::Seed,
            schedule: Schedule::Static,
            chunk_size: ChunkSize::Auto,
        })
    }

    /// Set how each progression is split over the pool
    pub fn with_schedule(mut self, schedule: Schedule, chunk_size: ChunkSize) -> Self {
        self.schedule = schedule;
        self.chunk_size = chunk_size;
        self
    }

    /// Current state
    pub fn state(&self) -> SieveState {
        self.state
    }

    /// The field being marked
    pub fn field(&self) -> &StrikeField {
        &self.field
    }

    /// Largest candidate prime, `floor(sqrt(limit))`
    pub fn root(&self) -> usize {
        self.root
    }

    fn state_for(&self, p: usize) -> SieveState {
        if p <= self.root {
            SieveState::Marking(p)
        } else {
            SieveState::Done
        }
    }

    /// Advance one state, marking if the current state is `Marking(p)`
    pub fn step(&mut self) -> Result<SieveState, ScanError> {
        self.state = match self.state {
            SieveState::Seed => self.state_for(2),
            SieveState::Marking(p) => {
                if self.field.is_set(p) {
                    strike_multiples(self.pool, &self.field, p, self.schedule, self.chunk_size)?;
                }
                self.state_for(p + 1)
            }
            SieveState::Done => SieveState::Done,
        };
        Ok(self.state)
    }

    /// Mark all candidate primes in parallel, jumping from `Seed` to `Done`
    fn mark_outer(&mut self) -> Result<(), ScanError> {
        let candidates = self.root.saturating_sub(1);
        let plan = self.pool.plan(candidates, Schedule::Guided, self.chunk_size)?;
        let field = &self.field;

        self.pool.try_for_each_chunk(&plan, |segment| {
            for p in segment.indices().map(|k| k + 2) {
                if field.is_set(p) {
                    let mut m = p * p;
                    while m < field.len() {
                        field.strike(m)?;
                        m += p;
                    }
                }
            }
            Ok::<(), ScanError>(())
        })?;

        self.state = SieveState::Done;
        Ok(())
    }

    /// Run to `Done` and collect the primes
    pub fn run(mut self, mode: MarkingMode) -> Result<Primes, ScanError> {
        debug!(
            limit = self.field.len().saturating_sub(1),
            root = self.root,
            ?mode,
            workers = self.pool.workers(),
            "sieve marking"
        );

        match mode {
            MarkingMode::OuterIdempotent if self.state == SieveState::Seed => self.mark_outer()?,
            _ => while self.step()? != SieveState::Done {},
        }

        Ok(Primes {
            flags: self.field.into_flags(),
        })
    }
}

/// Primes up to a limit, as produced by a finished sieve
///
/// Iteration is lazy and can be restarted any number of times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Primes {
    flags: Vec<bool>,
}

impl Primes {
    /// The limit the sieve ran to
    pub fn limit(&self) -> u64 {
        self.flags.len().saturating_sub(1) as u64
    }

    /// Returns true if `n` is prime
    pub fn contains(&self, n: u64) -> bool {
        usize::try_from(n)
            .ok()
            .and_then(|i| self.flags.get(i))
            .copied()
            .unwrap_or(false)
    }

    /// Primes in ascending order
    pub fn iter(&self) -> PrimeIter<'_> {
        PrimeIter {
            flags: &self.flags,
            next: 0,
        }
    }

    /// Primes as a vector, ascending
    pub fn to_vec(&self) -> Vec<u64> {
        self.iter().collect()
    }

    /// Primality flag per integer `0..=limit`
    pub fn as_flags(&self) -> &[bool] {
        &self.flags
    }
}

impl<'a> IntoIterator for &'a Primes {
    type Item = u64;
    type IntoIter = PrimeIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the primes of a [`Primes`]
#[derive(Debug, Clone)]
pub struct PrimeIter<'a> {
    flags: &'a [bool],
    next: usize,
}

impl<'a> Iterator for PrimeIter<'a> {
    type Item = u64;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next < self.flags.len() {
            let n = self.next;
            self.next += 1;
            if self.flags[n] {
                return Some(n as u64);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.flags.len() - self.next))
    }
}
