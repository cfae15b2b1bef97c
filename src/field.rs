//! Per-element fields shared by the parallel regions of a scan
//!
//! Two containers are provided, one per write discipline:
//!
//! - [`SharedField<T>`] holds one slot per integer of an [`Interval`]. Slots
//!   are written by [`SharedField::fill_with`], which hands every chunk of a
//!   [`SchedulePlan`] its own `&mut` window, so each slot has exactly one
//!   writer and no lock is needed.
//! - [`StrikeField`] holds one flag per integer `0..=limit`. Flags only ever
//!   move from `true` to `false`, and several workers may strike the same
//!   slot. Each slot is an `AtomicBool`, so overlapping strikes are ordinary
//!   atomic stores of the same value: idempotent and free of data races.
//!
//! Reading follows a fetch/materialize split:
//!
//! - **`fetch()`** returns a borrowed [`SharedView`] without copying.
//! - **`materialize()`** copies the slots into an owned vector.
//!
//! # Example
//!
//! ```
//! use rangescan::field::{Fetchable, Materializable, SharedField};
//! use rangescan::partition::Interval;
//!
//! let interval = Interval::new(1, 5).unwrap();
//! let field = SharedField::from_vec(interval, vec![1.0, 1.5, 4.0 / 3.0, 1.75, 1.2]).unwrap();
//!
//! let view = field.fetch();
//! assert_eq!(view.len(), 5);
//! assert_eq!(field.get(2), Some(&1.5));
//!
//! let owned: Vec<f64> = field.materialize();
//! assert_eq!(owned[3], 1.75);
//! ```

use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use thiserror::Error;

use crate::partition::{Interval, SchedulePlan};
use crate::pool::WorkerPool;

/// Errors that can occur during field access
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("index {index} out of bounds for length {len}")]
    OutOfBounds { index: usize, len: usize },

    #[error("slice range {start}..{end} out of bounds for length {len}")]
    SliceOutOfBounds { start: usize, end: usize, len: usize },

    #[error("expected {expected} slots, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("cannot allocate {len} slots")]
    Allocation { len: usize },

    #[error("plan does not tile the field: chunk at {chunk_start} expected at {expected_start}, field length {len}")]
    PlanMismatch {
        chunk_start: usize,
        expected_start: usize,
        len: usize,
    },
}

/// One slot per integer of an interval
#[derive(Debug)]
pub struct SharedField<T> {
    /// Integers the slots stand for
    interval: Interval,

    /// Slot `i` belongs to `interval.start() + i`
    slots: Vec<T>,
}

impl<T: Clone> SharedField<T> {
    /// Create a field with every slot set to `value`
    pub fn filled(interval: Interval, value: T) -> Self {
        Self {
            interval,
            slots: vec![value; interval.len()],
        }
    }

    /// Create a field from precomputed slots
    pub fn from_vec(interval: Interval, slots: Vec<T>) -> Result<Self, FieldError> {
        if slots.len() != interval.len() {
            return Err(FieldError::LengthMismatch {
                expected: interval.len(),
                actual: slots.len(),
            });
        }
        Ok(Self { interval, slots })
    }

    /// Interval the field covers
    pub fn interval(&self) -> Interval {
        self.interval
    }

    /// Returns the number of slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if the field has no slots
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Value stored for the integer `n`
    pub fn get(&self, n: u64) -> Option<&T> {
        self.interval.index_of(n).map(|i| &self.slots[i])
    }

    /// Value stored at slot `index`
    pub fn slot(&self, index: usize) -> Result<&T, FieldError> {
        self.slots.get(index).ok_or(FieldError::OutOfBounds {
            index,
            len: self.slots.len(),
        })
    }

    /// Iterate `(integer, value)` pairs in ascending order
    pub fn iter(&self) -> impl Iterator<Item = (u64, &T)> + '_ {
        let start = self.interval.start();
        self.slots
            .iter()
            .enumerate()
            .map(move |(i, v)| (start + i as u64, v))
    }

    /// Write every slot in parallel with `f(integer)`
    ///
    /// Each chunk of `plan` receives a disjoint window of the slots, so every
    /// slot is written exactly once by exactly one worker. The call returns
    /// after all chunks are written, or with the first error `f` reports.
    pub fn fill_with<F, E>(&mut self, pool: &WorkerPool, plan: &SchedulePlan, f: F) -> Result<(), E>
    where
        T: Send,
        F: Fn(u64) -> Result<T, E> + Sync + Send,
        E: From<FieldError> + Send,
    {
        let len = self.slots.len();
        if plan.n != len {
            return Err(FieldError::LengthMismatch {
                expected: len,
                actual: plan.n,
            }
            .into());
        }

        let mut windows = Vec::with_capacity(plan.num_chunks());
        let mut rest: &mut [T] = &mut self.slots;
        let mut cursor = 0;
        for chunk in plan {
            if chunk.start != cursor || chunk.end > len {
                return Err(FieldError::PlanMismatch {
                    chunk_start: chunk.start,
                    expected_start: cursor,
                    len,
                }
                .into());
            }
            let (window, tail) = std::mem::take(&mut rest).split_at_mut(chunk.len());
            windows.push((chunk.start, window));
            rest = tail;
            cursor = chunk.end;
        }
        if cursor != len {
            return Err(FieldError::PlanMismatch {
                chunk_start: cursor,
                expected_start: len,
                len,
            }
            .into());
        }

        let base = self.interval.start();
        pool.install(|| {
            windows
                .into_par_iter()
                .with_max_len(1)
                .try_for_each(|(offset, window)| {
                    for (i, slot) in window.iter_mut().enumerate() {
                        *slot = f(base + (offset + i) as u64)?;
                    }
                    Ok(())
                })
        })
    }
}

/// A borrowed, read-only view of field slots
///
/// This is the return type of `fetch()`. The view cannot outlive the field
/// and is `Sync` whenever `T` is, so downstream queries can read it from
/// many workers at once.
#[derive(Debug)]
pub struct SharedView<'a, T> {
    data: &'a [T],
}

impl<'a, T> SharedView<'a, T> {
    /// Wrap a plain slice
    pub fn new(data: &'a [T]) -> Self {
        Self { data }
    }

    /// Returns the data as a slice
    pub fn as_slice(&self) -> &'a [T] {
        self.data
    }

    /// Returns the number of elements
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get element at index
    pub fn get(&self, index: usize) -> Option<&T> {
        self.data.get(index)
    }

    /// Get a sub-slice view
    pub fn slice(&self, start: usize, end: usize) -> Result<SharedView<'a, T>, FieldError> {
        if end > self.data.len() || start > end {
            return Err(FieldError::SliceOutOfBounds {
                start,
                end,
                len: self.data.len(),
            });
        }
        Ok(SharedView {
            data: &self.data[start..end],
        })
    }
}

impl<'a, T> Deref for SharedView<'a, T> {
    type Target = [T];

    fn deref(&self) -> &Self::Target {
        self.data
    }
}

impl<'a, T> AsRef<[T]> for SharedView<'a, T> {
    fn as_ref(&self) -> &[T] {
        self.data
    }
}

/// Types that can hand out a view of their slots without copying
pub trait Fetchable<T> {
    /// Fetch a view into the data without copying
    fn fetch(&self) -> SharedView<'_, T>;

    /// Fetch a slice of the data
    fn fetch_slice(&self, start: usize, end: usize) -> Result<SharedView<'_, T>, FieldError>;
}

/// Types that can copy their slots into an owned vector
pub trait Materializable<T: Clone> {
    /// Materialize the data as an owned vector
    fn materialize(&self) -> Vec<T>;

    /// Materialize a slice of the data
    fn materialize_slice(&self, start: usize, end: usize) -> Result<Vec<T>, FieldError>;
}

impl<T: Clone> Fetchable<T> for SharedField<T> {
    fn fetch(&self) -> SharedView<'_, T> {
        SharedView { data: &self.slots }
    }

    fn fetch_slice(&self, start: usize, end: usize) -> Result<SharedView<'_, T>, FieldError> {
        if end > self.slots.len() || start > end {
            return Err(FieldError::SliceOutOfBounds {
                start,
                end,
                len: self.slots.len(),
            });
        }
        Ok(SharedView {
            data: &self.slots[start..end],
        })
    }
}

impl<T: Clone> Materializable<T> for SharedField<T> {
    fn materialize(&self) -> Vec<T> {
        self.slots.clone()
    }

    fn materialize_slice(&self, start: usize, end: usize) -> Result<Vec<T>, FieldError> {
        if end > self.slots.len() || start > end {
            return Err(FieldError::SliceOutOfBounds {
                start,
                end,
                len: self.slots.len(),
            });
        }
        Ok(self.slots[start..end].to_vec())
    }
}

impl<'a, T: Clone> Materializable<T> for SharedView<'a, T> {
    fn materialize(&self) -> Vec<T> {
        self.data.to_vec()
    }

    fn materialize_slice(&self, start: usize, end: usize) -> Result<Vec<T>, FieldError> {
        if end > self.data.len() || start > end {
            return Err(FieldError::SliceOutOfBounds {
                start,
                end,
                len: self.data.len(),
            });
        }
        Ok(self.data[start..end].to_vec())
    }
}

/// Monotonic flags over `0..=limit`, struck concurrently
///
/// A freshly seeded field has every flag at index 2 and above set; 0 and 1
/// are clear. [`StrikeField::strike`] clears a flag. Strikes commute and
/// repeat harmlessly, which is what lets several workers strike the same
/// slot without coordination.
#[derive(Debug)]
pub struct StrikeField {
    slots: Vec<AtomicBool>,
}

impl StrikeField {
    /// Seed a field for `0..=limit`
    ///
    /// Fails instead of aborting when the slots cannot be allocated.
    pub fn seeded(limit: usize) -> Result<Self, FieldError> {
        let len = limit.checked_add(1).ok_or(FieldError::Allocation { len: limit })?;
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(len)
            .map_err(|_| FieldError::Allocation { len })?;
        slots.extend((0..len).map(|i| AtomicBool::new(i >= 2)));
        Ok(Self { slots })
    }

    /// Returns the number of slots (`limit + 1`)
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if the field has no slots
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns true if slot `index` has not been struck
    ///
    /// Out-of-range indices read as struck.
    pub fn is_set(&self, index: usize) -> bool {
        self.slots
            .get(index)
            .is_some_and(|slot| slot.load(Ordering::Relaxed))
    }

    /// Clear slot `index`
    ///
    /// Relaxed ordering is enough: the only value ever stored is `false`, and
    /// the join at the end of each parallel region publishes every strike to
    /// the next region.
    pub fn strike(&self, index: usize) -> Result<(), FieldError> {
        let slot = self.slots.get(index).ok_or(FieldError::OutOfBounds {
            index,
            len: self.slots.len(),
        })?;
        slot.store(false, Ordering::Relaxed);
        Ok(())
    }

    /// Indices that are still set, ascending
    pub fn set_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.load(Ordering::Relaxed))
            .map(|(i, _)| i)
    }

    /// Consume the field into plain flags
    pub fn into_flags(self) -> Vec<bool> {
        self.slots.into_iter().map(AtomicBool::into_inner).collect()
    }
}

impl Materializable<bool> for StrikeField {
    fn materialize(&self) -> Vec<bool> {
        self.slots.iter().map(|s| s.load(Ordering::Relaxed)).collect()
    }

    fn materialize_slice(&self, start: usize, end: usize) -> Result<Vec<bool>, FieldError> {
        if end > self.slots.len() || start > end {
            return Err(FieldError::SliceOutOfBounds {
                start,
                end,
                len: self.slots.len(),
            });
        }
        Ok(self.slots[start..end]
            .iter()
            .map(|s| s.load(Ordering::Relaxed))
            .collect())
    }
}
