//! Result sinks
//!
//! Parallel regions emit results through a [`Sink`]. Every implementation
//! here takes a mutex for exactly one record, so records from different
//! workers never interleave and the lock is never held across computation.

use std::fmt::Display;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::error::ScanError;

/// Destination for results produced inside parallel regions
pub trait Sink<T>: Sync {
    /// Accept one result
    fn accept(&self, item: T) -> Result<(), ScanError>;
}

/// Collects results in memory
#[derive(Debug, Default)]
pub struct Collector<T> {
    items: Mutex<Vec<T>>,
}

impl<T> Collector<T> {
    /// Create an empty collector
    pub fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
        }
    }

    /// Number of results collected so far
    pub fn len(&self) -> usize {
        self.items.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true if nothing has been collected
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Results in arrival order
    pub fn into_inner(self) -> Vec<T> {
        self.items.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    /// Results in ascending order
    pub fn into_sorted(self) -> Vec<T>
    where
        T: Ord,
    {
        let mut items = self.into_inner();
        items.sort_unstable();
        items
    }
}

impl<T: Send> Sink<T> for Collector<T> {
    fn accept(&self, item: T) -> Result<(), ScanError> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(item);
        Ok(())
    }
}

/// Writes one line per result to a shared output stream
///
/// Pairs are written as `a e b`, single values as `n`.
#[derive(Debug)]
pub struct SerializedWriter<W> {
    out: Mutex<W>,
    records: AtomicU64,
}

impl<W: Write + Send> SerializedWriter<W> {
    /// Wrap an output stream
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
            records: AtomicU64::new(0),
        }
    }

    /// Number of records written
    pub fn records(&self) -> u64 {
        self.records.load(Ordering::Relaxed)
    }

    /// Flush and return the underlying stream
    pub fn into_inner(self) -> Result<W, ScanError> {
        let mut out = self.out.into_inner().unwrap_or_else(PoisonError::into_inner);
        out.flush().map_err(|e| ScanError::Report(e.to_string()))?;
        Ok(out)
    }

    fn write_record(&self, record: std::fmt::Arguments<'_>) -> Result<(), ScanError> {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        out.write_fmt(record)
            .and_then(|_| out.write_all(b"\n"))
            .map_err(|e| ScanError::Report(e.to_string()))?;
        self.records.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl<W: Write + Send, A: Display, B: Display> Sink<(A, B)> for SerializedWriter<W> {
    fn accept(&self, (a, b): (A, B)) -> Result<(), ScanError> {
        self.write_record(format_args!("{} e {}", a, b))
    }
}

impl<W: Write + Send> Sink<u64> for SerializedWriter<W> {
    fn accept(&self, n: u64) -> Result<(), ScanError> {
        self.write_record(format_args!("{}", n))
    }
}
