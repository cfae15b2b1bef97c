//! Error taxonomy shared by every scan operation
//!
//! Precondition failures are detected before any parallel region starts, so a
//! returned error never comes with a partially computed field.

use thiserror::Error;

use crate::config::ConfigError;
use crate::field::FieldError;
use crate::partition::PartitionError;

/// Errors that can occur during a scan
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error(transparent)]
    Partition(#[from] PartitionError),

    #[error(transparent)]
    Field(#[from] FieldError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{what} overflows for n = {value}")]
    Overflow { what: &'static str, value: u64 },

    #[error("divisor sums are defined for n >= 1, got 0")]
    ZeroElement,

    #[error("failed to build worker pool: {0}")]
    Pool(String),

    #[error("result sink failed: {0}")]
    Report(String),
}
