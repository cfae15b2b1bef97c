//! Scan configuration
//!
//! Configuration is layered:
//! 1. Start with defaults
//! 2. Parse a TOML document if one is supplied ([`ScanConfig::from_toml_str`])
//! 3. Override with `RANGESCAN_*` environment variables
//!    ([`ScanConfig::apply_env_overrides`])
//!
//! ```toml
//! workers = 8
//! schedule = "guided"
//! chunk_size = { explicit = 16 }
//! nested = "shared_pool"
//! marking = "inner_only"
//! equality = "exact"
//! pair_search = "hashed"
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::equality::{EqualityPolicy, PairSearch};
use crate::partition::{ChunkSize, Schedule};
use crate::pool::NestPolicy;
use crate::sieve::MarkingMode;

/// Configuration error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid configuration for {key}: '{value}' ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(String),
}

impl ConfigError {
    fn invalid(key: &str, value: impl ToString, reason: &str) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Options recognised by the scan engine
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Worker pool size; `None` uses the available parallelism
    pub workers: Option<usize>,

    /// How field sweeps and pair searches hand out chunks
    pub schedule: Schedule,

    /// Chunk size for dynamic schedules, minimum chunk for guided ones
    pub chunk_size: ChunkSize,

    /// Whether per-element computations may open their own parallel region
    pub nested: NestPolicy,

    /// How sieve marking is parallelized
    pub marking: MarkingMode,

    /// Comparison used when searching for equal abundances
    pub equality: EqualityPolicy,

    /// Algorithm used when searching for equal abundances
    pub pair_search: PairSearch,
}

impl ScanConfig {
    /// Create a configuration with an explicit worker count
    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers: Some(workers),
            ..Default::default()
        }
    }

    /// Set the schedule
    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Set the chunk size
    pub fn with_chunk_size(mut self, chunk_size: ChunkSize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Set the nested-parallelism policy
    pub fn with_nested(mut self, nested: NestPolicy) -> Self {
        self.nested = nested;
        self
    }

    /// Set the sieve marking mode
    pub fn with_marking(mut self, marking: MarkingMode) -> Self {
        self.marking = marking;
        self
    }

    /// Set the equality policy
    pub fn with_equality(mut self, equality: EqualityPolicy) -> Self {
        self.equality = equality;
        self
    }

    /// Set the pair search algorithm
    pub fn with_pair_search(mut self, pair_search: PairSearch) -> Self {
        self.pair_search = pair_search;
        self
    }

    /// Parse a configuration from a TOML document; missing keys take defaults
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load defaults overridden by environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply `RANGESCAN_*` environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(workers) = Self::env_parse::<usize>("RANGESCAN_WORKERS")? {
            self.workers = Some(workers);
        }
        if let Some(chunk) = Self::env_parse::<usize>("RANGESCAN_CHUNK_SIZE")? {
            self.chunk_size = ChunkSize::Explicit(chunk);
        }
        if let Some(schedule) = Self::env_keyword("RANGESCAN_SCHEDULE")? {
            self.schedule = schedule;
        }
        if let Some(nested) = Self::env_keyword("RANGESCAN_NESTED")? {
            self.nested = nested;
        }
        if let Some(marking) = Self::env_keyword("RANGESCAN_MARKING")? {
            self.marking = marking;
        }
        self.validate()
    }

    /// Reject values no scan can run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == Some(0) {
            return Err(ConfigError::invalid("workers", 0, "must be greater than 0"));
        }
        if self.chunk_size == ChunkSize::Explicit(0) {
            return Err(ConfigError::invalid("chunk_size", 0, "must be greater than 0"));
        }
        if let EqualityPolicy::Tolerance(eps) = self.equality {
            if !eps.is_finite() || eps < 0.0 {
                return Err(ConfigError::invalid(
                    "equality.tolerance",
                    eps,
                    "must be a finite, non-negative number",
                ));
            }
        }
        Ok(())
    }

    fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
        match std::env::var(key) {
            Ok(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| ConfigError::invalid(key, raw, "expected an unsigned integer")),
            Err(_) => Ok(None),
        }
    }

    /// Parse a snake_case keyword into one of the serde enums
    fn env_keyword<T: serde::de::DeserializeOwned>(key: &str) -> Result<Option<T>, ConfigError> {
        match std::env::var(key) {
            Ok(raw) => {
                let keyword = raw.trim().to_ascii_lowercase();
                T::deserialize(toml::Value::String(keyword))
                    .map(Some)
                    .map_err(|e| ConfigError::invalid(key, raw, &e.to_string()))
            }
            Err(_) => Ok(None),
        }
    }
}
