//! Strategy options.
//!
//! Options reach a strategy as a string→string map, as stored in the table
//! schema. Each strategy parses the keys it understands into a typed struct
//! and validates it once, at construction. Unknown keys are ignored.
//!
//! All structs also implement [`Default`] and can be built field by field,
//! then checked with `validate()`.

use std::collections::HashMap;
use std::time::Duration;

use super::CompactionError;

/// Raw option map, as stored in the table schema.
pub type OptionMap = HashMap<String, String>;

pub const TOMBSTONE_THRESHOLD_KEY: &str = "tombstone_threshold";
pub const TOMBSTONE_COMPACTION_INTERVAL_KEY: &str = "tombstone_compaction_interval";
pub const MIN_SSTABLE_SIZE_KEY: &str = "min_sstable_size";
pub const BUCKET_LOW_KEY: &str = "bucket_low";
pub const BUCKET_HIGH_KEY: &str = "bucket_high";
pub const FRAGMENT_SIZE_KEY: &str = "sstable_size_in_mb";
pub const SPACE_AMPLIFICATION_GOAL_KEY: &str = "space_amplification_goal";

pub const DEFAULT_TOMBSTONE_THRESHOLD: f64 = 0.2;
pub const DEFAULT_TOMBSTONE_COMPACTION_INTERVAL: Duration = Duration::from_secs(86_400);
pub const DEFAULT_MIN_SSTABLE_SIZE: u64 = 50 * 1024 * 1024;
pub const DEFAULT_BUCKET_LOW: f64 = 0.5;
pub const DEFAULT_BUCKET_HIGH: f64 = 1.5;
pub const DEFAULT_FRAGMENT_SIZE_IN_MB: u64 = 1000;

/// Fragment sizes below this lead to runs made of very many fragments.
pub(crate) const SMALL_FRAGMENT_SIZE_IN_MB: u64 = 100;

// ------------------------------------------------------------------------------------------------
// Common options
// ------------------------------------------------------------------------------------------------

/// Tombstone garbage-collection parameters shared by all strategies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommonOptions {
    /// Droppable tombstone ratio at which a run is worth a GC compaction.
    ///
    /// Default: 0.2. Must be ≥ 0.
    pub tombstone_threshold: f64,

    /// Minimum age of a run before it is considered for GC compaction.
    ///
    /// Default: 1 day.
    pub tombstone_compaction_interval: Duration,
}

impl Default for CommonOptions {
    fn default() -> Self {
        Self {
            tombstone_threshold: DEFAULT_TOMBSTONE_THRESHOLD,
            tombstone_compaction_interval: DEFAULT_TOMBSTONE_COMPACTION_INTERVAL,
        }
    }
}

impl CommonOptions {
    pub fn from_map(options: &OptionMap) -> Result<Self, CompactionError> {
        let parsed = Self {
            tombstone_threshold: parse_f64(
                options,
                TOMBSTONE_THRESHOLD_KEY,
                DEFAULT_TOMBSTONE_THRESHOLD,
            )?,
            tombstone_compaction_interval: Duration::from_secs(parse_u64(
                options,
                TOMBSTONE_COMPACTION_INTERVAL_KEY,
                DEFAULT_TOMBSTONE_COMPACTION_INTERVAL.as_secs(),
            )?),
        };
        parsed.validate()?;
        Ok(parsed)
    }

    pub fn validate(&self) -> Result<(), CompactionError> {
        if self.tombstone_threshold.is_nan() || self.tombstone_threshold < 0.0 {
            return Err(CompactionError::InvalidConfig(
                "tombstone_threshold must be >= 0".into(),
            ));
        }
        Ok(())
    }
}

// ------------------------------------------------------------------------------------------------
// Bucketing options
// ------------------------------------------------------------------------------------------------

/// Parameters of the size-tier bucketing pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketOptions {
    /// Runs below this size (bytes) are bucketed together regardless of ratio.
    ///
    /// Default: 50 MiB.
    pub min_sstable_size: u64,

    /// Lower bound multiplier of a bucket's tolerance band.
    ///
    /// Default: 0.5. Must be > 0.
    pub bucket_low: f64,

    /// Upper bound multiplier of a bucket's tolerance band.
    ///
    /// Default: 1.5. Must be > `bucket_low`.
    pub bucket_high: f64,
}

impl Default for BucketOptions {
    fn default() -> Self {
        Self {
            min_sstable_size: DEFAULT_MIN_SSTABLE_SIZE,
            bucket_low: DEFAULT_BUCKET_LOW,
            bucket_high: DEFAULT_BUCKET_HIGH,
        }
    }
}

impl BucketOptions {
    pub fn from_map(options: &OptionMap) -> Result<Self, CompactionError> {
        let parsed = Self {
            min_sstable_size: parse_u64(options, MIN_SSTABLE_SIZE_KEY, DEFAULT_MIN_SSTABLE_SIZE)?,
            bucket_low: parse_f64(options, BUCKET_LOW_KEY, DEFAULT_BUCKET_LOW)?,
            bucket_high: parse_f64(options, BUCKET_HIGH_KEY, DEFAULT_BUCKET_HIGH)?,
        };
        parsed.validate()?;
        Ok(parsed)
    }

    pub fn validate(&self) -> Result<(), CompactionError> {
        if self.bucket_low.is_nan() || self.bucket_low <= 0.0 {
            return Err(CompactionError::InvalidConfig(
                "bucket_low must be > 0".into(),
            ));
        }
        if self.bucket_high.is_nan() || self.bucket_high <= self.bucket_low {
            return Err(CompactionError::InvalidConfig(
                "bucket_high must be > bucket_low".into(),
            ));
        }
        Ok(())
    }
}

// ------------------------------------------------------------------------------------------------
// Incremental strategy options
// ------------------------------------------------------------------------------------------------

/// Full option set of the incremental compaction strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IncrementalCompactionOptions {
    pub bucket: BucketOptions,

    /// Size cap of output fragments, in MiB.
    ///
    /// Default: 1000. Must be ≥ 1.
    pub fragment_size_in_mb: u64,

    /// Space amplification above which the two largest tiers are merged.
    ///
    /// Default: unset (disabled). Must be > 1.0 when set.
    pub space_amplification_goal: Option<f64>,

    pub common: CommonOptions,
}

impl Default for IncrementalCompactionOptions {
    fn default() -> Self {
        Self {
            bucket: BucketOptions::default(),
            fragment_size_in_mb: DEFAULT_FRAGMENT_SIZE_IN_MB,
            space_amplification_goal: None,
            common: CommonOptions::default(),
        }
    }
}

impl IncrementalCompactionOptions {
    pub fn from_map(options: &OptionMap) -> Result<Self, CompactionError> {
        let fragment_size_in_mb = parse_i64(
            options,
            FRAGMENT_SIZE_KEY,
            DEFAULT_FRAGMENT_SIZE_IN_MB as i64,
        )?;
        if fragment_size_in_mb <= 0 {
            return Err(CompactionError::InvalidConfig(format!(
                "{FRAGMENT_SIZE_KEY} must be > 0, got {fragment_size_in_mb}"
            )));
        }

        let space_amplification_goal = match get_value(options, SPACE_AMPLIFICATION_GOAL_KEY) {
            Some(raw) => Some(to_f64(SPACE_AMPLIFICATION_GOAL_KEY, raw)?),
            None => None,
        };

        let parsed = Self {
            bucket: BucketOptions::from_map(options)?,
            fragment_size_in_mb: fragment_size_in_mb as u64,
            space_amplification_goal,
            common: CommonOptions::from_map(options)?,
        };
        parsed.validate()?;
        Ok(parsed)
    }

    pub fn validate(&self) -> Result<(), CompactionError> {
        self.bucket.validate()?;
        self.common.validate()?;
        if self.fragment_size_in_mb == 0 {
            return Err(CompactionError::InvalidConfig(format!(
                "{FRAGMENT_SIZE_KEY} must be > 0"
            )));
        }
        match self.space_amplification_goal {
            Some(goal) if goal.is_nan() || goal <= 1.0 => {
                return Err(CompactionError::InvalidConfig(format!(
                    "{SPACE_AMPLIFICATION_GOAL_KEY} must be greater than 1, got {goal}"
                )));
            }
            _ => {}
        }
        Ok(())
    }

    /// Output fragment size cap in bytes.
    pub fn fragment_size(&self) -> u64 {
        self.fragment_size_in_mb.saturating_mul(1024 * 1024)
    }
}

// ------------------------------------------------------------------------------------------------
// Parsing helpers
// ------------------------------------------------------------------------------------------------

pub(crate) fn get_value<'a>(options: &'a OptionMap, key: &str) -> Option<&'a str> {
    options.get(key).map(|v| v.trim())
}

fn invalid_number(key: &str, raw: &str) -> CompactionError {
    CompactionError::InvalidConfig(format!("invalid number for {key}: '{raw}'"))
}

/// Parses a float, accepting a trailing `f`/`F` suffix (`"0.3f"`).
fn to_f64(key: &str, raw: &str) -> Result<f64, CompactionError> {
    let digits = raw.strip_suffix(['f', 'F']).unwrap_or(raw);
    match digits.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(invalid_number(key, raw)),
    }
}

pub(crate) fn parse_f64(
    options: &OptionMap,
    key: &str,
    default: f64,
) -> Result<f64, CompactionError> {
    match get_value(options, key) {
        Some(raw) => to_f64(key, raw),
        None => Ok(default),
    }
}

pub(crate) fn parse_u64(
    options: &OptionMap,
    key: &str,
    default: u64,
) -> Result<u64, CompactionError> {
    match get_value(options, key) {
        Some(raw) => raw.parse::<u64>().map_err(|_| invalid_number(key, raw)),
        None => Ok(default),
    }
}

pub(crate) fn parse_i64(
    options: &OptionMap,
    key: &str,
    default: i64,
) -> Result<i64, CompactionError> {
    match get_value(options, key) {
        Some(raw) => raw.parse::<i64>().map_err(|_| invalid_number(key, raw)),
        None => Ok(default),
    }
}
