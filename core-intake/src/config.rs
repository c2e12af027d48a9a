//! Upload and polling configuration.

use core_runtime::config::{DEFAULT_CONCURRENCY, MAX_CONCURRENCY, MIN_CONCURRENCY};
use std::time::Duration;

use crate::error::{IntakeError, Result};
use crate::item::MAX_FILE_SIZE_BYTES;

/// Configuration for the remote task status poller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerConfig {
    /// Grace period before the first status query
    pub initial_delay: Duration,

    /// Pause between status queries
    pub interval: Duration,

    /// Status queries before giving up
    pub max_attempts: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            interval: Duration::from_secs(3),
            max_attempts: 60,
        }
    }
}

impl PollerConfig {
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(IntakeError::Config(
                "poller max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for batch uploads
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Simultaneous transfers for the next run (clamped to 1..=10)
    pub concurrency_limit: u8,

    /// Skip items flagged as duplicates instead of uploading them
    pub skip_duplicates: bool,

    /// Pause after each dispatch
    pub dispatch_delay: Duration,

    /// Synthetic progress cadence while a transfer is in flight
    pub progress_tick: Duration,

    /// Percent added per progress tick
    pub progress_step: u8,

    /// Synthetic progress never passes this value
    pub progress_cap: u8,

    /// Emit a pre-check progress event every N items
    pub precheck_progress_every: usize,

    /// Batch runs kept in history
    pub history_limit: usize,

    /// Largest accepted file
    pub max_file_size_bytes: u64,

    pub poller: PollerConfig,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: DEFAULT_CONCURRENCY,
            skip_duplicates: false,
            dispatch_delay: Duration::from_millis(200),
            progress_tick: Duration::from_millis(300),
            progress_step: 10,
            progress_cap: 90,
            precheck_progress_every: 5,
            history_limit: 20,
            max_file_size_bytes: MAX_FILE_SIZE_BYTES,
            poller: PollerConfig::default(),
        }
    }
}

impl UploadConfig {
    /// Create builder for configuration
    pub fn builder() -> Self {
        Self::default()
    }

    pub fn with_concurrency_limit(mut self, limit: u8) -> Self {
        self.concurrency_limit = limit;
        self
    }

    pub fn with_skip_duplicates(mut self, skip: bool) -> Self {
        self.skip_duplicates = skip;
        self
    }

    pub fn with_dispatch_delay(mut self, delay: Duration) -> Self {
        self.dispatch_delay = delay;
        self
    }

    pub fn with_progress_tick(mut self, tick: Duration) -> Self {
        self.progress_tick = tick;
        self
    }

    pub fn with_precheck_progress_every(mut self, every: usize) -> Self {
        self.precheck_progress_every = every;
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn with_poller(mut self, poller: PollerConfig) -> Self {
        self.poller = poller;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&self.concurrency_limit) {
            return Err(IntakeError::Config(format!(
                "concurrency_limit must be between {} and {}, got {}",
                MIN_CONCURRENCY, MAX_CONCURRENCY, self.concurrency_limit
            )));
        }

        if self.progress_tick.is_zero() {
            return Err(IntakeError::Config(
                "progress_tick must be non-zero".to_string(),
            ));
        }

        if self.progress_cap > 100 {
            return Err(IntakeError::Config(
                "progress_cap must not exceed 100".to_string(),
            ));
        }

        if self.precheck_progress_every == 0 {
            return Err(IntakeError::Config(
                "precheck_progress_every must be at least 1".to_string(),
            ));
        }

        if self.history_limit == 0 {
            return Err(IntakeError::Config(
                "history_limit must be at least 1".to_string(),
            ));
        }

        if self.max_file_size_bytes == 0 {
            return Err(IntakeError::Config(
                "max_file_size_bytes must be non-zero".to_string(),
            ));
        }

        self.poller.validate()
    }
}

/// Clamp an operator-supplied limit into the supported range.
pub fn clamp_concurrency(limit: u8) -> u8 {
    limit.clamp(MIN_CONCURRENCY, MAX_CONCURRENCY)
}
