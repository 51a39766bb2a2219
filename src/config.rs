use crate::buffering::{DEFAULT_CAPACITY, DEFAULT_FLUSH_INTERVAL};
use crate::error::{PipelineError, Result};
use std::time::Duration;

/// Environment variable overriding [`PipelineConfig::buffer_capacity`]
pub const ENV_BUFFER_CAPACITY: &str = "INT_PIPELINE_BUFFER_CAPACITY";

/// Environment variable overriding [`PipelineConfig::flush_interval`], in milliseconds
pub const ENV_FLUSH_INTERVAL_MS: &str = "INT_PIPELINE_FLUSH_INTERVAL_MS";

/// Tunables for the standard pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Values the buffering stage holds between flushes
    pub buffer_capacity: usize,
    /// Time between buffer flushes
    pub flush_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_CAPACITY,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
        }
    }
}

impl PipelineConfig {
    /// Defaults overridden by any of the `INT_PIPELINE_*` variables that are set
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_BUFFER_CAPACITY) {
            config.buffer_capacity = raw.trim().parse::<usize>().map_err(|e| {
                PipelineError::Config(format!("{}={:?}: {}", ENV_BUFFER_CAPACITY, raw, e))
            })?;
        }

        if let Some(raw) = lookup(ENV_FLUSH_INTERVAL_MS) {
            let millis = raw.trim().parse::<u64>().map_err(|e| {
                PipelineError::Config(format!("{}={:?}: {}", ENV_FLUSH_INTERVAL_MS, raw, e))
            })?;
            config.flush_interval = Duration::from_millis(millis);
        }

        config.validate()?;
        Ok(config)
    }

    /// Builder-style capacity override
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    /// Builder-style interval override
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Check that capacity and interval are both non-zero
    pub fn validate(&self) -> Result<()> {
        if self.buffer_capacity == 0 {
            return Err(PipelineError::Config(
                "buffer capacity must be greater than zero".into(),
            ));
        }
        if self.flush_interval.is_zero() {
            return Err(PipelineError::Config(
                "flush interval must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
