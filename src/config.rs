//! Sampler configuration
//!
//! Loaded from an optional TOML file; command-line flags override individual
//! fields afterwards.
//!
//! # Example rtstats.toml
//!
//! ```toml
//! window_ms = 1000
//! yield_ms = 1
//! accumulator_capacity = 16
//! array_size_offset = 5
//! processor_count = 2
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Tunables for the periodic sampler
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SamplerConfig {
    /// Sampling window between the two captures of a round (milliseconds)
    pub window_ms: u64,
    /// Pause between rounds (milliseconds)
    pub yield_ms: u64,
    /// Number of task names the accumulator table can track
    pub accumulator_capacity: usize,
    /// Extra snapshot buffer slots beyond the live task count
    ///
    /// Increase this if rounds fail with `CaptureIncomplete`.
    pub array_size_offset: usize,
    /// Cores sharing the run-time accounting, used to normalise percentages
    pub processor_count: u32,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            window_ms: 1000,
            yield_ms: 1,
            accumulator_capacity: crate::accumulator::DEFAULT_CAPACITY,
            array_size_offset: 5,
            processor_count: 1,
        }
    }
}

impl SamplerConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid configuration in {}", path.display()))
    }

    /// Load configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the sampler cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.window_ms == 0 {
            bail!("window_ms must be greater than 0");
        }
        if self.processor_count == 0 {
            bail!("processor_count must be at least 1");
        }
        Ok(())
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn yield_interval(&self) -> Duration {
        Duration::from_millis(self.yield_ms)
    }
}
