//! Error taxonomy for sampling and interval timing
//!
//! Round-level errors (`OutOfMemory`, `CaptureIncomplete`, `InvalidInterval`)
//! abort a single sampling round. The remaining variants are reported as
//! warnings by the component that raises them and only degrade functionality.

use thiserror::Error;

/// Errors raised by the sampler, the accumulator table and interval timers
#[derive(Error, Debug)]
pub enum StatsError {
    #[error("Failed to allocate snapshot buffer for {requested} tasks")]
    OutOfMemory { requested: usize },

    #[error("Snapshot buffer of {capacity} entries is too small for the live task list (increase array_size_offset)")]
    CaptureIncomplete { capacity: usize },

    #[error("Zero run time elapsed between snapshots (sampling window too short)")]
    InvalidInterval,

    #[error("Accumulator table is full ({capacity} entries), dropping observation for task '{name}'")]
    TableFull { name: String, capacity: usize },

    #[error("Invalid timer handle: {0}")]
    InvalidHandle(u32),

    #[error("Timer '{name}' is already {state}")]
    InvalidStateTransition { name: String, state: &'static str },

    #[error("Failed to parse {what}: {detail}")]
    Parse { what: String, detail: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for sampler operations
pub type Result<T> = std::result::Result<T, StatsError>;
