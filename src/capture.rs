//! Snapshot capture with buffer negotiation
//!
//! The scheduler can only copy its task list into a caller-provided buffer.
//! The buffer is sized from the live task count plus a safety margin, since
//! tasks may be created between the count query and the copy.

use crate::error::{Result, StatsError};
use crate::snapshot::{Snapshot, TaskSource, TaskStatus};
use tracing::trace;

/// Capture the current task list from `source`
///
/// # Errors
///
/// * `OutOfMemory` - the snapshot buffer could not be allocated
/// * `CaptureIncomplete` - more tasks were alive than `task_count + array_size_offset`
pub fn capture<S: TaskSource + ?Sized>(
    source: &mut S,
    array_size_offset: usize,
) -> Result<Snapshot> {
    let capacity = source.task_count().saturating_add(array_size_offset);

    let mut buffer: Vec<TaskStatus> = Vec::new();
    buffer
        .try_reserve_exact(capacity)
        .map_err(|_| StatsError::OutOfMemory {
            requested: capacity,
        })?;

    let total_run_time = source
        .capture_system_state(&mut buffer, capacity)
        .ok_or(StatsError::CaptureIncomplete { capacity })?;

    if buffer.is_empty() {
        return Err(StatsError::CaptureIncomplete { capacity });
    }

    trace!(
        tasks = buffer.len(),
        capacity,
        total_run_time,
        "captured task snapshot"
    );
    Ok(Snapshot::new(buffer, total_run_time))
}
