//! Snapshot reconciliation
//!
//! Matches the tasks of two snapshots by identity and computes how many
//! run-time ticks each task consumed between them. Tasks only present in the
//! first snapshot were deleted during the window; tasks only present in the
//! second were created during it.
//!
//! Every entry of either snapshot ends up in exactly one of `matched`,
//! `deleted` or `created`.

use crate::error::{Result, StatsError};
use crate::snapshot::{Snapshot, TaskId};
use fnv::FnvHashMap;

/// A task present in both snapshots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedTask {
    pub id: TaskId,
    pub name: String,
    /// Run-time ticks consumed during the window
    pub elapsed: u32,
}

/// Outcome of matching a start snapshot against an end snapshot
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Reconciliation {
    /// Matched tasks, in start-snapshot order
    pub matched: Vec<MatchedTask>,
    /// Names of tasks deleted during the window, in start-snapshot order
    pub deleted: Vec<String>,
    /// Names of tasks created during the window, in end-snapshot order
    pub created: Vec<String>,
    /// Global run-time ticks between the two captures
    pub window: u32,
}

impl Reconciliation {
    /// CPU share of a matched task over the window
    pub fn percentage(&self, task: &MatchedTask, processor_count: u32) -> u32 {
        cpu_percent(task.elapsed, self.window, processor_count)
    }
}

/// Integer CPU percentage: `floor(elapsed * 100 / (window * processor_count))`
///
/// Run time is accounted per core, so the total is divided across cores to
/// keep the figure within 0-100. Returns 0 for a zero denominator.
pub fn cpu_percent(elapsed: u32, window: u32, processor_count: u32) -> u32 {
    let denominator = u64::from(window) * u64::from(processor_count.max(1));
    if denominator == 0 {
        return 0;
    }
    let percent = u64::from(elapsed) * 100 / denominator;
    u32::try_from(percent).unwrap_or(u32::MAX)
}

/// Match `start` against `end` and compute per-task deltas
///
/// Counters are subtracted with wrapping semantics, so a single wrap inside
/// the window still yields the right delta.
///
/// # Errors
///
/// * `CaptureIncomplete` - either snapshot is empty
/// * `InvalidInterval` - no global run time elapsed between the captures
pub fn reconcile(start: &Snapshot, end: &Snapshot) -> Result<Reconciliation> {
    if start.is_empty() {
        return Err(StatsError::CaptureIncomplete { capacity: 0 });
    }
    if end.is_empty() {
        return Err(StatsError::CaptureIncomplete { capacity: 0 });
    }

    let window = end.total_run_time.wrapping_sub(start.total_run_time);
    if window == 0 {
        return Err(StatsError::InvalidInterval);
    }

    // Pending end indices per identity, reversed so pop() yields the earliest
    let mut pending: FnvHashMap<TaskId, Vec<usize>> = FnvHashMap::default();
    for (index, task) in end.tasks.iter().enumerate().rev() {
        pending.entry(task.id).or_default().push(index);
    }

    let mut consumed = vec![false; end.tasks.len()];
    let mut result = Reconciliation {
        window,
        ..Default::default()
    };

    for task in &start.tasks {
        match pending.get_mut(&task.id).and_then(Vec::pop) {
            Some(index) => {
                consumed[index] = true;
                let elapsed = end.tasks[index]
                    .run_time_counter
                    .wrapping_sub(task.run_time_counter);
                result.matched.push(MatchedTask {
                    id: task.id,
                    name: task.name.clone(),
                    elapsed,
                });
            }
            None => result.deleted.push(task.name.clone()),
        }
    }

    result.created = end
        .tasks
        .iter()
        .zip(&consumed)
        .filter(|(_, used)| !**used)
        .map(|(task, _)| task.name.clone())
        .collect();

    Ok(result)
}
