//! Task snapshot data model and the scheduler introspection interface
//!
//! A snapshot is the unordered list of live tasks at one instant, each with
//! its cumulative run-time counter, plus the scheduler's global run-time
//! counter taken at the same instant.

use std::fmt;
use std::time::Duration;

/// Maximum task name length in bytes (names are truncated, not rejected)
pub const MAX_TASK_NAME_LEN: usize = 15;

/// Opaque per-task identity
///
/// Unique among live tasks. A value is only reused after the task that owned
/// it has been destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One task as seen by a single capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskStatus {
    pub id: TaskId,
    /// Task name; two live tasks may share it
    pub name: String,
    /// Ticks this task has spent running since it was created (wraps)
    pub run_time_counter: u32,
}

impl TaskStatus {
    pub fn new(id: TaskId, name: &str, run_time_counter: u32) -> Self {
        Self {
            id,
            name: truncate_name(name),
            run_time_counter,
        }
    }
}

/// Truncate a name to [`MAX_TASK_NAME_LEN`] bytes on a char boundary
pub fn truncate_name(name: &str) -> String {
    if name.len() <= MAX_TASK_NAME_LEN {
        return name.to_string();
    }
    let mut end = MAX_TASK_NAME_LEN;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name[..end].to_string()
}

/// All tasks captured at one instant
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub tasks: Vec<TaskStatus>,
    /// Global run-time counter at capture time, in the same ticks as the tasks
    pub total_run_time: u32,
}

impl Snapshot {
    pub fn new(tasks: Vec<TaskStatus>, total_run_time: u32) -> Self {
        Self {
            tasks,
            total_run_time,
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Scheduler introspection primitives consumed by the sampler
///
/// Implemented by [`crate::procfs::ProcfsSource`] for Linux threads and by
/// [`crate::sim::SimScheduler`] for deterministic tests.
pub trait TaskSource {
    /// Number of tasks currently alive
    fn task_count(&mut self) -> usize;

    /// Fill `buffer` with every live task, writing at most `capacity` entries
    ///
    /// Returns the global run-time counter, or `None` when the live task list
    /// does not fit in `capacity`. The buffer is cleared first.
    fn capture_system_state(
        &mut self,
        buffer: &mut Vec<TaskStatus>,
        capacity: usize,
    ) -> Option<u32>;

    /// Block the calling context for `window`
    fn delay(&mut self, window: Duration);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_name_unchanged() {
        assert_eq!(truncate_name("IDLE0"), "IDLE0");
        assert_eq!(truncate_name(""), "");
    }

    #[test]
    fn test_truncate_long_name() {
        let name = truncate_name("a_very_long_task_name_indeed");
        assert_eq!(name.len(), MAX_TASK_NAME_LEN);
        assert_eq!(name, "a_very_long_tas");
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        // 14 ASCII bytes followed by a 2-byte char straddling the limit
        let name = truncate_name("abcdefghijklmnéz");
        assert_eq!(name, "abcdefghijklmn");
    }

    #[test]
    fn test_task_status_truncates_name() {
        let task = TaskStatus::new(TaskId(7), "esp_timer_service_task", 10);
        assert_eq!(task.name.len(), MAX_TASK_NAME_LEN);
        assert_eq!(task.run_time_counter, 10);
    }

    #[test]
    fn test_task_id_display() {
        assert_eq!(TaskId(42).to_string(), "#42");
    }
}
