//! Simulated scheduler for deterministic sampling
//!
//! [`SimScheduler`] implements [`TaskSource`] without touching the host: each
//! task declares the share of every delay it spends running, and `delay`
//! advances the global and per-task counters accordingly. Task creation and
//! deletion are scripted per sampling window.
//!
//! A sampling round is two captures around one delay. Scripted events are
//! applied at the start of the delay that follows a successful opening
//! capture, i.e. inside the window, never during the pause between rounds.
//! A failed capture always closes the window.

use crate::snapshot::{TaskId, TaskSource, TaskStatus};
use std::collections::VecDeque;
use std::time::Duration;

/// A change applied to the simulated task set inside a window
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimEvent {
    /// Create a task running `load_percent` of the time
    Spawn { name: String, load_percent: u32 },
    /// Destroy a task
    Kill(TaskId),
    /// Make the capture that closes this window fail
    FailCapture,
}

/// Where the simulator stands within a sampling round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WindowPhase {
    /// No window open; the next delay is a pause between rounds
    Between,
    /// Start snapshot taken; the next delay is the sampling window
    Open,
    /// Window elapsed; waiting for the end snapshot
    Closing,
}

#[derive(Debug, Clone)]
struct SimTask {
    id: TaskId,
    name: String,
    counter: u32,
    load_percent: u32,
}

/// In-memory scheduler with scripted load
#[derive(Debug, Clone)]
pub struct SimScheduler {
    tasks: Vec<SimTask>,
    next_id: u64,
    total_run_time: u32,
    ticks_per_ms: u32,
    frozen: bool,
    phase: WindowPhase,
    delays: u64,
    windows: VecDeque<Vec<SimEvent>>,
    spawn_during_capture: usize,
    fail_next_capture: bool,
}

impl SimScheduler {
    /// Create an empty scheduler whose clock advances `ticks_per_ms` per millisecond
    pub fn new(ticks_per_ms: u32) -> Self {
        Self {
            tasks: Vec::new(),
            next_id: 1,
            total_run_time: 0,
            ticks_per_ms,
            frozen: false,
            phase: WindowPhase::Between,
            delays: 0,
            windows: VecDeque::new(),
            spawn_during_capture: 0,
            fail_next_capture: false,
        }
    }

    /// Create a task immediately and return its identity
    pub fn spawn(&mut self, name: &str, load_percent: u32) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        self.tasks.push(SimTask {
            id,
            name: name.to_string(),
            counter: 0,
            load_percent,
        });
        id
    }

    /// Destroy a task immediately
    pub fn kill(&mut self, id: TaskId) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        self.tasks.len() != before
    }

    /// Queue events for the next window that has no events yet
    pub fn during_next_window(&mut self, events: Vec<SimEvent>) {
        self.windows.push_back(events);
    }

    /// Identity the next spawned task will receive
    pub fn next_id(&self) -> TaskId {
        TaskId(self.next_id)
    }

    /// Overwrite a task's run-time counter
    pub fn set_counter(&mut self, id: TaskId, counter: u32) {
        if let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) {
            task.counter = counter;
        }
    }

    /// Overwrite the global run-time counter
    pub fn set_total_run_time(&mut self, total: u32) {
        self.total_run_time = total;
    }

    /// Stop (or restart) the clock; a frozen clock makes every window empty
    pub fn freeze_clock(&mut self, frozen: bool) {
        self.frozen = frozen;
    }

    /// Make the next capture see `count` more tasks than `task_count` reported
    pub fn spawn_during_capture(&mut self, count: usize) {
        self.spawn_during_capture = count;
    }

    /// Make the next capture report insufficient capacity
    pub fn fail_next_capture(&mut self) {
        self.fail_next_capture = true;
    }

    /// Number of `delay` calls so far
    pub fn delay_count(&self) -> u64 {
        self.delays
    }

    pub fn total_run_time(&self) -> u32 {
        self.total_run_time
    }

    fn apply(&mut self, event: SimEvent) {
        match event {
            SimEvent::Spawn { name, load_percent } => {
                self.spawn(&name, load_percent);
            }
            SimEvent::Kill(id) => {
                self.kill(id);
            }
            SimEvent::FailCapture => self.fail_next_capture = true,
        }
    }
}

impl TaskSource for SimScheduler {
    fn task_count(&mut self) -> usize {
        self.tasks.len()
    }

    fn capture_system_state(
        &mut self,
        buffer: &mut Vec<TaskStatus>,
        capacity: usize,
    ) -> Option<u32> {
        for i in 0..std::mem::take(&mut self.spawn_during_capture) {
            self.spawn(&format!("late{}", i), 0);
        }

        buffer.clear();
        let failed = std::mem::take(&mut self.fail_next_capture) || self.tasks.len() > capacity;

        self.phase = match self.phase {
            _ if failed => WindowPhase::Between,
            // An empty list is rejected by the capturer, so it opens nothing
            WindowPhase::Between if self.tasks.is_empty() => WindowPhase::Between,
            WindowPhase::Between | WindowPhase::Open => WindowPhase::Open,
            WindowPhase::Closing => WindowPhase::Between,
        };
        if failed {
            return None;
        }

        buffer.extend(
            self.tasks
                .iter()
                .map(|t| TaskStatus::new(t.id, &t.name, t.counter)),
        );
        Some(self.total_run_time)
    }

    fn delay(&mut self, window: Duration) {
        self.delays += 1;

        if self.phase == WindowPhase::Open {
            if let Some(events) = self.windows.pop_front() {
                for event in events {
                    self.apply(event);
                }
            }
            self.phase = WindowPhase::Closing;
        } else {
            self.phase = WindowPhase::Between;
        }

        if self.frozen {
            return;
        }

        let ticks = (window.as_millis() as u64).wrapping_mul(u64::from(self.ticks_per_ms));
        self.total_run_time = self.total_run_time.wrapping_add(ticks as u32);
        for task in &mut self.tasks {
            let share = ticks * u64::from(task.load_percent) / 100;
            task.counter = task.counter.wrapping_add(share as u32);
        }
    }
}
