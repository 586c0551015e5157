//! Linux threads as sampled tasks
//!
//! Every thread of a process is one task: the TID is its identity, `comm` its
//! name and `utime + stime` from `/proc/<pid>/task/<tid>/stat` its run-time
//! counter, all in kernel clock ticks. The global run-time counter is the
//! monotonic clock expressed in the same ticks.

use crate::error::{Result, StatsError};
use crate::snapshot::{TaskId, TaskSource, TaskStatus};
use nix::sys::signal::kill;
use nix::time::{clock_gettime, ClockId};
use nix::unistd::{sysconf, Pid, SysconfVar};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Fallback when `sysconf(_SC_CLK_TCK)` is unavailable
const DEFAULT_CLK_TCK: u64 = 100;

/// Parsed fields of a `/proc/<pid>/task/<tid>/stat` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadStat {
    pub comm: String,
    pub utime: u64,
    pub stime: u64,
}

impl ThreadStat {
    /// Ticks spent in user and kernel mode
    pub fn run_time(&self) -> u64 {
        self.utime + self.stime
    }
}

/// Parse a `stat` line
///
/// `comm` may itself contain spaces and parentheses, so it spans from the
/// first `(` to the last `)`.
pub fn parse_stat(content: &str) -> Result<ThreadStat> {
    let parse_error = |detail: &str| StatsError::Parse {
        what: "thread stat".to_string(),
        detail: detail.to_string(),
    };

    let open = content.find('(').ok_or_else(|| parse_error("missing '('"))?;
    let close = content.rfind(')').ok_or_else(|| parse_error("missing ')'"))?;
    if close < open {
        return Err(parse_error("unbalanced comm"));
    }
    let comm = content[open + 1..close].to_string();

    // Fields after comm start at field 3 (state); utime and stime are 14 and 15
    let fields: Vec<&str> = content[close + 1..].split_whitespace().collect();
    let field = |index: usize, name: &str| -> Result<u64> {
        fields
            .get(index)
            .ok_or_else(|| parse_error(&format!("missing {}", name)))?
            .parse()
            .map_err(|_| parse_error(&format!("invalid {}", name)))
    };

    Ok(ThreadStat {
        comm,
        utime: field(11, "utime")?,
        stime: field(12, "stime")?,
    })
}

/// Kernel clock ticks per second
pub fn clock_ticks_per_second() -> u64 {
    match sysconf(SysconfVar::CLK_TCK) {
        Ok(Some(ticks)) if ticks > 0 => ticks as u64,
        _ => DEFAULT_CLK_TCK,
    }
}

/// Samples the threads of one process through procfs
#[derive(Debug, Clone)]
pub struct ProcfsSource {
    task_dir: PathBuf,
    pid: Pid,
    clk_tck: u64,
}

impl ProcfsSource {
    /// Sample the threads of `pid`
    ///
    /// # Errors
    ///
    /// `Io` if the process does not exist or cannot be signalled.
    pub fn new(pid: Pid) -> Result<Self> {
        kill(pid, None).map_err(std::io::Error::from)?;
        Ok(Self::with_root("/proc", pid))
    }

    /// Sample the calling process
    pub fn current() -> Self {
        Self::with_root("/proc", Pid::this())
    }

    /// Read from an alternative procfs mount
    pub fn with_root<P: AsRef<Path>>(root: P, pid: Pid) -> Self {
        let task_dir = root.as_ref().join(pid.to_string()).join("task");
        Self {
            task_dir,
            pid,
            clk_tck: clock_ticks_per_second(),
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn clk_tck(&self) -> u64 {
        self.clk_tck
    }

    fn thread_ids(&self) -> std::io::Result<Vec<u64>> {
        let mut tids: Vec<u64> = fs::read_dir(&self.task_dir)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().to_str()?.parse().ok())
            .collect();
        tids.sort_unstable();
        Ok(tids)
    }

    /// Read one thread, `None` if it exited since the directory listing
    fn read_thread(&self, tid: u64) -> Result<Option<TaskStatus>> {
        let path = self.task_dir.join(tid.to_string()).join("stat");
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) if e.raw_os_error() == Some(nix::libc::ESRCH) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let stat = parse_stat(&content)?;
        // Truncation keeps wrapping deltas exact within one window
        Ok(Some(TaskStatus::new(
            TaskId(tid),
            &stat.comm,
            stat.run_time() as u32,
        )))
    }

    /// Monotonic clock in kernel ticks
    fn now_ticks(&self) -> Result<u32> {
        let now = clock_gettime(ClockId::CLOCK_MONOTONIC).map_err(std::io::Error::from)?;
        let secs = now.tv_sec() as u64;
        let nanos = now.tv_nsec() as u64;
        let ticks = secs * self.clk_tck + nanos * self.clk_tck / 1_000_000_000;
        Ok(ticks as u32)
    }

    fn capture(&self, buffer: &mut Vec<TaskStatus>, capacity: usize) -> Result<Option<u32>> {
        let total = self.now_ticks()?;
        for tid in self.thread_ids()? {
            if let Some(task) = self.read_thread(tid)? {
                if buffer.len() == capacity {
                    debug!(capacity, "thread list outgrew snapshot buffer");
                    buffer.clear();
                    return Ok(None);
                }
                buffer.push(task);
            }
        }
        Ok(Some(total))
    }
}

impl TaskSource for ProcfsSource {
    fn task_count(&mut self) -> usize {
        self.thread_ids().map(|tids| tids.len()).unwrap_or(0)
    }

    fn capture_system_state(
        &mut self,
        buffer: &mut Vec<TaskStatus>,
        capacity: usize,
    ) -> Option<u32> {
        buffer.clear();
        match self.capture(buffer, capacity) {
            Ok(total) => total,
            Err(e) => {
                warn!(pid = %self.pid, "failed to read thread list: {}", e);
                buffer.clear();
                None
            }
        }
    }

    fn delay(&mut self, window: Duration) {
        std::thread::sleep(window);
    }
}
