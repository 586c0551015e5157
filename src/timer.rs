//! Manual start/stop interval timers
//!
//! A stopwatch for instrumenting arbitrary code regions. Time only accumulates
//! when a running timer is stopped. Starting a running timer or stopping a
//! stopped one logs a warning and changes nothing.
//!
//! Timers are not synchronised: use one timer per execution context.

use crate::error::{Result, StatsError};
use crate::snapshot::truncate_name;
use std::collections::HashMap;
use std::fmt;
use std::time::Instant;
use tracing::warn;

/// Monotonic timestamp source in microseconds
pub trait Clock {
    fn now_us(&self) -> i64;
}

/// [`Clock`] backed by [`Instant`], with its epoch at construction
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    epoch: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_us(&self) -> i64 {
        i64::try_from(self.epoch.elapsed().as_micros()).unwrap_or(i64::MAX)
    }
}

/// Whether a timer is currently measuring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Stopped,
    Running,
}

impl TimerState {
    fn as_str(self) -> &'static str {
        match self {
            TimerState::Stopped => "stopped",
            TimerState::Running => "running",
        }
    }
}

/// Named stopwatch accumulating time across start/stop pairs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalTimer {
    name: String,
    time_us: i64,
    start_us: i64,
    state: TimerState,
}

impl IntervalTimer {
    /// Create a stopped timer; the name is truncated to the task name limit
    pub fn new(name: &str) -> Self {
        Self {
            name: truncate_name(name),
            time_us: 0,
            start_us: 0,
            state: TimerState::Stopped,
        }
    }

    /// Begin measuring
    ///
    /// # Errors
    ///
    /// `InvalidStateTransition` if the timer is already running.
    pub fn start<C: Clock + ?Sized>(&mut self, clock: &C) -> Result<()> {
        self.start_at(clock.now_us())
    }

    /// Stop measuring and add the interval since `start` to the total
    ///
    /// # Errors
    ///
    /// `InvalidStateTransition` if the timer is not running.
    pub fn stop<C: Clock + ?Sized>(&mut self, clock: &C) -> Result<()> {
        self.stop_at(clock.now_us())
    }

    /// [`start`](Self::start) with an explicit timestamp
    pub fn start_at(&mut self, now_us: i64) -> Result<()> {
        if self.state == TimerState::Running {
            return Err(self.rejected());
        }
        self.start_us = now_us;
        self.state = TimerState::Running;
        Ok(())
    }

    /// [`stop`](Self::stop) with an explicit timestamp
    pub fn stop_at(&mut self, now_us: i64) -> Result<()> {
        if self.state == TimerState::Stopped {
            return Err(self.rejected());
        }
        // A clock that went backwards contributes nothing
        let interval = now_us.saturating_sub(self.start_us).max(0);
        self.time_us = self.time_us.saturating_add(interval);
        self.state = TimerState::Stopped;
        Ok(())
    }

    fn rejected(&self) -> StatsError {
        warn!(timer = %self.name, state = self.state.as_str(), "ignored timer transition");
        StatsError::InvalidStateTransition {
            name: self.name.clone(),
            state: self.state.as_str(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Accumulated time in microseconds (excludes a running interval)
    pub fn time_us(&self) -> i64 {
        self.time_us
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == TimerState::Running
    }
}

impl fmt::Display for IntervalTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} us", self.name, self.time_us)
    }
}

/// Opaque handle to a timer owned by a [`TimerRegistry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u32);

impl TimerHandle {
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Handle-based timer API
///
/// Destroyed handles are never reissued, so using one after `destroy` is
/// reported as `InvalidHandle` rather than touching another timer.
#[derive(Debug)]
pub struct TimerRegistry<C: Clock = MonotonicClock> {
    clock: C,
    timers: HashMap<TimerHandle, IntervalTimer>,
    next_handle: u32,
}

impl Default for TimerRegistry<MonotonicClock> {
    fn default() -> Self {
        Self::new(MonotonicClock::new())
    }
}

impl<C: Clock> TimerRegistry<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            timers: HashMap::new(),
            next_handle: 1,
        }
    }

    /// Create a stopped timer and return its handle
    pub fn create(&mut self, name: &str) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;
        self.timers.insert(handle, IntervalTimer::new(name));
        handle
    }

    pub fn start(&mut self, handle: TimerHandle) -> Result<()> {
        let now = self.clock.now_us();
        self.timer_mut(handle)?.start_at(now)
    }

    pub fn stop(&mut self, handle: TimerHandle) -> Result<()> {
        let now = self.clock.now_us();
        self.timer_mut(handle)?.stop_at(now)
    }

    /// Remove a timer, returning its final state
    pub fn destroy(&mut self, handle: TimerHandle) -> Result<IntervalTimer> {
        self.timers
            .remove(&handle)
            .ok_or_else(|| invalid_handle(handle))
    }

    /// Render a timer as `"<name>: <time> us"`
    pub fn format(&self, handle: TimerHandle) -> Result<String> {
        self.get(handle).map(|timer| timer.to_string())
    }

    pub fn get(&self, handle: TimerHandle) -> Result<&IntervalTimer> {
        self.timers.get(&handle).ok_or_else(|| invalid_handle(handle))
    }

    fn timer_mut(&mut self, handle: TimerHandle) -> Result<&mut IntervalTimer> {
        self.timers
            .get_mut(&handle)
            .ok_or_else(|| invalid_handle(handle))
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}

fn invalid_handle(handle: TimerHandle) -> StatsError {
    warn!(handle = handle.0, "invalid timer handle");
    StatsError::InvalidHandle(handle.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// Clock advanced by hand
    struct ManualClock(Cell<i64>);

    impl ManualClock {
        fn new() -> Self {
            Self(Cell::new(0))
        }

        fn advance(&self, us: i64) {
            self.0.set(self.0.get() + us);
        }
    }

    impl Clock for ManualClock {
        fn now_us(&self) -> i64 {
            self.0.get()
        }
    }

    #[test]
    fn test_new_timer_is_stopped() {
        let timer = IntervalTimer::new("flash_write");
        assert_eq!(timer.state(), TimerState::Stopped);
        assert_eq!(timer.time_us(), 0);
        assert_eq!(timer.name(), "flash_write");
    }

    #[test]
    fn test_start_stop_accumulates() {
        let clock = ManualClock::new();
        let mut timer = IntervalTimer::new("loop");

        timer.start(&clock).unwrap();
        clock.advance(150);
        timer.stop(&clock).unwrap();
        clock.advance(1000);
        timer.start(&clock).unwrap();
        clock.advance(50);
        timer.stop(&clock).unwrap();

        assert_eq!(timer.time_us(), 200);
    }

    #[test]
    fn test_double_start_is_noop() {
        let clock = ManualClock::new();
        let mut timer = IntervalTimer::new("t");

        timer.start(&clock).unwrap();
        clock.advance(100);
        let err = timer.start(&clock).unwrap_err();
        assert!(matches!(err, StatsError::InvalidStateTransition { .. }));
        clock.advance(100);
        timer.stop(&clock).unwrap();

        // Second start did not move the start timestamp
        assert_eq!(timer.time_us(), 200);
    }

    #[test]
    fn test_double_stop_is_noop() {
        let clock = ManualClock::new();
        let mut timer = IntervalTimer::new("t");

        timer.start(&clock).unwrap();
        clock.advance(10);
        timer.stop(&clock).unwrap();
        clock.advance(10);
        assert!(timer.stop(&clock).is_err());
        assert_eq!(timer.time_us(), 10);
        assert!(!timer.is_running());
    }

    #[test]
    fn test_stop_without_start_rejected() {
        let mut timer = IntervalTimer::new("t");
        assert!(timer.stop_at(5).is_err());
        assert_eq!(timer.time_us(), 0);
    }

    #[test]
    fn test_backwards_clock_adds_nothing() {
        let mut timer = IntervalTimer::new("skew");
        timer.start_at(100).unwrap();
        timer.stop_at(40).unwrap();
        assert_eq!(timer.time_us(), 0);

        timer.start_at(i64::MAX).unwrap();
        timer.stop_at(i64::MIN).unwrap();
        assert_eq!(timer.time_us(), 0);
        assert!(!timer.is_running());
    }

    #[test]
    fn test_display_format() {
        let mut timer = IntervalTimer::new("render");
        timer.start_at(1_000).unwrap();
        timer.stop_at(1_250).unwrap();
        assert_eq!(timer.to_string(), "render: 250 us");
    }

    #[test]
    fn test_name_truncated() {
        let timer = IntervalTimer::new("a_really_long_timer_name");
        assert_eq!(timer.name(), "a_really_long_t");
    }

    #[test]
    fn test_monotonic_clock_never_goes_back() {
        let clock = MonotonicClock::new();
        let a = clock.now_us();
        let b = clock.now_us();
        assert!(a >= 0);
        assert!(b >= a);
    }

    #[test]
    fn test_registry_lifecycle() {
        let mut registry = TimerRegistry::new(ManualClock::new());
        let handle = registry.create("isr");

        registry.start(handle).unwrap();
        registry.clock().advance(40);
        registry.stop(handle).unwrap();
        assert_eq!(registry.format(handle).unwrap(), "isr: 40 us");

        let timer = registry.destroy(handle).unwrap();
        assert_eq!(timer.time_us(), 40);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_registry_invalid_handle() {
        let mut registry = TimerRegistry::new(ManualClock::new());
        let handle = registry.create("x");
        registry.destroy(handle).unwrap();

        assert!(matches!(
            registry.start(handle),
            Err(StatsError::InvalidHandle(_))
        ));
        assert!(matches!(
            registry.format(handle),
            Err(StatsError::InvalidHandle(_))
        ));
        assert!(registry.destroy(handle).is_err());
    }

    #[test]
    fn test_registry_handles_not_reused() {
        let mut registry = TimerRegistry::new(ManualClock::new());
        let first = registry.create("a");
        registry.destroy(first).unwrap();
        let second = registry.create("b");
        assert_ne!(first, second);
        assert_eq!(registry.len(), 1);
    }
}
