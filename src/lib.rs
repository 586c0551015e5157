//! rtstats - real-time per-task CPU usage sampling
//!
//! This library samples a scheduler's per-task run-time counters over a fixed
//! window, reconciles the two snapshots (including tasks created or deleted
//! during the window), accumulates run time per task name across windows, and
//! renders a report per round. It also provides manual interval timers for
//! instrumenting code regions.

pub mod accumulator;
pub mod capture;
pub mod cli;
pub mod config;
pub mod error;
pub mod load;
pub mod procfs;
pub mod reconcile;
pub mod report;
pub mod sampler;
pub mod sim;
pub mod snapshot;
pub mod timer;
