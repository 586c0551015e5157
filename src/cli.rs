//! CLI argument parsing for rtstats

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for round reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table (default)
    Text,
    /// One JSON object per round
    Json,
    /// CSV rows for spreadsheet analysis
    Csv,
}

#[derive(Parser, Debug)]
#[command(name = "rtstats")]
#[command(version)]
#[command(about = "Real-time per-thread CPU usage sampler", long_about = None)]
pub struct Cli {
    /// Sample the threads of this process (default: rtstats itself)
    #[arg(short = 'p', long = "pid", value_name = "PID")]
    pub pid: Option<i32>,

    /// Load settings from a TOML file
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Sampling window in milliseconds
    #[arg(short = 'w', long = "window-ms", value_name = "MS")]
    pub window_ms: Option<u64>,

    /// Pause between rounds in milliseconds
    #[arg(long = "yield-ms", value_name = "MS")]
    pub yield_ms: Option<u64>,

    /// Number of task names tracked for accumulated run time
    #[arg(long = "capacity", value_name = "N")]
    pub capacity: Option<usize>,

    /// Extra snapshot buffer slots beyond the live thread count
    #[arg(long = "array-size-offset", value_name = "N")]
    pub array_size_offset: Option<usize>,

    /// Cores used to normalise percentages (default: available parallelism)
    #[arg(long = "processors", value_name = "N")]
    pub processors: Option<u32>,

    /// Stop after this many rounds (default: run forever)
    #[arg(short = 'n', long = "rounds", value_name = "N")]
    pub rounds: Option<u64>,

    /// Start N busy spin threads in this process before sampling
    #[arg(long = "spin-tasks", value_name = "N", default_value = "0")]
    pub spin_tasks: usize,

    /// Output format
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Enable debug logging to stderr
    #[arg(long = "debug")]
    pub debug: bool,
}
