use anyhow::{bail, Context, Result};
use clap::Parser;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::unistd::Pid;
use rtstats::accumulator::AccumulatorTable;
use rtstats::cli::{Cli, OutputFormat};
use rtstats::config::SamplerConfig;
use rtstats::load::SpinLoad;
use rtstats::procfs::ProcfsSource;
use rtstats::report::RoundReport;
use rtstats::sampler::Sampler;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::EnvFilter;

/// Raised by SIGUSR1, consumed by the sampler before its next round
static RESET_REQUESTED: AtomicBool = AtomicBool::new(false);

extern "C" fn request_reset(_: nix::libc::c_int) {
    RESET_REQUESTED.store(true, Ordering::Relaxed);
}

/// Discard accumulated run time on SIGUSR1
fn install_reset_handler() -> Result<()> {
    let action = SigAction::new(
        SigHandler::Handler(request_reset),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    // SAFETY: the handler only stores to an atomic
    unsafe { sigaction(Signal::SIGUSR1, &action) }.context("Failed to install SIGUSR1 handler")?;
    Ok(())
}

/// Initialize tracing subscriber; `--debug` raises the level to TRACE
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Merge the optional config file with command-line overrides
fn build_config(args: &Cli) -> Result<SamplerConfig> {
    let mut config = match &args.config {
        Some(path) => SamplerConfig::from_file(path)?,
        None => SamplerConfig {
            processor_count: default_processor_count(),
            ..SamplerConfig::default()
        },
    };

    if let Some(window_ms) = args.window_ms {
        config.window_ms = window_ms;
    }
    if let Some(yield_ms) = args.yield_ms {
        config.yield_ms = yield_ms;
    }
    if let Some(capacity) = args.capacity {
        config.accumulator_capacity = capacity;
    }
    if let Some(offset) = args.array_size_offset {
        config.array_size_offset = offset;
    }
    if let Some(processors) = args.processors {
        config.processor_count = processors;
    }

    config.validate()?;
    Ok(config)
}

fn default_processor_count() -> u32 {
    std::thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(1)
}

/// Print one round the way the selected format expects
fn emit(report: &RoundReport, format: OutputFormat, window_ms: u64) {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let result = match format {
        OutputFormat::Text => writeln!(
            out,
            "\nReal time stats over {} ms (round {})\n{}",
            window_ms, report.round, report
        ),
        OutputFormat::Csv if report.round > 1 => {
            // Header only once per stream
            let csv = report.to_csv();
            let body = csv.split_once('\n').map(|(_, rows)| rows).unwrap_or("");
            if body.is_empty() {
                Ok(())
            } else {
                writeln!(out, "{}", body)
            }
        }
        _ => writeln!(out, "{}", report.render(format)),
    };
    if let Err(e) = result.and_then(|_| out.flush()) {
        tracing::warn!("Failed to write report: {}", e);
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();

    init_tracing(args.debug);

    if args.rounds == Some(0) {
        bail!("Invalid value for --rounds: 0 (must be >= 1)");
    }

    let config = build_config(&args)?;
    install_reset_handler()?;

    let source = match args.pid {
        Some(pid) => ProcfsSource::new(Pid::from_raw(pid))
            .with_context(|| format!("Cannot sample process {}", pid))?,
        None => ProcfsSource::current(),
    };

    let _load = if args.spin_tasks > 0 {
        if args.pid.is_some() {
            bail!("--spin-tasks only applies when sampling rtstats itself (omit -p)");
        }
        Some(SpinLoad::spawn(args.spin_tasks).context("Failed to start spin threads")?)
    } else {
        None
    };

    let table = AccumulatorTable::with_capacity(config.accumulator_capacity);
    let window_ms = config.window_ms;
    let format = args.format;
    let mut sampler = Sampler::new(source, table, config).reset_on(&RESET_REQUESTED);
    let sink = |report: &RoundReport| emit(report, format, window_ms);

    match args.rounds {
        Some(rounds) => {
            let ok = sampler.run_rounds(rounds, sink);
            if ok == 0 {
                bail!("No sampling round succeeded out of {}", rounds);
            }
            Ok(())
        }
        None => sampler.run(sink),
    }
}
