//! Periodic CPU usage sampler
//!
//! Each round captures the task list, waits one sampling window, captures it
//! again, reconciles the two snapshots, folds the deltas into the accumulator
//! table and produces a [`RoundReport`]. A failed round is logged and the next
//! one starts as usual.

use crate::accumulator::AccumulatorTable;
use crate::capture::capture;
use crate::config::SamplerConfig;
use crate::error::Result;
use crate::reconcile::reconcile;
use crate::report::RoundReport;
use crate::snapshot::TaskSource;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// Drives sampling rounds against a [`TaskSource`]
///
/// # Example
///
/// ```
/// use rtstats::accumulator::AccumulatorTable;
/// use rtstats::config::SamplerConfig;
/// use rtstats::sampler::Sampler;
/// use rtstats::sim::SimScheduler;
///
/// let mut sim = SimScheduler::new(10);
/// sim.spawn("IDLE", 60);
/// sim.spawn("spin0", 40);
///
/// let mut sampler = Sampler::new(sim, AccumulatorTable::new(), SamplerConfig::default());
/// let report = sampler.sample_round().unwrap();
/// assert_eq!(report.running().count(), 2);
/// ```
#[derive(Debug)]
pub struct Sampler<S: TaskSource> {
    source: S,
    table: AccumulatorTable,
    config: SamplerConfig,
    rounds: u64,
    reset_request: Option<&'static AtomicBool>,
}

impl<S: TaskSource> Sampler<S> {
    /// Create a sampler over `source` that accumulates into `table`
    pub fn new(source: S, table: AccumulatorTable, config: SamplerConfig) -> Self {
        Self {
            source,
            table,
            config,
            rounds: 0,
            reset_request: None,
        }
    }

    /// Create a sampler with a fresh table sized from `config`
    pub fn with_config(source: S, config: SamplerConfig) -> Self {
        let table = AccumulatorTable::with_capacity(config.accumulator_capacity);
        Self::new(source, table, config)
    }

    /// Clear the accumulator table before the next round whenever `flag` is raised
    ///
    /// The flag is lowered once the reset has happened. It is static so a
    /// signal handler can raise it.
    pub fn reset_on(mut self, flag: &'static AtomicBool) -> Self {
        self.reset_request = Some(flag);
        self
    }

    /// Run one sampling round
    ///
    /// # Errors
    ///
    /// Any capture or reconciliation error aborts the round before the
    /// accumulator table is touched.
    pub fn sample_round(&mut self) -> Result<RoundReport> {
        let start = capture(&mut self.source, self.config.array_size_offset)?;
        self.source.delay(self.config.window());
        let end = capture(&mut self.source, self.config.array_size_offset)?;

        let reconciliation = reconcile(&start, &end)?;

        // Table overflow only loses history for that task; the row still prints
        let accumulated: Vec<Option<u64>> = reconciliation
            .matched
            .iter()
            .map(|task| self.table.fold(&task.name, task.elapsed).ok())
            .collect();
        self.table.end_round();

        self.rounds += 1;
        debug!(
            round = self.rounds,
            window = reconciliation.window,
            matched = reconciliation.matched.len(),
            deleted = reconciliation.deleted.len(),
            created = reconciliation.created.len(),
            "sampling round complete"
        );

        Ok(RoundReport::from_reconciliation(
            self.rounds,
            &reconciliation,
            &accumulated,
            self.config.processor_count,
        ))
    }

    /// Sample forever, handing each report to `sink`
    pub fn run<F>(&mut self, mut sink: F) -> !
    where
        F: FnMut(&RoundReport),
    {
        loop {
            self.round_then_yield(&mut sink);
        }
    }

    /// Sample `rounds` times, handing each report to `sink`
    ///
    /// Returns the number of rounds that produced a report.
    pub fn run_rounds<F>(&mut self, rounds: u64, mut sink: F) -> u64
    where
        F: FnMut(&RoundReport),
    {
        (0..rounds)
            .filter(|_| self.round_then_yield(&mut sink))
            .count() as u64
    }

    fn round_then_yield<F>(&mut self, sink: &mut F) -> bool
    where
        F: FnMut(&RoundReport),
    {
        if self
            .reset_request
            .is_some_and(|flag| flag.swap(false, Ordering::Relaxed))
        {
            self.reset_accumulated();
        }

        let ok = match self.sample_round() {
            Ok(report) => {
                sink(&report);
                true
            }
            Err(e) => {
                warn!("Error getting real time stats: {}", e);
                false
            }
        };
        self.source.delay(self.config.yield_interval());
        ok
    }

    /// Discard all accumulated history
    pub fn reset_accumulated(&mut self) {
        self.table.reset_all();
    }

    /// Number of successful rounds so far
    pub fn rounds(&self) -> u64 {
        self.rounds
    }

    pub fn table(&self) -> &AccumulatorTable {
        &self.table
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Consume the sampler, returning its source and table
    pub fn into_parts(self) -> (S, AccumulatorTable) {
        (self.source, self.table)
    }
}
