//! Fixed-capacity accumulated run time per task name
//!
//! Each sampling round folds the matched tasks' deltas into the table and then
//! calls [`AccumulatorTable::end_round`]. Names that were not folded during
//! the round are evicted, so a vanished task never holds a slot for longer
//! than one round.

use crate::error::{Result, StatsError};
use std::collections::HashMap;
use tracing::{info, warn};

/// Default number of names the table can track
pub const DEFAULT_CAPACITY: usize = 16;

/// Running total for one task name
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccumulatorEntry {
    /// Ticks attributed to this name across all rounds it was seen in
    pub cumulative_time: u64,
    /// Whether the name was folded during the current round
    pub seen_this_round: bool,
}

/// Bounded map from task name to accumulated run time
///
/// Names are compared by content. Tasks that share a name share an entry.
#[derive(Debug, Clone)]
pub struct AccumulatorTable {
    entries: HashMap<String, AccumulatorEntry>,
    capacity: usize,
}

impl Default for AccumulatorTable {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl AccumulatorTable {
    /// Create a table with [`DEFAULT_CAPACITY`] slots
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table holding at most `capacity` names
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
            capacity,
        }
    }

    /// Add `elapsed` ticks to `name` and mark it seen for this round
    ///
    /// Returns the accumulated total. A name not yet tracked takes a free slot
    /// and starts at `elapsed`.
    ///
    /// # Errors
    ///
    /// `TableFull` when `name` is new and every slot is taken. The observation
    /// is dropped and logged; existing entries are untouched.
    pub fn fold(&mut self, name: &str, elapsed: u32) -> Result<u64> {
        if let Some(entry) = self.entries.get_mut(name) {
            entry.cumulative_time += u64::from(elapsed);
            entry.seen_this_round = true;
            return Ok(entry.cumulative_time);
        }

        if self.entries.len() >= self.capacity {
            warn!(
                task = name,
                capacity = self.capacity,
                "accumulator table is full, dropping observation"
            );
            return Err(StatsError::TableFull {
                name: name.to_string(),
                capacity: self.capacity,
            });
        }

        let entry = AccumulatorEntry {
            cumulative_time: u64::from(elapsed),
            seen_this_round: true,
        };
        self.entries.insert(name.to_string(), entry);
        Ok(entry.cumulative_time)
    }

    /// Close the current round
    ///
    /// Evicts every name not folded since the previous call and clears the
    /// seen flag on the rest.
    pub fn end_round(&mut self) {
        self.entries.retain(|_, entry| {
            let keep = entry.seen_this_round;
            entry.seen_this_round = false;
            keep
        });
    }

    /// Discard all accumulated history
    pub fn reset_all(&mut self) {
        self.entries.clear();
        info!("reset accumulated infos");
    }

    /// Accumulated total for `name`, if tracked
    pub fn get(&self, name: &str) -> Option<u64> {
        self.entries.get(name).map(|e| e.cumulative_time)
    }

    /// Full entry for `name`, if tracked
    pub fn entry(&self, name: &str) -> Option<&AccumulatorEntry> {
        self.entries.get(name)
    }

    /// Number of tracked names
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate over tracked names and their entries
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AccumulatorEntry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }
}
