//! Property-based tests for reconciliation, accumulation and interval timers
//!
//! Core properties:
//! 1. Every snapshot entry lands in exactly one of matched / deleted / created
//! 2. Deltas use wrapping subtraction, percentages use floor division
//! 3. Accumulated time is the sum of all folds while the name stays seen
//! 4. The table never exceeds its capacity
//! 5. Timers only accumulate on stop

use proptest::prelude::*;
use rtstats::accumulator::AccumulatorTable;
use rtstats::reconcile::{cpu_percent, reconcile};
use rtstats::snapshot::{Snapshot, TaskId, TaskStatus};
use rtstats::timer::IntervalTimer;
use std::collections::HashSet;

/// Distinct task ids with arbitrary counters
fn task_set(max: usize) -> impl Strategy<Value = Vec<(u64, u32)>> {
    prop::collection::hash_map(0u64..64, any::<u32>(), 1..max)
        .prop_map(|m| m.into_iter().collect())
}

fn snapshot(tasks: &[(u64, u32)], total: u32) -> Snapshot {
    Snapshot::new(
        tasks
            .iter()
            .map(|&(id, counter)| TaskStatus::new(TaskId(id), &format!("t{}", id), counter))
            .collect(),
        total,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_identical_sets_fully_matched(
        tasks in task_set(24),
        deltas in prop::collection::vec(any::<u32>(), 24),
        window in 1u32..,
        start_total in any::<u32>(),
    ) {
        let start = snapshot(&tasks, start_total);
        let mut end_tasks: Vec<(u64, u32)> = tasks
            .iter()
            .zip(&deltas)
            .map(|(&(id, c), &d)| (id, c.wrapping_add(d)))
            .collect();
        end_tasks.reverse();
        let end = snapshot(&end_tasks, start_total.wrapping_add(window));

        let r = reconcile(&start, &end).unwrap();
        prop_assert_eq!(r.matched.len(), tasks.len());
        prop_assert!(r.deleted.is_empty());
        prop_assert!(r.created.is_empty());
        prop_assert_eq!(r.window, window);

        for (task, &delta) in r.matched.iter().zip(&deltas) {
            prop_assert_eq!(task.elapsed, delta);
        }
    }

    #[test]
    fn prop_partition_is_exact(
        start_tasks in task_set(32),
        end_tasks in task_set(32),
    ) {
        let start = snapshot(&start_tasks, 0);
        let end = snapshot(&end_tasks, 100);
        let r = reconcile(&start, &end).unwrap();

        let start_ids: HashSet<u64> = start_tasks.iter().map(|t| t.0).collect();
        let end_ids: HashSet<u64> = end_tasks.iter().map(|t| t.0).collect();
        let both = start_ids.intersection(&end_ids).count();

        prop_assert_eq!(r.matched.len(), both);
        prop_assert_eq!(r.deleted.len(), start_ids.len() - both);
        prop_assert_eq!(r.created.len(), end_ids.len() - both);
        prop_assert_eq!(r.matched.len() + r.deleted.len(), start.len());
        prop_assert_eq!(r.matched.len() + r.created.len(), end.len());
    }

    #[test]
    fn prop_cpu_percent_floor(
        elapsed in any::<u32>(),
        window in 1u32..,
        cores in 1u32..8,
    ) {
        let expected = u64::from(elapsed) * 100 / (u64::from(window) * u64::from(cores));
        prop_assert_eq!(u64::from(cpu_percent(elapsed, window, cores)), expected);
    }

    #[test]
    fn prop_cpu_percent_bounded_single_core(window in 1u32.., frac in 0.0f64..=1.0) {
        let elapsed = (f64::from(window) * frac) as u32;
        prop_assert!(cpu_percent(elapsed.min(window), window, 1) <= 100);
    }

    #[test]
    fn prop_fold_sums_while_seen(deltas in prop::collection::vec(any::<u32>(), 1..50)) {
        let mut table = AccumulatorTable::new();
        let mut total = 0u64;
        for &d in &deltas {
            total += u64::from(d);
            prop_assert_eq!(table.fold("IDLE", d).unwrap(), total);
            table.end_round();
        }
        prop_assert_eq!(table.get("IDLE"), Some(total));
    }

    #[test]
    fn prop_table_never_exceeds_capacity(
        capacity in 0usize..8,
        rounds in prop::collection::vec(prop::collection::vec(0u8..16, 0..12), 1..10),
    ) {
        let mut table = AccumulatorTable::with_capacity(capacity);
        for names in &rounds {
            for n in names {
                let _ = table.fold(&format!("task{}", n), 1);
                prop_assert!(table.len() <= capacity);
            }
            table.end_round();
            // Only names folded this round survive
            let folded: HashSet<String> = names.iter().map(|n| format!("task{}", n)).collect();
            for (name, _) in table.iter() {
                prop_assert!(folded.contains(name));
            }
        }
    }

    #[test]
    fn prop_timer_sums_intervals(
        intervals in prop::collection::vec((0i64..1_000_000, 0i64..1_000_000), 1..20),
    ) {
        let mut timer = IntervalTimer::new("prop");
        let mut now = 0i64;
        let mut expected = 0i64;
        for &(gap, run) in &intervals {
            now += gap;
            timer.start_at(now).unwrap();
            prop_assert!(timer.start_at(now + 1).is_err());
            now += run;
            timer.stop_at(now).unwrap();
            prop_assert!(timer.stop_at(now + 1).is_err());
            expected += run;
        }
        prop_assert_eq!(timer.time_us(), expected);
    }
}
