//! Per-round report rendering
//!
//! One report per sampling round: a row for every task that ran during the
//! window, then a row for each task deleted or created during it. Text output
//! is a markdown-style table; JSON and CSV carry the same rows.

use crate::cli::OutputFormat;
use crate::reconcile::Reconciliation;
use serde::Serialize;
use std::fmt;

/// What happened to a task during the window
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RowKind {
    /// Present in both snapshots
    Running {
        /// Ticks consumed during this window
        run_time: u32,
        /// Ticks accumulated across windows (None if the table dropped it)
        accumulated: Option<u64>,
        /// Share of the window, 0-100
        percentage: u32,
    },
    /// Only in the start snapshot
    Deleted,
    /// Only in the end snapshot
    Created,
}

/// A single report line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub task: String,
    #[serde(flatten)]
    pub kind: RowKind,
}

/// Everything observed in one sampling round
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoundReport {
    /// Round sequence number, starting at 1
    pub round: u64,
    /// Global run-time ticks between the two captures
    pub window: u32,
    pub processor_count: u32,
    pub rows: Vec<ReportRow>,
}

impl RoundReport {
    /// Build the report rows from a reconciliation
    ///
    /// `accumulated` holds the table's answer for each matched task, in the
    /// same order as `reconciliation.matched`.
    pub fn from_reconciliation(
        round: u64,
        reconciliation: &Reconciliation,
        accumulated: &[Option<u64>],
        processor_count: u32,
    ) -> Self {
        let running = reconciliation
            .matched
            .iter()
            .zip(accumulated)
            .map(|(task, total)| ReportRow {
                task: task.name.clone(),
                kind: RowKind::Running {
                    run_time: task.elapsed,
                    accumulated: *total,
                    percentage: reconciliation.percentage(task, processor_count),
                },
            });
        let deleted = reconciliation.deleted.iter().map(|name| ReportRow {
            task: name.clone(),
            kind: RowKind::Deleted,
        });
        let created = reconciliation.created.iter().map(|name| ReportRow {
            task: name.clone(),
            kind: RowKind::Created,
        });

        Self {
            round,
            window: reconciliation.window,
            processor_count,
            rows: running.chain(deleted).chain(created).collect(),
        }
    }

    /// Rows for tasks that ran during the window
    pub fn running(&self) -> impl Iterator<Item = &ReportRow> {
        self.rows
            .iter()
            .filter(|row| matches!(row.kind, RowKind::Running { .. }))
    }

    /// Find the first row for `task`
    pub fn row(&self, task: &str) -> Option<&ReportRow> {
        self.rows.iter().find(|row| row.task == task)
    }

    /// Render in the requested output format
    pub fn render(&self, format: OutputFormat) -> String {
        match format {
            OutputFormat::Text => self.to_string(),
            OutputFormat::Json => self.to_json(),
            OutputFormat::Csv => self.to_csv(),
        }
    }

    /// Single-line JSON object
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!("{{\"error\":\"{}\"}}", e))
    }

    /// CSV with a header row
    pub fn to_csv(&self) -> String {
        let mut lines = vec!["round,task,status,run_time,accumulated,percentage".to_string()];
        for row in &self.rows {
            let (status, run_time, accumulated, percentage) = match &row.kind {
                RowKind::Running {
                    run_time,
                    accumulated,
                    percentage,
                } => (
                    "running",
                    run_time.to_string(),
                    accumulated.map(|t| t.to_string()).unwrap_or_default(),
                    percentage.to_string(),
                ),
                RowKind::Deleted => ("deleted", String::new(), String::new(), String::new()),
                RowKind::Created => ("created", String::new(), String::new(), String::new()),
            };
            lines.push(format!(
                "{},{},{},{},{},{}",
                self.round,
                escape_csv_field(&row.task),
                status,
                run_time,
                accumulated,
                percentage
            ));
        }
        lines.join("\n")
    }
}

/// Escape CSV field (handle commas, quotes, newlines)
fn escape_csv_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

impl fmt::Display for RoundReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "| Task | Run Time | Run Time(Accumulated) | Percentage")?;
        write!(f, "| --- | --- | --- | ---")?;
        for row in &self.rows {
            match &row.kind {
                RowKind::Running {
                    run_time,
                    accumulated,
                    percentage,
                } => {
                    let accumulated = accumulated
                        .map(|t| t.to_string())
                        .unwrap_or_else(|| "-".to_string());
                    write!(
                        f,
                        "\n| {} | {} | {} | {}%",
                        row.task, run_time, accumulated, percentage
                    )?;
                }
                RowKind::Deleted => write!(f, "\n| {} | Deleted", row.task)?,
                RowKind::Created => write!(f, "\n| {} | Created", row.task)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::MatchedTask;
    use crate::snapshot::TaskId;

    fn sample() -> RoundReport {
        let reconciliation = Reconciliation {
            matched: vec![
                MatchedTask {
                    id: TaskId(1),
                    name: "IDLE".to_string(),
                    elapsed: 750,
                },
                MatchedTask {
                    id: TaskId(2),
                    name: "spin,0".to_string(),
                    elapsed: 250,
                },
            ],
            deleted: vec!["old".to_string()],
            created: vec!["new".to_string()],
            window: 1000,
        };
        RoundReport::from_reconciliation(3, &reconciliation, &[Some(1500), None], 1)
    }

    #[test]
    fn test_rows_ordered_running_deleted_created() {
        let report = sample();
        assert_eq!(report.rows.len(), 4);
        assert_eq!(report.rows[0].task, "IDLE");
        assert_eq!(report.rows[2].kind, RowKind::Deleted);
        assert_eq!(report.rows[3].kind, RowKind::Created);
        assert_eq!(report.running().count(), 2);
    }

    #[test]
    fn test_percentage_in_rows() {
        let report = sample();
        match &report.row("IDLE").unwrap().kind {
            RowKind::Running { percentage, .. } => assert_eq!(*percentage, 75),
            other => panic!("unexpected row {:?}", other),
        }
    }

    #[test]
    fn test_text_table() {
        let text = sample().to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "| Task | Run Time | Run Time(Accumulated) | Percentage");
        assert_eq!(lines[1], "| --- | --- | --- | ---");
        assert_eq!(lines[2], "| IDLE | 750 | 1500 | 75%");
        assert_eq!(lines[3], "| spin,0 | 250 | - | 25%");
        assert_eq!(lines[4], "| old | Deleted");
        assert_eq!(lines[5], "| new | Created");
    }

    #[test]
    fn test_json_output() {
        let json = sample().render(OutputFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["round"], 3);
        assert_eq!(value["window"], 1000);
        assert_eq!(value["rows"][0]["task"], "IDLE");
        assert_eq!(value["rows"][0]["status"], "running");
        assert_eq!(value["rows"][0]["accumulated"], 1500);
        assert!(value["rows"][1]["accumulated"].is_null());
        assert_eq!(value["rows"][2]["status"], "deleted");
    }

    #[test]
    fn test_csv_output_escapes_names() {
        let csv = sample().render(OutputFormat::Csv);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "round,task,status,run_time,accumulated,percentage");
        assert_eq!(lines[1], "3,IDLE,running,750,1500,75");
        assert_eq!(lines[2], "3,\"spin,0\",running,250,,25");
        assert_eq!(lines[3], "3,old,deleted,,,");
    }
}
