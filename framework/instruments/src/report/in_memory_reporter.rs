mod checks_table;
mod operations_table;
mod statuses_table;

use std::collections::BTreeMap;
use std::time::Duration;

use tabled::settings::Style;
use tabled::Table;

use crate::check::{CheckRecord, CheckSummary};
use crate::operation::OperationRecord;
use checks_table::CheckRow;
use operations_table::OperationRow;
use statuses_table::StatusRow;

/// Records carrying this attribute are tallied by its value, see [OperationStats::status_counts].
pub const STATUS_ATTR: &str = "status";

/// Running totals for one operation id.
///
/// Timings are only kept for successful operations, so that fast failures such as refused
/// connections do not drag the latency figures down.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationStats {
    pub operation_id: String,
    pub total_operations: usize,
    pub error_count: usize,
    pub total_duration: Duration,
    /// How many operations reported each value of the [STATUS_ATTR] attribute.
    pub status_counts: BTreeMap<String, usize>,
    successful_durations_micros: Vec<u64>,
}

impl OperationStats {
    fn new(operation_id: String) -> Self {
        Self {
            operation_id,
            ..Default::default()
        }
    }

    fn add(&mut self, record: &OperationRecord) {
        let elapsed = record.duration().unwrap_or_default();

        self.total_operations += 1;
        self.total_duration += elapsed;
        if record.is_error {
            self.error_count += 1;
        } else {
            self.successful_durations_micros
                .push(elapsed.as_micros() as u64);
        }
        if let Some(status) = record.attr.get(STATUS_ATTR) {
            *self.status_counts.entry(status.clone()).or_default() += 1;
        }
    }

    pub fn avg_time(&self) -> Option<Duration> {
        if self.total_operations == 0 {
            return None;
        }

        let avg_nanos = self.total_duration.as_nanos() / self.total_operations as u128;
        Some(Duration::from_nanos(avg_nanos as u64))
    }

    /// Operations completed per second over `run_time`.
    pub fn rate_per_sec(&self, run_time: Duration) -> Option<f64> {
        if run_time.is_zero() {
            return None;
        }

        Some(self.total_operations as f64 / run_time.as_secs_f64())
    }

    pub fn min_time(&self) -> Option<Duration> {
        self.successful_durations_micros
            .iter()
            .min()
            .map(|m| Duration::from_micros(*m))
    }

    pub fn max_time(&self) -> Option<Duration> {
        self.successful_durations_micros
            .iter()
            .max()
            .map(|m| Duration::from_micros(*m))
    }

    /// Nearest-rank percentile over successful operations, `p` in `(0, 100]`.
    pub fn percentile(&self, p: f64) -> Option<Duration> {
        if self.successful_durations_micros.is_empty() {
            return None;
        }

        let mut sorted = self.successful_durations_micros.clone();
        sorted.sort_unstable();

        let rank = ((p / 100.0) * sorted.len() as f64).ceil() as usize;
        let index = rank.clamp(1, sorted.len()) - 1;

        Some(Duration::from_micros(sorted[index]))
    }
}

/// Keeps aggregates of every operation and check in memory and prints them at the end of the run.
#[derive(Debug, Default)]
pub(crate) struct InMemoryReporter {
    operations: BTreeMap<String, OperationStats>,
    checks: BTreeMap<String, CheckSummary>,
}

impl InMemoryReporter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_operation(&mut self, operation_record: &OperationRecord) {
        self.operations
            .entry(operation_record.operation_id.clone())
            .or_insert_with(|| OperationStats::new(operation_record.operation_id.clone()))
            .add(operation_record);
    }

    pub(crate) fn add_check(&mut self, check_record: &CheckRecord) {
        let summary = self
            .checks
            .entry(check_record.name.clone())
            .or_insert_with(|| CheckSummary {
                name: check_record.name.clone(),
                ..Default::default()
            });

        if check_record.passed {
            summary.passes += 1;
        } else {
            summary.fails += 1;
        }
    }

    pub(crate) fn operation_stats(&self) -> Vec<OperationStats> {
        self.operations.values().cloned().collect()
    }

    pub(crate) fn check_summaries(&self) -> Vec<CheckSummary> {
        self.checks.values().cloned().collect()
    }

    pub(crate) fn print_summary_of_operations(&self, run_time: Duration) {
        println!("\nSummary of operations over {:.2}s", run_time.as_secs_f64());
        let rows = self
            .operations
            .values()
            .map(|stats| OperationRow::new(stats, run_time))
            .collect::<Vec<_>>();

        let mut table = Table::new(rows);
        table.with(Style::modern());

        println!("{table}");
    }

    pub(crate) fn print_summary_of_statuses(&self) {
        let rows = self
            .operations
            .values()
            .flat_map(StatusRow::for_operation)
            .collect::<Vec<_>>();
        if rows.is_empty() {
            return;
        }

        println!("\nStatus distribution");
        let mut table = Table::new(rows);
        table.with(Style::modern());

        println!("{table}");
    }

    pub(crate) fn print_summary_of_checks(&self) {
        if self.checks.is_empty() {
            return;
        }

        println!("\nSummary of checks");
        let rows = self.checks.values().map(CheckRow::from).collect::<Vec<_>>();

        let mut table = Table::new(rows);
        table.with(Style::modern());

        println!("{table}");
    }
}
