mod in_memory_reporter;

use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::check::{CheckRecord, CheckSummary};
use crate::operation::OperationRecord;
use in_memory_reporter::InMemoryReporter;

pub use in_memory_reporter::{OperationStats, STATUS_ATTR};

/// Choose how the run is reported before any virtual users start.
#[derive(Debug, Default, Clone)]
pub struct ReportConfig {
    summary: bool,
}

impl ReportConfig {
    /// Print tables summarising operations and checks when the run is finalized.
    pub fn enable_summary(mut self) -> Self {
        self.summary = true;
        self
    }

    pub fn init(self) -> Reporter {
        Reporter {
            aggregate: Mutex::new(InMemoryReporter::new()),
            print_summary: self.summary,
            started: Instant::now(),
        }
    }
}

/// The aggregate report for a run.
///
/// Every virtual user writes to the same reporter. Records are folded into per-operation and
/// per-check totals as they arrive, so the order in which virtual users report does not matter.
#[derive(Debug)]
pub struct Reporter {
    aggregate: Mutex<InMemoryReporter>,
    print_summary: bool,
    started: Instant,
}

impl Reporter {
    pub fn add_operation(&self, operation_record: OperationRecord) {
        self.aggregate.lock().add_operation(&operation_record);
    }

    pub fn add_check(&self, check_record: CheckRecord) {
        log::trace!(
            "Check [{}] {} for {} iteration {}",
            check_record.name,
            if check_record.passed { "passed" } else { "failed" },
            check_record.agent_id,
            check_record.iteration
        );
        self.aggregate.lock().add_check(&check_record);
    }

    /// Totals for every operation seen so far, ordered by operation id.
    pub fn operation_stats(&self) -> Vec<OperationStats> {
        self.aggregate.lock().operation_stats()
    }

    /// Totals for every check seen so far, ordered by check name.
    pub fn check_summaries(&self) -> Vec<CheckSummary> {
        self.aggregate.lock().check_summaries()
    }

    /// Time since the reporter was created, which is what operation rates are measured over.
    pub fn run_time(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn finalize(&self) {
        if self.print_summary {
            let aggregate = self.aggregate.lock();
            aggregate.print_summary_of_operations(self.run_time());
            aggregate.print_summary_of_statuses();
            aggregate.print_summary_of_checks();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn checks_from_many_threads_are_all_counted() {
        let reporter = Arc::new(ReportConfig::default().init());

        let handles = (0..8)
            .map(|t| {
                let reporter = reporter.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        reporter.add_check(CheckRecord::new(
                            "status is 200",
                            i % 4 != 0,
                            format!("vu-{t}"),
                            i,
                        ));
                    }
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.join().unwrap();
        }

        let summaries = reporter.check_summaries();
        assert_eq!(1, summaries.len());
        assert_eq!(600, summaries[0].passes);
        assert_eq!(200, summaries[0].fails);
    }

    #[test]
    fn finalize_with_summary_does_not_need_any_records() {
        let reporter = ReportConfig::default().enable_summary().init();
        reporter.finalize();
    }

    #[test]
    fn finalize_prints_statuses_and_rates() {
        let reporter = ReportConfig::default().enable_summary().init();
        let record = OperationRecord::new("http_get").with_attr(STATUS_ATTR, 200);
        crate::operation::report_operation(&reporter, record, &Ok::<(), ()>(()));

        reporter.finalize();

        assert!(reporter.run_time() > Duration::ZERO);
        assert_eq!(
            Some(&1),
            reporter.operation_stats()[0].status_counts.get("200")
        );
    }
}
