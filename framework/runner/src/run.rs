use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use surge_instruments::prelude::{CheckSummary, OperationStats, ReportConfig};
use surge_summary_model::{append_run_summary, RunSummary, StageSummary};

use crate::cli::ReporterOpt;
use crate::definition::RunOptions;
use crate::monitor::start_monitor;
use crate::pool::{PoolOutcome, VuHooks, VuPool};
use crate::progress::start_progress;
use crate::{
    context::{RunnerContext, UserValuesConstraint},
    definition::ScenarioDefinitionBuilder,
    executor::Executor,
    shutdown::start_shutdown_listener,
};

/// How often the number of active virtual users is brought back in line with the schedule.
pub const RAMP_TICK: Duration = Duration::from_millis(50);

/// What happened during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub run_id: String,
    /// Iterations completed across all virtual users. Abandoned iterations are not counted.
    pub iterations: u64,
    pub started_vus: usize,
    pub peak_vus: usize,
    pub bailed_vus: usize,
    /// True if the run was stopped before the last stage finished.
    pub aborted: bool,
    pub checks: Vec<CheckSummary>,
    pub operations: Vec<OperationStats>,
}

impl RunReport {
    pub fn check(&self, name: &str) -> Option<&CheckSummary> {
        self.checks.iter().find(|c| c.name == name)
    }

    pub fn operation(&self, operation_id: &str) -> Option<&OperationStats> {
        self.operations.iter().find(|o| o.operation_id == operation_id)
    }
}

/// Returned by [run] when a check failed more often than the configured maximum.
#[derive(derive_more::Error, derive_more::Display, Debug)]
#[display("Check [{check}] failed {failure_percent:.2}% of the time, above the threshold of {threshold_percent:.2}%")]
pub struct ThresholdBreachedError {
    check: String,
    failure_percent: f64,
    threshold_percent: f64,
}

pub fn run<RV: UserValuesConstraint, V: UserValuesConstraint>(
    definition: ScenarioDefinitionBuilder<RV, V>,
) -> anyhow::Result<RunReport> {
    let definition = definition.build()?;

    log::info!("Running scenario: {}", definition.name);

    let options = Arc::new(definition.options.clone());
    let schedule = options.schedule();
    let total_duration = schedule.total_duration();
    log::info!(
        "Using the {} executor with {} stages over {:?}, up to {} virtual users",
        options.executor,
        schedule.stages().len(),
        total_duration,
        schedule.max_vus()
    );

    let runtime = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    let shutdown_handle = start_shutdown_listener(&runtime);
    let executor = Arc::new(Executor::new(runtime, shutdown_handle.clone()));
    let report_config = match definition.reporter {
        ReporterOpt::InMemory => ReportConfig::default().enable_summary(),
        ReporterOpt::Noop => ReportConfig::default(),
    };
    let reporter = Arc::new(report_config.init());
    let run_id = definition
        .run_id
        .clone()
        .unwrap_or_else(|| nanoid::nanoid!());
    let started_at = chrono::Utc::now().timestamp();

    let mut runner_context = RunnerContext::new(
        executor,
        reporter.clone(),
        shutdown_handle.clone(),
        options.clone(),
        definition.connection_string.clone(),
        run_id.clone(),
    );

    if let Some(setup_fn) = &definition.setup_fn {
        setup_fn(&mut runner_context)?;
    }

    let runner_context = Arc::new(runner_context);

    let mut pool = VuPool::new(
        runner_context.clone(),
        VuHooks {
            setup: definition.setup_agent_fn,
            behaviour: definition.agent_behaviour,
            teardown: definition.teardown_agent_fn,
        },
        shutdown_handle.clone(),
    );

    if !definition.no_progress {
        start_progress(
            total_duration,
            pool.active_count(),
            pool.iterations(),
            shutdown_handle.new_listener(),
        );
    }

    // Ready to start spawning virtual users so start the resource monitor to report high usage
    // which might lead to a misleading outcome.
    start_monitor(shutdown_handle.new_listener());

    let mut run_shutdown_listener = shutdown_handle.new_listener();
    let mut aborted = false;
    let mut spawn_error = None;
    let start = Instant::now();
    loop {
        if run_shutdown_listener.should_shutdown() {
            log::info!("Run stopped early after {:?}", start.elapsed());
            aborted = true;
            break;
        }

        let elapsed = start.elapsed();
        if elapsed >= total_duration {
            break;
        }

        if let Err(e) = pool.scale_to(schedule.vus_at(elapsed), options.graceful_ramp_down) {
            spawn_error = Some(e);
            break;
        }

        std::thread::sleep(RAMP_TICK.min(total_duration - elapsed));
    }

    // The last tick lands before the end of the final stage, so its target is applied here.
    if !aborted && spawn_error.is_none() {
        if let Err(e) = pool.scale_to(
            schedule.vus_at(total_duration),
            options.graceful_ramp_down,
        ) {
            spawn_error = Some(e);
        }
    }

    let grace = if aborted || spawn_error.is_some() {
        Duration::ZERO
    } else {
        options.graceful_stop
    };
    log::info!(
        "All stages finished, stopping {} virtual users with a graceful stop of {:?}",
        pool.len(),
        grace
    );
    let outcome = pool.stop_all(grace);

    // Stops the progress bar and the resource monitor.
    shutdown_handle.shutdown();

    if let Some(teardown_fn) = definition.teardown_fn {
        // Don't crash the runner if the teardown fails. We still want the reporting and runner
        // shutdown to happen cleanly. The hook is documented as 'best effort'
        if let Err(e) = teardown_fn(runner_context.clone()) {
            log::error!("Teardown failed: {:?}", e);
        }
    }

    reporter.finalize();

    let report = RunReport {
        run_id,
        iterations: outcome.iterations,
        started_vus: outcome.started_vus,
        peak_vus: outcome.peak_vus,
        bailed_vus: outcome.bailed_vus,
        aborted,
        checks: reporter.check_summaries(),
        operations: reporter.operation_stats(),
    };
    log::info!(
        "Completed {} iterations with a peak of {} virtual users",
        report.iterations,
        report.peak_vus
    );
    if outcome.failed_setups > 0 {
        log::warn!("{} virtual users failed their setup", outcome.failed_setups);
    }

    if let Some(summary_path) = &definition.summary_path {
        if let Err(e) = write_run_summary(
            summary_path.clone(),
            &definition.name,
            started_at,
            &options,
            &outcome,
            &report,
            &definition.capture_env,
        ) {
            log::error!("Failed to write run summary: {:?}", e);
        }
    }

    if let Some(e) = spawn_error {
        return Err(e);
    }

    if let Some(max_rate) = options.max_check_failure_rate {
        check_thresholds(&report.checks, max_rate)?;
    }

    Ok(report)
}

fn check_thresholds(checks: &[CheckSummary], max_rate: f64) -> anyhow::Result<()> {
    if let Some(breached) = checks.iter().find(|c| c.failure_rate() > max_rate) {
        return Err(ThresholdBreachedError {
            check: breached.name.clone(),
            failure_percent: breached.failure_rate() * 100.0,
            threshold_percent: max_rate * 100.0,
        }
        .into());
    }

    Ok(())
}

fn write_run_summary(
    path: PathBuf,
    scenario_name: &str,
    started_at: i64,
    options: &RunOptions,
    outcome: &PoolOutcome,
    report: &RunReport,
    capture_env: &HashSet<String>,
) -> anyhow::Result<()> {
    let mut summary = RunSummary::new(
        report.run_id.clone(),
        scenario_name.to_string(),
        started_at,
        options.executor.to_string(),
        options.start_vus,
        options
            .stages
            .iter()
            .map(|s| StageSummary {
                duration_ms: s.duration.as_millis() as u64,
                target: s.target,
            })
            .collect(),
        options.discard_response_bodies,
        env!("CARGO_PKG_VERSION").to_string(),
    );
    summary.set_results(
        outcome.peak_vus,
        outcome.bailed_vus,
        outcome.iterations,
        report.aborted,
    );
    for check in &report.checks {
        summary.add_check(check.name.clone(), check.passes, check.fails);
    }
    for key in capture_env {
        if let Ok(value) = std::env::var(key) {
            summary.add_env(key.clone(), value);
        }
    }

    log::debug!("Run summary fingerprint: {}", summary.fingerprint());
    append_run_summary(summary, path.clone())
        .with_context(|| format!("Could not append to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_breach_names_the_check() {
        let checks = vec![
            CheckSummary {
                name: "fine".to_string(),
                passes: 99,
                fails: 1,
            },
            CheckSummary {
                name: "status is 200".to_string(),
                passes: 1,
                fails: 3,
            },
        ];

        assert!(check_thresholds(&checks, 0.5).is_err());
        let err = check_thresholds(&checks, 0.5).unwrap_err();
        assert!(err.is::<ThresholdBreachedError>());
        assert_eq!(
            "Check [status is 200] failed 75.00% of the time, above the threshold of 50.00%",
            err.to_string()
        );

        assert!(check_thresholds(&checks, 0.75).is_ok());
    }
}
