use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;

use crate::cli::{ReporterOpt, SurgeScenarioCli};
use crate::context::{AgentContext, RunnerContext, UserValuesConstraint};
use crate::stage::{validate_stages, RampSchedule, Stage};

pub type HookResult = anyhow::Result<()>;

pub type GlobalHookMut<RV> = fn(&mut RunnerContext<RV>) -> HookResult;
pub type GlobalHook<RV> = fn(Arc<RunnerContext<RV>>) -> HookResult;
pub type AgentHookMut<RV, V> = fn(&mut AgentContext<RV, V>) -> HookResult;

/// Virtual users active before the first stage when neither the scenario nor the command line sets
/// a start count.
pub const DEFAULT_START_VUS: usize = 1;

/// Graceful stop used when neither the scenario nor the command line sets one.
pub const DEFAULT_GRACEFUL_STOP: Duration = Duration::from_secs(30);

/// How virtual users are scheduled over the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, derive_more::Display)]
pub enum ExecutorKind {
    /// Ramp the number of looping virtual users through a list of stages.
    #[default]
    #[display("ramping-vus")]
    RampingVus,
}

/// The options a run is configured with. These are fixed before the first virtual user starts.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    pub executor: ExecutorKind,
    pub start_vus: usize,
    pub stages: Vec<Stage>,
    pub discard_response_bodies: bool,
    pub graceful_ramp_down: Duration,
    pub graceful_stop: Duration,
    pub max_check_failure_rate: Option<f64>,
}

impl RunOptions {
    pub fn schedule(&self) -> RampSchedule {
        RampSchedule::new(self.start_vus, self.stages.clone())
    }
}

/// The builder for a scenario definition.
///
/// This must be used at the start of a test to define the scenario that you want to run.
pub struct ScenarioDefinitionBuilder<RV: UserValuesConstraint, V: UserValuesConstraint> {
    /// The name of the scenario, which should be unique within the test suite.
    ///
    /// Recommended value is `env!("CARGO_PKG_NAME")`.
    name: String,
    cli: SurgeScenarioCli,
    /// The stages to run when none are given on the command line.
    default_stages: Vec<Stage>,
    start_vus: usize,
    discard_response_bodies: bool,
    graceful_ramp_down: Duration,
    graceful_stop: Duration,
    max_check_failure_rate: Option<f64>,
    /// Environment variables to record in the run summary, if they are set.
    capture_env: HashSet<String>,
    /// Global setup hook for this scenario. It will be run once, before any virtual users are started.
    setup_fn: Option<GlobalHookMut<RV>>,
    /// Setup hook for a virtual user, which will be run once for each virtual user as it starts.
    setup_agent_fn: Option<AgentHookMut<RV, V>>,
    /// The scenario function. Each virtual user calls this in a loop until it is retired or the
    /// run ends.
    agent_behaviour: Option<AgentHookMut<RV, V>>,
    /// Teardown hook for a virtual user, run once as it stops.
    teardown_agent_fn: Option<AgentHookMut<RV, V>>,
    /// Global teardown hook, run once after every virtual user has stopped. This is best effort,
    /// an error is logged but does not fail the run.
    teardown_fn: Option<GlobalHook<RV>>,
}

pub struct ScenarioDefinition<RV: UserValuesConstraint, V: UserValuesConstraint> {
    pub name: String,
    pub options: RunOptions,
    pub connection_string: Option<String>,
    pub no_progress: bool,
    pub reporter: ReporterOpt,
    pub run_id: Option<String>,
    pub summary_path: Option<PathBuf>,
    pub capture_env: HashSet<String>,
    pub setup_fn: Option<GlobalHookMut<RV>>,
    pub setup_agent_fn: Option<AgentHookMut<RV, V>>,
    pub agent_behaviour: Option<AgentHookMut<RV, V>>,
    pub teardown_agent_fn: Option<AgentHookMut<RV, V>>,
    pub teardown_fn: Option<GlobalHook<RV>>,
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> ScenarioDefinitionBuilder<RV, V> {
    /// Initialise a new scenario definition from the scenario name and already parsed command line
    /// arguments.
    pub fn new(name: &str, cli: SurgeScenarioCli) -> Self {
        Self {
            name: name.to_string(),
            cli,
            default_stages: Vec::new(),
            start_vus: DEFAULT_START_VUS,
            discard_response_bodies: false,
            graceful_ramp_down: Duration::ZERO,
            graceful_stop: DEFAULT_GRACEFUL_STOP,
            max_check_failure_rate: None,
            capture_env: HashSet::with_capacity(0),
            setup_fn: None,
            setup_agent_fn: None,
            agent_behaviour: None,
            teardown_agent_fn: None,
            teardown_fn: None,
        }
    }

    /// Initialise logging, parse the command line and create a new scenario definition.
    pub fn new_with_init(name: &str) -> Self {
        Self::new(name, crate::init::init())
    }

    /// The stages to run when none are given with `--stage`.
    pub fn with_default_stages(mut self, stages: Vec<Stage>) -> Self {
        self.default_stages = stages;
        self
    }

    /// The number of virtual users to start before the first stage. Defaults to
    /// [DEFAULT_START_VUS].
    pub fn with_start_vus(mut self, start_vus: usize) -> Self {
        self.start_vus = start_vus;
        self
    }

    /// Drop response bodies as soon as they arrive. Behaviours can still see status codes.
    pub fn with_discard_response_bodies(mut self, discard: bool) -> Self {
        self.discard_response_bodies = discard;
        self
    }

    /// Time a retired virtual user gets to finish its iteration. Defaults to zero, so in-flight
    /// iterations are abandoned as soon as a virtual user is retired.
    pub fn with_graceful_ramp_down(mut self, graceful_ramp_down: Duration) -> Self {
        self.graceful_ramp_down = graceful_ramp_down;
        self
    }

    /// Time in-flight iterations get to finish after the last stage. Defaults to
    /// [DEFAULT_GRACEFUL_STOP].
    pub fn with_graceful_stop(mut self, graceful_stop: Duration) -> Self {
        self.graceful_stop = graceful_stop;
        self
    }

    /// Fail the run if any check fails more often than `rate`, a fraction between 0 and 1.
    pub fn with_max_check_failure_rate(mut self, rate: f64) -> Self {
        self.max_check_failure_rate = Some(rate);
        self
    }

    /// Record the value of the environment variable `key` in the run summary, when it is set.
    pub fn add_capture_env(mut self, key: &str) -> Self {
        self.capture_env.insert(key.to_string());
        self
    }

    /// Set the global setup hook [ScenarioDefinitionBuilder::setup_fn] for this scenario.
    pub fn use_setup(mut self, setup_fn: GlobalHookMut<RV>) -> Self {
        self.setup_fn = Some(setup_fn);
        self
    }

    /// Set the virtual user setup hook [ScenarioDefinitionBuilder::setup_agent_fn] for this scenario.
    pub fn use_agent_setup(mut self, setup_agent_fn: AgentHookMut<RV, V>) -> Self {
        self.setup_agent_fn = Some(setup_agent_fn);
        self
    }

    /// Set the scenario function [ScenarioDefinitionBuilder::agent_behaviour].
    pub fn use_agent_behaviour(mut self, behaviour: AgentHookMut<RV, V>) -> Self {
        self.agent_behaviour = Some(behaviour);
        self
    }

    /// Set the virtual user teardown hook [ScenarioDefinitionBuilder::teardown_agent_fn].
    pub fn use_agent_teardown(mut self, teardown_agent_fn: AgentHookMut<RV, V>) -> Self {
        self.teardown_agent_fn = Some(teardown_agent_fn);
        self
    }

    /// Set the global teardown hook [ScenarioDefinitionBuilder::teardown_fn].
    pub fn use_teardown(mut self, teardown_fn: GlobalHook<RV>) -> Self {
        self.teardown_fn = Some(teardown_fn);
        self
    }

    /// Resolve command line overrides against the scenario defaults and check the result.
    pub(crate) fn build(self) -> anyhow::Result<ScenarioDefinition<RV, V>> {
        let stages = if self.cli.stage.is_empty() {
            self.default_stages
        } else {
            self.cli.stage
        };
        validate_stages(&stages).context("Invalid stage configuration")?;

        let max_check_failure_rate = self.cli.max_check_failure_rate.or(self.max_check_failure_rate);
        if let Some(rate) = max_check_failure_rate {
            if !(0.0..=1.0).contains(&rate) {
                anyhow::bail!("Max check failure rate must be between 0 and 1, got {rate}");
            }
        }

        let options = RunOptions {
            executor: ExecutorKind::RampingVus,
            start_vus: self.cli.start_vus.unwrap_or(self.start_vus),
            stages,
            discard_response_bodies: self.cli.discard_response_bodies
                || self.discard_response_bodies,
            graceful_ramp_down: self.cli.graceful_ramp_down.unwrap_or(self.graceful_ramp_down),
            graceful_stop: self.cli.graceful_stop.unwrap_or(self.graceful_stop),
            max_check_failure_rate,
        };

        Ok(ScenarioDefinition {
            name: self.name,
            options,
            connection_string: self.cli.connection_string,
            no_progress: self.cli.no_progress,
            reporter: self.cli.reporter,
            run_id: self.cli.run_id,
            summary_path: self
                .cli
                .summary_path
                .or_else(|| std::env::var_os("RUN_SUMMARY_PATH").map(PathBuf::from)),
            capture_env: self.capture_env,
            setup_fn: self.setup_fn,
            setup_agent_fn: self.setup_agent_fn,
            agent_behaviour: self.agent_behaviour,
            teardown_agent_fn: self.teardown_agent_fn,
            teardown_fn: self.teardown_fn,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Debug, Default)]
    struct Values;
    impl UserValuesConstraint for Values {}

    fn cli(args: &[&str]) -> SurgeScenarioCli {
        SurgeScenarioCli::try_parse_from(std::iter::once("scenario").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn defaults_apply_without_overrides() {
        let definition = ScenarioDefinitionBuilder::<Values, Values>::new("test", cli(&[]))
            .with_default_stages(vec![Stage::secs(10, 5)])
            .with_discard_response_bodies(true)
            .build()
            .unwrap();

        assert_eq!(
            RunOptions {
                executor: ExecutorKind::RampingVus,
                start_vus: 1,
                stages: vec![Stage::secs(10, 5)],
                discard_response_bodies: true,
                graceful_ramp_down: Duration::ZERO,
                graceful_stop: DEFAULT_GRACEFUL_STOP,
                max_check_failure_rate: None,
            },
            definition.options
        );
        assert_eq!("ramping-vus", definition.options.executor.to_string());
    }

    #[test]
    fn cli_stages_replace_defaults() {
        let definition = ScenarioDefinitionBuilder::<Values, Values>::new(
            "test",
            cli(&["--stage", "1s:2", "--stage", "2s:0", "--start-vus", "1"]),
        )
        .with_default_stages(vec![Stage::secs(10, 5)])
        .with_start_vus(3)
        .build()
        .unwrap();

        assert_eq!(
            vec![Stage::secs(1, 2), Stage::secs(2, 0)],
            definition.options.stages
        );
        assert_eq!(1, definition.options.start_vus);
    }

    #[test]
    fn missing_stages_are_rejected() {
        let result = ScenarioDefinitionBuilder::<Values, Values>::new("test", cli(&[])).build();

        let err = result.err().unwrap();
        assert_eq!("Invalid stage configuration", err.to_string());
        assert!(err.root_cause().to_string().contains("At least one stage"));
    }

    #[test]
    fn out_of_range_failure_rate_is_rejected() {
        let result = ScenarioDefinitionBuilder::<Values, Values>::new("test", cli(&[]))
            .with_default_stages(vec![Stage::secs(1, 1)])
            .with_max_check_failure_rate(1.5)
            .build();

        assert!(result.is_err());
    }
}
