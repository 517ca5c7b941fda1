use std::sync::Arc;
use std::time::Duration;
use surge_runner::prelude::{
    run, AgentBailError, AgentContext, HookResult, ReporterOpt, RunnerContext,
    ScenarioDefinitionBuilder, Stage, SurgeScenarioCli, UserValuesConstraint,
};

#[derive(Default, Debug)]
struct RunnerContextValue {}

impl UserValuesConstraint for RunnerContextValue {}

#[derive(Default, Debug)]
struct AgentContextValue {
    value: i32,
}

impl UserValuesConstraint for AgentContextValue {}

fn sample_cli_cfg() -> SurgeScenarioCli {
    SurgeScenarioCli {
        connection_string: Some("test_connection_string".to_string()),
        stage: vec![],
        start_vus: None,
        discard_response_bodies: false,
        graceful_ramp_down: None,
        graceful_stop: None,
        max_check_failure_rate: None,
        no_progress: true,
        reporter: ReporterOpt::Noop,
        run_id: None,
        summary_path: None,
    }
}

fn short_stages() -> Vec<Stage> {
    vec![Stage::new(Duration::from_millis(500), 1)]
}

#[test]
fn propagate_error_in_setup_hook() {
    fn setup(_tx: &mut RunnerContext<RunnerContextValue>) -> HookResult {
        Err(anyhow::anyhow!("Error in setup hook"))
    }

    let scenario = ScenarioDefinitionBuilder::<RunnerContextValue, AgentContextValue>::new(
        "propagate_error_in_setup_hook",
        sample_cli_cfg(),
    )
    .with_default_stages(short_stages())
    .use_setup(setup);

    let result = run(scenario);

    assert!(result.is_err());
    assert_eq!(result.unwrap_err().to_string(), "Error in setup hook");
}

#[test]
fn capture_error_in_agent_setup() {
    fn agent_setup(_ctx: &mut AgentContext<RunnerContextValue, AgentContextValue>) -> HookResult {
        Err(anyhow::anyhow!("Error in agent setup hook"))
    }

    fn agent_behaviour(
        _ctx: &mut AgentContext<RunnerContextValue, AgentContextValue>,
    ) -> HookResult {
        Ok(())
    }

    let scenario = ScenarioDefinitionBuilder::<RunnerContextValue, AgentContextValue>::new(
        "capture_error_in_agent_setup",
        sample_cli_cfg(),
    )
    .with_default_stages(short_stages())
    .with_start_vus(1)
    .use_agent_setup(agent_setup)
    .use_agent_behaviour(agent_behaviour);

    let report = run(scenario).unwrap();

    assert_eq!(0, report.iterations);
}

#[test]
fn capture_error_in_agent_behaviour_and_continue() {
    fn agent_behaviour(
        ctx: &mut AgentContext<RunnerContextValue, AgentContextValue>,
    ) -> HookResult {
        if ctx.get().value < 5 {
            ctx.get_mut().value += 1;
        } else {
            // Save time running this test by shutting down once this has run a few times.
            ctx.runner_context().force_stop_scenario();
        }

        Err(anyhow::anyhow!("Error in agent behaviour hook"))
    }

    let scenario = ScenarioDefinitionBuilder::<RunnerContextValue, AgentContextValue>::new(
        "capture_error_in_agent_behaviour_and_continue",
        sample_cli_cfg(),
    )
    .with_default_stages(vec![Stage::secs(30, 1)])
    .with_start_vus(1)
    .use_agent_behaviour(agent_behaviour);

    let report = run(scenario).unwrap();

    assert!(report.aborted);
    assert!(report.iterations >= 5);
}

#[test]
fn bail_error_stops_only_that_virtual_user() {
    fn agent_behaviour(
        ctx: &mut AgentContext<RunnerContextValue, AgentContextValue>,
    ) -> HookResult {
        if ctx.agent_index() == 0 {
            return Err(AgentBailError::default().into());
        }

        std::thread::sleep(Duration::from_millis(1));
        Ok(())
    }

    let scenario = ScenarioDefinitionBuilder::<RunnerContextValue, AgentContextValue>::new(
        "bail_error_stops_only_that_virtual_user",
        sample_cli_cfg(),
    )
    .with_default_stages(vec![Stage::new(Duration::from_millis(500), 2)])
    .with_start_vus(2)
    .use_agent_behaviour(agent_behaviour);

    let report = run(scenario).unwrap();

    assert_eq!(2, report.started_vus);
    assert_eq!(1, report.bailed_vus);
    assert!(report.iterations > 0);
    assert!(!report.aborted);
}

#[test]
fn capture_error_in_agent_teardown() {
    fn agent_teardown(
        _ctx: &mut AgentContext<RunnerContextValue, AgentContextValue>,
    ) -> HookResult {
        Err(anyhow::anyhow!("Error in agent teardown hook"))
    }

    let scenario = ScenarioDefinitionBuilder::<RunnerContextValue, AgentContextValue>::new(
        "capture_error_in_agent_teardown",
        sample_cli_cfg(),
    )
    .with_default_stages(short_stages())
    .with_start_vus(1)
    .use_agent_teardown(agent_teardown);

    let result = run(scenario);

    assert!(result.is_ok());
}

#[test]
fn capture_error_in_teardown() {
    fn teardown(_ctx: Arc<RunnerContext<RunnerContextValue>>) -> HookResult {
        Err(anyhow::anyhow!("Error in teardown hook"))
    }

    let scenario = ScenarioDefinitionBuilder::<RunnerContextValue, AgentContextValue>::new(
        "capture_error_in_teardown",
        sample_cli_cfg(),
    )
    .with_default_stages(short_stages())
    .use_teardown(teardown);

    let result = run(scenario);

    assert!(result.is_ok());
}

#[test]
fn invalid_stages_fail_before_running() {
    let mut cfg = sample_cli_cfg();
    cfg.stage = vec![Stage::secs(0, 10)];

    let scenario = ScenarioDefinitionBuilder::<RunnerContextValue, AgentContextValue>::new(
        "invalid_stages_fail_before_running",
        cfg,
    );

    let result = run(scenario);

    assert!(result.is_err());
}
