//! Find the load at which a single HTTP target stops answering `200 OK`.
//!
//! Virtual users ramp from 1 to 3000 over two minutes. Each one sends a GET to the target in a
//! tight loop and checks the status of every response. Response bodies are discarded.

use http_surge_runner::prelude::*;

/// The target used when `--target-url` is not given.
pub const TARGET_URL: &str = "http://test-echo-server:8080";

/// The name of the only check this scenario records.
pub const STATUS_CHECK: &str = "status is 200";

/// The load profile: 120s in total, ending on 3000 virtual users.
pub fn stages() -> Vec<Stage> {
    vec![
        Stage::secs(10, 500),
        Stage::secs(20, 1000),
        Stage::secs(20, 1500),
        Stage::secs(20, 2000),
        Stage::secs(20, 2500),
        Stage::secs(30, 3000),
    ]
}

/// One iteration: a single GET and a single status check.
///
/// A request that gets no response fails the check and the iteration still completes.
pub fn agent_behaviour(
    ctx: &mut AgentContext<HttpRunnerContext, HttpAgentContext>,
) -> HookResult {
    let response = http_get(ctx)?;
    check_status(ctx, response.as_ref(), 200);
    Ok(())
}

/// Apply the scenario's defaults and hooks. Command line options still override the defaults.
pub fn configure(
    builder: HttpScenarioDefinitionBuilder<HttpRunnerContext, HttpAgentContext>,
) -> ScenarioDefinitionBuilder<HttpRunnerContext, HttpAgentContext> {
    builder
        .into_std()
        .with_default_stages(stages())
        .with_discard_response_bodies(true)
        .use_setup(configure_http_client)
        .use_agent_behaviour(agent_behaviour)
}
