use std::time::Duration;

use clap::Parser;
use http_surge_runner::prelude::*;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

type Ctx = AgentContext<HttpRunnerContext, HttpAgentContext>;

/// Start a target on its own runtime, the run creates its own runtime for the virtual users.
fn start_target(status: u16) -> (tokio::runtime::Runtime, MockServer) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let server = rt.block_on(async {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(status).set_body_string("echo"))
            .mount(&server)
            .await;
        server
    });
    (rt, server)
}

fn cli(target_url: &str, extra: &[&str]) -> SurgeHttpScenarioCli {
    let mut args = vec![
        "scenario",
        "--target-url",
        target_url,
        "--no-progress",
        "--reporter",
        "noop",
        "--request-timeout",
        "2s",
    ];
    args.extend_from_slice(extra);
    SurgeHttpScenarioCli::try_parse_from(args).unwrap()
}

fn get_and_check_ok(ctx: &mut Ctx) -> HookResult {
    let response = http_get(ctx)?;
    if let Some(response) = &response {
        assert_eq!(Some(response.status), ctx.get().last_status());
    }
    check_status(ctx, response.as_ref(), 200);
    Ok(())
}

fn scenario(
    cli: SurgeHttpScenarioCli,
) -> ScenarioDefinitionBuilder<HttpRunnerContext, HttpAgentContext> {
    HttpScenarioDefinitionBuilder::new("http_scenario", cli, "http://localhost:1")
        .unwrap()
        .into_std()
        .with_default_stages(vec![Stage::new(Duration::from_millis(400), 2)])
        .use_setup(configure_http_client)
        .use_agent_behaviour(get_and_check_ok)
}

#[test]
fn healthy_target_passes_every_check() {
    let (_rt, server) = start_target(200);

    let report = run(scenario(cli(&server.uri(), &[]))).unwrap();

    let check = report.check("status is 200").unwrap();
    assert!(check.passes > 0);
    assert_eq!(0, check.fails);
    assert!(!report.aborted);
}

#[test]
fn failing_target_fails_every_check() {
    let (_rt, server) = start_target(503);

    let report = run(scenario(cli(&server.uri(), &[]))).unwrap();

    let check = report.check("status is 200").unwrap();
    assert_eq!(0, check.passes);
    assert!(check.fails > 0);
    assert_eq!(1.0, check.failure_rate());
}

#[test]
fn unreachable_target_fails_checks_without_stopping() {
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();

    let report = run(scenario(cli(&format!("http://127.0.0.1:{port}"), &[]))).unwrap();

    let check = report.check("status is 200").unwrap();
    assert_eq!(0, check.passes);
    assert!(check.fails > 0);
    assert_eq!(0, report.bailed_vus);
}

#[test]
fn discarded_bodies_do_not_change_checks() {
    let (_rt, server) = start_target(200);

    let report = run(scenario(cli(&server.uri(), &["--discard-response-bodies"]))).unwrap();

    let check = report.check("status is 200").unwrap();
    assert!(check.passes > 0);
    assert_eq!(0, check.fails);
}

#[test]
fn missing_client_setup_is_an_error_for_the_behaviour() {
    let (_rt, server) = start_target(200);

    let builder = HttpScenarioDefinitionBuilder::<HttpRunnerContext, HttpAgentContext>::new(
        "no_setup",
        cli(&server.uri(), &[]),
        "http://localhost:1",
    )
    .unwrap()
    .into_std()
    .with_default_stages(vec![Stage::new(Duration::from_millis(200), 1)])
    .use_agent_behaviour(get_and_check_ok);

    let report = run(builder).unwrap();

    // Every iteration errors before it gets to the check.
    assert!(report.check("status is 200").is_none());
    assert!(report.iterations > 0);
}
