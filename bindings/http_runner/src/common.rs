use std::time::Duration;

use anyhow::Context;
use http_client_instrumented::{HttpClientInstrumented, HttpResponse, DEFAULT_REQUEST_TIMEOUT};
use serde::{Deserialize, Serialize};
use surge_runner::prelude::{
    AgentContext, HookResult, RunReport, RunnerContext, ScenarioDefinitionBuilder,
    ShutdownSignalError,
};
use url::Url;

use crate::{HttpAgentContext, HttpRunnerContext};

/// Where the requests go, carried from the command line to the setup hook in the connection string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HttpTarget {
    pub target_url: Url,
    pub request_timeout_ms: Option<u64>,
}

impl HttpTarget {
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT)
    }
}

pub(crate) fn to_connection_string(target: &HttpTarget) -> anyhow::Result<String> {
    serde_json::to_string(target).context("Failed to convert HTTP target to connection string")
}

pub(crate) fn from_connection_string(connection_string: &str) -> anyhow::Result<HttpTarget> {
    serde_json::from_str(connection_string)
        .context("Failed to parse HTTP target from connection string")
}

/// Setup hook that creates the shared HTTP client.
///
/// The client honours the run's `discard_response_bodies` option and is shared by every virtual
/// user, so they all draw on the same connection pool.
pub fn configure_http_client(ctx: &mut RunnerContext<HttpRunnerContext>) -> HookResult {
    let target = from_connection_string(ctx.get_connection_string()?)?;
    let discard_response_bodies = ctx.options().discard_response_bodies;

    let client = HttpClientInstrumented::new(
        ctx.reporter(),
        discard_response_bodies,
        target.request_timeout(),
    )?;

    log::info!(
        "Sending requests to {} with a timeout of {:?}{}",
        target.target_url,
        target.request_timeout(),
        if discard_response_bodies {
            ", discarding response bodies"
        } else {
            ""
        }
    );

    let values = ctx.get_mut();
    values.client = Some(client);
    values.target_url = Some(target.target_url);

    Ok(())
}

/// Send a GET to the target and wait for the response.
///
/// A request that gets no response, because of a connection error or timeout, is not an error for
/// the iteration. It has already been reported as a failed operation, so this returns `Ok(None)`
/// and the behaviour can record its checks as failed. The only error returned is the shutdown
/// signal, when the virtual user is retired or the run is stopping.
pub fn http_get(
    ctx: &mut AgentContext<HttpRunnerContext, HttpAgentContext>,
) -> anyhow::Result<Option<HttpResponse>> {
    let client = ctx.runner_context().get().client()?;
    let url = ctx.runner_context().get().target_url()?.clone();

    let result = ctx.execute_in_place(async move { client.get(&url).await });

    match result {
        Ok(response) => {
            ctx.get_mut().last_status = Some(response.status);
            Ok(Some(response))
        }
        Err(e) if e.is::<ShutdownSignalError>() => Err(e),
        Err(e) => {
            log::debug!("No response for virtual user {}: {e:#}", ctx.agent_id());
            ctx.get_mut().last_status = None;
            Ok(None)
        }
    }
}

/// Record a check named `status is <expected>`, passing iff a response arrived with that status.
pub fn check_status(
    ctx: &AgentContext<HttpRunnerContext, HttpAgentContext>,
    response: Option<&HttpResponse>,
    expected: u16,
) -> bool {
    ctx.check(
        &format!("status is {expected}"),
        response.is_some_and(|r| r.status == expected),
    )
}

pub fn run(
    definition: ScenarioDefinitionBuilder<HttpRunnerContext, HttpAgentContext>,
) -> anyhow::Result<RunReport> {
    surge_runner::prelude::run(definition)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_string_carries_the_target() {
        let target = HttpTarget {
            target_url: Url::parse("http://test-echo-server:8080").unwrap(),
            request_timeout_ms: Some(1_500),
        };

        let parsed = from_connection_string(&to_connection_string(&target).unwrap()).unwrap();

        assert_eq!(target, parsed);
        assert_eq!(Duration::from_millis(1_500), parsed.request_timeout());
    }

    #[test]
    fn default_request_timeout() {
        let target = from_connection_string(r#"{"target_url":"http://localhost:8080/"}"#).unwrap();
        assert_eq!(DEFAULT_REQUEST_TIMEOUT, target.request_timeout());
    }

    #[test]
    fn connection_string_that_is_not_a_target() {
        let err = from_connection_string("ws://localhost:8888").unwrap_err();
        assert!(err.to_string().contains("Failed to parse HTTP target"));
    }
}
