use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use surge_runner::prelude::{ReporterOpt, Stage, SurgeScenarioCli};
use surge_runner::{parse_duration, parse_stage};
use url::Url;

use crate::common::{to_connection_string, HttpTarget};

#[derive(Debug, Clone, Parser)]
#[command(about, long_about = None)]
pub struct SurgeHttpScenarioCli {
    /// The URL that every virtual user sends its requests to.
    ///
    /// Defaults to the target chosen by the scenario.
    #[clap(long)]
    pub target_url: Option<Url>,

    /// How long to wait for a response before the request counts as failed.
    ///
    /// Defaults to 60s.
    #[clap(long, value_parser = parse_duration)]
    pub request_timeout: Option<Duration>,

    /// Override the scenario's stages. Specify a stage as `<duration>:<target>`, for example
    /// `--stage 10s:500`. Repeat the flag to give several stages, they run in the order given.
    #[clap(long, value_parser = parse_stage)]
    pub stage: Vec<Stage>,

    /// The number of virtual users to start with, before the first stage begins ramping.
    #[clap(long)]
    pub start_vus: Option<usize>,

    /// Drop response bodies as soon as they arrive. Status codes are still available to checks.
    #[clap(long, default_value = "false")]
    pub discard_response_bodies: bool,

    /// How long a virtual user retired during a ramp down may spend finishing its request.
    #[clap(long, value_parser = parse_duration)]
    pub graceful_ramp_down: Option<Duration>,

    /// How long in-flight requests may run once the last stage is over.
    #[clap(long, value_parser = parse_duration)]
    pub graceful_stop: Option<Duration>,

    /// Fail the run if any check fails more often than this, as a fraction between 0 and 1.
    #[clap(long)]
    pub max_check_failure_rate: Option<f64>,

    /// Do not show a progress bar on the CLI.
    ///
    /// This is recommended for CI/CD environments where the progress bar isn't being looked at by anyone and is just adding noise to the logs.
    #[clap(long, default_value = "false")]
    pub no_progress: bool,

    /// The reporter to use.
    #[arg(long, value_enum, default_value_t = ReporterOpt::InMemory)]
    pub reporter: ReporterOpt,

    /// Set the ID of this run
    ///
    /// If not set, a random ID is used.
    #[arg(long, short)]
    pub run_id: Option<String>,

    /// Append a JSON summary of the run to this file.
    #[arg(long)]
    pub summary_path: Option<PathBuf>,
}

impl SurgeHttpScenarioCli {
    /// Convert into the standard CLI, falling back to `default_target_url` when no target was
    /// given on the command line.
    pub fn into_scenario_cli(self, default_target_url: &str) -> anyhow::Result<SurgeScenarioCli> {
        let target_url = match self.target_url {
            Some(url) => url,
            None => Url::parse(default_target_url)
                .with_context(|| format!("Invalid default target URL [{default_target_url}]"))?,
        };
        let connection_string = to_connection_string(&HttpTarget {
            target_url,
            request_timeout_ms: self.request_timeout.map(|t| t.as_millis() as u64),
        })?;

        Ok(SurgeScenarioCli {
            connection_string: Some(connection_string),
            stage: self.stage,
            start_vus: self.start_vus,
            discard_response_bodies: self.discard_response_bodies,
            graceful_ramp_down: self.graceful_ramp_down,
            graceful_stop: self.graceful_stop,
            max_check_failure_rate: self.max_check_failure_rate,
            no_progress: self.no_progress,
            reporter: self.reporter,
            run_id: self.run_id,
            summary_path: self.summary_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::from_connection_string;

    #[test]
    fn default_target_is_used_when_none_given() {
        let cli = SurgeHttpScenarioCli::try_parse_from(["scenario", "--no-progress"]).unwrap();

        let std_cli = cli.into_scenario_cli("http://test-echo-server:8080").unwrap();

        let target = from_connection_string(std_cli.connection_string.as_deref().unwrap()).unwrap();
        assert_eq!("http://test-echo-server:8080/", target.target_url.as_str());
        assert_eq!(None, target.request_timeout_ms);
        assert!(std_cli.no_progress);
    }

    #[test]
    fn target_and_timeout_from_command_line() {
        let cli = SurgeHttpScenarioCli::try_parse_from([
            "scenario",
            "--target-url",
            "http://localhost:3000/health",
            "--request-timeout",
            "30s",
            "--stage",
            "5s:10",
        ])
        .unwrap();

        let std_cli = cli.into_scenario_cli("http://test-echo-server:8080").unwrap();

        let target = from_connection_string(std_cli.connection_string.as_deref().unwrap()).unwrap();
        assert_eq!("http://localhost:3000/health", target.target_url.as_str());
        assert_eq!(Some(30_000), target.request_timeout_ms);
        assert_eq!(vec![Stage::secs(5, 10)], std_cli.stage);
    }

    #[test]
    fn invalid_target_is_rejected() {
        let result =
            SurgeHttpScenarioCli::try_parse_from(["scenario", "--target-url", "not a url"]);
        assert!(result.is_err());
    }
}
