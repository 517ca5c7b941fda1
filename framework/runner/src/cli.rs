use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::stage::{parse_duration, parse_stage, Stage};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ReporterOpt {
    /// Keep aggregates in memory and print summary tables at the end of the run.
    #[default]
    InMemory,
    /// Keep aggregates for thresholds and the run summary but print nothing.
    Noop,
}

#[derive(Debug, Clone, Parser)]
#[command(about, long_about = None)]
pub struct SurgeScenarioCli {
    /// A connection string for the service to test
    #[clap(short, long)]
    pub connection_string: Option<String>,

    /// Override the scenario's stages. Specify a stage as `<duration>:<target>`, for example
    /// `--stage 10s:500`. Durations accept `ms`, `s`, `m` and `h` units and can be combined, as
    /// in `1m30s`.
    ///
    /// Repeat the flag to give several stages, they run in the order given. If any stage is given
    /// then all of the scenario's default stages are replaced.
    #[clap(long, value_parser = parse_stage)]
    pub stage: Vec<Stage>,

    /// The number of virtual users to start with, before the first stage begins ramping.
    #[clap(long)]
    pub start_vus: Option<usize>,

    /// Drop response bodies as soon as they arrive instead of keeping them for the behaviour.
    #[clap(long, default_value = "false")]
    pub discard_response_bodies: bool,

    /// How long a virtual user retired during a ramp down may spend finishing its current
    /// iteration before that iteration is abandoned.
    #[clap(long, value_parser = parse_duration)]
    pub graceful_ramp_down: Option<Duration>,

    /// How long in-flight iterations may run once the last stage is over before they are
    /// abandoned.
    #[clap(long, value_parser = parse_duration)]
    pub graceful_stop: Option<Duration>,

    /// Fail the run if any check fails more often than this, as a fraction between 0 and 1.
    ///
    /// For example `0.01` fails the run if more than 1% of evaluations of any check failed.
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
    ///
    /// Falls back to the `RUN_SUMMARY_PATH` environment variable. If neither is set then no
    /// summary file is written.
    #[arg(long)]
    pub summary_path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_stages_and_options() {
        let cli = SurgeScenarioCli::try_parse_from([
            "scenario",
            "--stage",
            "10s:500",
            "--stage",
            "1m:0",
            "--graceful-stop",
            "5s",
            "--max-check-failure-rate",
            "0.05",
            "--reporter",
            "noop",
        ])
        .unwrap();

        assert_eq!(vec![Stage::secs(10, 500), Stage::secs(60, 0)], cli.stage);
        assert_eq!(Some(Duration::from_secs(5)), cli.graceful_stop);
        assert_eq!(Some(0.05), cli.max_check_failure_rate);
        assert_eq!(ReporterOpt::Noop, cli.reporter);
        assert!(!cli.discard_response_bodies);
    }

    #[test]
    fn bad_stage_is_rejected() {
        let result = SurgeScenarioCli::try_parse_from(["scenario", "--stage", "10s"]);
        assert!(result.is_err());
    }
}
