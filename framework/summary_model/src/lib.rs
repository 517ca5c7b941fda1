use itertools::Itertools;
use serde::{Deserialize, Serialize};
use sha3::Digest;
use std::collections::HashMap;
use std::io::{BufRead, Read, Write};
use std::path::PathBuf;

/// One configured stage, as recorded in the summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageSummary {
    /// Stage duration in milliseconds
    pub duration_ms: u64,
    /// The number of virtual users to reach by the end of the stage
    pub target: usize,
}

/// Pass and fail totals for one named check
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckTotals {
    pub passes: u64,
    pub fails: u64,
}

/// Summary of a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    /// The unique run id
    ///
    /// Chosen by the runner. Unique for each run.
    pub run_id: String,
    /// The name of the scenario that was run
    pub scenario_name: String,
    /// The time the run started
    ///
    /// This is a Unix timestamp in seconds.
    pub started_at: i64,
    /// The executor that drove the virtual users, for example `ramping-vus`
    pub executor: String,
    /// The number of virtual users active before the first stage starts
    pub start_vus: usize,
    /// The stages the run was configured with
    pub stages: Vec<StageSummary>,
    /// Whether response bodies were dropped as soon as they arrived
    pub discard_response_bodies: bool,
    /// The planned run time in seconds, which is the sum of the stage durations
    pub run_duration: u64,
    /// The highest number of virtual users that were active at the same time
    ///
    /// Compare this with the largest stage target to see whether the run reached its plan.
    pub peak_vus: usize,
    /// The number of virtual users that bailed out before they were retired
    pub bailed_vus: usize,
    /// The number of completed iterations across all virtual users
    pub iterations: u64,
    /// Whether the run was stopped early by the operator
    pub aborted: bool,
    /// Totals for each check, by name
    pub checks: HashMap<String, CheckTotals>,
    /// Environment variables set for the run
    ///
    /// This won't capture all environment variables. Just the ones that the runner is aware of or
    /// that are included by the scenario itself.
    pub env: HashMap<String, String>,
    /// The version of Surge that was used for this run
    pub surge_version: String,
}

impl RunSummary {
    /// Create a new run summary with empty results
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        run_id: String,
        scenario_name: String,
        started_at: i64,
        executor: String,
        start_vus: usize,
        stages: Vec<StageSummary>,
        discard_response_bodies: bool,
        surge_version: String,
    ) -> Self {
        let run_duration = stages.iter().map(|s| s.duration_ms).sum::<u64>() / 1000;
        Self {
            run_id,
            scenario_name,
            started_at,
            executor,
            start_vus,
            stages,
            discard_response_bodies,
            run_duration,
            peak_vus: 0,
            bailed_vus: 0,
            iterations: 0,
            aborted: false,
            checks: HashMap::with_capacity(0),
            env: HashMap::with_capacity(0),
            surge_version,
        }
    }

    /// Record the results of the run once it has finished
    pub fn set_results(
        &mut self,
        peak_vus: usize,
        bailed_vus: usize,
        iterations: u64,
        aborted: bool,
    ) {
        self.peak_vus = peak_vus;
        self.bailed_vus = bailed_vus;
        self.iterations = iterations;
        self.aborted = aborted;
    }

    /// Record the totals for a check
    pub fn add_check(&mut self, name: String, passes: u64, fails: u64) {
        self.checks.insert(name, CheckTotals { passes, fails });
    }

    /// Add an environment variable
    pub fn add_env(&mut self, key: String, value: String) {
        self.env.insert(key, value);
    }

    /// Compute a fingerprint for this run summary
    ///
    /// The fingerprint is intended to uniquely identify the configuration used to run the scenario.
    /// It uses the
    ///     - Scenario name
    ///     - Executor and start virtual users
    ///     - Stages, in order
    ///     - Whether response bodies were discarded
    ///     - Selected environment variables
    ///     - Surge version
    ///
    /// Results such as check totals do not contribute. The fingerprint is computed using
    /// [sha3::Sha3_256].
    pub fn fingerprint(&self) -> String {
        let mut hasher = sha3::Sha3_256::new();
        Digest::update(&mut hasher, self.scenario_name.as_bytes());
        Digest::update(&mut hasher, self.executor.as_bytes());
        Digest::update(&mut hasher, self.start_vus.to_le_bytes());
        for stage in &self.stages {
            Digest::update(&mut hasher, stage.duration_ms.to_le_bytes());
            Digest::update(&mut hasher, stage.target.to_le_bytes());
        }
        Digest::update(&mut hasher, [self.discard_response_bodies as u8]);
        self.env
            .iter()
            .sorted_by_key(|(k, _)| k.to_owned())
            .for_each(|(k, v)| {
                Digest::update(&mut hasher, k.as_bytes());
                Digest::update(&mut hasher, v.as_bytes());
            });
        Digest::update(&mut hasher, self.surge_version.as_bytes());

        format!("{:x}", hasher.finalize())
    }
}

/// Append the run summary to a file
///
/// The summary will be serialized to JSON and output as a single line followed by a newline. The
/// recommended file extension is `.jsonl`.
pub fn append_run_summary(run_summary: RunSummary, path: PathBuf) -> anyhow::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)?;
    store_run_summary(run_summary, &mut file)?;
    file.write_all(b"\n")?;
    Ok(())
}

/// Serialize the run summary to a writer
pub fn store_run_summary<W: Write>(run_summary: RunSummary, writer: &mut W) -> anyhow::Result<()> {
    serde_json::to_writer(writer, &run_summary)?;
    Ok(())
}

/// Load a run summary from a reader
pub fn load_run_summary<R: Read>(reader: R) -> anyhow::Result<RunSummary> {
    let reader = std::io::BufReader::new(reader);
    let run_summary: RunSummary = serde_json::from_reader(reader)?;
    Ok(run_summary)
}

/// Load run summaries from a file
///
/// The file should contain one JSON object per line. This is the format produced by
/// [append_run_summary].
pub fn load_summary_runs(path: PathBuf) -> anyhow::Result<Vec<RunSummary>> {
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    let mut runs = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let run: RunSummary = serde_json::from_str(&line)?;
        runs.push(run);
    }
    Ok(runs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> RunSummary {
        RunSummary::new(
            "run-1".to_string(),
            "breaking_point".to_string(),
            1_700_000_000,
            "ramping-vus".to_string(),
            0,
            vec![
                StageSummary {
                    duration_ms: 10_000,
                    target: 500,
                },
                StageSummary {
                    duration_ms: 20_000,
                    target: 1000,
                },
            ],
            true,
            "0.1.0".to_string(),
        )
    }

    #[test]
    fn run_duration_is_sum_of_stages() {
        assert_eq!(30, sample().run_duration);
    }

    #[test]
    fn fingerprint_ignores_results_and_run_id() {
        let a = sample();
        let mut b = sample();
        b.run_id = "run-2".to_string();
        b.set_results(1000, 2, 12345, false);
        b.add_check("status is 200".to_string(), 10, 1);

        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn fingerprint_depends_on_stage_order() {
        let a = sample();
        let mut b = sample();
        b.stages.reverse();

        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn append_and_load_summaries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run_summary.jsonl");

        let mut first = sample();
        first.add_check("status is 200".to_string(), 7, 3);
        first.add_env("TARGET_URL".to_string(), "http://localhost".to_string());
        let mut second = sample();
        second.run_id = "run-2".to_string();

        append_run_summary(first.clone(), path.clone()).unwrap();
        append_run_summary(second.clone(), path.clone()).unwrap();

        let loaded = load_summary_runs(path).unwrap();
        assert_eq!(vec![first, second], loaded);
    }
}
