/// The outcome of one named assertion, recorded once per evaluation and never changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckRecord {
    pub name: String,
    pub passed: bool,
    pub agent_id: String,
    pub iteration: u64,
}

impl CheckRecord {
    pub fn new(
        name: impl Into<String>,
        passed: bool,
        agent_id: impl Into<String>,
        iteration: u64,
    ) -> Self {
        Self {
            name: name.into(),
            passed,
            agent_id: agent_id.into(),
            iteration,
        }
    }
}

/// Aggregate pass and fail counts for one check name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckSummary {
    pub name: String,
    pub passes: u64,
    pub fails: u64,
}

impl CheckSummary {
    pub fn total(&self) -> u64 {
        self.passes + self.fails
    }

    /// Fraction of evaluations that failed, `0.0` when the check never ran.
    pub fn failure_rate(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.fails as f64 / total as f64,
        }
    }
}
