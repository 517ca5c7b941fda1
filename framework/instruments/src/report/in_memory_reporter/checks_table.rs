use tabled::Tabled;

use crate::check::CheckSummary;

#[derive(Tabled)]
pub struct CheckRow {
    pub check: String,
    pub passes: u64,
    pub fails: u64,
    #[tabled(display = "percent")]
    pub failure_rate: f64,
}

impl From<&CheckSummary> for CheckRow {
    fn from(summary: &CheckSummary) -> Self {
        Self {
            check: summary.name.clone(),
            passes: summary.passes,
            fails: summary.fails,
            failure_rate: summary.failure_rate(),
        }
    }
}

fn percent(n: &f64) -> String {
    format!("{:.2}%", n * 100.0)
}
