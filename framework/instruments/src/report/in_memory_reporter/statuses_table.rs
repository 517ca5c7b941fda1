use tabled::Tabled;

use super::OperationStats;

#[derive(Tabled)]
pub struct StatusRow {
    pub operation_id: String,
    pub status: String,
    pub count: usize,
    #[tabled(display = "percent")]
    pub share: f64,
}

impl StatusRow {
    pub fn for_operation(stats: &OperationStats) -> Vec<Self> {
        stats
            .status_counts
            .iter()
            .map(|(status, count)| Self {
                operation_id: stats.operation_id.clone(),
                status: status.clone(),
                count: *count,
                share: *count as f64 / stats.total_operations.max(1) as f64,
            })
            .collect()
    }
}

fn percent(n: &f64) -> String {
    format!("{:.1}%", n * 100.0)
}
