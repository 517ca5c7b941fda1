use std::time::Duration;

use tabled::Tabled;

use super::OperationStats;

#[derive(Tabled)]
pub struct OperationRow {
    pub operation_id: String,
    #[tabled(display = "float2")]
    pub avg_time_ms: f64,
    #[tabled(display = "float2")]
    pub min_time_ms: f64,
    #[tabled(display = "float2")]
    pub max_time_ms: f64,
    #[tabled(display = "float2")]
    pub p90_time_ms: f64,
    #[tabled(display = "float2")]
    pub p95_time_ms: f64,
    pub total_operations: usize,
    pub errors: usize,
    #[tabled(display = "float2")]
    pub rate_per_s: f64,
}

impl OperationRow {
    pub fn new(stats: &OperationStats, run_time: Duration) -> Self {
        Self {
            operation_id: stats.operation_id.clone(),
            avg_time_ms: as_millis(stats.avg_time()),
            min_time_ms: as_millis(stats.min_time()),
            max_time_ms: as_millis(stats.max_time()),
            p90_time_ms: as_millis(stats.percentile(90.0)),
            p95_time_ms: as_millis(stats.percentile(95.0)),
            total_operations: stats.total_operations,
            errors: stats.error_count,
            rate_per_s: stats.rate_per_sec(run_time).unwrap_or_default(),
        }
    }
}

fn as_millis(duration: Option<Duration>) -> f64 {
    duration.map_or(0.0, |d| d.as_micros() as f64 / 1000.0)
}

fn float2(n: &f64) -> String {
    format!("{:.2}", n)
}
