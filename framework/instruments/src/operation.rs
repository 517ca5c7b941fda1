use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::report::Reporter;

/// A single timed operation, such as one HTTP request.
#[derive(Debug, Clone)]
pub struct OperationRecord {
    pub operation_id: String,
    started: Instant,
    pub elapsed: Option<Duration>,
    pub is_error: bool,
    pub attr: HashMap<String, String>,
}

impl OperationRecord {
    pub fn new(operation_id: impl Into<String>) -> Self {
        Self {
            operation_id: operation_id.into(),
            started: Instant::now(),
            elapsed: None,
            is_error: false,
            attr: HashMap::new(),
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.attr.insert(key.into(), value.to_string());
        self
    }

    /// How long the operation took, once it has been reported.
    pub fn duration(&self) -> Option<Duration> {
        self.elapsed
    }

    pub(crate) fn finish(&mut self, is_error: bool) {
        self.elapsed = Some(self.started.elapsed());
        self.is_error = is_error;
    }
}

/// Stop the clock on `record`, mark it as failed if `response` is an error, and hand it to the
/// reporter.
pub fn report_operation<T, E>(
    reporter: &Reporter,
    mut record: OperationRecord,
    response: &Result<T, E>,
) {
    record.finish(response.is_err());
    reporter.add_operation(record);
}
