mod check;
mod operation;
mod report;

pub mod prelude {
    pub use crate::check::{CheckRecord, CheckSummary};
    pub use crate::operation::{report_operation, OperationRecord};
    pub use crate::report::{OperationStats, ReportConfig, Reporter, STATUS_ATTR};
}
