mod workflow;

pub use workflow::{filter_records, HistoryStatus, HistoryWorkflow};
