//! Status - point-in-time view of the worker.

use serde::{Deserialize, Serialize};

use crate::domain::RunSummary;

/// Snapshot returned by the status query.
///
/// Counts are `None` when the queue store could not be read; `error` then
/// carries the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStatus {
    pub is_running: bool,
    pub pending_count: Option<usize>,
    pub interval_ms: u64,
    pub scheduler_active: bool,
    pub dead_count: Option<usize>,
    pub last_run: Option<RunSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
