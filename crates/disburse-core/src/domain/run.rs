//! Processing runs and their reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::{ErrorKind, FulfillError};
use super::ids::{RequestId, RunId};
use super::request::TransferRequest;
use super::transfer::Receipt;

/// Both receipts of a fulfilled request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fulfillment {
    pub request_id: RequestId,
    pub primary: Receipt,
    pub secondary: Receipt,
    /// The primary receipt came from an earlier run rather than a new transfer.
    pub resumed: bool,
}

/// A request that could not be fulfilled in this run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedRequest {
    pub request_id: RequestId,
    pub kind: ErrorKind,
    pub error: String,
    /// The request was moved to the dead state after this failure.
    pub dead: bool,
}

/// One execution of the fulfillment loop.
///
/// Holds the snapshot fetched at run start and the running tally.
#[derive(Debug)]
pub struct ProcessingRun {
    id: RunId,
    started_at: DateTime<Utc>,
    requests: Vec<TransferRequest>,
    fulfilled: Vec<Fulfillment>,
    failed: Vec<FailedRequest>,
}

impl ProcessingRun {
    pub fn begin(id: RunId, started_at: DateTime<Utc>, mut requests: Vec<TransferRequest>) -> Self {
        requests.retain(|request| !request.completed);
        Self {
            id,
            started_at,
            requests,
            fulfilled: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn id(&self) -> RunId {
        self.id
    }

    pub fn requests(&self) -> &[TransferRequest] {
        &self.requests
    }

    pub fn record_success(&mut self, fulfillment: Fulfillment) {
        self.fulfilled.push(fulfillment);
    }

    pub fn record_failure(&mut self, error: &FulfillError, dead: bool) {
        self.failed.push(FailedRequest {
            request_id: error.request_id(),
            kind: error.error_kind(),
            error: error.to_string(),
            dead,
        });
    }

    pub fn finish(self, finished_at: DateTime<Utc>) -> RunReport {
        RunReport {
            run_id: self.id,
            started_at: self.started_at,
            finished_at,
            attempted: self.requests.len(),
            fulfilled: self.fulfilled,
            failed: self.failed,
        }
    }
}

/// Result of a finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub attempted: usize,
    pub fulfilled: Vec<Fulfillment>,
    pub failed: Vec<FailedRequest>,
}

impl RunReport {
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            run_id: self.run_id,
            started_at: self.started_at,
            finished_at: self.finished_at,
            attempted: self.attempted,
            succeeded: self.fulfilled.len(),
            failed: self.failed.len(),
            error: None,
        }
    }
}

/// Compact view of the last run, for status queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Set when the run was aborted by a queue store error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
