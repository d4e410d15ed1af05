//! QueueStore port - the durable external queue of transfer requests.

use async_trait::async_trait;

use crate::domain::{QueueError, Receipt, RequestId, TransferRequest};

/// Durable, ordered store of transfer requests.
///
/// # Contract
/// - `list_pending` returns every entry that is neither completed nor dead,
///   in insertion order; an empty queue is `Ok(vec![])`, not an error.
/// - An id returned by `append` is visible to the next `list_pending`.
/// - `mark_completed` is idempotent.
/// - `record_primary` persists the primary receipt so a later run can skip
///   the primary transfer.
/// - Any error is a run-level failure for the worker.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Verify the store is reachable and initialised.
    async fn check(&self) -> Result<(), QueueError> {
        Ok(())
    }

    async fn list_pending(&self) -> Result<Vec<TransferRequest>, QueueError>;

    async fn append(&self, amount: &str, recipient: &str) -> Result<RequestId, QueueError>;

    async fn mark_completed(&self, id: RequestId) -> Result<(), QueueError>;

    async fn record_primary(&self, id: RequestId, receipt: &Receipt) -> Result<(), QueueError>;

    /// Record a failed fulfillment; returns the number of consecutive failures.
    async fn record_failure(&self, id: RequestId, error: &str) -> Result<u32, QueueError>;

    /// Move a request to the terminal dead state.
    async fn mark_dead(&self, id: RequestId, reason: &str) -> Result<(), QueueError>;

    async fn dead_count(&self) -> Result<usize, QueueError>;
}
