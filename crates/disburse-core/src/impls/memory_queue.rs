//! In-memory queue store.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::entries::{EntryTable, QueueEntry};
use crate::domain::{QueueError, Receipt, RequestId, TransferRequest};
use crate::ports::QueueStore;

/// Queue store held in process memory; cloning shares the same table.
#[derive(Debug, Clone, Default)]
pub struct InMemoryQueueStore {
    table: Arc<Mutex<EntryTable>>,
}

impl InMemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store; entries keep the ids and order given.
    pub fn with_requests(requests: Vec<TransferRequest>) -> Self {
        Self {
            table: Arc::new(Mutex::new(EntryTable::from(requests))),
        }
    }

    pub async fn get(&self, id: RequestId) -> Option<QueueEntry> {
        self.table.lock().await.get(id).cloned()
    }

    pub async fn entries(&self) -> Vec<QueueEntry> {
        self.table.lock().await.entries().to_vec()
    }
}

#[async_trait]
impl QueueStore for InMemoryQueueStore {
    async fn list_pending(&self) -> Result<Vec<TransferRequest>, QueueError> {
        Ok(self.table.lock().await.pending())
    }

    async fn append(&self, amount: &str, recipient: &str) -> Result<RequestId, QueueError> {
        Ok(self.table.lock().await.append(amount, recipient))
    }

    async fn mark_completed(&self, id: RequestId) -> Result<(), QueueError> {
        self.table.lock().await.mark_completed(id)
    }

    async fn record_primary(&self, id: RequestId, receipt: &Receipt) -> Result<(), QueueError> {
        self.table.lock().await.record_primary(id, receipt)
    }

    async fn record_failure(&self, id: RequestId, error: &str) -> Result<u32, QueueError> {
        self.table.lock().await.record_failure(id, error)
    }

    async fn mark_dead(&self, id: RequestId, reason: &str) -> Result<(), QueueError> {
        self.table.lock().await.mark_dead(id, reason)
    }

    async fn dead_count(&self) -> Result<usize, QueueError> {
        Ok(self.table.lock().await.dead_count())
    }
}
