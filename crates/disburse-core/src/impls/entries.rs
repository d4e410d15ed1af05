//! Entry table shared by the queue store adapters.
//!
//! Ids are 1-based positions in insertion order and are never reused.

use serde::{Deserialize, Serialize};

use crate::domain::{QueueError, Receipt, RequestId, TransferRequest};

/// One stored queue row, including bookkeeping the worker never sees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: RequestId,
    pub amount: String,
    pub recipient: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<Receipt>,
    #[serde(default)]
    pub failures: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default)]
    pub dead: bool,
}

impl QueueEntry {
    fn is_pending(&self) -> bool {
        !self.completed && !self.dead
    }

    fn to_request(&self) -> TransferRequest {
        TransferRequest {
            id: self.id,
            amount: self.amount.clone(),
            recipient: self.recipient.clone(),
            completed: self.completed,
            primary: self.primary.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryTable {
    entries: Vec<QueueEntry>,
}

impl EntryTable {
    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }

    pub fn get(&self, id: RequestId) -> Option<&QueueEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    fn get_mut(&mut self, id: RequestId) -> Result<&mut QueueEntry, QueueError> {
        self.entries
            .iter_mut()
            .find(|entry| entry.id == id)
            .ok_or(QueueError::NotFound(id))
    }

    pub fn pending(&self) -> Vec<TransferRequest> {
        self.entries
            .iter()
            .filter(|entry| entry.is_pending())
            .map(QueueEntry::to_request)
            .collect()
    }

    pub fn append(&mut self, amount: &str, recipient: &str) -> RequestId {
        let next = self
            .entries
            .iter()
            .map(|entry| entry.id.get())
            .max()
            .unwrap_or(0)
            + 1;
        let id = RequestId::new(next);
        self.entries.push(QueueEntry {
            id,
            amount: amount.to_string(),
            recipient: recipient.to_string(),
            completed: false,
            primary: None,
            failures: 0,
            last_error: None,
            dead: false,
        });
        id
    }

    pub fn mark_completed(&mut self, id: RequestId) -> Result<(), QueueError> {
        let entry = self.get_mut(id)?;
        entry.completed = true;
        entry.failures = 0;
        entry.last_error = None;
        Ok(())
    }

    pub fn record_primary(&mut self, id: RequestId, receipt: &Receipt) -> Result<(), QueueError> {
        self.get_mut(id)?.primary = Some(receipt.clone());
        Ok(())
    }

    pub fn record_failure(&mut self, id: RequestId, error: &str) -> Result<u32, QueueError> {
        let entry = self.get_mut(id)?;
        entry.failures = entry.failures.saturating_add(1);
        entry.last_error = Some(error.to_string());
        Ok(entry.failures)
    }

    pub fn mark_dead(&mut self, id: RequestId, reason: &str) -> Result<(), QueueError> {
        let entry = self.get_mut(id)?;
        entry.dead = true;
        entry.last_error = Some(reason.to_string());
        Ok(())
    }

    pub fn dead_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.dead).count()
    }
}

impl From<Vec<TransferRequest>> for EntryTable {
    fn from(requests: Vec<TransferRequest>) -> Self {
        let entries = requests
            .into_iter()
            .map(|request| QueueEntry {
                id: request.id,
                amount: request.amount,
                recipient: request.recipient,
                completed: request.completed,
                primary: request.primary,
                failures: 0,
                last_error: None,
                dead: false,
            })
            .collect();
        Self { entries }
    }
}
