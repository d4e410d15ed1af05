#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use disburse_core::domain::{
    Address, Fee, LedgerError, QueueError, Receipt, RequestId, SignedTransfer, TransferKind,
    TransferOperation, TransferRequest,
};
use disburse_core::impls::{DevSigner, InMemoryQueueStore};
use disburse_core::ports::{LedgerClient, QueueStore};
use disburse_core::{FulfillmentWorker, WorkerConfig};

pub const SENDER: &str = "0x1111111111111111111111111111111111111111";
pub const KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

/// Distinct, valid recipient address for request `n`.
pub fn wallet(n: u64) -> String {
    format!("0x{n:040x}")
}

pub fn request(id: u64, amount: &str) -> TransferRequest {
    TransferRequest::new(RequestId::new(id), amount, wallet(id))
}

/// Zero delays, default attempt budget.
pub fn fast_config() -> WorkerConfig {
    WorkerConfig {
        retry_delay_ms: 0,
        inter_request_delay_ms: 0,
        ..WorkerConfig::default()
    }
}

pub fn signer() -> Arc<DevSigner> {
    Arc::new(DevSigner::new(Address::parse(SENDER).unwrap(), KEY).unwrap())
}

pub fn worker(
    queue: Arc<dyn QueueStore>,
    ledger: Arc<dyn LedgerClient>,
    config: WorkerConfig,
) -> Arc<FulfillmentWorker> {
    Arc::new(FulfillmentWorker::new(queue, ledger, signer(), config).unwrap())
}

/// Lets a test hold the first ledger submission open.
#[derive(Default)]
pub struct Gate {
    entered: Notify,
    release: Notify,
}

impl Gate {
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

/// Ledger fake that records every submission and fails on request.
#[derive(Default)]
pub struct ScriptedLedger {
    submitted: Mutex<Vec<TransferOperation>>,
    failing: Mutex<HashSet<TransferKind>>,
    failure_message: Mutex<String>,
    gate: Option<Arc<Gate>>,
    gate_used: AtomicBool,
    block: AtomicUsize,
}

impl ScriptedLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The first submission blocks until the gate is released.
    pub fn gated() -> (Arc<Self>, Arc<Gate>) {
        let gate = Arc::new(Gate::default());
        let ledger = Self {
            gate: Some(Arc::clone(&gate)),
            ..Self::default()
        };
        (Arc::new(ledger), gate)
    }

    /// Every submission of `kind` fails with `message` until `heal` is called.
    pub fn fail(&self, kind: TransferKind, message: &str) {
        self.failing.lock().unwrap().insert(kind);
        *self.failure_message.lock().unwrap() = message.to_string();
    }

    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub fn operations(&self) -> Vec<TransferOperation> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn count(&self, kind: TransferKind) -> usize {
        self.operations()
            .iter()
            .filter(|operation| operation.kind() == kind)
            .count()
    }
}

#[async_trait]
impl LedgerClient for ScriptedLedger {
    async fn estimate_fee(&self, _operation: &TransferOperation) -> Result<Fee, LedgerError> {
        Ok(Fee {
            gas_limit: 50_000,
            gas_price: 10,
        })
    }

    async fn submit(&self, transfer: SignedTransfer) -> Result<Receipt, LedgerError> {
        if let Some(gate) = &self.gate
            && !self.gate_used.swap(true, Ordering::SeqCst)
        {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        let operation = transfer.operation;
        self.submitted.lock().unwrap().push(operation.clone());

        if self.failing.lock().unwrap().contains(&operation.kind()) {
            let message = self.failure_message.lock().unwrap().clone();
            return Err(LedgerError::from_message(message));
        }

        let block = self.block.fetch_add(1, Ordering::SeqCst) as u64 + 1;
        Ok(Receipt {
            kind: operation.kind(),
            tx_hash: format!("0x{block:064x}"),
            block_number: block,
            gas_used: transfer.fee.gas_limit,
            recipient: operation.recipient().to_string(),
            units: operation.units(),
        })
    }
}

/// In-memory store with switchable faults.
#[derive(Default)]
pub struct FaultyQueue {
    pub inner: InMemoryQueueStore,
    pub fail_check: AtomicBool,
    pub fail_list: AtomicBool,
    pub fail_complete: AtomicBool,
    pub list_calls: AtomicUsize,
    pub complete_calls: AtomicUsize,
}

impl FaultyQueue {
    pub fn with_requests(requests: Vec<TransferRequest>) -> Arc<Self> {
        Arc::new(Self {
            inner: InMemoryQueueStore::with_requests(requests),
            ..Self::default()
        })
    }

    pub fn set(flag: &AtomicBool, on: bool) {
        flag.store(on, Ordering::SeqCst);
    }

    fn unavailable(flag: &AtomicBool) -> Result<(), QueueError> {
        if flag.load(Ordering::SeqCst) {
            Err(QueueError::Unavailable("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl QueueStore for FaultyQueue {
    async fn check(&self) -> Result<(), QueueError> {
        Self::unavailable(&self.fail_check)
    }

    async fn list_pending(&self) -> Result<Vec<TransferRequest>, QueueError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Self::unavailable(&self.fail_list)?;
        self.inner.list_pending().await
    }

    async fn append(&self, amount: &str, recipient: &str) -> Result<RequestId, QueueError> {
        self.inner.append(amount, recipient).await
    }

    async fn mark_completed(&self, id: RequestId) -> Result<(), QueueError> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        Self::unavailable(&self.fail_complete)?;
        self.inner.mark_completed(id).await
    }

    async fn record_primary(&self, id: RequestId, receipt: &Receipt) -> Result<(), QueueError> {
        self.inner.record_primary(id, receipt).await
    }

    async fn record_failure(&self, id: RequestId, error: &str) -> Result<u32, QueueError> {
        self.inner.record_failure(id, error).await
    }

    async fn mark_dead(&self, id: RequestId, reason: &str) -> Result<(), QueueError> {
        self.inner.mark_dead(id, reason).await
    }

    async fn dead_count(&self) -> Result<usize, QueueError> {
        self.inner.dead_count().await
    }
}
