//! FulfillmentWorker - single-flight processing runs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{Instrument, error, info, info_span, warn};

use super::processor::RequestProcessor;
use super::status::WorkerStatus;
use crate::config::{ConfigError, WorkerConfig};
use crate::domain::{
    Address, EnqueueError, FulfillError, ProcessingRun, QueueError, RequestId, RunError, RunId,
    RunReport, RunSummary, TransferRequest, to_base_units,
};
use crate::ports::{
    Clock, IdGenerator, LedgerClient, QueueStore, Signer, SystemClock, UlidGenerator,
};

/// What a trigger did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Another run was active; the trigger was dropped.
    Skipped,
    Completed(RunReport),
}

/// Single-flight token. Holding it means a run is active; dropping it
/// releases the worker on every exit path, including `?` and panics.
struct RunGuard<'a> {
    running: &'a AtomicBool,
}

impl<'a> RunGuard<'a> {
    fn acquire(running: &'a AtomicBool) -> Option<Self> {
        running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { running })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

pub struct FulfillmentWorker {
    queue: Arc<dyn QueueStore>,
    processor: RequestProcessor,
    config: WorkerConfig,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    running: AtomicBool,
    last_run: Mutex<Option<RunSummary>>,
}

impl FulfillmentWorker {
    pub fn new(
        queue: Arc<dyn QueueStore>,
        ledger: Arc<dyn LedgerClient>,
        signer: Arc<dyn Signer>,
        config: WorkerConfig,
    ) -> Result<Self, ConfigError> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let ids = Arc::new(UlidGenerator::new(Arc::clone(&clock)));
        Self::with_clock(queue, ledger, signer, config, clock, ids)
    }

    pub fn with_clock(
        queue: Arc<dyn QueueStore>,
        ledger: Arc<dyn LedgerClient>,
        signer: Arc<dyn Signer>,
        config: WorkerConfig,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Result<Self, ConfigError> {
        let processor = RequestProcessor::new(Arc::clone(&queue), ledger, signer, &config)?;
        Ok(Self {
            queue,
            processor,
            config,
            clock,
            ids,
            running: AtomicBool::new(false),
            last_run: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Verify the queue store before the first run.
    pub async fn check(&self) -> Result<(), QueueError> {
        self.queue.check().await
    }

    /// Validate and append a new request (producer side).
    pub async fn enqueue(&self, amount: &str, recipient: &str) -> Result<RequestId, EnqueueError> {
        let recipient = Address::parse(recipient)?;
        to_base_units(amount, self.config.token_decimals)?;
        let id = self.queue.append(amount.trim(), recipient.as_str()).await?;
        info!(request_id = %id, amount, recipient = %recipient, "request enqueued");
        Ok(id)
    }

    /// Process every pending request once, unless a run is already active.
    ///
    /// Requests are handled strictly in queue order, one at a time. A request
    /// that exhausts its retries is reported and left pending; a queue store
    /// error aborts the run.
    pub async fn run_once(&self) -> Result<RunOutcome, RunError> {
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            info!("run already in progress, dropping trigger");
            return Ok(RunOutcome::Skipped);
        };

        let run_id = self.ids.generate_run_id();
        let started_at = self.clock.now();
        let result = self
            .execute(run_id)
            .instrument(info_span!("run", run_id = %run_id))
            .await;

        let summary = match &result {
            Ok(report) => report.summary(),
            Err(err) => RunSummary {
                run_id,
                started_at,
                finished_at: self.clock.now(),
                attempted: 0,
                succeeded: 0,
                failed: 0,
                error: Some(err.to_string()),
            },
        };
        if let Ok(mut last_run) = self.last_run.lock() {
            *last_run = Some(summary);
        }

        result.map(RunOutcome::Completed)
    }

    async fn execute(&self, run_id: RunId) -> Result<RunReport, RunError> {
        let pending = self.queue.list_pending().await.inspect_err(|err| {
            error!(error = %err, "failed to list pending requests");
        })?;
        let mut run = ProcessingRun::begin(run_id, self.clock.now(), pending);

        if run.requests().is_empty() {
            info!("no pending requests");
            return Ok(run.finish(self.clock.now()));
        }
        info!(pending = run.requests().len(), "processing pending requests");

        let requests: Vec<TransferRequest> = run.requests().to_vec();
        for (index, request) in requests.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.config.inter_request_delay()).await;
            }

            match self.processor.fulfill(request).await {
                Ok(fulfillment) => run.record_success(fulfillment),
                Err(FulfillError::Queue { id, source }) => {
                    error!(request_id = %id, error = %source, "queue store failed, aborting run");
                    return Err(RunError::Request { id, source });
                }
                Err(err) => {
                    error!(
                        request_id = %request.id,
                        kind = ?err.error_kind(),
                        error = %err,
                        "request failed, leaving it pending"
                    );
                    let dead = self.apply_dead_letter(request.id, &err).await?;
                    run.record_failure(&err, dead);
                }
            }
        }

        let report = run.finish(self.clock.now());
        info!(
            attempted = report.attempted,
            succeeded = report.fulfilled.len(),
            failed = report.failed.len(),
            "run finished"
        );
        Ok(report)
    }

    /// Returns whether the request was moved to the dead state.
    async fn apply_dead_letter(&self, id: RequestId, err: &FulfillError) -> Result<bool, RunError> {
        let Some(limit) = self.config.dead_after_runs else {
            return Ok(false);
        };
        let reason = err.to_string();
        let failures = self
            .queue
            .record_failure(id, &reason)
            .await
            .map_err(|source| RunError::Request { id, source })?;
        if failures < limit {
            return Ok(false);
        }
        self.queue
            .mark_dead(id, &reason)
            .await
            .map_err(|source| RunError::Request { id, source })?;
        warn!(request_id = %id, failures, "request marked dead");
        Ok(true)
    }

    /// Snapshot for observability. A failing queue store is reported in the
    /// snapshot rather than as an error.
    pub async fn status(&self) -> WorkerStatus {
        let last_run = self.last_run.lock().ok().and_then(|last| last.clone());
        let mut status = WorkerStatus {
            is_running: self.is_running(),
            pending_count: None,
            interval_ms: self.config.interval_ms,
            scheduler_active: false,
            dead_count: None,
            last_run,
            error: None,
        };
        match self.queue.list_pending().await {
            Ok(pending) => status.pending_count = Some(pending.len()),
            Err(err) => status.error = Some(err.to_string()),
        }
        match self.queue.dead_count().await {
            Ok(count) => status.dead_count = Some(count),
            Err(err) => {
                status.error.get_or_insert_with(|| err.to_string());
            }
        }
        status
    }
}
