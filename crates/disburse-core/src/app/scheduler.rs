//! Scheduler - periodic triggering of processing runs.
//!
//! - the first run fires immediately on start
//! - ticks that land while a run is active are dropped, never queued
//! - `shutdown()` stops the ticker and waits for an in-flight run to finish

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use super::status::WorkerStatus;
use super::worker::{FulfillmentWorker, RunOutcome};
use crate::domain::{QueueError, RunError};

/// Handle to a running tick loop.
pub struct Scheduler {
    worker: Arc<FulfillmentWorker>,
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl Scheduler {
    /// Check the queue store, then spawn the tick loop.
    pub async fn start(worker: Arc<FulfillmentWorker>) -> Result<Self, QueueError> {
        worker.check().await?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(tick_loop(Arc::clone(&worker), shutdown_rx));
        info!(
            interval_ms = worker.config().interval_ms,
            "scheduler started"
        );

        Ok(Self {
            worker,
            shutdown_tx,
            join,
        })
    }

    pub fn worker(&self) -> &Arc<FulfillmentWorker> {
        &self.worker
    }

    /// Manual trigger, subject to the same single-flight rule as ticks.
    pub async fn trigger(&self) -> Result<RunOutcome, RunError> {
        self.worker.run_once().await
    }

    pub async fn status(&self) -> WorkerStatus {
        let mut status = self.worker.status().await;
        status.scheduler_active = !self.join.is_finished();
        status
    }

    /// Stop ticking and wait for the loop to exit.
    pub async fn shutdown(self) {
        // receiver may already be gone if the loop panicked
        let _ = self.shutdown_tx.send(true);
        if let Err(err) = self.join.await {
            error!(error = %err, "scheduler task ended abnormally");
        }
        info!("scheduler stopped");
    }
}

async fn tick_loop(worker: Arc<FulfillmentWorker>, mut shutdown_rx: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(worker.config().interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => break,
            _ = ticker.tick() => {}
        }
        if *shutdown_rx.borrow() {
            break;
        }

        if let Err(err) = worker.run_once().await {
            error!(error = %err, "scheduled run aborted");
        }
    }
}
