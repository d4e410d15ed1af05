//! disburse-core
//!
//! Fulfillment of queued value-transfer requests against an external ledger.
//!
//! # Modules
//! - **domain**: requests, transfers, receipts, run reports, errors
//! - **ports**: seams to the outside world (QueueStore, LedgerClient, Signer, Clock, IdGenerator)
//! - **app**: RetryPolicy, RequestProcessor, FulfillmentWorker, Scheduler, status
//! - **impls**: in-memory and file-backed queue stores, simulated ledger
//! - **config**: WorkerConfig and its validation

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;

pub use app::{FulfillmentWorker, RequestProcessor, RetryPolicy, RunOutcome, Scheduler, WorkerStatus};
pub use config::{ConfigError, WorkerConfig};
