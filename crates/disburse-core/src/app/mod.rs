//! App - orchestration over the ports.
//!
//! - **RetryPolicy**: bounded attempts with a fixed delay
//! - **RequestProcessor**: primary and secondary transfer for one request
//! - **FulfillmentWorker**: single-flight run over the pending queue
//! - **Scheduler**: periodic and manual triggering

pub mod processor;
pub mod retry;
pub mod scheduler;
pub mod status;
pub mod worker;

pub use self::processor::RequestProcessor;
pub use self::retry::{Exhausted, RetryPolicy};
pub use self::scheduler::Scheduler;
pub use self::status::WorkerStatus;
pub use self::worker::{FulfillmentWorker, RunOutcome};
