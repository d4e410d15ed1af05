//! Domain model (ids, requests, transfers, runs, errors).

pub mod attempt;
pub mod errors;
pub mod ids;
pub mod request;
pub mod run;
pub mod transfer;

pub use attempt::AttemptState;
pub use errors::{
    EnqueueError, ErrorKind, FulfillError, LedgerError, LedgerErrorKind, QueueError, RunError,
    ValidationError,
};
pub use ids::{RequestId, RunId};
pub use request::{TransferRequest, parse_amount, to_base_units};
pub use run::{FailedRequest, Fulfillment, ProcessingRun, RunReport, RunSummary};
pub use transfer::{Address, Fee, Receipt, SignedTransfer, TransferKind, TransferOperation};
