//! Error types and their operational classification.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::ids::RequestId;
use super::transfer::TransferKind;

/// Operational classification of a failure.
///
/// - Validation: bad input, rejected before any network call, never retried
/// - Transient: ledger hiccup worth another attempt
/// - Permanent: ledger refused for a reason that will not fix itself
/// - Infrastructure: the queue store failed, the run is aborted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Transient,
    Permanent,
    Infrastructure,
}

/// Malformed request data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid recipient address: {0:?}")]
    InvalidAddress(String),

    #[error("malformed amount: {0:?}")]
    MalformedAmount(String),

    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(String),

    #[error("amount {amount} has more than {decimals} fractional digits")]
    ExcessPrecision { amount: String, decimals: u32 },

    #[error("amount {0} does not fit the ledger's integer range")]
    AmountOverflow(String),
}

/// Why the ledger refused or failed a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerErrorKind {
    /// Not enough native currency to pay for fees.
    InsufficientFunds,
    NonceTooLow,
    FeeTooLow,
    InsufficientAllowance,
    InsufficientBalance,
    Network,
    Rejected,
    Other,
}

impl LedgerErrorKind {
    /// Classify a raw failure message reported by a ledger node.
    pub fn classify(message: &str) -> Self {
        let message = message.to_ascii_lowercase();
        if message.contains("insufficient funds") {
            Self::InsufficientFunds
        } else if message.contains("nonce too low") {
            Self::NonceTooLow
        } else if message.contains("gas price too low")
            || message.contains("fee too low")
            || message.contains("underpriced")
        {
            Self::FeeTooLow
        } else if message.contains("exceeds allowance") {
            Self::InsufficientAllowance
        } else if message.contains("exceeds balance") {
            Self::InsufficientBalance
        } else if message.contains("timed out")
            || message.contains("timeout")
            || message.contains("connection")
            || message.contains("network")
        {
            Self::Network
        } else if message.contains("reverted") || message.contains("rejected") {
            Self::Rejected
        } else {
            Self::Other
        }
    }

    pub fn is_transient(self) -> bool {
        matches!(
            self,
            Self::NonceTooLow | Self::FeeTooLow | Self::Network | Self::Other
        )
    }

    pub fn error_kind(self) -> ErrorKind {
        if self.is_transient() {
            ErrorKind::Transient
        } else {
            ErrorKind::Permanent
        }
    }
}

impl fmt::Display for LedgerErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InsufficientFunds => "insufficient native funds for fees",
            Self::NonceTooLow => "nonce too low",
            Self::FeeTooLow => "fee too low",
            Self::InsufficientAllowance => "insufficient token allowance",
            Self::InsufficientBalance => "insufficient token balance",
            Self::Network => "network failure",
            Self::Rejected => "rejected by ledger",
            Self::Other => "ledger failure",
        };
        f.write_str(s)
    }
}

/// A failed ledger call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct LedgerError {
    pub kind: LedgerErrorKind,
    pub message: String,
}

impl LedgerError {
    pub fn new(kind: LedgerErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Build an error from a node message, classifying it on the way.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: LedgerErrorKind::classify(&message),
            message,
        }
    }
}

/// Failure of the external queue store.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue store unavailable: {0}")]
    Unavailable(String),

    #[error("request {0} not found in queue")]
    NotFound(RequestId),

    #[error("queue store io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("queue store data is corrupt: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Failure to fulfill a single request.
#[derive(Debug, Error)]
pub enum FulfillError {
    #[error("request {id} rejected: {source}")]
    Validation {
        id: RequestId,
        #[source]
        source: ValidationError,
    },

    #[error("{kind} transfer for request {id} failed after {attempts} attempt(s): {source}")]
    Ledger {
        id: RequestId,
        kind: TransferKind,
        attempts: u32,
        #[source]
        source: LedgerError,
    },

    #[error("queue store failed while fulfilling request {id}: {source}")]
    Queue {
        id: RequestId,
        #[source]
        source: QueueError,
    },
}

impl FulfillError {
    pub fn request_id(&self) -> RequestId {
        match self {
            Self::Validation { id, .. } | Self::Ledger { id, .. } | Self::Queue { id, .. } => *id,
        }
    }

    pub fn error_kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Ledger { source, .. } => source.kind.error_kind(),
            Self::Queue { .. } => ErrorKind::Infrastructure,
        }
    }
}

/// Failure that aborts a whole processing run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("queue store error: {0}")]
    Queue(#[from] QueueError),

    #[error("queue store error on request {id}: {source}")]
    Request {
        id: RequestId,
        #[source]
        source: QueueError,
    },
}

/// Failure to accept a new request on the producer side.
#[derive(Debug, Error)]
pub enum EnqueueError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}
