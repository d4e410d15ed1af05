//! Ledger ports - fee estimation, broadcast and signing.

use async_trait::async_trait;

use crate::domain::{Address, Fee, LedgerError, Receipt, SignedTransfer, TransferOperation};

/// Remote ledger service.
///
/// `submit` returns only once the transfer is confirmed; a receipt is proof
/// of inclusion. Call timeouts belong to the implementation.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn estimate_fee(&self, operation: &TransferOperation) -> Result<Fee, LedgerError>;

    async fn submit(&self, transfer: SignedTransfer) -> Result<Receipt, LedgerError>;
}

/// Holder of the sending account's key material.
///
/// The core never looks at the key; it only asks for signatures.
pub trait Signer: Send + Sync {
    fn address(&self) -> &Address;

    fn sign(&self, operation: TransferOperation, fee: Fee) -> Result<SignedTransfer, LedgerError>;
}
