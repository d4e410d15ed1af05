//! In-process ledger and development signer.
//!
//! `SimulatedLedger` keeps token and native balances per account, charges
//! fees, assigns block numbers and random transaction hashes. Failures carry
//! the same messages a ledger node would report so they classify the same
//! way.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::{
    Address, Fee, LedgerError, LedgerErrorKind, Receipt, SignedTransfer, TransferOperation,
};
use crate::ports::{LedgerClient, Signer};

const TOKEN_TRANSFER_GAS: u64 = 52_000;
const NATIVE_TRANSFER_GAS: u64 = 21_000;
const DEFAULT_GAS_PRICE: u128 = 1_000_000_000;
const SIGNATURE_LEN: usize = 32;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Balance {
    pub token: u128,
    pub native: u128,
}

#[derive(Debug)]
struct LedgerState {
    balances: HashMap<String, Balance>,
    block_number: u64,
    gas_price: u128,
    scripted_failures: VecDeque<String>,
    submissions: u64,
}

pub struct SimulatedLedger {
    state: Mutex<LedgerState>,
}

impl SimulatedLedger {
    /// Ledger where `sender` holds the given balances.
    pub fn new(sender: &Address, token: u128, native: u128) -> Self {
        let mut balances = HashMap::new();
        balances.insert(sender.key(), Balance { token, native });
        Self {
            state: Mutex::new(LedgerState {
                balances,
                block_number: 1,
                gas_price: DEFAULT_GAS_PRICE,
                scripted_failures: VecDeque::new(),
                submissions: 0,
            }),
        }
    }

    pub async fn set_gas_price(&self, gas_price: u128) {
        self.state.lock().await.gas_price = gas_price;
    }

    /// The next submissions fail with these node messages, in order.
    pub async fn fail_next(&self, messages: impl IntoIterator<Item = impl Into<String>>) {
        let mut state = self.state.lock().await;
        state
            .scripted_failures
            .extend(messages.into_iter().map(Into::into));
    }

    pub async fn balance_of(&self, account: &Address) -> Balance {
        self.state
            .lock()
            .await
            .balances
            .get(&account.key())
            .copied()
            .unwrap_or_default()
    }

    /// Submissions seen so far, including failed ones.
    pub async fn submissions(&self) -> u64 {
        self.state.lock().await.submissions
    }
}

#[async_trait]
impl LedgerClient for SimulatedLedger {
    async fn estimate_fee(&self, operation: &TransferOperation) -> Result<Fee, LedgerError> {
        let gas_limit = match operation {
            TransferOperation::Token { .. } => TOKEN_TRANSFER_GAS,
            TransferOperation::Native { .. } => NATIVE_TRANSFER_GAS,
        };
        Ok(Fee {
            gas_limit,
            gas_price: self.state.lock().await.gas_price,
        })
    }

    async fn submit(&self, transfer: SignedTransfer) -> Result<Receipt, LedgerError> {
        let mut state = self.state.lock().await;
        state.submissions += 1;

        if let Some(message) = state.scripted_failures.pop_front() {
            return Err(LedgerError::from_message(message));
        }
        if transfer.signature.len() != SIGNATURE_LEN {
            return Err(LedgerError::new(
                LedgerErrorKind::Rejected,
                "transaction rejected: invalid signature",
            ));
        }
        if transfer.fee.gas_price < state.gas_price {
            return Err(LedgerError::from_message("transaction gas price too low"));
        }

        let gas_used = match transfer.operation {
            TransferOperation::Token { .. } => TOKEN_TRANSFER_GAS,
            TransferOperation::Native { .. } => NATIVE_TRANSFER_GAS,
        };
        if transfer.fee.gas_limit < gas_used {
            return Err(LedgerError::from_message("execution reverted: out of gas"));
        }

        let sender = state
            .balances
            .get(&transfer.from.key())
            .copied()
            .unwrap_or_default();
        let native_value = match transfer.operation {
            TransferOperation::Native { units, .. } => units,
            TransferOperation::Token { .. } => 0,
        };
        let max_cost = transfer.fee.max_cost().saturating_add(native_value);
        if sender.native < max_cost {
            return Err(LedgerError::from_message(
                "insufficient funds for gas * price + value",
            ));
        }
        if let TransferOperation::Token { units, .. } = transfer.operation
            && sender.token < units
        {
            return Err(LedgerError::from_message(
                "ERC20: transfer amount exceeds balance",
            ));
        }

        let charged = u128::from(gas_used) * transfer.fee.gas_price + native_value;
        let recipient = transfer.operation.recipient().clone();
        let units = transfer.operation.units();
        {
            let from = state.balances.entry(transfer.from.key()).or_default();
            from.native -= charged;
            if let TransferOperation::Token { .. } = transfer.operation {
                from.token -= units;
            }
        }
        {
            let to = state.balances.entry(recipient.key()).or_default();
            match transfer.operation {
                TransferOperation::Token { .. } => to.token += units,
                TransferOperation::Native { .. } => to.native += units,
            }
        }

        state.block_number += 1;
        let receipt = Receipt {
            kind: transfer.operation.kind(),
            tx_hash: format!("0x{}", hex::encode(rand::random::<[u8; 32]>())),
            block_number: state.block_number,
            gas_used,
            recipient: recipient.to_string(),
            units,
        };
        debug!(
            tx_hash = %receipt.tx_hash,
            block = receipt.block_number,
            kind = %receipt.kind,
            "simulated transfer included"
        );
        Ok(receipt)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("private key must be 64 hex digits, optionally prefixed with 0x")]
    Malformed,
}

/// Signer for development and tests.
///
/// Signatures are a SHA-256 digest over the key and the transfer payload.
/// They bind a transfer to the key but are not ledger-grade signatures.
pub struct DevSigner {
    address: Address,
    key: [u8; 32],
}

impl std::fmt::Debug for DevSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevSigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl DevSigner {
    pub fn new(address: Address, private_key: &str) -> Result<Self, KeyError> {
        let raw = private_key.trim();
        let raw = raw.strip_prefix("0x").unwrap_or(raw);
        let mut key = [0u8; 32];
        hex::decode_to_slice(raw, &mut key).map_err(|_| KeyError::Malformed)?;
        Ok(Self { address, key })
    }
}

impl Signer for DevSigner {
    fn address(&self) -> &Address {
        &self.address
    }

    fn sign(&self, operation: TransferOperation, fee: Fee) -> Result<SignedTransfer, LedgerError> {
        let payload = serde_json::to_vec(&(&self.address, &operation, &fee))
            .map_err(|err| LedgerError::new(LedgerErrorKind::Other, err.to_string()))?;
        let mut hasher = Sha256::new();
        hasher.update(self.key);
        hasher.update(&payload);
        Ok(SignedTransfer {
            from: self.address.clone(),
            operation,
            fee,
            signature: hasher.finalize().to_vec(),
        })
    }
}
