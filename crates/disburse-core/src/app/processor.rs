//! RequestProcessor - the two-part transfer for one request.
//!
//! # Flow
//! 1. Validate recipient and amount (no network call, no retry on failure)
//! 2. Primary transfer under RetryPolicy, unless a stored receipt exists
//! 3. Persist the primary receipt
//! 4. Secondary (incentive) transfer under RetryPolicy
//! 5. Mark the request completed
//!
//! Step 3 is what makes a retried request resumable: a later run that sees
//! the stored receipt starts at step 4 and never pays the primary twice.

use std::sync::Arc;

use tracing::{Instrument, debug, info, info_span};

use super::retry::RetryPolicy;
use crate::config::{ConfigError, WorkerConfig};
use crate::domain::{
    Address, FulfillError, Fulfillment, LedgerError, Receipt, RequestId, TransferOperation,
    TransferRequest, to_base_units,
};
use crate::ports::{LedgerClient, QueueStore, Signer};

#[derive(Debug, Clone)]
struct TransferSettings {
    token_decimals: u32,
    incentive_units: u128,
    fee_buffer_percent: u32,
    gas_price_override: Option<u128>,
}

pub struct RequestProcessor {
    queue: Arc<dyn QueueStore>,
    ledger: Arc<dyn LedgerClient>,
    signer: Arc<dyn Signer>,
    retry: RetryPolicy,
    settings: TransferSettings,
}

impl RequestProcessor {
    pub fn new(
        queue: Arc<dyn QueueStore>,
        ledger: Arc<dyn LedgerClient>,
        signer: Arc<dyn Signer>,
        config: &WorkerConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            queue,
            ledger,
            signer,
            retry: config.retry_policy(),
            settings: TransferSettings {
                token_decimals: config.token_decimals,
                incentive_units: config.incentive_units()?,
                fee_buffer_percent: config.fee_buffer_percent,
                gas_price_override: config.gas_price_override,
            },
        })
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Execute both transfers for `request` and mark it completed.
    pub async fn fulfill(&self, request: &TransferRequest) -> Result<Fulfillment, FulfillError> {
        let id = request.id;
        let recipient = Address::parse(&request.recipient)
            .map_err(|source| FulfillError::Validation { id, source })?;
        let units = to_base_units(&request.amount, self.settings.token_decimals)
            .map_err(|source| FulfillError::Validation { id, source })?;

        info!(
            request_id = %id,
            amount = %request.amount,
            recipient = %recipient,
            "fulfilling request"
        );

        let (primary, resumed) = match &request.primary {
            Some(receipt) => {
                info!(
                    request_id = %id,
                    tx_hash = %receipt.tx_hash,
                    "primary transfer already confirmed, resuming at secondary"
                );
                (receipt.clone(), true)
            }
            None => {
                let operation = TransferOperation::Token {
                    recipient: recipient.clone(),
                    units,
                };
                let receipt = self.transfer(id, operation).await?;
                self.queue
                    .record_primary(id, &receipt)
                    .await
                    .map_err(|source| FulfillError::Queue { id, source })?;
                (receipt, false)
            }
        };

        let operation = TransferOperation::Native {
            recipient,
            units: self.settings.incentive_units,
        };
        let secondary = self.transfer(id, operation).await?;

        self.queue
            .mark_completed(id)
            .await
            .map_err(|source| FulfillError::Queue { id, source })?;

        info!(
            request_id = %id,
            primary_tx = %primary.tx_hash,
            secondary_tx = %secondary.tx_hash,
            "request fulfilled"
        );

        Ok(Fulfillment {
            request_id: id,
            primary,
            secondary,
            resumed,
        })
    }

    /// One transfer under the retry policy, waiting for a confirmed receipt.
    async fn transfer(
        &self,
        id: RequestId,
        operation: TransferOperation,
    ) -> Result<Receipt, FulfillError> {
        let kind = operation.kind();
        let span = info_span!("transfer", request_id = %id, %kind);

        self.retry
            .run(|attempt| {
                let operation = operation.clone();
                async move {
                    debug!(attempt, "submitting transfer");
                    self.submit_once(operation).await
                }
            })
            .instrument(span)
            .await
            .map_err(|exhausted| FulfillError::Ledger {
                id,
                kind,
                attempts: exhausted.attempts.attempts_made,
                source: exhausted.error,
            })
    }

    async fn submit_once(&self, operation: TransferOperation) -> Result<Receipt, LedgerError> {
        let estimated = self.ledger.estimate_fee(&operation).await?;
        let mut fee = estimated.padded(self.settings.fee_buffer_percent);
        if let Some(gas_price) = self.settings.gas_price_override {
            fee = fee.with_gas_price(gas_price);
        }
        let signed = self.signer.sign(operation, fee)?;
        let receipt = self.ledger.submit(signed).await?;
        debug!(tx_hash = %receipt.tx_hash, block = receipt.block_number, "transfer confirmed");
        Ok(receipt)
    }
}
