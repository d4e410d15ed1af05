//! Transfer requests as read from the external queue.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::errors::ValidationError;
use super::ids::RequestId;
use super::transfer::Receipt;

/// One entry of the external queue.
///
/// `amount` and `recipient` are kept as the producer wrote them; they are
/// validated when the request is fulfilled, not when it is read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub id: RequestId,
    pub amount: String,
    pub recipient: String,
    pub completed: bool,

    /// Receipt of the primary transfer once it has been confirmed.
    /// A request carrying one resumes at the secondary transfer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<Receipt>,
}

impl TransferRequest {
    pub fn new(id: RequestId, amount: impl Into<String>, recipient: impl Into<String>) -> Self {
        Self {
            id,
            amount: amount.into(),
            recipient: recipient.into(),
            completed: false,
            primary: None,
        }
    }

    pub fn with_primary(mut self, receipt: Receipt) -> Self {
        self.primary = Some(receipt);
        self
    }
}

/// Parse a positive decimal amount.
pub fn parse_amount(raw: &str) -> Result<Decimal, ValidationError> {
    let raw = raw.trim();
    let value =
        Decimal::from_str(raw).map_err(|_| ValidationError::MalformedAmount(raw.to_string()))?;
    if value <= Decimal::ZERO {
        return Err(ValidationError::NonPositiveAmount(raw.to_string()));
    }
    Ok(value.normalize())
}

/// Convert a decimal amount to integer base units at `decimals` precision.
///
/// Amounts with more fractional digits than `decimals` are rejected instead
/// of being truncated.
pub fn to_base_units(raw: &str, decimals: u32) -> Result<u128, ValidationError> {
    let value = parse_amount(raw)?;
    if value.scale() > decimals {
        return Err(ValidationError::ExcessPrecision {
            amount: raw.trim().to_string(),
            decimals,
        });
    }

    let overflow = || ValidationError::AmountOverflow(raw.trim().to_string());
    let mut units = value.mantissa().unsigned_abs();
    for _ in value.scale()..decimals {
        units = units.checked_mul(10).ok_or_else(overflow)?;
    }
    Ok(units)
}
