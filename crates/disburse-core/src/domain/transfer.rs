//! Ledger-facing transfer model: addresses, operations, fees, receipts.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::ValidationError;

/// Which half of a fulfillment a ledger transfer belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferKind {
    /// The asset payment to the recipient.
    Primary,
    /// The small native-currency incentive sent after the primary transfer.
    Secondary,
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => f.write_str("primary"),
            Self::Secondary => f.write_str("secondary"),
        }
    }
}

/// A checked ledger account address: `0x` followed by 40 hex digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let raw = raw.trim();
        let hex = raw
            .strip_prefix("0x")
            .or_else(|| raw.strip_prefix("0X"))
            .ok_or_else(|| ValidationError::InvalidAddress(raw.to_string()))?;
        if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ValidationError::InvalidAddress(raw.to_string()));
        }
        Ok(Self(format!("0x{hex}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison key.
    pub fn key(&self) -> String {
        self.0.to_ascii_lowercase()
    }
}

impl TryFrom<String> for Address {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An unsigned transfer, amounts in ledger base units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "asset", rename_all = "snake_case")]
pub enum TransferOperation {
    /// Asset (token contract) transfer.
    Token { recipient: Address, units: u128 },
    /// Native currency transfer.
    Native { recipient: Address, units: u128 },
}

impl TransferOperation {
    pub fn kind(&self) -> TransferKind {
        match self {
            Self::Token { .. } => TransferKind::Primary,
            Self::Native { .. } => TransferKind::Secondary,
        }
    }

    pub fn recipient(&self) -> &Address {
        match self {
            Self::Token { recipient, .. } | Self::Native { recipient, .. } => recipient,
        }
    }

    pub fn units(&self) -> u128 {
        match self {
            Self::Token { units, .. } | Self::Native { units, .. } => *units,
        }
    }
}

/// Fee parameters for one transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fee {
    pub gas_limit: u64,
    pub gas_price: u128,
}

impl Fee {
    /// Raise the gas limit by `percent` to absorb estimation drift.
    pub fn padded(self, percent: u32) -> Self {
        let limit = u128::from(self.gas_limit) * (100 + u128::from(percent)) / 100;
        Self {
            gas_limit: u64::try_from(limit).unwrap_or(u64::MAX),
            ..self
        }
    }

    pub fn with_gas_price(self, gas_price: u128) -> Self {
        Self { gas_price, ..self }
    }

    /// Upper bound on what the transfer may cost in native base units.
    pub fn max_cost(&self) -> u128 {
        u128::from(self.gas_limit).saturating_mul(self.gas_price)
    }
}

/// A transfer signed by the sending account, ready for broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransfer {
    pub from: Address,
    pub operation: TransferOperation,
    pub fee: Fee,
    pub signature: Vec<u8>,
}

/// Confirmation of a transfer included in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub kind: TransferKind,
    pub tx_hash: String,
    pub block_number: u64,
    pub gas_used: u64,
    pub recipient: String,
    pub units: u128,
}
