//! Worker configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::app::RetryPolicy;
use crate::domain::{ValidationError, to_base_units};

/// Rust's `Decimal` carries at most 28 fractional digits.
const MAX_DECIMALS: u32 = 28;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("{field} may not exceed {max}, got {value}", max = MAX_DECIMALS)]
    TooManyDecimals { field: &'static str, value: u32 },

    #[error("invalid incentive amount: {0}")]
    Incentive(#[source] ValidationError),
}

/// Tunables of the fulfillment worker.
///
/// Defaults: a run every 10s, three attempts
/// per transfer 5s apart, 2s between requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub interval_ms: u64,
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    pub inter_request_delay_ms: u64,
    /// Decimal precision of the transferred asset.
    pub token_decimals: u32,
    /// Decimal precision of the ledger's native currency.
    pub native_decimals: u32,
    /// Incentive sent with every request, in native currency.
    pub incentive_amount: String,
    pub fee_buffer_percent: u32,
    /// Fixed gas price in native base units; `None` uses the ledger estimate.
    pub gas_price_override: Option<u128>,
    /// Consecutive failed runs after which a request is marked dead.
    /// `None` retries forever.
    pub dead_after_runs: Option<u32>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            interval_ms: 10_000,
            max_attempts: 3,
            retry_delay_ms: 5_000,
            inter_request_delay_ms: 2_000,
            token_decimals: 2,
            native_decimals: 18,
            incentive_amount: "0.000001".to_string(),
            fee_buffer_percent: 20,
            gas_price_override: None,
            dead_after_runs: None,
        }
    }
}

impl WorkerConfig {
    /// Fail fast on settings the worker cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_ms == 0 {
            return Err(ConfigError::Zero("interval_ms"));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::Zero("max_attempts"));
        }
        if self.dead_after_runs == Some(0) {
            return Err(ConfigError::Zero("dead_after_runs"));
        }
        for (field, value) in [
            ("token_decimals", self.token_decimals),
            ("native_decimals", self.native_decimals),
        ] {
            if value > MAX_DECIMALS {
                return Err(ConfigError::TooManyDecimals { field, value });
            }
        }
        self.incentive_units()?;
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn inter_request_delay(&self) -> Duration {
        Duration::from_millis(self.inter_request_delay_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.retry_delay_ms))
    }

    /// Incentive amount in native base units.
    pub fn incentive_units(&self) -> Result<u128, ConfigError> {
        to_base_units(&self.incentive_amount, self.native_decimals).map_err(ConfigError::Incentive)
    }
}
