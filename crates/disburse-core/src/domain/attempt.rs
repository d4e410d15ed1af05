//! Per-operation attempt bookkeeping.

use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Attempts made at one operation within the current run.
///
/// Lives only as long as a single retry loop; nothing carries it across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptState {
    pub attempts_made: u32,
    pub last_error: Option<String>,
}

impl AttemptState {
    /// Count a new attempt; returns its 1-based number.
    pub fn begin(&mut self) -> u32 {
        self.attempts_made += 1;
        self.attempts_made
    }

    pub fn fail(&mut self, error: &impl Display) {
        self.last_error = Some(error.to_string());
    }
}
