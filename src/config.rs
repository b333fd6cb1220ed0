//! Per-engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::executor::RetryPolicy;

/// Tunables for one [`crate::runtime::engine::OptimisticEngine`].
///
/// Every field is optional when deserializing; missing fields take the
/// [`Default`] values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Constant delay between attempts in milliseconds.
    pub retry_delay_ms: u64,
    /// Report confirmed operations to the status reporter.
    pub show_success_notification: bool,
    /// Report rolled-back operations and emergency refreshes.
    pub show_error_notification: bool,
    /// Hand the server-confirmed value to the view on success.
    pub reconcile_on_success: bool,
    /// Buffer size of the engine event channel.
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 15_000,
            max_retries: 2,
            retry_delay_ms: 1_000,
            show_success_notification: true,
            show_error_notification: true,
            reconcile_on_success: false,
            event_capacity: 256,
        }
    }
}

impl EngineConfig {
    /// Parses a JSON object, filling absent fields with defaults.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Executor settings derived from this config.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_millis(self.timeout_ms),
            max_retries: self.max_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}
