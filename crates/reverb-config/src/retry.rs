use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Retry policy applied by the orchestrator to failed invocations.
///
/// An execution whose invocation fails is retried `max_retries` times. The
/// wait before retry `n` (1-based) is `initial_backoff_ms * multiplier^(n-1)`,
/// capped at `max_backoff_ms`. Once retries are exhausted the execution is
/// written to the dead-letter store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
  pub max_retries: u32,
  pub initial_backoff_ms: u64,
  pub max_backoff_ms: u64,
  pub multiplier: f64,
}

impl RetryConfig {
  /// A policy that never retries.
  pub fn none() -> Self {
    Self {
      max_retries: 0,
      ..Self::default()
    }
  }

  /// Backoff before the given retry attempt (1-based).
  pub fn backoff(&self, attempt: u32) -> Duration {
    let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
    let millis = self.initial_backoff_ms as f64 * self.multiplier.powi(exponent);
    let capped = millis.min(self.max_backoff_ms as f64).max(0.0);
    Duration::from_millis(capped as u64)
  }
}

impl Default for RetryConfig {
  fn default() -> Self {
    Self {
      max_retries: 3,
      initial_backoff_ms: 1_000,
      max_backoff_ms: 60_000,
      multiplier: 2.0,
    }
  }
}
