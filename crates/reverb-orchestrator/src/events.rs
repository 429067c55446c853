//! Progress events published while executions are driven.
//!
//! Events are emitted as the orchestrator drives an execution so consumers
//! can stream progress, mirror state elsewhere, or assert on it in tests.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

/// Events emitted while an execution is driven.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExecutionEvent {
  /// An execution has started.
  ExecutionStarted {
    execution_id: String,
    function: String,
    /// Set for nested executions.
    parent_execution_id: Option<String>,
  },

  /// A step completed and its value was cached.
  StepCompleted {
    execution_id: String,
    step_id: String,
    value: Value,
  },

  /// The execution paused for a delay step.
  StepDelayed {
    execution_id: String,
    step_id: String,
    delay_ms: u64,
  },

  /// The execution is waiting on a nested execution.
  StepInvoked {
    execution_id: String,
    step_id: String,
    function: String,
  },

  /// An invocation failed and will be retried.
  AttemptFailed {
    execution_id: String,
    attempt: u32,
    error: String,
  },

  /// The execution finished.
  ExecutionCompleted { execution_id: String, value: Value },

  /// The execution failed terminally.
  ExecutionFailed { execution_id: String, error: String },

  /// The execution was cancelled and will not be resumed.
  ExecutionCancelled { execution_id: String },
}

/// Receives progress events from the orchestrator.
///
/// The orchestrator calls `notify` for each event; implementations decide
/// what to do with them.
pub trait ExecutionNotifier: Send + Sync {
  fn notify(&self, event: ExecutionEvent);
}

/// A notifier that discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ExecutionNotifier for NoopNotifier {
  fn notify(&self, _event: ExecutionEvent) {}
}

/// Forwards every event to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  sender: mpsc::UnboundedSender<ExecutionEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<ExecutionEvent>) -> Self {
    Self { sender }
  }
}

impl ExecutionNotifier for ChannelNotifier {
  fn notify(&self, event: ExecutionEvent) {
    // The receiver may have been dropped.
    let _ = self.sender.send(event);
  }
}
