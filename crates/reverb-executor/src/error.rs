//! Step execution errors.

use reverb_function::HandlerFailure;

/// Errors that end an invocation without a step outcome.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExecutionError {
  /// The function declared a step with an empty or repeated id.
  #[error("invalid step declaration '{step_id}' in execution '{execution_id}': {reason}")]
  InvalidStepDeclaration {
    execution_id: String,
    step_id: String,
    reason: String,
  },

  /// The pending step or the function body failed.
  #[error("execution '{execution_id}' failed: {failure}")]
  Failed {
    execution_id: String,
    #[source]
    failure: HandlerFailure,
  },
}

impl ExecutionError {
  pub fn execution_id(&self) -> &str {
    match self {
      Self::InvalidStepDeclaration { execution_id, .. } | Self::Failed { execution_id, .. } => {
        execution_id
      }
    }
  }

  /// The message to report to the caller, or `None` when the failure is
  /// unclassified and must not be reported.
  pub fn reportable_message(&self) -> Option<String> {
    match self {
      Self::InvalidStepDeclaration { step_id, reason, .. } => {
        Some(format!("invalid step declaration '{}': {}", step_id, reason))
      }
      Self::Failed { failure, .. } => failure.message().map(str::to_string),
    }
  }
}
