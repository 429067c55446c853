//! Step executor implementation.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use reverb_function::{FunctionDescriptor, HandlerFailure, Step, StepError, StepOutcome};
use serde_json::Value;
use tracing::{debug, error, info, instrument};

use crate::error::ExecutionError;
use crate::state::ExecutionState;

/// Advances executions by exactly one step per call.
#[derive(Debug, Clone, Default)]
pub struct StepExecutor;

impl StepExecutor {
  pub fn new() -> Self {
    Self
  }

  /// Replay the function body over the cached steps and classify the first
  /// uncached step.
  ///
  /// The state is not modified. A panic inside the handler is reported as a
  /// failure: recognized when the panic carries a message, unclassified
  /// otherwise.
  #[instrument(
    name = "step_advance",
    skip(self, function, state),
    fields(
      execution_id = %state.execution_id,
      function = %state.function,
      cached_steps = state.cache.len(),
    )
  )]
  pub fn advance(
    &self,
    function: &FunctionDescriptor,
    state: &ExecutionState,
  ) -> Result<StepOutcome, ExecutionError> {
    let mut step = Step::new(&state.cache);
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
      function.handler().call(&state.event, &mut step)
    }));
    let invalid = step.invalid_declaration().cloned();
    let pending = step.into_pending();

    let outcome = classify(&state.execution_id, result, pending, invalid);

    match &outcome {
      Ok(StepOutcome::Done { .. }) => info!("execution_done"),
      Ok(outcome) => debug!(step_id = outcome.step_id().unwrap_or_default(), "step_emitted"),
      Err(e) => error!(error = %e, "execution_failed"),
    }

    outcome
  }
}

fn classify(
  execution_id: &str,
  result: std::thread::Result<Result<Value, StepError>>,
  pending: Option<StepOutcome>,
  invalid: Option<StepError>,
) -> Result<StepOutcome, ExecutionError> {
  // Checked first: the handler may have discarded the declaration error.
  if let Some(StepError::InvalidDeclaration { step_id, reason }) = invalid {
    return Err(ExecutionError::InvalidStepDeclaration {
      execution_id: execution_id.to_string(),
      step_id,
      reason,
    });
  }

  match (result, pending) {
    (Ok(Err(StepError::InvalidDeclaration { step_id, reason })), _) => {
      Err(ExecutionError::InvalidStepDeclaration {
        execution_id: execution_id.to_string(),
        step_id,
        reason,
      })
    }
    // A step ran during this invocation; its outcome must be reported even if
    // the body failed afterwards.
    (_, Some(outcome)) => Ok(outcome),
    (Ok(Ok(value)), None) => Ok(StepOutcome::Done { value }),
    (Ok(Err(StepError::Failed(failure))), None) => Err(ExecutionError::Failed {
      execution_id: execution_id.to_string(),
      failure,
    }),
    (Ok(Err(StepError::Suspended)), None) => Err(ExecutionError::Failed {
      execution_id: execution_id.to_string(),
      failure: HandlerFailure::recognized("handler suspended without a pending step"),
    }),
    (Err(payload), None) => Err(ExecutionError::Failed {
      execution_id: execution_id.to_string(),
      failure: classify_panic(payload),
    }),
  }
}

fn classify_panic(payload: Box<dyn Any + Send>) -> HandlerFailure {
  if let Some(message) = payload.downcast_ref::<&str>() {
    HandlerFailure::recognized(*message)
  } else if let Some(message) = payload.downcast_ref::<String>() {
    HandlerFailure::recognized(message.clone())
  } else {
    HandlerFailure::Unclassified
  }
}
