//! Drives executions to completion.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::BoxFuture;
use reverb_config::RetryConfig;
use reverb_executor::ExecutionState;
use reverb_function::{Event, StepOutcome};
use reverb_gateway::RpcRequest;
use reverb_store::{DeadLetterRecord, Json, LogLevel, NewLogEntry, Store};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::error::OrchestratorError;
use crate::events::{ExecutionEvent, ExecutionNotifier, NoopNotifier};
use crate::invoker::Invoker;

/// How deep `invoke` steps may nest before the execution is failed.
pub const MAX_NESTING_DEPTH: usize = 32;

/// Result of a completed execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionReport {
  pub execution_id: String,
  pub function: String,
  /// The value the function finished with.
  pub value: Value,
  /// Every outcome applied, ending with `done`.
  pub history: Vec<StepOutcome>,
  /// Number of gateway invocations, retries included.
  pub invocations: u32,
}

/// Where an execution sits: the event that started the chain and its parent.
#[derive(Debug, Clone, Default)]
struct Scope {
  event_id: Option<String>,
  parent_execution_id: Option<String>,
  depth: usize,
}

/// The orchestrator.
///
/// Each call to [`Orchestrator::execute`] owns the state of its execution
/// for its whole lifetime, so resumptions of one execution never overlap.
/// Separate executions may run concurrently on the same orchestrator.
pub struct Orchestrator<N: ExecutionNotifier = NoopNotifier> {
  invoker: Arc<dyn Invoker>,
  store: Arc<dyn Store>,
  retry: RetryConfig,
  notifier: N,
}

impl Orchestrator<NoopNotifier> {
  /// Create an orchestrator with no-op notifications.
  pub fn new(invoker: Arc<dyn Invoker>, store: Arc<dyn Store>, retry: RetryConfig) -> Self {
    Self::with_notifier(invoker, store, retry, NoopNotifier)
  }
}

impl<N: ExecutionNotifier> Orchestrator<N> {
  /// Create an orchestrator with a custom notifier.
  pub fn with_notifier(
    invoker: Arc<dyn Invoker>,
    store: Arc<dyn Store>,
    retry: RetryConfig,
    notifier: N,
  ) -> Self {
    Self {
      invoker,
      store,
      retry,
      notifier,
    }
  }

  pub fn retry(&self) -> &RetryConfig {
    &self.retry
  }

  /// Run `function` for `event` until it is done, fails terminally, or
  /// `cancel` fires.
  ///
  /// `event_id` links the log entries of the execution to the ingress entry
  /// of the event that triggered it.
  pub async fn execute(
    &self,
    function: &str,
    event: Event,
    event_id: Option<&str>,
    cancel: CancellationToken,
  ) -> Result<ExecutionReport, OrchestratorError> {
    let scope = Scope {
      event_id: event_id.map(str::to_string),
      ..Scope::default()
    };
    self.run(function.to_string(), event, scope, cancel).await
  }

  fn run_nested(
    &self,
    function: String,
    event: Event,
    scope: Scope,
    cancel: CancellationToken,
  ) -> BoxFuture<'_, Result<ExecutionReport, OrchestratorError>> {
    Box::pin(self.run(function, event, scope, cancel))
  }

  #[instrument(
    name = "orchestrator_execute",
    skip(self, event, scope, cancel),
    fields(function = %function, event = %event.name, depth = scope.depth)
  )]
  async fn run(
    &self,
    function: String,
    event: Event,
    scope: Scope,
    cancel: CancellationToken,
  ) -> Result<ExecutionReport, OrchestratorError> {
    let execution_id = uuid::Uuid::new_v4().to_string();

    info!(execution_id = %execution_id, "execution_started");
    self.notifier.notify(ExecutionEvent::ExecutionStarted {
      execution_id: execution_id.clone(),
      function: function.clone(),
      parent_execution_id: scope.parent_execution_id.clone(),
    });
    self
      .log(
        &scope,
        NewLogEntry::info("execution_started").func_id(&function).payload(json!({
          "executionId": execution_id,
          "parentExecutionId": scope.parent_execution_id,
          "event": event,
        })),
      )
      .await;

    let mut state = ExecutionState::new(execution_id, function, event);
    let mut invocations = 0;
    let result = self.drive(&mut state, &scope, &mut invocations, &cancel).await;

    match result {
      Ok(value) => {
        info!(execution_id = %state.execution_id, steps = state.cache.len(), "execution_completed");
        self.notifier.notify(ExecutionEvent::ExecutionCompleted {
          execution_id: state.execution_id.clone(),
          value: value.clone(),
        });
        self
          .log(
            &scope,
            NewLogEntry::info("execution_completed")
              .func_id(&state.function)
              .payload(json!({ "executionId": state.execution_id, "value": value })),
          )
          .await;

        Ok(ExecutionReport {
          execution_id: state.execution_id,
          function: state.function,
          value,
          history: state.history,
          invocations,
        })
      }
      Err(e) if e.is_cancelled() => {
        info!(execution_id = %state.execution_id, "execution_cancelled");
        self.notifier.notify(ExecutionEvent::ExecutionCancelled {
          execution_id: state.execution_id.clone(),
        });
        self
          .log(
            &scope,
            NewLogEntry::info("execution_cancelled")
              .func_id(&state.function)
              .payload(json!({ "executionId": state.execution_id })),
          )
          .await;
        Err(e)
      }
      Err(e) => {
        error!(execution_id = %state.execution_id, error = %e, "execution_failed");
        self.notifier.notify(ExecutionEvent::ExecutionFailed {
          execution_id: state.execution_id.clone(),
          error: e.to_string(),
        });
        self
          .log(
            &scope,
            NewLogEntry::error("execution_failed")
              .func_id(&state.function)
              .payload(json!({ "executionId": state.execution_id, "error": e.to_string() })),
          )
          .await;
        Err(e)
      }
    }
  }

  /// Invoke, apply, repeat. Returns the final value of the function.
  async fn drive(
    &self,
    state: &mut ExecutionState,
    scope: &Scope,
    invocations: &mut u32,
    cancel: &CancellationToken,
  ) -> Result<Value, OrchestratorError> {
    // Consecutive failed attempts at the current step.
    let mut failures: u32 = 0;

    loop {
      if cancel.is_cancelled() {
        return Err(OrchestratorError::Cancelled {
          execution_id: state.execution_id.clone(),
        });
      }

      *invocations += 1;
      let outcome = match self.attempt(state).await {
        Ok(outcome) => {
          failures = 0;
          outcome
        }
        Err(err) => {
          failures += 1;
          warn!(
            execution_id = %state.execution_id,
            attempt = failures,
            error = %err,
            "invocation_failed"
          );
          self.notifier.notify(ExecutionEvent::AttemptFailed {
            execution_id: state.execution_id.clone(),
            attempt: failures,
            error: err.to_string(),
          });
          self
            .log(
              scope,
              NewLogEntry::new(LogLevel::Warn, "invocation_failed")
                .func_id(&state.function)
                .payload(json!({
                  "executionId": state.execution_id,
                  "attempt": failures,
                  "error": err.to_string(),
                })),
            )
            .await;

          if failures > self.retry.max_retries {
            self.dead_letter(state, scope, &err.to_string(), failures).await?;
            return Err(OrchestratorError::RetriesExhausted {
              execution_id: state.execution_id.clone(),
              attempts: failures,
              source: Box::new(err),
            });
          }

          self
            .pause(self.retry.backoff(failures), &state.execution_id, cancel)
            .await?;
          continue;
        }
      };

      let resolved = match &outcome {
        StepOutcome::Complete { step_id, value } => {
          debug!(execution_id = %state.execution_id, step_id = %step_id, "step_completed");
          self.notifier.notify(ExecutionEvent::StepCompleted {
            execution_id: state.execution_id.clone(),
            step_id: step_id.clone(),
            value: value.clone(),
          });
          self
            .log(
              scope,
              NewLogEntry::info("step_completed")
                .func_id(&state.function)
                .step_id(step_id)
                .payload(json!({ "executionId": state.execution_id, "value": value })),
            )
            .await;
          value.clone()
        }

        StepOutcome::Delay { step_id, delay_ms } => {
          debug!(execution_id = %state.execution_id, step_id = %step_id, delay_ms, "step_delayed");
          self.notifier.notify(ExecutionEvent::StepDelayed {
            execution_id: state.execution_id.clone(),
            step_id: step_id.clone(),
            delay_ms: *delay_ms,
          });
          self
            .log(
              scope,
              NewLogEntry::info("step_delayed")
                .func_id(&state.function)
                .step_id(step_id)
                .payload(json!({ "executionId": state.execution_id, "delayInMs": delay_ms })),
            )
            .await;
          self
            .pause(Duration::from_millis(*delay_ms), &state.execution_id, cancel)
            .await?;
          Value::Null
        }

        StepOutcome::Invoke {
          step_id,
          function,
          payload,
        } => {
          self
            .invoke_nested(state, scope, step_id, function, payload.clone(), cancel)
            .await?
        }

        StepOutcome::Done { value } => value.clone(),
      };

      let finished = outcome.is_terminal();
      state
        .record(outcome, resolved.clone())
        .map_err(|e| OrchestratorError::CacheConflict {
          execution_id: state.execution_id.clone(),
          step_id: match e {
            reverb_function::CacheError::AlreadyCached { step_id } => step_id,
          },
        })?;

      if finished {
        return Ok(resolved);
      }
    }
  }

  /// Run the target of an `invoke` step and return its final value.
  async fn invoke_nested(
    &self,
    state: &ExecutionState,
    scope: &Scope,
    step_id: &str,
    function: &str,
    payload: Option<Value>,
    cancel: &CancellationToken,
  ) -> Result<Value, OrchestratorError> {
    if scope.depth >= MAX_NESTING_DEPTH {
      let err = OrchestratorError::NestingTooDeep {
        execution_id: state.execution_id.clone(),
        limit: MAX_NESTING_DEPTH,
      };
      self.dead_letter(state, scope, &err.to_string(), 1).await?;
      return Err(err);
    }

    debug!(execution_id = %state.execution_id, step_id = %step_id, target = %function, "step_invoked");
    self.notifier.notify(ExecutionEvent::StepInvoked {
      execution_id: state.execution_id.clone(),
      step_id: step_id.to_string(),
      function: function.to_string(),
    });
    self
      .log(
        scope,
        NewLogEntry::info("step_invoked")
          .func_id(&state.function)
          .step_id(step_id)
          .payload(json!({ "executionId": state.execution_id, "invokedFnName": function })),
      )
      .await;

    let event = Event {
      name: function.to_string(),
      payload,
    };
    let child = Scope {
      event_id: scope.event_id.clone(),
      parent_execution_id: Some(state.execution_id.clone()),
      depth: scope.depth + 1,
    };

    match self
      .run_nested(function.to_string(), event, child, cancel.clone())
      .await
    {
      Ok(report) => Ok(report.value),
      Err(e) if e.is_cancelled() => Err(OrchestratorError::Cancelled {
        execution_id: state.execution_id.clone(),
      }),
      Err(e) => {
        let err = OrchestratorError::NestedFailed {
          execution_id: state.execution_id.clone(),
          function: function.to_string(),
          source: Box::new(e),
        };
        self.dead_letter(state, scope, &err.to_string(), 1).await?;
        Err(err)
      }
    }
  }

  /// One gateway round trip for the current state.
  async fn attempt(&self, state: &ExecutionState) -> Result<StepOutcome, OrchestratorError> {
    let request = RpcRequest::new(&state.function, state.event.clone())
      .with_id(state.execution_id.as_str())
      .with_execution_id(&state.execution_id)
      .with_cache(state.cache.clone());

    let reply = self
      .invoker
      .invoke(&request)
      .await
      .map_err(|source| OrchestratorError::Invoke {
        execution_id: state.execution_id.clone(),
        source,
      })?;

    if let Some(message) = reply.error() {
      return Err(OrchestratorError::FunctionFailed {
        execution_id: state.execution_id.clone(),
        message: message.to_string(),
      });
    }

    let Some(outcome) = reply.outcome().cloned() else {
      return Err(OrchestratorError::NoResult {
        execution_id: state.execution_id.clone(),
        status: reply.status.as_u16(),
      });
    };

    if let Some(step_id) = outcome.step_id() {
      if state.cache.contains(step_id) {
        return Err(OrchestratorError::CacheConflict {
          execution_id: state.execution_id.clone(),
          step_id: step_id.to_string(),
        });
      }
    }

    Ok(outcome)
  }

  /// Sleep unless cancelled first.
  async fn pause(
    &self,
    duration: Duration,
    execution_id: &str,
    cancel: &CancellationToken,
  ) -> Result<(), OrchestratorError> {
    tokio::select! {
      _ = tokio::time::sleep(duration) => Ok(()),
      _ = cancel.cancelled() => Err(OrchestratorError::Cancelled {
        execution_id: execution_id.to_string(),
      }),
    }
  }

  async fn dead_letter(
    &self,
    state: &ExecutionState,
    scope: &Scope,
    error: &str,
    attempts: u32,
  ) -> Result<(), OrchestratorError> {
    let record = DeadLetterRecord {
      execution_id: state.execution_id.clone(),
      function_id: state.function.clone(),
      event: Json(serde_json::to_value(&state.event).unwrap_or(Value::Null)),
      error: error.to_string(),
      attempts: i32::try_from(attempts).unwrap_or(i32::MAX),
      timestamp: Utc::now(),
    };
    self.store.append_dead_letter(&record).await?;

    error!(execution_id = %state.execution_id, attempts, "execution_dead_lettered");
    self
      .log(
        scope,
        NewLogEntry::error("execution_dead_lettered")
          .func_id(&state.function)
          .payload(json!({ "executionId": state.execution_id, "error": error })),
      )
      .await;
    Ok(())
  }

  /// Append a log entry. Failures are reported but never fail the execution.
  async fn log(&self, scope: &Scope, entry: NewLogEntry) {
    let entry = match &scope.event_id {
      Some(event_id) => entry.event_id(event_id),
      None => entry,
    };

    if let Err(e) = self.store.append_log(&entry).await {
      warn!(error = %e, message = %entry.message, "log_append_failed");
    }
  }
}
