use reverb_function::{CacheError, Event, StepCache, StepOutcome};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Everything needed to replay one execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionState {
  /// Unique execution ID.
  pub execution_id: String,
  /// Method name of the function being executed.
  pub function: String,
  /// The event that started the execution.
  pub event: Event,
  /// Resolved step values.
  pub cache: StepCache,
  /// Outcomes in the order they were recorded.
  pub history: Vec<StepOutcome>,
}

impl ExecutionState {
  pub fn new(execution_id: impl Into<String>, function: impl Into<String>, event: Event) -> Self {
    Self {
      execution_id: execution_id.into(),
      function: function.into(),
      event,
      cache: StepCache::new(),
      history: Vec::new(),
    }
  }

  /// Resume from a cache produced by earlier invocations.
  pub fn with_cache(mut self, cache: StepCache) -> Self {
    self.cache = cache;
    self
  }

  /// Record an outcome and, for step outcomes, the value it resolved to.
  ///
  /// For `complete` the value is the step's own value, for `delay` a
  /// placeholder, for `invoke` the nested function's final value.
  pub fn record(&mut self, outcome: StepOutcome, resolved: Value) -> Result<(), CacheError> {
    if let Some(step_id) = outcome.step_id() {
      self.cache.insert(step_id, resolved)?;
    }
    self.history.push(outcome);
    Ok(())
  }

  /// Whether a `done` outcome has been recorded.
  pub fn is_finished(&self) -> bool {
    self.history.last().is_some_and(StepOutcome::is_terminal)
  }
}
