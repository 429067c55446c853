//! The step context, step cache and step outcomes.

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CacheError, HandlerFailure, StepError};

/// Values produced by completed steps of one execution, keyed by step id.
///
/// The cache only grows: a step id is written once and never replaced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepCache(BTreeMap<String, Value>);

impl StepCache {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, step_id: &str) -> Option<&Value> {
    self.0.get(step_id)
  }

  pub fn contains(&self, step_id: &str) -> bool {
    self.0.contains_key(step_id)
  }

  /// Record the value of a step.
  pub fn insert(&mut self, step_id: impl Into<String>, value: Value) -> Result<(), CacheError> {
    let step_id = step_id.into();
    if self.0.contains_key(&step_id) {
      return Err(CacheError::AlreadyCached { step_id });
    }
    self.0.insert(step_id, value);
    Ok(())
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn step_ids(&self) -> impl Iterator<Item = &str> {
    self.0.keys().map(String::as_str)
  }
}

impl FromIterator<(String, Value)> for StepCache {
  fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
    Self(iter.into_iter().collect())
  }
}

/// What an invocation of a function produced.
///
/// Serialized with a `type` tag and camelCase fields, e.g.
/// `{"type":"delay","stepId":"s1","delayInMs":5000}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum StepOutcome {
  /// A step finished; its value must be cached before the next invocation.
  Complete {
    step_id: String,
    #[serde(rename = "stepValue", default)]
    value: Value,
  },

  /// The execution pauses for `delay_ms` before being invoked again.
  Delay {
    step_id: String,
    #[serde(rename = "delayInMs")]
    delay_ms: u64,
  },

  /// The execution waits for `function` to run with `payload`.
  Invoke {
    step_id: String,
    #[serde(rename = "invokedFnName")]
    function: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload: Option<Value>,
  },

  /// The execution finished with `value`.
  Done {
    #[serde(default)]
    value: Value,
  },
}

impl StepOutcome {
  /// The step this outcome belongs to. `None` for [`StepOutcome::Done`].
  pub fn step_id(&self) -> Option<&str> {
    match self {
      Self::Complete { step_id, .. } | Self::Delay { step_id, .. } | Self::Invoke { step_id, .. } => {
        Some(step_id)
      }
      Self::Done { .. } => None,
    }
  }

  pub fn is_terminal(&self) -> bool {
    matches!(self, Self::Done { .. })
  }
}

/// The step context handed to a handler for one invocation.
///
/// Every declaration either replays a cached value or, for the first uncached
/// step, records a pending [`StepOutcome`] and returns
/// [`StepError::Suspended`]. Once a step is pending, later declarations are
/// not evaluated.
///
/// An invalid declaration is remembered even if the handler discards the
/// error, and every later declaration fails with it.
pub struct Step<'a> {
  cache: &'a StepCache,
  declared: HashSet<String>,
  pending: Option<StepOutcome>,
  invalid: Option<StepError>,
}

impl<'a> Step<'a> {
  pub fn new(cache: &'a StepCache) -> Self {
    Self {
      cache,
      declared: HashSet::new(),
      pending: None,
      invalid: None,
    }
  }

  /// Run a unit of work, or replay its cached value.
  pub fn run<T, F>(&mut self, step_id: &str, work: F) -> Result<T, StepError>
  where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Result<T, HandlerFailure>,
  {
    if let Some(cached) = self.declare(step_id)? {
      return decode(step_id, cached);
    }

    let output = work()?;
    let value = serde_json::to_value(output).map_err(|e| {
      HandlerFailure::recognized(format!("step '{}' produced an unserializable value: {}", step_id, e))
    })?;

    Err(self.suspend(StepOutcome::Complete {
      step_id: step_id.to_string(),
      value,
    }))
  }

  /// Pause the execution for `duration`.
  pub fn sleep(&mut self, step_id: &str, duration: Duration) -> Result<(), StepError> {
    if self.declare(step_id)?.is_some() {
      return Ok(());
    }

    let delay_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
    Err(self.suspend(StepOutcome::Delay {
      step_id: step_id.to_string(),
      delay_ms,
    }))
  }

  /// Run another registered function and wait for its final value.
  pub fn invoke<T>(&mut self, step_id: &str, function: &str, payload: Value) -> Result<T, StepError>
  where
    T: DeserializeOwned,
  {
    if let Some(cached) = self.declare(step_id)? {
      return decode(step_id, cached);
    }

    Err(self.suspend(StepOutcome::Invoke {
      step_id: step_id.to_string(),
      function: function.to_string(),
      payload: Some(payload),
    }))
  }

  /// The outcome of the step evaluated during this invocation, if any.
  pub fn into_pending(self) -> Option<StepOutcome> {
    self.pending
  }

  /// The first invalid declaration made during this invocation, if any.
  pub fn invalid_declaration(&self) -> Option<&StepError> {
    self.invalid.as_ref()
  }

  fn declare(&mut self, step_id: &str) -> Result<Option<&'a Value>, StepError> {
    if let Some(invalid) = &self.invalid {
      return Err(invalid.clone());
    }

    if step_id.is_empty() {
      return Err(self.reject(step_id, "step id must not be empty"));
    }

    if !self.declared.insert(step_id.to_string()) {
      return Err(self.reject(step_id, "step id declared more than once"));
    }

    if self.pending.is_some() {
      return Err(StepError::Suspended);
    }

    Ok(self.cache.get(step_id))
  }

  fn reject(&mut self, step_id: &str, reason: &str) -> StepError {
    let err = StepError::InvalidDeclaration {
      step_id: step_id.to_string(),
      reason: reason.to_string(),
    };
    self.invalid = Some(err.clone());
    err
  }

  fn suspend(&mut self, outcome: StepOutcome) -> StepError {
    self.pending = Some(outcome);
    StepError::Suspended
  }
}

fn decode<T: DeserializeOwned>(step_id: &str, cached: &Value) -> Result<T, StepError> {
  serde_json::from_value(cached.clone()).map_err(|e| {
    StepError::Failed(HandlerFailure::recognized(format!(
      "cached value for step '{}' has an unexpected shape: {}",
      step_id, e
    )))
  })
}
