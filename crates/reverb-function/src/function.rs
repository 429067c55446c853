use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::StepError;
use crate::event::Event;
use crate::step::Step;

/// The callable part of a registered function.
pub trait Handler: Send + Sync {
  /// Run the function body against the triggering event.
  ///
  /// The body is re-run from the top on every invocation of an execution and
  /// must declare its steps in the same order each time.
  fn call(&self, event: &Event, step: &mut Step<'_>) -> Result<Value, StepError>;
}

struct FnHandler<F>(F);

impl<F> Handler for FnHandler<F>
where
  F: Fn(&Event, &mut Step<'_>) -> Result<Value, StepError> + Send + Sync,
{
  fn call(&self, event: &Event, step: &mut Step<'_>) -> Result<Value, StepError> {
    (self.0)(event, step)
  }
}

/// A function known to the registry.
#[derive(Clone)]
pub struct FunctionDescriptor {
  /// Function id, used as the default method name.
  pub id: String,
  /// Name of the event that triggers this function.
  pub event: String,
  handler: Arc<dyn Handler>,
}

impl FunctionDescriptor {
  pub fn new(id: impl Into<String>, event: impl Into<String>, handler: impl Handler + 'static) -> Self {
    Self {
      id: id.into(),
      event: event.into(),
      handler: Arc::new(handler),
    }
  }

  /// Build a descriptor from a closure.
  pub fn from_fn<F>(id: impl Into<String>, event: impl Into<String>, body: F) -> Self
  where
    F: Fn(&Event, &mut Step<'_>) -> Result<Value, StepError> + Send + Sync + 'static,
  {
    Self::new(id, event, FnHandler(body))
  }

  pub fn handler(&self) -> &dyn Handler {
    self.handler.as_ref()
  }
}

impl fmt::Debug for FunctionDescriptor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("FunctionDescriptor")
      .field("id", &self.id)
      .field("event", &self.event)
      .finish_non_exhaustive()
  }
}
