//! Error types for registration, step declaration and handler failures.

/// Errors raised while building the function registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
  /// A function is already registered under this name.
  #[error("function '{name}' is already registered")]
  DuplicateRegistration { name: String },
}

/// Errors raised when writing to a step cache.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CacheError {
  /// The cache is append-only; a step id can be written once.
  #[error("step '{step_id}' is already cached")]
  AlreadyCached { step_id: String },
}

/// A failure produced by a handler or one of its steps.
///
/// Only [`HandlerFailure::Recognized`] failures are reported back to the
/// caller of the gateway. [`HandlerFailure::Unclassified`] failures are
/// dropped at the gateway boundary and produce no response body.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HandlerFailure {
  /// A failure carrying a message.
  #[error("{message}")]
  Recognized { message: String },

  /// A failure without a usable message.
  #[error("unclassified handler failure")]
  Unclassified,
}

impl HandlerFailure {
  pub fn recognized(message: impl Into<String>) -> Self {
    Self::Recognized {
      message: message.into(),
    }
  }

  /// The message reported to callers, if this failure is reportable.
  pub fn message(&self) -> Option<&str> {
    match self {
      Self::Recognized { message } => Some(message),
      Self::Unclassified => None,
    }
  }
}

impl From<String> for HandlerFailure {
  fn from(message: String) -> Self {
    Self::Recognized { message }
  }
}

impl From<&str> for HandlerFailure {
  fn from(message: &str) -> Self {
    Self::recognized(message)
  }
}

/// Control flow and errors surfaced from inside a handler body.
///
/// Handlers propagate every variant with `?`; the step executor turns them
/// into outcomes.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StepError {
  /// A pending step was reached; the body must stop here.
  #[error("execution suspended at a pending step")]
  Suspended,

  /// A step was declared with an empty or repeated id.
  #[error("invalid step declaration '{step_id}': {reason}")]
  InvalidDeclaration { step_id: String, reason: String },

  /// The pending step or the handler body failed.
  #[error(transparent)]
  Failed(#[from] HandlerFailure),
}
