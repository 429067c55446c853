use reverb_store::StoreError;

/// Errors raised while delivering a request to a gateway.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvokeError {
  /// The gateway could not be reached or its response could not be read.
  #[error("{message}")]
  Transport { message: String },

  /// The gateway replied with a body that is not a response envelope.
  #[error("invalid gateway response: {message}")]
  Decode { message: String },
}

/// Errors raised while driving an execution.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
  /// The function reported a failure.
  #[error("execution '{execution_id}' failed: {message}")]
  FunctionFailed {
    execution_id: String,
    message: String,
  },

  /// The gateway answered without a step outcome.
  #[error("execution '{execution_id}' got no result from the gateway (status {status})")]
  NoResult { execution_id: String, status: u16 },

  /// The request never produced a reply.
  #[error("execution '{execution_id}' could not be invoked: {source}")]
  Invoke {
    execution_id: String,
    #[source]
    source: InvokeError,
  },

  /// The gateway emitted an outcome for a step that is already cached.
  #[error("execution '{execution_id}' emitted step '{step_id}' which is already cached")]
  CacheConflict {
    execution_id: String,
    step_id: String,
  },

  /// A nested execution failed, failing its parent.
  #[error("execution '{execution_id}' failed because nested function '{function}' failed: {source}")]
  NestedFailed {
    execution_id: String,
    function: String,
    #[source]
    source: Box<OrchestratorError>,
  },

  /// Nested invocations went deeper than allowed.
  #[error("execution '{execution_id}' exceeded the nesting limit of {limit}")]
  NestingTooDeep { execution_id: String, limit: usize },

  /// Every retry failed; the execution was dead-lettered.
  #[error("execution '{execution_id}' failed after {attempts} attempts: {source}")]
  RetriesExhausted {
    execution_id: String,
    attempts: u32,
    #[source]
    source: Box<OrchestratorError>,
  },

  /// The execution was cancelled and will not be resumed.
  #[error("execution '{execution_id}' was cancelled")]
  Cancelled { execution_id: String },

  /// Writing the dead-letter record failed.
  #[error(transparent)]
  Store(#[from] StoreError),
}

impl OrchestratorError {
  pub fn is_cancelled(&self) -> bool {
    matches!(self, Self::Cancelled { .. })
  }
}
