use reverb_executor::ExecutionError;

/// Errors raised while handling an invocation request.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
  /// The request is not a valid JSON-RPC invocation.
  #[error("malformed request: {reason}")]
  MalformedRequest { reason: String },

  /// No function is registered under the requested method.
  #[error("Method {method} does not exist.")]
  UnknownMethod { method: String },

  /// The function failed or declared its steps incorrectly.
  #[error(transparent)]
  Execution(#[from] ExecutionError),
}
