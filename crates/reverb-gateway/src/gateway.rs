use std::sync::Arc;

use axum::http::StatusCode;
use reverb_executor::{ExecutionState, StepExecutor};
use reverb_function::{FunctionRegistry, StepOutcome};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::error::GatewayError;
use crate::rpc::{RequestId, RpcRequest, RpcResponse};

const MALFORMED_MESSAGE: &str = "Not a valid JSON RPC request format";

/// Status code and optional body produced for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayReply {
  pub status: StatusCode,
  pub body: Option<RpcResponse>,
}

impl GatewayReply {
  pub fn new(status: StatusCode, body: Option<RpcResponse>) -> Self {
    Self { status, body }
  }

  /// The outcome carried by the body, if any.
  pub fn outcome(&self) -> Option<&StepOutcome> {
    self.body.as_ref().and_then(|b| b.result.as_ref())
  }

  /// The error message carried by the body, if any.
  pub fn error(&self) -> Option<&str> {
    self.body.as_ref().and_then(|b| b.error.as_deref())
  }
}

/// Stateless request handler over an immutable registry.
#[derive(Clone)]
pub struct Gateway {
  registry: Arc<FunctionRegistry>,
  executor: StepExecutor,
}

impl Gateway {
  pub fn new(registry: Arc<FunctionRegistry>) -> Self {
    Self {
      registry,
      executor: StepExecutor::new(),
    }
  }

  pub fn registry(&self) -> &FunctionRegistry {
    &self.registry
  }

  /// Handle a raw request body.
  pub fn handle(&self, body: &Value) -> GatewayReply {
    match RpcRequest::parse(body) {
      Ok(request) => self.dispatch(request),
      Err(reason) => error_reply(
        RequestId::extract(body),
        GatewayError::MalformedRequest { reason },
      ),
    }
  }

  /// Handle an already validated request.
  #[instrument(
    name = "gateway_dispatch",
    skip(self, request),
    fields(method = %request.method, cached_steps = request.params.cache.len())
  )]
  pub fn dispatch(&self, request: RpcRequest) -> GatewayReply {
    let id = request.id.clone();

    match self.invoke(request) {
      Ok(outcome) => {
        debug!(outcome = ?outcome, "request_handled");
        GatewayReply::new(StatusCode::OK, id.map(|id| RpcResponse::result(id, outcome)))
      }
      Err(err) => error_reply(id, err),
    }
  }

  fn invoke(&self, request: RpcRequest) -> Result<StepOutcome, GatewayError> {
    let RpcRequest {
      method, params, id, ..
    } = request;

    let function = self
      .registry
      .lookup(&method)
      .ok_or_else(|| GatewayError::UnknownMethod {
        method: method.clone(),
      })?;

    let execution_id = params
      .execution_id
      .or_else(|| id.map(|id| id.to_string()))
      .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let state = ExecutionState::new(execution_id, method, params.event).with_cache(params.cache);
    Ok(self.executor.advance(function, &state)?)
  }
}

fn error_reply(id: Option<RequestId>, err: GatewayError) -> GatewayReply {
  match err {
    GatewayError::MalformedRequest { .. } => {
      debug!(error = %err, has_id = id.is_some(), "request_rejected");
      GatewayReply::new(
        StatusCode::BAD_REQUEST,
        id.map(|id| RpcResponse::error(id, MALFORMED_MESSAGE)),
      )
    }
    GatewayError::UnknownMethod { .. } => {
      warn!(error = %err, "unknown_method");
      GatewayReply::new(
        StatusCode::NOT_FOUND,
        id.map(|id| RpcResponse::error(id, err.to_string())),
      )
    }
    GatewayError::Execution(err) => {
      let Some(message) = err.reportable_message() else {
        info!(execution_id = %err.execution_id(), "unclassified_failure_dropped");
        return GatewayReply::new(StatusCode::OK, None);
      };
      GatewayReply::new(StatusCode::OK, id.map(|id| RpcResponse::error(id, message)))
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::time::Duration;

  use reverb_function::{FunctionDescriptor, HandlerFailure};
  use serde_json::json;

  use super::*;

  fn gateway() -> Gateway {
    let mut builder = FunctionRegistry::builder();
    builder
      .register(
        "greet",
        FunctionDescriptor::from_fn("greet", "user.created", |event, _| {
          let name = event
            .payload
            .as_ref()
            .and_then(|p| p["name"].as_str())
            .unwrap_or("nobody");
          Ok(json!(format!("hello {}", name)))
        }),
      )
      .unwrap()
      .register(
        "wait",
        FunctionDescriptor::from_fn("wait", "tick", |_, step| {
          step.sleep("s1", Duration::from_millis(5000))?;
          Ok(Value::Null)
        }),
      )
      .unwrap()
      .register(
        "fail",
        FunctionDescriptor::from_fn("fail", "boom", |_, _| {
          Err(HandlerFailure::recognized("card declined").into())
        }),
      )
      .unwrap()
      .register(
        "vanish",
        FunctionDescriptor::from_fn("vanish", "boom", |_, _| {
          Err(HandlerFailure::Unclassified.into())
        }),
      )
      .unwrap();
    Gateway::new(Arc::new(builder.build()))
  }

  fn request(method: &str, id: Option<Value>) -> Value {
    let mut body = json!({
      "jsonrpc": "2.0",
      "method": method,
      "params": { "event": { "name": "user.created", "payload": { "name": "ada" } } }
    });
    if let Some(id) = id {
      body["id"] = id;
    }
    body
  }

  #[test]
  fn test_done_with_id() {
    let reply = gateway().handle(&request("greet", Some(json!(1))));
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.outcome(), Some(&StepOutcome::Done { value: json!("hello ada") }));
    assert!(reply.error().is_none());
  }

  #[test]
  fn test_fire_and_forget_has_no_body() {
    let reply = gateway().handle(&request("greet", None));
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.body.is_none());
  }

  #[test]
  fn test_unknown_method() {
    let reply = gateway().handle(&request("noSuchFn", Some(json!(42))));
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(
      serde_json::to_value(reply.body.unwrap()).unwrap(),
      json!({ "error": "Method noSuchFn does not exist.", "id": 42 })
    );

    let reply = gateway().handle(&request("noSuchFn", None));
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert!(reply.body.is_none());
  }

  #[test]
  fn test_malformed_request() {
    let reply = gateway().handle(&json!({}));
    assert_eq!(reply, GatewayReply::new(StatusCode::BAD_REQUEST, None));

    let reply = gateway().handle(&json!({ "id": "abc", "method": "greet" }));
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.error(), Some(MALFORMED_MESSAGE));
    assert_eq!(reply.body.unwrap().id, RequestId::from("abc"));
  }

  #[test]
  fn test_delay_leaves_cache_alone() {
    let body = json!({
      "jsonrpc": "2.0",
      "method": "wait",
      "params": { "event": { "name": "tick" } },
      "id": "r1"
    });
    let reply = gateway().handle(&body);
    assert_eq!(
      reply.outcome(),
      Some(&StepOutcome::Delay {
        step_id: "s1".to_string(),
        delay_ms: 5000,
      })
    );
  }

  #[test]
  fn test_recognized_failure_is_reported() {
    let reply = gateway().handle(&request("fail", Some(json!("r1"))));
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.error(), Some("card declined"));
    assert!(reply.outcome().is_none());
  }

  #[test]
  fn test_unclassified_failure_is_dropped() {
    let reply = gateway().handle(&request("vanish", Some(json!("r1"))));
    assert_eq!(reply, GatewayReply::new(StatusCode::OK, None));
  }

  #[test]
  fn test_fully_cached_request_runs_no_step_work() {
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = runs.clone();
    let mut builder = FunctionRegistry::builder();
    builder
      .register(
        "count",
        FunctionDescriptor::from_fn("count", "e", move |_, step| {
          let n: i64 = step.run("s1", || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(5)
          })?;
          Ok(json!(n * 2))
        }),
      )
      .unwrap();
    let gateway = Gateway::new(Arc::new(builder.build()));

    let body = json!({
      "jsonrpc": "2.0",
      "method": "count",
      "params": { "event": { "name": "e" }, "cache": { "s1": 5 } },
      "id": 7
    });

    let first = gateway.handle(&body);
    let second = gateway.handle(&body);
    assert_eq!(first, second);
    assert_eq!(first.outcome(), Some(&StepOutcome::Done { value: json!(10) }));
    assert_eq!(runs.load(Ordering::SeqCst), 0);
  }
}
