//! JSON-RPC envelope types.

use std::fmt;

use reverb_function::{Event, StepCache, StepOutcome};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

/// A request id, echoed verbatim in the response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
  Number(serde_json::Number),
  String(String),
}

impl RequestId {
  /// Pull a usable id out of an arbitrary request body.
  ///
  /// Only string and number ids count; anything else is treated as absent.
  pub fn extract(body: &Value) -> Option<Self> {
    match body.get("id")? {
      Value::String(s) => Some(Self::String(s.clone())),
      Value::Number(n) => Some(Self::Number(n.clone())),
      _ => None,
    }
  }
}

impl fmt::Display for RequestId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Number(n) => write!(f, "{}", n),
      Self::String(s) => f.write_str(s),
    }
  }
}

impl From<&str> for RequestId {
  fn from(id: &str) -> Self {
    Self::String(id.to_string())
  }
}

impl From<i64> for RequestId {
  fn from(id: i64) -> Self {
    Self::Number(id.into())
  }
}

/// Parameters of an invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcParams {
  pub event: Event,
  /// Step values of the execution resolved so far.
  #[serde(default, skip_serializing_if = "StepCache::is_empty")]
  pub cache: StepCache,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub execution_id: Option<String>,
}

/// An invocation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
  pub jsonrpc: String,
  pub method: String,
  pub params: RpcParams,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id: Option<RequestId>,
}

impl RpcRequest {
  pub fn new(method: impl Into<String>, event: Event) -> Self {
    Self {
      jsonrpc: JSONRPC_VERSION.to_string(),
      method: method.into(),
      params: RpcParams {
        event,
        cache: StepCache::new(),
        execution_id: None,
      },
      id: None,
    }
  }

  pub fn with_id(mut self, id: impl Into<RequestId>) -> Self {
    self.id = Some(id.into());
    self
  }

  pub fn with_cache(mut self, cache: StepCache) -> Self {
    self.params.cache = cache;
    self
  }

  pub fn with_execution_id(mut self, execution_id: impl Into<String>) -> Self {
    self.params.execution_id = Some(execution_id.into());
    self
  }

  /// Parse and validate a raw request body.
  pub fn parse(body: &Value) -> Result<Self, String> {
    let request: Self = serde_json::from_value(body.clone()).map_err(|e| e.to_string())?;
    if request.jsonrpc != JSONRPC_VERSION {
      return Err(format!(
        "unsupported jsonrpc version '{}'",
        request.jsonrpc
      ));
    }
    Ok(request)
  }
}

/// The response envelope. At most one of `result` and `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub result: Option<StepOutcome>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
  pub id: RequestId,
}

impl RpcResponse {
  pub fn result(id: RequestId, outcome: StepOutcome) -> Self {
    Self {
      result: Some(outcome),
      error: None,
      id,
    }
  }

  pub fn error(id: RequestId, message: impl Into<String>) -> Self {
    Self {
      result: None,
      error: Some(message.into()),
      id,
    }
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn test_extract_id() {
    assert_eq!(RequestId::extract(&json!({ "id": 42 })), Some(RequestId::from(42)));
    assert_eq!(RequestId::extract(&json!({ "id": "a" })), Some(RequestId::from("a")));
    assert_eq!(RequestId::extract(&json!({ "id": 0 })), Some(RequestId::from(0)));
    assert_eq!(RequestId::extract(&json!({ "id": null })), None);
    assert_eq!(RequestId::extract(&json!({ "id": [1] })), None);
    assert_eq!(RequestId::extract(&json!([1, 2])), None);
  }

  #[test]
  fn test_parse_full_request() {
    let request = RpcRequest::parse(&json!({
      "jsonrpc": "2.0",
      "method": "greet",
      "params": {
        "event": { "name": "user.created", "payload": { "name": "ada" } },
        "cache": { "s1": 1 },
        "executionId": "exec-1"
      },
      "id": "r1"
    }))
    .unwrap();

    assert_eq!(request.method, "greet");
    assert_eq!(request.params.event.name, "user.created");
    assert_eq!(request.params.cache.get("s1"), Some(&json!(1)));
    assert_eq!(request.params.execution_id.as_deref(), Some("exec-1"));
    assert_eq!(request.id, Some(RequestId::from("r1")));
  }

  #[test]
  fn test_parse_rejects_bad_shapes() {
    let cases = [
      json!({}),
      json!({ "jsonrpc": "1.0", "method": "m", "params": { "event": { "name": "e" } } }),
      json!({ "jsonrpc": "2.0", "method": 7, "params": { "event": { "name": "e" } } }),
      json!({ "jsonrpc": "2.0", "method": "m", "params": { "event": { "name": 1 } } }),
      json!({ "jsonrpc": "2.0", "method": "m", "params": {} }),
    ];

    for case in cases {
      assert!(RpcRequest::parse(&case).is_err(), "accepted {}", case);
    }
  }

  #[test]
  fn test_response_omits_absent_fields() {
    let response = RpcResponse::error(RequestId::from(42), "Method noSuchFn does not exist.");
    assert_eq!(
      serde_json::to_value(&response).unwrap(),
      json!({ "error": "Method noSuchFn does not exist.", "id": 42 })
    );
  }
}
