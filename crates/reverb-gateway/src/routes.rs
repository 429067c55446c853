//! HTTP surface of the gateway.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;
use tracing::{debug, error};

use crate::gateway::{Gateway, GatewayReply};

/// Build the gateway router: `POST /` takes a JSON-RPC invocation.
pub fn router(gateway: Arc<Gateway>) -> Router {
  Router::new()
    .route("/", post(invoke))
    .with_state(gateway)
}

async fn invoke(State(gateway): State<Arc<Gateway>>, body: Bytes) -> Response {
  let value: Value = match serde_json::from_slice(&body) {
    Ok(value) => value,
    Err(e) => {
      debug!(error = %e, "unparseable_request");
      // Not JSON at all, so there is no id to echo.
      Value::Null
    }
  };

  // Handlers are synchronous user code.
  match tokio::task::spawn_blocking(move || gateway.handle(&value)).await {
    Ok(reply) => reply.into_response(),
    Err(e) => {
      error!(error = %e, "gateway_task_failed");
      StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
  }
}

impl IntoResponse for GatewayReply {
  fn into_response(self) -> Response {
    match self.body {
      Some(body) => (self.status, Json(body)).into_response(),
      None => self.status.into_response(),
    }
  }
}
