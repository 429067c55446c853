//! Transports from the orchestrator to a gateway.

use std::sync::Arc;

use async_trait::async_trait;
use reverb_gateway::{Gateway, GatewayReply, RpcRequest, RpcResponse};
use tracing::debug;

use crate::error::InvokeError;

/// Sends one invocation request to a gateway.
#[async_trait]
pub trait Invoker: Send + Sync {
  async fn invoke(&self, request: &RpcRequest) -> Result<GatewayReply, InvokeError>;
}

/// Calls a gateway living in the same process.
#[derive(Clone)]
pub struct LocalInvoker {
  gateway: Arc<Gateway>,
}

impl LocalInvoker {
  pub fn new(gateway: Arc<Gateway>) -> Self {
    Self { gateway }
  }
}

#[async_trait]
impl Invoker for LocalInvoker {
  async fn invoke(&self, request: &RpcRequest) -> Result<GatewayReply, InvokeError> {
    let gateway = self.gateway.clone();
    let request = request.clone();

    // Handlers are synchronous user code.
    tokio::task::spawn_blocking(move || gateway.dispatch(request))
      .await
      .map_err(|e| InvokeError::Transport {
        message: format!("gateway task failed: {}", e),
      })
  }
}

/// Posts requests to a remote gateway over HTTP.
#[derive(Clone)]
pub struct HttpInvoker {
  client: reqwest::Client,
  url: String,
}

impl HttpInvoker {
  pub fn new(url: impl Into<String>) -> Self {
    Self::with_client(reqwest::Client::new(), url)
  }

  pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
    Self {
      client,
      url: url.into(),
    }
  }
}

#[async_trait]
impl Invoker for HttpInvoker {
  async fn invoke(&self, request: &RpcRequest) -> Result<GatewayReply, InvokeError> {
    let response = self
      .client
      .post(&self.url)
      .json(request)
      .send()
      .await
      .map_err(|e| InvokeError::Transport {
        message: format!("failed to reach gateway at {}: {}", self.url, e),
      })?;

    let status = response.status();
    let bytes = response.bytes().await.map_err(|e| InvokeError::Transport {
      message: format!("failed to read gateway response: {}", e),
    })?;
    debug!(status = status.as_u16(), bytes = bytes.len(), "gateway_replied");

    let body = if bytes.is_empty() {
      None
    } else {
      Some(
        serde_json::from_slice::<RpcResponse>(&bytes).map_err(|e| InvokeError::Decode {
          message: e.to_string(),
        })?,
      )
    };

    Ok(GatewayReply::new(status, body))
  }
}
