use std::net::SocketAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::retry::RetryConfig;

/// Top-level configuration for `reverb serve`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  /// Listener for the function invocation gateway.
  pub gateway_addr: SocketAddr,

  /// Listener for the ingress and log query API.
  pub ingress_addr: SocketAddr,

  /// sqlx connection string for the log and dead-letter store.
  /// If not specified, a database file in the data directory is used.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub database_url: Option<String>,

  /// Key required in the `x-api-key` header of dead-letter queries.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub api_key: Option<String>,

  /// Base URL of a remote gateway. If not specified, functions bundled with
  /// this process are invoked in-process.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub functions_url: Option<String>,

  /// Function triggers used when `functions_url` points to a remote gateway.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub functions: Vec<FunctionTrigger>,

  pub retry: RetryConfig,
}

/// A remote function and the event name that triggers it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionTrigger {
  pub id: String,
  pub event: String,
}

impl ServerConfig {
  /// Load configuration from a JSON file.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
      path: path.to_path_buf(),
      source,
    })?;

    let config: ServerConfig =
      serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
      })?;

    config.validate()?;
    Ok(config)
  }

  /// Check values serde cannot reject on its own.
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.retry.multiplier < 1.0 {
      return Err(ConfigError::Invalid {
        field: "retry.multiplier",
        message: format!("must be at least 1.0, got {}", self.retry.multiplier),
      });
    }

    if self.functions_url.is_none() && !self.functions.is_empty() {
      return Err(ConfigError::Invalid {
        field: "functions",
        message: "remote triggers require functions_url".to_string(),
      });
    }

    Ok(())
  }
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      gateway_addr: SocketAddr::from(([127, 0, 0, 1], 3001)),
      ingress_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
      database_url: None,
      api_key: None,
      functions_url: None,
      functions: Vec::new(),
      retry: RetryConfig::default(),
    }
  }
}
