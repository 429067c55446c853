use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use reverb_store::StoreError;
use serde_json::json;
use tracing::error;

/// Errors returned by ingress handlers.
///
/// The display text is the message sent to the client.
#[derive(Debug, thiserror::Error)]
pub enum IngressError {
  /// The time window is incomplete or does not parse.
  #[error("{message}")]
  InvalidRange { message: &'static str },

  /// The request body is not the expected JSON document.
  #[error("{message}")]
  InvalidBody { message: String },

  /// `page` or `limit` is not a usable number.
  #[error("page must be a positive integer and limit a positive integer or -1")]
  InvalidPageParameter,

  /// `count` is not a positive integer.
  #[error("Count is invalid")]
  InvalidCount,

  /// A page beyond the last one was requested.
  #[error("Page not found")]
  PageNotFound,

  /// The requested event or function has no entries.
  #[error("{entity} not found")]
  EntityNotFound { entity: &'static str },

  /// The API key header is missing or wrong.
  #[error("API key invalid")]
  Unauthorized,

  /// The event runner is not accepting events.
  #[error("Event runner is not accepting events")]
  RunnerUnavailable,

  /// The store failed.
  #[error("{context}")]
  Storage {
    context: &'static str,
    #[source]
    source: StoreError,
  },
}

impl IngressError {
  pub fn status_code(&self) -> StatusCode {
    match self {
      Self::InvalidRange { .. }
      | Self::InvalidBody { .. }
      | Self::InvalidPageParameter
      | Self::InvalidCount => StatusCode::BAD_REQUEST,
      Self::PageNotFound | Self::EntityNotFound { .. } => StatusCode::NOT_FOUND,
      Self::Unauthorized => StatusCode::FORBIDDEN,
      Self::RunnerUnavailable => StatusCode::SERVICE_UNAVAILABLE,
      Self::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  pub(crate) fn storage(context: &'static str) -> impl FnOnce(StoreError) -> Self {
    move |source| Self::Storage { context, source }
  }
}

impl From<JsonRejection> for IngressError {
  fn from(rejection: JsonRejection) -> Self {
    Self::InvalidBody {
      message: rejection.body_text(),
    }
  }
}

impl IntoResponse for IngressError {
  fn into_response(self) -> Response {
    if let Self::Storage { source, .. } = &self {
      error!(error = %source, "store_failed");
    }

    let status = self.status_code();
    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}
