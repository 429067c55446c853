//! Client side of `reverb dlq`.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;

/// How far back the listing reaches when no start time is given.
const DEFAULT_WINDOW_DAYS: i64 = 7;

/// Failures reported to the operator. The display text is what gets printed.
#[derive(Debug, thiserror::Error)]
pub enum DlqError {
  #[error("[FAIL] API Key invalid, please provide correct API Key")]
  Unauthorized,

  #[error("[FAIL] Internal Server Error, try again later")]
  Server,

  #[error("[FAIL] Cannot connect to {url}.")]
  Connect { url: String },

  #[error("invalid {bound} time: '{raw}'")]
  InvalidTime { bound: &'static str, raw: String },
}

/// The time window of a dead-letter listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
  pub start: DateTime<Utc>,
  pub end: DateTime<Utc>,
}

impl Window {
  /// `end` defaults to `now`, `start` to seven days before `end`.
  pub fn resolve(start: Option<&str>, end: Option<&str>, now: DateTime<Utc>) -> Result<Self, DlqError> {
    let end = match end {
      Some(raw) => parse_bound("end", raw)?,
      None => now,
    };
    let start = match start {
      Some(raw) => parse_bound("start", raw)?,
      None => end - Duration::days(DEFAULT_WINDOW_DAYS),
    };
    Ok(Self { start, end })
  }
}

fn parse_bound(bound: &'static str, raw: &str) -> Result<DateTime<Utc>, DlqError> {
  reverb_ingress::parse_time(raw).ok_or_else(|| DlqError::InvalidTime {
    bound,
    raw: raw.to_string(),
  })
}

fn format_time(time: &DateTime<Utc>) -> String {
  time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Fetches dead-letter records from an ingress.
pub struct DeadLetterClient {
  client: reqwest::Client,
  url: String,
  api_key: String,
}

impl DeadLetterClient {
  pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
    Self {
      client: reqwest::Client::new(),
      url: url.into().trim_end_matches('/').to_string(),
      api_key: api_key.into(),
    }
  }

  /// Every record in `window`. Never retried.
  pub async fn fetch(&self, window: &Window) -> Result<Vec<Value>, DlqError> {
    let connect = || DlqError::Connect {
      url: self.url.clone(),
    };

    let response = self
      .client
      .get(format!("{}/logs/dead-letter", self.url))
      .header("x-api-key", &self.api_key)
      .query(&[
        ("limit", "-1".to_string()),
        ("startTime", format_time(&window.start)),
        ("endTime", format_time(&window.end)),
      ])
      .send()
      .await
      .map_err(|e| {
        debug!(error = %e, "dead_letter_request_failed");
        connect()
      })?;

    let status = response.status();
    match status {
      StatusCode::FORBIDDEN => return Err(DlqError::Unauthorized),
      StatusCode::INTERNAL_SERVER_ERROR => return Err(DlqError::Server),
      _ => {}
    }

    if !status.is_success() {
      let message = response.text().await.unwrap_or_default();
      debug!(status = status.as_u16(), error = %message, "dead_letter_request_rejected");
      return Err(connect());
    }

    let mut page: Value = response.json().await.map_err(|e| {
      debug!(error = %e, "dead_letter_response_unreadable");
      connect()
    })?;

    match page.get_mut("logs").map(Value::take) {
      Some(Value::Array(records)) => Ok(records),
      _ => Err(connect()),
    }
  }
}

/// Run `reverb dlq` and print the listing.
pub async fn run(client: &DeadLetterClient, window: &Window) -> Result<(), DlqError> {
  let records = client.fetch(window).await?;

  println!(
    "[Success] Showing dead letter items from {} to {}:\n",
    format_time(&window.start),
    format_time(&window.end)
  );

  if records.is_empty() {
    eprintln!("There are no dead letter items to show");
  }

  for record in records {
    match serde_json::to_string_pretty(&record) {
      Ok(pretty) => println!("{}\n", pretty),
      Err(_) => println!("{}\n", record),
    }
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use chrono::TimeZone;
  use reverb_ingress::IngressState;
  use reverb_store::{DeadLetterRecord, Json, SqliteStore, Store};
  use serde_json::json;
  use sqlx::SqlitePool;
  use sqlx::sqlite::SqlitePoolOptions;

  use super::*;

  async fn pool() -> SqlitePool {
    SqlitePoolOptions::new()
      .max_connections(1)
      .connect("sqlite::memory:")
      .await
      .unwrap()
  }

  async fn serve(store: SqliteStore) -> String {
    let state = IngressState::new(Arc::new(store)).with_api_key(Some("secret".to_string()));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, reverb_ingress::router(state)).await });
    format!("http://{}", addr)
  }

  fn window() -> Window {
    Window {
      start: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
      end: Utc.with_ymd_and_hms(2026, 1, 31, 0, 0, 0).unwrap(),
    }
  }

  #[test]
  fn test_window_defaults_to_last_week() {
    let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
    let window = Window::resolve(None, None, now).unwrap();
    assert_eq!(window.end, now);
    assert_eq!(window.start, Utc.with_ymd_and_hms(2026, 3, 3, 12, 0, 0).unwrap());
  }

  #[test]
  fn test_window_start_follows_given_end() {
    let now = Utc.with_ymd_and_hms(2026, 3, 10, 0, 0, 0).unwrap();
    let window = Window::resolve(None, Some("2026-02-08"), now).unwrap();
    assert_eq!(window.start, Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap());
  }

  #[test]
  fn test_window_rejects_garbage() {
    let err = Window::resolve(Some("yesterday-ish"), None, Utc::now()).unwrap_err();
    assert!(matches!(err, DlqError::InvalidTime { bound: "start", .. }));
  }

  #[test]
  fn test_failure_messages() {
    assert_eq!(
      DlqError::Unauthorized.to_string(),
      "[FAIL] API Key invalid, please provide correct API Key"
    );
    assert_eq!(
      DlqError::Server.to_string(),
      "[FAIL] Internal Server Error, try again later"
    );
    assert_eq!(
      DlqError::Connect {
        url: "http://localhost:3000".to_string()
      }
      .to_string(),
      "[FAIL] Cannot connect to http://localhost:3000."
    );
  }

  #[tokio::test]
  async fn test_fetch_returns_records_in_window() {
    let store = SqliteStore::new(pool().await);
    store.migrate().await.unwrap();
    for (execution_id, month) in [("inside", 1), ("outside", 2)] {
      store
        .append_dead_letter(&DeadLetterRecord {
          execution_id: execution_id.to_string(),
          function_id: "welcome-email".to_string(),
          event: Json(json!({ "name": "user.signup" })),
          error: "boom".to_string(),
          attempts: 4,
          timestamp: Utc.with_ymd_and_hms(2026, month, 15, 0, 0, 0).unwrap(),
        })
        .await
        .unwrap();
    }

    let url = serve(store).await;
    let records = DeadLetterClient::new(url, "secret")
      .fetch(&window())
      .await
      .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["executionId"], "inside");
  }

  #[tokio::test]
  async fn test_fetch_with_wrong_key() {
    let store = SqliteStore::new(pool().await);
    store.migrate().await.unwrap();
    let url = serve(store).await;

    let err = DeadLetterClient::new(url, "wrong").fetch(&window()).await.unwrap_err();
    assert!(matches!(err, DlqError::Unauthorized));
  }

  #[tokio::test]
  async fn test_fetch_when_storage_fails() {
    let pool = pool().await;
    let store = SqliteStore::new(pool.clone());
    store.migrate().await.unwrap();
    pool.close().await;
    let url = serve(store).await;

    let err = DeadLetterClient::new(url, "secret").fetch(&window()).await.unwrap_err();
    assert!(matches!(err, DlqError::Server));
  }

  #[tokio::test]
  async fn test_fetch_with_rejected_request() {
    let store = SqliteStore::new(pool().await);
    store.migrate().await.unwrap();
    let url = format!("{}/missing", serve(store).await);

    let err = DeadLetterClient::new(url.clone(), "secret")
      .fetch(&window())
      .await
      .unwrap_err();
    assert_eq!(err.to_string(), format!("[FAIL] Cannot connect to {}.", url));
  }

  #[tokio::test]
  async fn test_fetch_without_server() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let err = DeadLetterClient::new(url.clone(), "secret")
      .fetch(&window())
      .await
      .unwrap_err();
    assert_eq!(err.to_string(), format!("[FAIL] Cannot connect to {}.", url));
  }
}
