use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use sqlx::types::Json;

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum LogLevel {
  Debug,
  Info,
  Warn,
  Error,
}

/// A log entry as stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
  pub id: i64,
  pub timestamp: DateTime<Utc>,
  pub level: LogLevel,
  pub message: String,
  pub event_id: Option<String>,
  pub func_id: Option<String>,
  pub step_id: Option<String>,
  pub payload: Json<Value>,
}

/// A log entry before the store has assigned it an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLogEntry {
  #[serde(default = "Utc::now")]
  pub timestamp: DateTime<Utc>,
  pub level: LogLevel,
  pub message: String,
  #[serde(default)]
  pub event_id: Option<String>,
  #[serde(default)]
  pub func_id: Option<String>,
  #[serde(default)]
  pub step_id: Option<String>,
  #[serde(default)]
  pub payload: Value,
}

impl NewLogEntry {
  pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
    Self {
      timestamp: Utc::now(),
      level,
      message: message.into(),
      event_id: None,
      func_id: None,
      step_id: None,
      payload: Value::Null,
    }
  }

  pub fn info(message: impl Into<String>) -> Self {
    Self::new(LogLevel::Info, message)
  }

  pub fn error(message: impl Into<String>) -> Self {
    Self::new(LogLevel::Error, message)
  }

  pub fn event_id(mut self, event_id: impl Into<String>) -> Self {
    self.event_id = Some(event_id.into());
    self
  }

  pub fn func_id(mut self, func_id: impl Into<String>) -> Self {
    self.func_id = Some(func_id.into());
    self
  }

  pub fn step_id(mut self, step_id: impl Into<String>) -> Self {
    self.step_id = Some(step_id.into());
    self
  }

  pub fn payload(mut self, payload: Value) -> Self {
    self.payload = payload;
    self
  }

  pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
    self.timestamp = timestamp;
    self
  }
}

/// An execution that failed terminally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetterRecord {
  pub execution_id: String,
  pub function_id: String,
  pub event: Json<Value>,
  pub error: String,
  pub attempts: i32,
  pub timestamp: DateTime<Utc>,
}

/// Inclusive time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
  pub start: DateTime<Utc>,
  pub end: DateTime<Utc>,
}

impl TimeRange {
  pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
    Self { start, end }
  }
}

/// How many rows a listing returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Paging {
  /// Every matching row.
  Unbounded,
  /// One 1-based page of `limit` rows.
  Page { page: u32, limit: u32 },
}

impl Paging {
  pub fn offset(&self) -> u64 {
    match self {
      Self::Unbounded => 0,
      Self::Page { page, limit } => u64::from(page.saturating_sub(1)) * u64::from(*limit),
    }
  }

  /// The requested page number; an unbounded listing is a single first page.
  pub fn page(&self) -> u32 {
    match self {
      Self::Unbounded => 1,
      Self::Page { page, .. } => *page,
    }
  }
}

/// Filter for log listings. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogFilter {
  pub range: Option<TimeRange>,
  pub event_id: Option<String>,
  pub func_id: Option<String>,
  /// Only entries written when an event was received: an event id and no
  /// function id.
  pub emitted_only: bool,
}

impl LogFilter {
  pub fn all() -> Self {
    Self::default()
  }

  pub fn in_range(mut self, range: Option<TimeRange>) -> Self {
    self.range = range;
    self
  }

  pub fn by_event(event_id: impl Into<String>) -> Self {
    Self {
      event_id: Some(event_id.into()),
      ..Self::default()
    }
  }

  pub fn by_function(func_id: impl Into<String>) -> Self {
    Self {
      func_id: Some(func_id.into()),
      ..Self::default()
    }
  }

  pub fn emitted(range: TimeRange) -> Self {
    Self {
      range: Some(range),
      emitted_only: true,
      ..Self::default()
    }
  }
}
