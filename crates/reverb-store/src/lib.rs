//! Reverb Store
//!
//! This crate provides the storage trait and implementations for execution
//! logs and dead-letter records. Data is persisted to a SQLite database.
//!
//! The [`Store`] trait defines operations for:
//! - Appending log entries and listing them by time, event or function
//! - Fetching the most recent error entries
//! - Appending and listing dead-letter records

mod sqlite;
mod types;

pub use sqlite::SqliteStore;
pub use sqlx::types::Json;
pub use types::{
  DeadLetterRecord, LogEntry, LogFilter, LogLevel, NewLogEntry, Paging, TimeRange,
};

use async_trait::async_trait;

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  /// A database error occurred.
  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),

  /// Applying migrations failed.
  #[error("migration error: {0}")]
  Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Storage trait for logs and dead-letter records.
///
/// Both collections are append-only and ordered by timestamp.
#[async_trait]
pub trait Store: Send + Sync {
  /// Append a log entry and return it with its assigned id.
  async fn append_log(&self, entry: &NewLogEntry) -> Result<LogEntry, StoreError>;

  /// List log entries matching `filter`, oldest first.
  async fn list_logs(&self, filter: &LogFilter, paging: Paging) -> Result<Vec<LogEntry>, StoreError>;

  /// The `count` most recent error entries, newest first.
  async fn recent_errors(&self, count: u32) -> Result<Vec<LogEntry>, StoreError>;

  /// Append a dead-letter record.
  async fn append_dead_letter(&self, record: &DeadLetterRecord) -> Result<(), StoreError>;

  /// List dead-letter records, oldest first, optionally within `range`.
  async fn list_dead_letters(
    &self,
    range: Option<TimeRange>,
    paging: Paging,
  ) -> Result<Vec<DeadLetterRecord>, StoreError>;
}
