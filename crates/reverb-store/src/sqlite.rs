use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::types::Json;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::{
  DeadLetterRecord, LogEntry, LogFilter, LogLevel, NewLogEntry, Paging, Store, StoreError,
  TimeRange,
};

const LOG_COLUMNS: &str = "id, timestamp, level, message, event_id, func_id, step_id, payload";

/// SQLite-based store implementation.
#[derive(Clone)]
pub struct SqliteStore {
  pool: SqlitePool,
}

impl SqliteStore {
  /// Create a new SQLite store with the given connection pool.
  pub fn new(pool: SqlitePool) -> Self {
    Self { pool }
  }

  /// Open (creating if needed) the database at `url`.
  ///
  /// The database runs in WAL mode so queries can proceed during appends.
  pub async fn connect(url: &str) -> Result<Self, StoreError> {
    let options = SqliteConnectOptions::from_str(url)?
      .create_if_missing(true)
      .journal_mode(SqliteJournalMode::Wal);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    Ok(Self::new(pool))
  }

  /// Run database migrations.
  pub async fn migrate(&self) -> Result<(), StoreError> {
    sqlx::migrate!("../../migrations").run(&self.pool).await?;
    Ok(())
  }
}

fn push_range(query: &mut QueryBuilder<'_, Sqlite>, range: Option<TimeRange>) {
  if let Some(range) = range {
    query
      .push(" AND timestamp >= ")
      .push_bind(range.start)
      .push(" AND timestamp <= ")
      .push_bind(range.end);
  }
}

fn push_paging(query: &mut QueryBuilder<'_, Sqlite>, paging: Paging) {
  if let Paging::Page { limit, .. } = paging {
    query
      .push(" LIMIT ")
      .push_bind(i64::from(limit))
      .push(" OFFSET ")
      .push_bind(i64::try_from(paging.offset()).unwrap_or(i64::MAX));
  }
}

#[async_trait]
impl Store for SqliteStore {
  async fn append_log(&self, entry: &NewLogEntry) -> Result<LogEntry, StoreError> {
    let row = sqlx::query_as(
      r#"
      INSERT INTO logs (timestamp, level, message, event_id, func_id, step_id, payload)
      VALUES (?, ?, ?, ?, ?, ?, ?)
      RETURNING id, timestamp, level, message, event_id, func_id, step_id, payload
      "#,
    )
    .bind(entry.timestamp)
    .bind(entry.level)
    .bind(&entry.message)
    .bind(&entry.event_id)
    .bind(&entry.func_id)
    .bind(&entry.step_id)
    .bind(Json(&entry.payload))
    .fetch_one(&self.pool)
    .await?;

    Ok(row)
  }

  async fn list_logs(&self, filter: &LogFilter, paging: Paging) -> Result<Vec<LogEntry>, StoreError> {
    let mut query = QueryBuilder::new(format!("SELECT {} FROM logs WHERE 1 = 1", LOG_COLUMNS));

    push_range(&mut query, filter.range);
    if let Some(event_id) = &filter.event_id {
      query.push(" AND event_id = ").push_bind(event_id.clone());
    }
    if let Some(func_id) = &filter.func_id {
      query.push(" AND func_id = ").push_bind(func_id.clone());
    }
    if filter.emitted_only {
      query.push(" AND event_id IS NOT NULL AND func_id IS NULL");
    }
    query.push(" ORDER BY timestamp ASC, id ASC");
    push_paging(&mut query, paging);

    let logs = query.build_query_as().fetch_all(&self.pool).await?;
    Ok(logs)
  }

  async fn recent_errors(&self, count: u32) -> Result<Vec<LogEntry>, StoreError> {
    let logs = sqlx::query_as(&format!(
      "SELECT {} FROM logs WHERE level = ? ORDER BY timestamp DESC, id DESC LIMIT ?",
      LOG_COLUMNS
    ))
    .bind(LogLevel::Error)
    .bind(i64::from(count))
    .fetch_all(&self.pool)
    .await?;

    Ok(logs)
  }

  async fn append_dead_letter(&self, record: &DeadLetterRecord) -> Result<(), StoreError> {
    sqlx::query(
      r#"
      INSERT INTO dead_letters (execution_id, function_id, event, error, attempts, timestamp)
      VALUES (?, ?, ?, ?, ?, ?)
      "#,
    )
    .bind(&record.execution_id)
    .bind(&record.function_id)
    .bind(&record.event)
    .bind(&record.error)
    .bind(record.attempts)
    .bind(record.timestamp)
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn list_dead_letters(
    &self,
    range: Option<TimeRange>,
    paging: Paging,
  ) -> Result<Vec<DeadLetterRecord>, StoreError> {
    let mut query = QueryBuilder::new(
      "SELECT execution_id, function_id, event, error, attempts, timestamp FROM dead_letters WHERE 1 = 1",
    );

    push_range(&mut query, range);
    query.push(" ORDER BY timestamp ASC, id ASC");
    push_paging(&mut query, paging);

    let records = query.build_query_as().fetch_all(&self.pool).await?;
    Ok(records)
  }
}
