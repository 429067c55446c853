use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use reverb_function::{Event, ReceivedEvent};
use reverb_store::{DeadLetterRecord, LogEntry, LogFilter, NewLogEntry, Paging, Store};
use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::IngressError;
use crate::query::LogQuery;

const API_KEY_HEADER: &str = "x-api-key";

/// Shared state of the ingress handlers.
#[derive(Clone)]
pub struct IngressState {
  store: Arc<dyn Store>,
  api_key: Option<String>,
  events: Option<mpsc::Sender<ReceivedEvent>>,
}

impl IngressState {
  pub fn new(store: Arc<dyn Store>) -> Self {
    Self {
      store,
      api_key: None,
      events: None,
    }
  }

  /// Require this key in `x-api-key` for dead-letter listings.
  pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
    self.api_key = api_key;
    self
  }

  /// Forward accepted events to the event runner.
  pub fn with_events(mut self, events: mpsc::Sender<ReceivedEvent>) -> Self {
    self.events = Some(events);
    self
  }

  fn authorize(&self, headers: &HeaderMap) -> Result<(), IngressError> {
    let Some(expected) = &self.api_key else {
      return Ok(());
    };

    let provided = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok());
    if provided == Some(expected.as_str()) {
      Ok(())
    } else {
      warn!("api_key_rejected");
      Err(IngressError::Unauthorized)
    }
  }
}

/// Build the ingress router.
pub fn router(state: IngressState) -> Router {
  Router::new()
    .route("/events", post(receive_event))
    .route("/logs", get(list_logs).post(append_log))
    .route("/logs/events", get(list_emitted_events))
    .route("/logs/events/{event_id}", get(list_event_logs))
    .route("/logs/functions/{func_id}", get(list_function_logs))
    .route("/logs/errors/{count}", get(recent_errors))
    .route("/logs/dead-letter", get(list_dead_letters))
    .with_state(state)
}

#[derive(Debug, Serialize)]
struct DeadLetterPage {
  logs: Vec<DeadLetterRecord>,
}

/// A page past the end is only an error when it is not the first page.
fn check_page<T>(items: &[T], paging: Paging) -> Result<(), IngressError> {
  if items.is_empty() && paging.page() != 1 {
    return Err(IngressError::PageNotFound);
  }
  Ok(())
}

async fn receive_event(
  State(state): State<IngressState>,
  body: Result<Json<Event>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), IngressError> {
  let Json(event) = body?;
  let event_id = uuid::Uuid::new_v4().to_string();
  let entry = NewLogEntry::info("event_received")
    .event_id(&event_id)
    .payload(json!({ "name": event.name, "payload": event.payload }));

  state
    .store
    .append_log(&entry)
    .await
    .map_err(IngressError::storage("Error saving event"))?;
  info!(event_id = %event_id, event = %event.name, "event_received");

  if let Some(events) = &state.events {
    events
      .send(ReceivedEvent::new(&event_id, event))
      .await
      .map_err(|_| IngressError::RunnerUnavailable)?;
  }

  Ok((StatusCode::ACCEPTED, Json(json!({ "eventId": event_id }))))
}

async fn append_log(
  State(state): State<IngressState>,
  body: Result<Json<NewLogEntry>, JsonRejection>,
) -> Result<(StatusCode, Json<LogEntry>), IngressError> {
  let Json(entry) = body?;
  let entry = state
    .store
    .append_log(&entry)
    .await
    .map_err(IngressError::storage("Error saving log"))?;
  debug!(id = entry.id, message = %entry.message, "log_appended");
  Ok((StatusCode::CREATED, Json(entry)))
}

async fn list_logs(
  State(state): State<IngressState>,
  Query(query): Query<LogQuery>,
) -> Result<Json<Vec<LogEntry>>, IngressError> {
  let range = query.optional_range()?;
  let paging = query.paging()?;

  let logs = state
    .store
    .list_logs(&LogFilter::all().in_range(range), paging)
    .await
    .map_err(IngressError::storage("Error retrieving logs"))?;

  check_page(&logs, paging)?;
  Ok(Json(logs))
}

async fn list_emitted_events(
  State(state): State<IngressState>,
  Query(query): Query<LogQuery>,
) -> Result<Json<Vec<LogEntry>>, IngressError> {
  let range = query.required_range()?;
  let paging = query.paging()?;

  let logs = state
    .store
    .list_logs(&LogFilter::emitted(range), paging)
    .await
    .map_err(IngressError::storage("Error retrieving events"))?;

  check_page(&logs, paging)?;
  Ok(Json(logs))
}

async fn list_event_logs(
  State(state): State<IngressState>,
  Path(event_id): Path<String>,
  Query(query): Query<LogQuery>,
) -> Result<Json<Vec<LogEntry>>, IngressError> {
  list_entity(&state, LogFilter::by_event(event_id), &query, "Event").await
}

async fn list_function_logs(
  State(state): State<IngressState>,
  Path(func_id): Path<String>,
  Query(query): Query<LogQuery>,
) -> Result<Json<Vec<LogEntry>>, IngressError> {
  list_entity(&state, LogFilter::by_function(func_id), &query, "Function").await
}

async fn list_entity(
  state: &IngressState,
  filter: LogFilter,
  query: &LogQuery,
  entity: &'static str,
) -> Result<Json<Vec<LogEntry>>, IngressError> {
  let paging = query.paging()?;

  let logs = state
    .store
    .list_logs(&filter, paging)
    .await
    .map_err(IngressError::storage("Error retrieving logs"))?;

  check_page(&logs, paging)?;
  if logs.is_empty() {
    return Err(IngressError::EntityNotFound { entity });
  }
  Ok(Json(logs))
}

async fn recent_errors(
  State(state): State<IngressState>,
  Path(count): Path<String>,
) -> Result<Json<Vec<LogEntry>>, IngressError> {
  let count = count
    .trim()
    .parse::<u32>()
    .ok()
    .filter(|count| *count > 0)
    .ok_or(IngressError::InvalidCount)?;

  let logs = state
    .store
    .recent_errors(count)
    .await
    .map_err(IngressError::storage("Error retrieving errors"))?;
  Ok(Json(logs))
}

async fn list_dead_letters(
  State(state): State<IngressState>,
  headers: HeaderMap,
  Query(query): Query<LogQuery>,
) -> Result<Json<DeadLetterPage>, IngressError> {
  state.authorize(&headers)?;
  let range = query.optional_range()?;
  let paging = query.paging()?;

  let logs = state
    .store
    .list_dead_letters(range, paging)
    .await
    .map_err(IngressError::storage("Error retrieving dead letter items"))?;

  check_page(&logs, paging)?;
  Ok(Json(DeadLetterPage { logs }))
}
