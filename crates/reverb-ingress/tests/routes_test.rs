use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use reverb_ingress::{IngressState, router};
use reverb_store::{DeadLetterRecord, NewLogEntry, SqliteStore, Store};
use serde_json::{Value, json};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::types::Json;
use tokio::sync::mpsc;
use tower::ServiceExt;

async fn store() -> Arc<SqliteStore> {
  let pool = SqlitePoolOptions::new()
    .max_connections(1)
    .connect("sqlite::memory:")
    .await
    .unwrap();
  let store = SqliteStore::new(pool);
  store.migrate().await.unwrap();
  Arc::new(store)
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
  let response = app.oneshot(request).await.unwrap();
  let status = response.status();
  let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
  let body = if bytes.is_empty() {
    Value::Null
  } else {
    serde_json::from_slice(&bytes).unwrap()
  };
  (status, body)
}

fn get(uri: &str) -> Request<Body> {
  Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str, body: Value) -> Request<Body> {
  Request::builder()
    .method("POST")
    .uri(uri)
    .header("content-type", "application/json")
    .body(Body::from(body.to_string()))
    .unwrap()
}

#[tokio::test]
async fn test_empty_first_page_and_missing_second_page() {
  let app = router(IngressState::new(store().await));

  let (status, body) = send(app.clone(), get("/logs?page=1")).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body, json!([]));

  let (status, body) = send(app, get("/logs?page=2")).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert_eq!(body, json!({ "error": "Page not found" }));
}

#[tokio::test]
async fn test_range_must_come_in_pairs() {
  let app = router(IngressState::new(store().await));

  let (status, body) = send(app.clone(), get("/logs?startTime=2024-05-01")).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(
    body,
    json!({ "error": "startTime and endTime must be provided together and be valid" })
  );

  let (status, body) = send(app, get("/logs/events")).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(
    body,
    json!({ "error": "No or invalid startTime or endTime provided in URL" })
  );
}

#[tokio::test]
async fn test_bad_page_parameter() {
  let app = router(IngressState::new(store().await));
  let (status, _) = send(app, get("/logs?page=zero")).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_entity_not_found() {
  let app = router(IngressState::new(store().await));

  let (status, body) = send(app.clone(), get("/logs/events/missing")).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert_eq!(body, json!({ "error": "Event not found" }));

  let (status, body) = send(app.clone(), get("/logs/functions/missing")).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert_eq!(body, json!({ "error": "Function not found" }));

  let (status, body) = send(app, get("/logs/functions/missing?page=2")).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert_eq!(body, json!({ "error": "Page not found" }));
}

#[tokio::test]
async fn test_received_event_is_logged_and_forwarded() {
  let store = store().await;
  let (tx, mut rx) = mpsc::channel(8);
  let app = router(IngressState::new(store.clone()).with_events(tx));

  let (status, body) = send(
    app.clone(),
    post("/events", json!({ "name": "order.placed", "payload": { "items": 2 } })),
  )
  .await;
  assert_eq!(status, StatusCode::ACCEPTED);
  let event_id = body["eventId"].as_str().unwrap().to_string();

  let received = rx.recv().await.unwrap();
  assert_eq!(received.event_id, event_id);
  assert_eq!(received.event.name, "order.placed");

  let (status, body) = send(app.clone(), get(&format!("/logs/events/{}", event_id))).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body[0]["message"], "event_received");
  assert_eq!(body[0]["funcId"], Value::Null);

  let start = (Utc::now() - Duration::hours(1)).to_rfc3339();
  let end = (Utc::now() + Duration::hours(1)).to_rfc3339();
  let uri = format!(
    "/logs/events?startTime={}&endTime={}",
    urlencode(&start),
    urlencode(&end)
  );
  let (status, body) = send(app, get(&uri)).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_undecodable_bodies_are_bad_requests() {
  let app = router(IngressState::new(store().await));

  let (status, body) = send(app.clone(), post("/events", json!({ "payload": 1 }))).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(body["error"].as_str().unwrap().contains("name"));

  let (status, body) = send(app.clone(), post("/logs", json!({ "message": "x" }))).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(body["error"].as_str().unwrap().contains("level"));

  let request = Request::builder()
    .method("POST")
    .uri("/events")
    .header("content-type", "application/json")
    .body(Body::from("{ not json"))
    .unwrap();
  let (status, body) = send(app.clone(), request).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(body["error"].is_string());

  let (status, body) = send(app, get("/logs")).await;
  assert_eq!((status, body), (StatusCode::OK, json!([])));
}

#[tokio::test]
async fn test_append_log_and_function_listing() {
  let app = router(IngressState::new(store().await));

  let (status, body) = send(
    app.clone(),
    post(
      "/logs",
      json!({ "level": "info", "message": "step_completed", "funcId": "greet", "stepId": "s1" }),
    ),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  assert!(body["id"].as_i64().is_some());

  let (status, body) = send(app, get("/logs/functions/greet")).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body[0]["stepId"], "s1");
}

#[tokio::test]
async fn test_recent_errors() {
  let store = store().await;
  for i in 0..3 {
    store
      .append_log(&NewLogEntry::error(format!("execution_failed_{}", i)).at(Utc::now() + Duration::seconds(i)))
      .await
      .unwrap();
  }
  let app = router(IngressState::new(store));

  let (status, body) = send(app.clone(), get("/logs/errors/2")).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body.as_array().unwrap().len(), 2);
  assert_eq!(body[0]["message"], "execution_failed_2");

  for bad in ["0", "-3", "many"] {
    let (status, body) = send(app.clone(), get(&format!("/logs/errors/{}", bad))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Count is invalid" }));
  }
}

#[tokio::test]
async fn test_dead_letter_requires_api_key() {
  let store = store().await;
  store
    .append_dead_letter(&DeadLetterRecord {
      execution_id: "exec-1".to_string(),
      function_id: "charge".to_string(),
      event: Json(json!({ "name": "order.placed" })),
      error: "card declined".to_string(),
      attempts: 4,
      timestamp: Utc::now() - Duration::days(1),
    })
    .await
    .unwrap();
  let app = router(IngressState::new(store).with_api_key(Some("secret".to_string())));

  let (status, _) = send(app.clone(), get("/logs/dead-letter?limit=-1")).await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let request = Request::builder()
    .uri("/logs/dead-letter?limit=-1")
    .header("x-api-key", "secret")
    .body(Body::empty())
    .unwrap();
  let (status, body) = send(app, request).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["logs"][0]["executionId"], "exec-1");
  assert_eq!(body["logs"][0]["attempts"], 4);
}

fn urlencode(raw: &str) -> String {
  raw.replace('+', "%2B").replace(':', "%3A")
}
