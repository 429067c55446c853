//! Reverb Ingress
//!
//! The HTTP adapter in front of the [`Store`](reverb_store::Store):
//!
//! - `POST /events` logs an event and hands it to the event runner
//! - `POST /logs` appends a log entry
//! - `GET /logs`, `/logs/events`, `/logs/events/{event_id}`,
//!   `/logs/functions/{func_id}` list entries page by page
//! - `GET /logs/errors/{count}` returns the most recent errors
//! - `GET /logs/dead-letter` lists dead-letter records (API key protected)
//!
//! Error responses are `{ "error": "<message>" }`.

mod error;
mod query;
mod routes;

pub use error::IngressError;
pub use query::{LogQuery, parse_time};
pub use routes::{IngressState, router};
