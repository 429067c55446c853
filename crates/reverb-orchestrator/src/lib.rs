//! Reverb Orchestrator
//!
//! Drives executions of Reverb functions to completion and turns received
//! events into executions.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        EventRunner                          │
//! │  - owns mpsc channel of received events                     │
//! │  - start(cancel) spawns one execution per matching function │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Orchestrator                          │
//! │  - execute(function, event, event_id, cancel) → report      │
//! │  - applies complete / delay / invoke / done                 │
//! │  - retries with backoff, then writes a dead-letter record   │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Invoker (local | HTTP)                    │
//! │  - one JSON-RPC round trip to the gateway per step          │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod error;
mod events;
mod invoker;
mod orchestrator;
mod runner;

pub use error::{InvokeError, OrchestratorError};
pub use events::{ChannelNotifier, ExecutionEvent, ExecutionNotifier, NoopNotifier};
pub use invoker::{HttpInvoker, Invoker, LocalInvoker};
pub use orchestrator::{ExecutionReport, MAX_NESTING_DEPTH, Orchestrator};
pub use runner::{EventRunner, Trigger};
