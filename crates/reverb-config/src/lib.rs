//! Reverb Config
//!
//! This crate contains the serializable configuration types for a Reverb
//! process: listener addresses, the store location, the operator API key and
//! the retry policy the orchestrator applies before dead-lettering.
//!
//! Configuration is loaded from a JSON file. Every field has a default, so an
//! empty object (or no file at all) yields a usable local setup.

mod error;
mod retry;
mod server;

pub use error::ConfigError;
pub use retry::RetryConfig;
pub use server::{FunctionTrigger, ServerConfig};
