//! Reverb Function
//!
//! This crate provides the types a function author works with and the
//! registry the gateway resolves methods from.
//!
//! A function is a plain, synchronous handler that receives the triggering
//! [`Event`] and a [`Step`] context. Each unit of side-effecting work is
//! declared through the step context under a stable id:
//!
//! ```ignore
//! let greet = FunctionDescriptor::from_fn("greet", "user.created", |event, step| {
//!   let name: String = step.run("lookup", || Ok("ada".to_string()))?;
//!   step.sleep("wait", Duration::from_secs(5))?;
//!   let card: Value = step.invoke("render", "render-card", json!({ "name": name }))?;
//!   Ok(json!({ "card": card }))
//! });
//! ```
//!
//! The handler body is re-run from the top on every invocation. Steps whose id
//! is already in the [`StepCache`] return the cached value immediately; the
//! first uncached step is evaluated and suspends the body through `?`,
//! leaving a single [`StepOutcome`] for the orchestrator to act on.

mod error;
mod event;
mod function;
mod registry;
mod step;

pub use error::{CacheError, HandlerFailure, RegistryError, StepError};
pub use event::{Event, ReceivedEvent};
pub use function::{FunctionDescriptor, Handler};
pub use registry::{FunctionRegistry, RegistryBuilder};
pub use step::{Step, StepCache, StepOutcome};
