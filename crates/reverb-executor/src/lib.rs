//! Step execution for Reverb functions.
//!
//! This crate provides the [`StepExecutor`], the state machine that advances
//! one execution of a function by a single step:
//!
//! ```text
//! Pending ─► Running ─┬─► StepEmitted(complete | delay | invoke) ─► Running (on resume)
//!                     ├─► Done
//!                     └─► Failed
//! ```
//!
//! The executor is pure with respect to the execution: it reads an
//! [`ExecutionState`] and returns the next [`StepOutcome`]. Recording the
//! outcome into the state, sleeping, and running nested functions are left to
//! the orchestrator.
//!
//! [`StepOutcome`]: reverb_function::StepOutcome

mod error;
mod executor;
mod state;

pub use error::ExecutionError;
pub use executor::StepExecutor;
pub use state::ExecutionState;
