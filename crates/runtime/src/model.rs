//! Model contract
//!
//! Every simulated entity implements [`Model`]. The engine owns the boxed
//! instance and calls it from worker threads, one phase at a time; a model
//! is never called concurrently with itself.

use thiserror::Error;

use crate::hooks::ModelHooks;
use crate::value::Record;

/// Failure reported by a model entry point.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{0}")]
pub struct ModelError(pub String);

impl ModelError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

impl From<crate::Error> for ModelError {
    fn from(err: crate::Error) -> Self {
        Self(err.to_string())
    }
}

/// A simulated entity.
pub trait Model: Send {
    /// Receive the hooks bound to this instance. Called once, before `init`.
    fn attach(&mut self, hooks: ModelHooks) {
        let _ = hooks;
    }

    fn init(&mut self, params: &Record) -> Result<(), ModelError>;

    /// Advance simulated time by `delta_ms`.
    fn tick(&mut self, delta_ms: f64) -> Result<(), ModelError>;

    /// Deliver one routed record. Called once per record addressed to this
    /// model's type in the current frame.
    fn set_input(&mut self, input: &Record) -> Result<(), ModelError>;

    /// Expose this frame's output.
    ///
    /// For a model declared movable, the engine moves every routed field
    /// out of the returned record; fields no rule routes are left in place.
    fn output(&mut self) -> Result<&mut Record, ModelError>;
}
