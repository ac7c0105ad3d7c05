//! Runtime errors for loading and driving a simulation.
//!
//! # Error Categories
//!
//! - **Setup errors**: [`Error::Config`], [`Error::PluginLoad`], [`Error::UnknownModelType`],
//!   [`Error::ModelInit`]
//! - **Routing errors**: [`Error::RoutingDefect`]
//! - **Value errors**: [`Error::TypeMismatch`], [`Error::MissingField`]
//! - **Graph errors**: [`Error::GraphFrozen`], [`Error::GraphBuild`]
//!
//! Faults raised by a model while frames are running never become an [`Error`].
//! They are contained at the model-call boundary and logged, see
//! [`crate::boundary`].

use thiserror::Error;

use crate::value::ValueKind;

/// Runtime result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the runtime to its caller.
#[derive(Debug, Error)]
pub enum Error {
    /// A scene declaration is malformed or references something undeclared.
    ///
    /// Fatal to loading; the run does not start.
    #[error("config error: {0}")]
    Config(String),

    /// A model type could not be resolved by the model library.
    #[error("failed to load model type '{model_type}': {reason}")]
    PluginLoad {
        /// Declared model type name.
        model_type: String,
        /// What the library reported.
        reason: String,
    },

    /// A model instance was requested for a type that was never loaded.
    #[error("no such model type: {0}")]
    UnknownModelType(String),

    /// A model's init entry point failed or panicked.
    #[error("model {model_type}[{id}] failed to initialize: {reason}")]
    ModelInit {
        /// Model type name.
        model_type: String,
        /// Requested instance id.
        id: u64,
        /// Failure description from the boundary.
        reason: String,
    },

    /// A transform rule was declared with an empty action list.
    ///
    /// An action list must name at least one destination. An empty list is a
    /// programming error, never a silent no-op.
    #[error("routing defect: rule {source_type}.{field} has no actions")]
    RoutingDefect {
        /// Source model type of the rule.
        source_type: String,
        /// Source field of the rule.
        field: String,
    },

    /// Typed extraction found a different variant.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Requested kind.
        expected: ValueKind,
        /// Kind actually held.
        found: ValueKind,
    },

    /// A record lacked a field required by the caller.
    #[error("missing field: {0}")]
    MissingField(String),

    /// Static models cannot be added once the execution graph is built.
    #[error("static model {model_type}[{id}] rejected: execution graph already built")]
    GraphFrozen {
        /// Model type name.
        model_type: String,
        /// Requested instance id.
        id: u64,
    },

    /// The task graph failed validation.
    #[error("invalid task graph: {0}")]
    GraphBuild(String),
}
