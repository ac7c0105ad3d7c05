//! Framesim Runtime
//!
//! Drives populations of models through repeated frames: output, routing,
//! input, tick. Routing is declared per source model type as topics of
//! field renames; the frame graph is derived from that topology and run on
//! a work-stealing pool.

pub mod boundary;
pub mod cell;
pub mod dag;
pub mod error;
pub mod executor;
pub mod hooks;
pub mod loader;
pub mod model;
pub mod registry;
pub mod scene;
pub mod storage;
pub mod topic;
pub mod transform;
pub mod types;
pub mod value;

pub use error::{Error, Result};
pub use executor::{Engine, RunReport};
pub use hooks::{CallbackHub, ModelHooks, PendingCreationCommand};
pub use loader::{ModelFactory, ModelLibrary, StaticLibrary};
pub use model::{Model, ModelError};
pub use scene::SceneDecl;
pub use types::*;
pub use value::{Record, Value, ValueKind};
