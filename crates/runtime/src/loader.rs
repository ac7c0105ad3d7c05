//! Model type loading
//!
//! A [`ModelLibrary`] resolves a declared path to a factory. The
//! [`ModelLoader`] keeps one factory per loaded type name together with
//! the type's movable flag.

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::info;

use crate::error::{Error, Result};
use crate::model::Model;

/// Creates a fresh, uninitialized model instance.
pub type ModelFactory = Arc<dyn Fn() -> Box<dyn Model> + Send + Sync>;

/// Resolves a model path to a factory.
pub trait ModelLibrary: Send + Sync {
    fn open(&self, path: &str) -> std::result::Result<ModelFactory, String>;
}

/// Map-backed library for tests and embedders.
#[derive(Default, Clone)]
pub struct StaticLibrary {
    factories: IndexMap<String, ModelFactory>,
}

impl StaticLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F, M>(&mut self, path: &str, create: F) -> &mut Self
    where
        F: Fn() -> M + Send + Sync + 'static,
        M: Model + 'static,
    {
        self.factories.insert(
            path.to_string(),
            Arc::new(move || Box::new(create()) as Box<dyn Model>),
        );
        self
    }

    pub fn with<F, M>(mut self, path: &str, create: F) -> Self
    where
        F: Fn() -> M + Send + Sync + 'static,
        M: Model + 'static,
    {
        self.register(path, create);
        self
    }
}

impl ModelLibrary for StaticLibrary {
    fn open(&self, path: &str) -> std::result::Result<ModelFactory, String> {
        self.factories
            .get(path)
            .cloned()
            .ok_or_else(|| format!("nothing registered at '{path}'"))
    }
}

struct LoadedType {
    factory: ModelFactory,
    movable: bool,
    path: String,
}

/// Loaded model types by name.
#[derive(Default)]
pub struct ModelLoader {
    types: IndexMap<String, LoadedType>,
}

impl ModelLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `path` and register it under `name`, replacing any previous entry.
    pub fn load_library(
        &mut self,
        library: &dyn ModelLibrary,
        name: &str,
        path: &str,
        movable: bool,
    ) -> Result<()> {
        let factory = library.open(path).map_err(|reason| Error::PluginLoad {
            model_type: name.to_string(),
            reason,
        })?;
        info!(model_type = name, path, movable, "model type loaded");
        self.types.insert(
            name.to_string(),
            LoadedType {
                factory,
                movable,
                path: path.to_string(),
            },
        );
        Ok(())
    }

    pub fn instantiate(&self, name: &str) -> Result<Box<dyn Model>> {
        let loaded = self
            .types
            .get(name)
            .ok_or_else(|| Error::UnknownModelType(name.to_string()))?;
        Ok((loaded.factory)())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Movable flag of a loaded type; `None` if not loaded.
    pub fn is_movable(&self, name: &str) -> Option<bool> {
        self.types.get(name).map(|t| t.movable)
    }

    pub fn path(&self, name: &str) -> Option<&str> {
        self.types.get(name).map(|t| t.path.as_str())
    }

    pub fn clear(&mut self) {
        self.types.clear();
    }
}
