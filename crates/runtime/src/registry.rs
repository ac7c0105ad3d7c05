//! Model registry
//!
//! Owns every live model. Static models are created while loading a scene
//! and are index-stable once the execution graph is built. Dynamic models
//! are appended by the spawn step and are never reordered or removed.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::boundary::contain;
use crate::cell::TaskCell;
use crate::error::{Error, Result};
use crate::hooks::{CallbackHub, ModelHooks};
use crate::loader::ModelLoader;
use crate::model::Model;
use crate::types::{LogLevel, ModelState};
use crate::value::Record;

/// A live model and its metadata.
pub struct ModelEntity {
    pub model_type: String,
    pub id: u64,
    pub side_id: u16,
    /// Output may be taken by the router instead of copied
    pub movable: bool,
    pub state: ModelState,
    pub model: Box<dyn Model>,
}

impl std::fmt::Debug for ModelEntity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelEntity")
            .field("model_type", &self.model_type)
            .field("id", &self.id)
            .field("side_id", &self.side_id)
            .field("movable", &self.movable)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

pub struct ModelRegistry {
    loader: ModelLoader,
    hub: Arc<CallbackHub>,
    statics: Vec<TaskCell<ModelEntity>>,
    dynamics: TaskCell<Vec<ModelEntity>>,
    frozen: bool,
}

impl ModelRegistry {
    pub fn new(hub: Arc<CallbackHub>) -> Self {
        Self {
            loader: ModelLoader::new(),
            hub,
            statics: Vec::new(),
            dynamics: TaskCell::default(),
            frozen: false,
        }
    }

    pub fn loader(&self) -> &ModelLoader {
        &self.loader
    }

    pub fn loader_mut(&mut self) -> &mut ModelLoader {
        &mut self.loader
    }

    pub fn hub(&self) -> &Arc<CallbackHub> {
        &self.hub
    }

    /// Instantiate, attach and initialize one model.
    fn build_entity(&self, id: u64, side_id: u16, model_type: &str, init: &Record) -> Result<ModelEntity> {
        let model = self.loader.instantiate(model_type)?;
        let movable = self.loader.is_movable(model_type).unwrap_or(false);
        let mut entity = ModelEntity {
            model_type: model_type.to_string(),
            id,
            side_id,
            movable,
            state: ModelState::Created,
            model,
        };
        entity
            .model
            .attach(ModelHooks::new(self.hub.clone(), model_type, id, side_id));

        if let Err(fault) = contain(|| entity.model.init(init)) {
            let msg = format!("Exception When Model[{model_type}][{id}] Init: {fault}");
            self.hub.write_log("engine", &msg, LogLevel::Critical);
            return Err(Error::ModelInit {
                model_type: model_type.to_string(),
                id,
                reason: fault.to_string(),
            });
        }
        entity.state = ModelState::Initialized;
        Ok(entity)
    }

    /// Create a model and add it to the static or dynamic collection.
    ///
    /// Nothing is added when init fails. Static creation is refused once
    /// the graph has been built.
    pub fn create_model(
        &mut self,
        id: u64,
        side_id: u16,
        model_type: &str,
        init: &Record,
        dynamic: bool,
    ) -> Result<&ModelEntity> {
        if !dynamic && self.frozen {
            return Err(Error::GraphFrozen {
                model_type: model_type.to_string(),
                id,
            });
        }
        let entity = self.build_entity(id, side_id, model_type, init)?;
        debug!(model_type, id, side_id, dynamic, "model created");
        if dynamic {
            let dynamics = self.dynamics.get_mut();
            dynamics.push(entity);
            Ok(&dynamics[dynamics.len() - 1])
        } else {
            self.statics.push(TaskCell::new(entity));
            let last = self.statics.len() - 1;
            Ok(self.statics[last].get_mut())
        }
    }

    /// Materialize queued creation commands as dynamic models.
    ///
    /// Failures are logged per command and do not stop the drain.
    pub fn spawn_pending(&self) -> usize {
        let pending = self.hub.take_pending();
        if pending.is_empty() {
            return 0;
        }
        let mut created = 0;
        for cmd in pending {
            match self.build_entity(cmd.id, cmd.side_id, &cmd.model_type, &cmd.params) {
                Ok(entity) => {
                    self.dynamics.borrow_mut().push(entity);
                    created += 1;
                }
                Err(err) => {
                    warn!(model_type = %cmd.model_type, id = cmd.id, error = %err, "spawn failed");
                    self.hub.write_log("engine", &err.to_string(), LogLevel::Error);
                }
            }
        }
        debug!(created, "pending models spawned");
        created
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn static_count(&self) -> usize {
        self.statics.len()
    }

    pub fn static_model(&self, index: usize) -> Option<&TaskCell<ModelEntity>> {
        self.statics.get(index)
    }

    pub fn statics_mut(&mut self) -> impl Iterator<Item = &mut ModelEntity> {
        self.statics.iter_mut().map(TaskCell::get_mut)
    }

    pub fn dynamics(&self) -> &TaskCell<Vec<ModelEntity>> {
        &self.dynamics
    }

    pub fn dynamics_mut(&mut self) -> &mut Vec<ModelEntity> {
        self.dynamics.get_mut()
    }

    /// Destroy every model and forget loaded types.
    pub fn clear(&mut self) {
        let count = self.statics.len() + self.dynamics.get_mut().len();
        for entity in self.statics_mut() {
            entity.state = ModelState::Destroyed;
        }
        for entity in self.dynamics.get_mut() {
            entity.state = ModelState::Destroyed;
        }
        self.statics.clear();
        self.dynamics.get_mut().clear();
        self.loader.clear();
        self.hub.clear_pending();
        self.frozen = false;
        if count > 0 {
            info!(count, "models destroyed");
        }
    }
}
