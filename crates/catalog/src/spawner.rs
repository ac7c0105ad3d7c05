//! `spawner`: requests new models while the simulation runs.
//!
//! Every `interval` ticks it asks the hub to create one `child_type` model,
//! up to `limit` children. Child ids are `ID * 1000 + n`, starting at 1.
//! Children inherit the spawner's side and position.

use framesim_runtime::types::LogLevel;
use framesim_runtime::value::get_field;
use framesim_runtime::{Model, ModelError, ModelHooks, Record, Value};
use linkme::distributed_slice;

use crate::{MODELS, ModelDescriptor, param};

#[distributed_slice(MODELS)]
static SPAWNER: ModelDescriptor = ModelDescriptor {
    name: "spawner",
    doc: "Creates a `child_type` model every `interval` ticks, at most `limit` times.",
    create: || Box::new(Spawner::default()),
};

#[derive(Debug, Default)]
pub struct Spawner {
    hooks: Option<ModelHooks>,
    id: u64,
    interval: i64,
    limit: i64,
    child_type: String,
    child_params: Record,
    ticks: i64,
    spawned: i64,
    out: Record,
}

impl Spawner {
    fn request_child(&mut self) -> Result<(), ModelError> {
        let hooks = self
            .hooks
            .as_ref()
            .ok_or_else(|| ModelError::new("spawner used before attach"))?;
        let child_id = self
            .id
            .checked_mul(1000)
            .and_then(|base| base.checked_add(self.spawned as u64 + 1))
            .ok_or_else(|| ModelError::new(format!("child id of spawner {} overflows u64", self.id)))?;
        let reply = hooks.create_entity(
            &self.child_type,
            child_id,
            hooks.side_id(),
            self.child_params.clone(),
        );
        if !reply.is_empty() {
            return Err(ModelError::new(reply));
        }
        hooks.log(
            &format!("requested {}[{child_id}]", self.child_type),
            LogLevel::Debug,
        );
        self.spawned += 1;
        Ok(())
    }
}

impl Model for Spawner {
    fn attach(&mut self, hooks: ModelHooks) {
        self.hooks = Some(hooks);
    }

    fn init(&mut self, params: &Record) -> Result<(), ModelError> {
        self.id = get_field(params, "ID")?;
        self.interval = param(params, "interval", 10)?;
        self.limit = param(params, "limit", 5)?;
        self.child_type = param(params, "child_type", "mover".to_string())?;
        if self.interval <= 0 {
            return Err(ModelError::new("interval must be positive"));
        }
        for key in ["longitude", "latitude", "speed", "heading"] {
            if let Some(value) = params.get(key) {
                self.child_params.insert(key.to_string(), value.clone());
            }
        }
        Ok(())
    }

    fn tick(&mut self, _delta_ms: f64) -> Result<(), ModelError> {
        self.ticks += 1;
        if self.spawned < self.limit && self.ticks % self.interval == 0 {
            self.request_child()?;
        }
        Ok(())
    }

    fn set_input(&mut self, _input: &Record) -> Result<(), ModelError> {
        Ok(())
    }

    fn output(&mut self) -> Result<&mut Record, ModelError> {
        self.out.insert("ID".into(), Value::U64(self.id));
        self.out.insert("spawned".into(), Value::I64(self.spawned));
        Ok(&mut self.out)
    }
}
