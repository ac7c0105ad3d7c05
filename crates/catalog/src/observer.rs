//! `observer`: counts the records routed to it and reports through the hub.

use framesim_runtime::types::LogLevel;
use framesim_runtime::value::get_field;
use framesim_runtime::{Model, ModelError, ModelHooks, Record, Value};
use linkme::distributed_slice;

use crate::{MODELS, ModelDescriptor, param};

#[distributed_slice(MODELS)]
static OBSERVER: ModelDescriptor = ModelDescriptor {
    name: "observer",
    doc: "Counts inputs per frame; logs a summary every `report_every` frames.",
    create: || Box::new(Observer::default()),
};

#[derive(Debug, Default)]
pub struct Observer {
    hooks: Option<ModelHooks>,
    id: u64,
    report_every: i64,
    frame: i64,
    this_frame: u64,
    total: u64,
    out: Record,
}

impl Model for Observer {
    fn attach(&mut self, hooks: ModelHooks) {
        self.hooks = Some(hooks);
    }

    fn init(&mut self, params: &Record) -> Result<(), ModelError> {
        self.id = get_field(params, "ID")?;
        self.report_every = param(params, "report_every", 0)?;
        Ok(())
    }

    fn tick(&mut self, _delta_ms: f64) -> Result<(), ModelError> {
        self.frame += 1;
        if self.report_every > 0 && self.frame % self.report_every == 0 {
            if let Some(hooks) = &self.hooks {
                hooks.log(
                    &format!("frame {}: {} records, {} total", self.frame, self.this_frame, self.total),
                    LogLevel::Info,
                );
            }
        }
        Ok(())
    }

    fn set_input(&mut self, _input: &Record) -> Result<(), ModelError> {
        self.this_frame += 1;
        self.total += 1;
        Ok(())
    }

    fn output(&mut self) -> Result<&mut Record, ModelError> {
        self.out.insert("ID".into(), Value::U64(self.id));
        self.out.insert("seen".into(), Value::U64(self.this_frame));
        self.out.insert("total".into(), Value::U64(self.total));
        self.this_frame = 0;
        Ok(&mut self.out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_per_frame() {
        let mut params = Record::new();
        params.insert("ID".into(), Value::U64(9));
        let mut obs = Observer::default();
        obs.init(&params).unwrap();

        for _ in 0..3 {
            obs.set_input(&Record::new()).unwrap();
        }
        obs.tick(100.0).unwrap();
        let out = obs.output().unwrap();
        assert_eq!(out["seen"], Value::U64(3));

        obs.set_input(&Record::new()).unwrap();
        let out = obs.output().unwrap();
        assert_eq!(out["seen"], Value::U64(1));
        assert_eq!(out["total"], Value::U64(4));
    }
}
