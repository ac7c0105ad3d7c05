//! `counter`: publishes how many ticks it has seen.

use framesim_runtime::value::get_field;
use framesim_runtime::{Model, ModelError, Record, Value};
use linkme::distributed_slice;

use crate::{MODELS, ModelDescriptor, param};

#[distributed_slice(MODELS)]
static COUNTER: ModelDescriptor = ModelDescriptor {
    name: "counter",
    doc: "Publishes ID, ForceSideID and a tick count scaled by `step`.",
    create: || Box::new(Counter::default()),
};

#[derive(Debug, Default)]
pub struct Counter {
    id: u64,
    side_id: u16,
    step: i64,
    count: i64,
    out: Record,
}

impl Model for Counter {
    fn init(&mut self, params: &Record) -> Result<(), ModelError> {
        self.id = get_field(params, "ID")?;
        self.side_id = get_field(params, "ForceSideID")?;
        self.step = param(params, "step", 1)?;
        self.count = param(params, "start", 0)?;
        Ok(())
    }

    fn tick(&mut self, _delta_ms: f64) -> Result<(), ModelError> {
        self.count += self.step;
        Ok(())
    }

    fn set_input(&mut self, _input: &Record) -> Result<(), ModelError> {
        Ok(())
    }

    fn output(&mut self) -> Result<&mut Record, ModelError> {
        self.out.insert("ID".into(), Value::U64(self.id));
        self.out.insert("ForceSideID".into(), Value::U16(self.side_id));
        self.out.insert("count".into(), Value::I64(self.count));
        Ok(&mut self.out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_by_step() {
        let mut params = Record::new();
        params.insert("ID".into(), Value::U64(4));
        params.insert("ForceSideID".into(), Value::U16(1));
        params.insert("step".into(), Value::I64(3));

        let mut counter = Counter::default();
        counter.init(&params).unwrap();
        counter.tick(100.0).unwrap();
        counter.tick(100.0).unwrap();
        let out = counter.output().unwrap();
        assert_eq!(out["count"], Value::I64(6));
        assert_eq!(out["ID"], Value::U64(4));
    }

    #[test]
    fn test_requires_identity() {
        let mut counter = Counter::default();
        assert!(counter.init(&Record::new()).is_err());
    }
}
