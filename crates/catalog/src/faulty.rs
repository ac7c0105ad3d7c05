//! `faulty`: fails on purpose in a chosen phase.
//!
//! `fail_on` is one of `init`, `output`, `input` or `tick`; with
//! `panic: true` the failure is a panic instead of an error. Useful for
//! exercising fault containment from scene files.

use framesim_runtime::value::get_field;
use framesim_runtime::{Model, ModelError, Record, Value};
use linkme::distributed_slice;

use crate::{MODELS, ModelDescriptor, param};

#[distributed_slice(MODELS)]
static FAULTY: ModelDescriptor = ModelDescriptor {
    name: "faulty",
    doc: "Fails (or panics with `panic: true`) in the phase named by `fail_on`.",
    create: || Box::new(Faulty::default()),
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum FailOn {
    #[default]
    Tick,
    Output,
    Input,
}

#[derive(Debug, Default)]
pub struct Faulty {
    id: u64,
    fail_on: FailOn,
    panic: bool,
    out: Record,
}

impl Faulty {
    fn fail(&self, phase: &str) -> Result<(), ModelError> {
        if self.panic {
            panic!("faulty[{}] {phase}", self.id);
        }
        Err(ModelError::new(format!("faulty[{}] {phase}", self.id)))
    }
}

impl Model for Faulty {
    fn init(&mut self, params: &Record) -> Result<(), ModelError> {
        self.id = get_field(params, "ID")?;
        self.panic = param(params, "panic", false)?;
        let fail_on: String = param(params, "fail_on", "tick".to_string())?;
        self.fail_on = match fail_on.as_str() {
            "init" => return self.fail("init"),
            "tick" => FailOn::Tick,
            "output" => FailOn::Output,
            "input" => FailOn::Input,
            other => return Err(ModelError::new(format!("unknown fail_on '{other}'"))),
        };
        Ok(())
    }

    fn tick(&mut self, _delta_ms: f64) -> Result<(), ModelError> {
        if self.fail_on == FailOn::Tick {
            return self.fail("tick");
        }
        Ok(())
    }

    fn set_input(&mut self, _input: &Record) -> Result<(), ModelError> {
        if self.fail_on == FailOn::Input {
            return self.fail("input");
        }
        Ok(())
    }

    fn output(&mut self) -> Result<&mut Record, ModelError> {
        if self.fail_on == FailOn::Output {
            self.fail("output")?;
        }
        self.out.insert("ID".into(), Value::U64(self.id));
        Ok(&mut self.out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(fail_on: &str, panic: bool) -> Record {
        let mut p = Record::new();
        p.insert("ID".into(), Value::U64(3));
        p.insert("fail_on".into(), Value::from(fail_on));
        p.insert("panic".into(), Value::Bool(panic));
        p
    }

    #[test]
    fn test_fails_only_in_chosen_phase() {
        let mut f = Faulty::default();
        f.init(&params("input", false)).unwrap();
        assert!(f.tick(1.0).is_ok());
        assert!(f.output().is_ok());
        let err = f.set_input(&Record::new()).unwrap_err();
        assert_eq!(err.to_string(), "faulty[3] input");
    }

    #[test]
    fn test_init_failure() {
        assert!(Faulty::default().init(&params("init", false)).is_err());
        assert!(Faulty::default().init(&params("never", false)).is_err());
    }

    #[test]
    #[should_panic(expected = "faulty[3] tick")]
    fn test_panic_mode() {
        let mut f = Faulty::default();
        f.init(&params("tick", true)).unwrap();
        let _ = f.tick(1.0);
    }
}
