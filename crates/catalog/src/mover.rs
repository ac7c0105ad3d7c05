//! `mover`: a point moving over a longitude/latitude plane.
//!
//! Publishes `ID`, `ForceSideID`, `longitude`, `latitude` and `State`, which
//! is what the shell's plot draws. Inputs may carry `heading` (degrees) or
//! `halt` (bool).

use framesim_runtime::value::get_field;
use framesim_runtime::{Model, ModelError, Record, Value};
use linkme::distributed_slice;

use crate::{MODELS, ModelDescriptor, param};

#[distributed_slice(MODELS)]
static MOVER: ModelDescriptor = ModelDescriptor {
    name: "mover",
    doc: "Moves at `speed` degrees per second along `heading`; bounces off the poles.",
    create: || Box::new(Mover::default()),
};

#[derive(Debug, Default)]
pub struct Mover {
    id: u64,
    side_id: u16,
    longitude: f64,
    latitude: f64,
    heading: f64,
    speed: f64,
    halted: bool,
    out: Record,
}

impl Mover {
    fn state(&self) -> &'static str {
        if self.halted { "halted" } else { "moving" }
    }
}

/// Wrap into [-180, 180).
fn wrap_longitude(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

impl Model for Mover {
    fn init(&mut self, params: &Record) -> Result<(), ModelError> {
        self.id = get_field(params, "ID")?;
        self.side_id = get_field(params, "ForceSideID")?;
        self.longitude = wrap_longitude(param(params, "longitude", 0.0)?);
        self.latitude = param(params, "latitude", 0.0_f64)?.clamp(-90.0, 90.0);
        self.heading = param(params, "heading", 0.0)?;
        self.speed = param(params, "speed", 1.0)?;
        Ok(())
    }

    fn tick(&mut self, delta_ms: f64) -> Result<(), ModelError> {
        if self.halted {
            return Ok(());
        }
        let step = self.speed * delta_ms / 1000.0;
        let (sin, cos) = self.heading.to_radians().sin_cos();
        self.longitude = wrap_longitude(self.longitude + step * cos);
        let lat = self.latitude + step * sin;
        if lat.abs() > 90.0 {
            self.latitude = lat.signum() * 180.0 - lat;
            self.heading = -self.heading;
        } else {
            self.latitude = lat;
        }
        Ok(())
    }

    fn set_input(&mut self, input: &Record) -> Result<(), ModelError> {
        if let Some(heading) = input.get("heading") {
            self.heading = heading.extract()?;
        }
        if let Some(halt) = input.get("halt") {
            self.halted = halt.extract()?;
        }
        Ok(())
    }

    fn output(&mut self) -> Result<&mut Record, ModelError> {
        self.out.insert("ID".into(), Value::U64(self.id));
        self.out.insert("ForceSideID".into(), Value::U16(self.side_id));
        self.out.insert("longitude".into(), Value::F64(self.longitude));
        self.out.insert("latitude".into(), Value::F64(self.latitude));
        self.out.insert("State".into(), Value::from(self.state()));
        Ok(&mut self.out)
    }
}
