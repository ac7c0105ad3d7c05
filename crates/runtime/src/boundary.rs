//! Failure boundary around model calls.
//!
//! [`contain`] turns both a returned [`ModelError`] and a panic into a
//! [`ModelFault`], so one misbehaving model cannot take down a worker.

use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::model::ModelError;

/// A contained failure of one model call.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelFault {
    Failed(ModelError),
    Panicked(String),
}

impl fmt::Display for ModelFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelFault::Failed(err) => write!(f, "{err}"),
            ModelFault::Panicked(msg) => write!(f, "panicked: {msg}"),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Run `f`, containing errors and panics.
pub fn contain<T, F>(f: F) -> Result<T, ModelFault>
where
    F: FnOnce() -> Result<T, ModelError>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(ModelFault::Failed(err)),
        Err(payload) => Err(ModelFault::Panicked(panic_message(payload.as_ref()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contain_ok() {
        assert_eq!(contain(|| Ok(3)), Ok(3));
    }

    #[test]
    fn test_contain_error() {
        let fault = contain::<(), _>(|| Err(ModelError::new("bad input"))).unwrap_err();
        assert_eq!(fault.to_string(), "bad input");
    }

    #[test]
    fn test_contain_panic() {
        let fault = contain::<(), _>(|| panic!("boom {}", 7)).unwrap_err();
        assert_eq!(fault, ModelFault::Panicked("boom 7".to_string()));
    }
}
