//! Built-in Model Catalog.
//!
//! Model types register themselves into [`MODELS`] with
//! [`linkme::distributed_slice`]; at link time every registration in the
//! final binary is collected, and [`Catalog`] resolves scene paths against
//! them by name.
//!
//! # Example Registration
//!
//! ```ignore
//! use framesim_catalog::{MODELS, ModelDescriptor};
//! use framesim_catalog::linkme::distributed_slice;
//!
//! #[distributed_slice(MODELS)]
//! static IDLE: ModelDescriptor = ModelDescriptor {
//!     name: "idle",
//!     doc: "Does nothing.",
//!     create: || Box::new(Idle::default()),
//! };
//! ```
//!
//! # Example Lookup
//!
//! A scene may refer to a built-in as `mover` or `builtin:mover`:
//!
//! ```
//! use framesim_catalog::Catalog;
//! use framesim_runtime::ModelLibrary;
//!
//! assert!(Catalog.open("builtin:mover").is_ok());
//! assert!(Catalog.open("libmissing.so").is_err());
//! ```

pub use linkme;

use std::sync::Arc;

use framesim_runtime::value::FromValue;
use framesim_runtime::{Model, ModelError, ModelFactory, ModelLibrary, Record};
use linkme::distributed_slice;

pub mod counter;
pub mod faulty;
pub mod mover;
pub mod observer;
pub mod spawner;

/// Prefix accepted in front of catalog names.
pub const BUILTIN_PREFIX: &str = "builtin:";

/// Descriptor for a registered model type
pub struct ModelDescriptor {
    /// Catalog name, as written in scene files
    pub name: &'static str,
    /// One-line description
    pub doc: &'static str,
    pub create: fn() -> Box<dyn Model>,
}

/// Distributed slice collecting all built-in model registrations.
#[distributed_slice]
pub static MODELS: [ModelDescriptor];

/// Get all registered model names
pub fn all_names() -> impl Iterator<Item = &'static str> {
    MODELS.iter().map(|m| m.name)
}

/// Look up a model by name, with or without the builtin prefix
pub fn get(name: &str) -> Option<&'static ModelDescriptor> {
    let name = name.strip_prefix(BUILTIN_PREFIX).unwrap_or(name);
    MODELS.iter().find(|m| m.name == name)
}

pub fn is_known(name: &str) -> bool {
    get(name).is_some()
}

/// [`ModelLibrary`] backed by [`MODELS`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Catalog;

impl ModelLibrary for Catalog {
    fn open(&self, path: &str) -> Result<ModelFactory, String> {
        let descriptor = get(path).ok_or_else(|| {
            let known: Vec<&str> = all_names().collect();
            format!("no built-in model '{path}' (known: {})", known.join(", "))
        })?;
        let create = descriptor.create;
        Ok(Arc::new(create))
    }
}

/// Optional init parameter: absent yields `default`, a wrong type is an error.
pub fn param<T: FromValue>(params: &Record, key: &str, default: T) -> Result<T, ModelError> {
    match params.get(key) {
        None => Ok(default),
        Some(value) => value
            .extract()
            .map_err(|e| ModelError::new(format!("parameter '{key}': {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use framesim_runtime::Value;

    #[test]
    fn test_builtins_registered() {
        for name in ["counter", "mover", "observer", "spawner", "faulty"] {
            assert!(is_known(name), "{name} missing");
        }
        assert!(is_known("builtin:counter"));
        assert!(!is_known("builtin:"));
    }

    #[test]
    fn test_open_unknown_lists_known() {
        let err = match Catalog.open("ghost") {
            Err(e) => e,
            Ok(_) => panic!("ghost resolved"),
        };
        assert!(err.contains("ghost"));
        assert!(err.contains("mover"));
    }

    #[test]
    fn test_param() {
        let mut params = Record::new();
        params.insert("speed".into(), Value::F64(2.5));
        assert_eq!(param(&params, "speed", 1.0).unwrap(), 2.5);
        assert_eq!(param(&params, "absent", 1.0).unwrap(), 1.0);
        assert!(param(&params, "speed", 1i64).is_err());
    }
}
