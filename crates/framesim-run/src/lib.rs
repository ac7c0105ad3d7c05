//! Framesim shell
//!
//! YAML scene and settings files plus an interactive command loop over the
//! frame engine. Models come from the built-in catalog.

pub mod error;
pub mod scene;
pub mod settings;
pub mod shell;
pub mod view;

pub use error::{SceneError, SettingsError, ShellError};
pub use scene::{load_scene, parse_scene};
pub use settings::Settings;
pub use shell::{Flow, Shell};

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber; `RUST_LOG` overrides the default filter.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,framesim_runtime=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
