//! Front-end errors.

use std::path::PathBuf;

use thiserror::Error;

/// Failure reading a YAML scene file.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("cannot read scene {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed scene: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Structurally valid YAML that does not describe a scene.
    #[error("invalid scene: {0}")]
    Invalid(String),
}

/// Failure reading or changing a shell setting.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("unknown cfg '{0}', input \"cfg\" to show all cfg")]
    UnknownKey(String),

    #[error("invalid value '{value}' for {key}: {reason}")]
    Parse {
        key: String,
        value: String,
        reason: String,
    },

    #[error("settings file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed settings file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Failure of one shell command. Never fatal to the shell.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("unknown command, all commands: {0}")]
    UnknownCommand(String),

    #[error("argument count mismatch: {command} takes {expected}, got {found}")]
    ArgCount {
        command: String,
        expected: usize,
        found: usize,
    },

    #[error("invalid argument '{arg}': {reason}")]
    BadArgument { arg: String, reason: String },

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Scene(#[from] SceneError),

    #[error(transparent)]
    Engine(#[from] framesim_runtime::Error),

    #[error("output: {0}")]
    Io(#[from] std::io::Error),
}
