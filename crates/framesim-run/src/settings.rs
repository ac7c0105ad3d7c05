//! Shell settings, persisted as YAML.

use std::path::{Path, PathBuf};

use framesim_runtime::{Engine, EngineSettings, LogLevel};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SettingsError;

/// Keys accepted by `get` and `set`.
pub const KEYS: [&str; 5] = ["loglevel", "logfile", "enablelog", "drawrate", "dt"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Minimum model log level, 0 (trace) to 5 (critical)
    pub loglevel: u8,
    /// Model log mirror; empty for none
    pub logfile: String,
    pub enablelog: bool,
    /// Draw the plot every this many frames; 0 never draws
    pub drawrate: u64,
    /// Milliseconds per tick
    pub dt: f64,
}

impl Default for Settings {
    fn default() -> Self {
        let engine = EngineSettings::default();
        Self {
            loglevel: engine.log_level.as_u8(),
            logfile: String::new(),
            enablelog: engine.enable_log,
            drawrate: 0,
            dt: engine.dt_ms,
        }
    }
}

fn parse_error(key: &str, value: &str, reason: impl ToString) -> SettingsError {
    SettingsError::Parse {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

impl Settings {
    /// Read settings from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        match std::fs::read_to_string(path) {
            Ok(text) if text.trim().is_empty() => Ok(Self::default()),
            Ok(text) => Ok(serde_yaml::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no settings file, using defaults");
                Ok(Self::default())
            }
            Err(source) => Err(SettingsError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let text = serde_yaml::to_string(self)?;
        std::fs::write(path, text).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn get(&self, key: &str) -> Result<String, SettingsError> {
        Ok(match key {
            "loglevel" => self.loglevel.to_string(),
            "logfile" => self.logfile.clone(),
            "enablelog" => u8::from(self.enablelog).to_string(),
            "drawrate" => self.drawrate.to_string(),
            "dt" => self.dt.to_string(),
            _ => return Err(SettingsError::UnknownKey(key.to_string())),
        })
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
        match key {
            "loglevel" => {
                let level: u8 = value.parse().map_err(|e| parse_error(key, value, e))?;
                LogLevel::try_from(level).map_err(|e| parse_error(key, value, e))?;
                self.loglevel = level;
            }
            "logfile" => self.logfile = value.to_string(),
            "enablelog" => {
                self.enablelog = match value {
                    "1" | "true" | "on" => true,
                    "0" | "false" | "off" => false,
                    _ => return Err(parse_error(key, value, "expected 0 or 1")),
                }
            }
            "drawrate" => self.drawrate = value.parse().map_err(|e| parse_error(key, value, e))?,
            "dt" => {
                let dt: f64 = value.parse().map_err(|e| parse_error(key, value, e))?;
                if !dt.is_finite() || dt < 0.0 {
                    return Err(parse_error(key, value, "must be a non-negative number"));
                }
                self.dt = dt;
            }
            _ => return Err(SettingsError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    fn log_file(&self) -> Option<PathBuf> {
        (!self.logfile.is_empty()).then(|| PathBuf::from(&self.logfile))
    }

    pub fn engine_settings(&self, workers: usize) -> EngineSettings {
        EngineSettings {
            dt_ms: self.dt,
            workers,
            log_level: LogLevel::from_u8(self.loglevel).unwrap_or_default(),
            enable_log: self.enablelog,
            log_file: self.log_file(),
        }
    }

    /// Push every setting the engine knows about into `engine`.
    pub fn apply(&self, engine: &mut Engine) -> framesim_runtime::Result<()> {
        let workers = engine.settings().workers;
        engine.apply_settings(self.engine_settings(workers))
    }
}
