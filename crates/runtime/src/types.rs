//! Core runtime types
//!
//! Lifecycle enums and engine settings shared by the registry, the
//! executor and the front-ends.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Severity of a model-originated log line, 0 (trace) through 5 (critical).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Critical = 5,
}

impl LogLevel {
    pub fn from_u8(level: u8) -> Option<Self> {
        match level {
            0 => Some(LogLevel::Trace),
            1 => Some(LogLevel::Debug),
            2 => Some(LogLevel::Info),
            3 => Some(LogLevel::Warn),
            4 => Some(LogLevel::Error),
            5 => Some(LogLevel::Critical),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Trace
    }
}

impl TryFrom<u8> for LogLevel {
    type Error = String;

    fn try_from(level: u8) -> Result<Self, String> {
        LogLevel::from_u8(level).ok_or_else(|| format!("log level {level} out of range 0..=5"))
    }
}

impl From<LogLevel> for u8 {
    fn from(level: LogLevel) -> Self {
        level.as_u8()
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        };
        f.write_str(name)
    }
}

/// Lifecycle state of a model instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ModelState {
    #[default]
    Created,
    Initialized,
    Running,
    Destroyed,
    Error,
}

/// The per-model step being executed; used to label contained faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Init,
    Output,
    Input,
    Tick,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Init => "Init",
            Phase::Output => "Output",
            Phase::Input => "Input",
            Phase::Tick => "Tick",
        };
        f.write_str(name)
    }
}

/// Engine-wide settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Simulated milliseconds passed to every tick
    pub dt_ms: f64,
    /// Worker threads; 0 lets rayon pick
    pub workers: usize,
    /// Minimum level for model-originated log lines
    pub log_level: LogLevel,
    pub enable_log: bool,
    /// Optional file receiving model-originated log lines
    pub log_file: Option<PathBuf>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            dt_ms: 100.0,
            workers: 0,
            log_level: LogLevel::Trace,
            enable_log: true,
            log_file: None,
        }
    }
}
