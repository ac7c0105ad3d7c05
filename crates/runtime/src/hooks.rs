//! Callback hub
//!
//! Models talk back to the engine through [`ModelHooks`]: log lines and
//! generic commands. Everything lands in one [`CallbackHub`] owned by the
//! engine and shared by `Arc`, so several engines can coexist in a process.
//!
//! The only command understood today is `CreateEntity`, which queues a
//! [`PendingCreationCommand`] for the next frame's spawn step.

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use parking_lot::Mutex;
use tracing::{debug, error, info, trace, warn};

use crate::error::Result;
use crate::types::LogLevel;
use crate::value::{Record, Value, get_field};

/// Command name that requests a new dynamic model.
pub const CREATE_ENTITY: &str = "CreateEntity";

/// A queued request for a new dynamic model.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingCreationCommand {
    pub id: u64,
    pub side_id: u16,
    /// Full parameter record, passed to the new model's `init`
    pub params: Record,
    pub model_type: String,
}

impl PendingCreationCommand {
    /// Parse a `CreateEntity` parameter record.
    ///
    /// `ID: u64`, `ForceSideID: u16` and `ModelID: string` are required with
    /// exactly those types.
    pub fn from_params(params: &Record) -> Result<Self> {
        Ok(Self {
            id: get_field(params, "ID")?,
            side_id: get_field(params, "ForceSideID")?,
            model_type: get_field(params, "ModelID")?,
            params: params.clone(),
        })
    }
}

#[derive(Default)]
struct HubState {
    writer: Option<Box<dyn Write + Send>>,
    pending: Vec<PendingCreationCommand>,
}

/// Shared sink for model logs and commands.
pub struct CallbackHub {
    state: Mutex<HubState>,
    level: AtomicU8,
    enabled: AtomicBool,
}

impl Default for CallbackHub {
    fn default() -> Self {
        Self::new(LogLevel::Trace, true)
    }
}

impl std::fmt::Debug for CallbackHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackHub")
            .field("level", &self.level())
            .field("enabled", &self.enabled())
            .finish_non_exhaustive()
    }
}

impl CallbackHub {
    pub fn new(level: LogLevel, enabled: bool) -> Self {
        Self {
            state: Mutex::new(HubState::default()),
            level: AtomicU8::new(level.as_u8()),
            enabled: AtomicBool::new(enabled),
        }
    }

    pub fn level(&self) -> LogLevel {
        LogLevel::from_u8(self.level.load(Ordering::Relaxed)).unwrap_or_default()
    }

    pub fn set_level(&self, level: LogLevel) {
        self.level.store(level.as_u8(), Ordering::Relaxed);
    }

    pub fn enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Replace the secondary log writer. `None` keeps only tracing output.
    pub fn set_writer(&self, writer: Option<Box<dyn Write + Send>>) {
        let mut state = self.state.lock();
        if let Some(old) = state.writer.as_mut() {
            let _ = old.flush();
        }
        state.writer = writer;
    }

    pub fn flush(&self) {
        if let Some(writer) = self.state.lock().writer.as_mut() {
            let _ = writer.flush();
        }
    }

    /// Record one log line from `source`, subject to level and enable flag.
    pub fn write_log(&self, source: &str, msg: &str, level: LogLevel) {
        if !self.enabled() || level < self.level() {
            return;
        }
        match level {
            LogLevel::Trace => trace!(target: "framesim::model", source, "{msg}"),
            LogLevel::Debug => debug!(target: "framesim::model", source, "{msg}"),
            LogLevel::Info => info!(target: "framesim::model", source, "{msg}"),
            LogLevel::Warn => warn!(target: "framesim::model", source, "{msg}"),
            LogLevel::Error | LogLevel::Critical => {
                error!(target: "framesim::model", source, "{msg}")
            }
        }
        if let Some(writer) = self.state.lock().writer.as_mut() {
            let _ = writeln!(writer, "[{level}] {source}: {msg}");
        }
    }

    /// Handle a generic command. Returns an empty string on success and
    /// the error text otherwise.
    pub fn dispatch(&self, command: &str, params: &Record) -> String {
        if command != CREATE_ENTITY {
            let msg = format!("unsupported command: {command}");
            self.write_log("engine", &msg, LogLevel::Warn);
            return msg;
        }
        match PendingCreationCommand::from_params(params) {
            Ok(cmd) => {
                debug!(model_type = %cmd.model_type, id = cmd.id, "creation queued");
                self.state.lock().pending.push(cmd);
                String::new()
            }
            Err(err) => {
                let msg = format!("{CREATE_ENTITY} rejected: {err}");
                self.write_log("engine", &msg, LogLevel::Error);
                msg
            }
        }
    }

    /// Drain queued creation commands in arrival order.
    pub fn take_pending(&self) -> Vec<PendingCreationCommand> {
        std::mem::take(&mut self.state.lock().pending)
    }

    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn clear_pending(&self) {
        self.state.lock().pending.clear();
    }
}

/// Per-instance handle given to a model in [`Model::attach`](crate::model::Model::attach).
#[derive(Debug, Clone)]
pub struct ModelHooks {
    hub: Arc<CallbackHub>,
    model_type: Arc<str>,
    id: u64,
    side_id: u16,
}

impl ModelHooks {
    pub fn new(hub: Arc<CallbackHub>, model_type: &str, id: u64, side_id: u16) -> Self {
        Self {
            hub,
            model_type: Arc::from(model_type),
            id,
            side_id,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn side_id(&self) -> u16 {
        self.side_id
    }

    pub fn model_type(&self) -> &str {
        &self.model_type
    }

    pub fn log(&self, msg: &str, level: LogLevel) {
        let source = format!("{}[{}]", self.model_type, self.id);
        self.hub.write_log(&source, msg, level);
    }

    pub fn call(&self, command: &str, params: &Record) -> String {
        self.hub.dispatch(command, params)
    }

    /// Queue a new dynamic model; `params` becomes its init record.
    pub fn create_entity(&self, model_type: &str, id: u64, side_id: u16, mut params: Record) -> String {
        params.insert("ID".into(), Value::U64(id));
        params.insert("ForceSideID".into(), Value::U16(side_id));
        params.insert("ModelID".into(), Value::String(model_type.to_string()));
        self.call(CREATE_ENTITY, &params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Capture {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }
    }

    fn create_params(fields: &[(&str, Value)]) -> Record {
        fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_create_entity_queues_command() {
        let hub = CallbackHub::default();
        let params = create_params(&[
            ("ID", Value::U64(10)),
            ("ForceSideID", Value::U16(1)),
            ("ModelID", "mover".into()),
            ("speed", Value::F64(2.0)),
        ]);
        assert_eq!(hub.dispatch(CREATE_ENTITY, &params), "");
        let pending = hub.take_pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, 10);
        assert_eq!(pending[0].side_id, 1);
        assert_eq!(pending[0].model_type, "mover");
        assert_eq!(pending[0].params["speed"], Value::F64(2.0));
        assert_eq!(hub.pending_len(), 0);
    }

    #[test]
    fn test_create_entity_rejects_missing_or_mistyped_fields() {
        let hub = CallbackHub::default();
        let missing = create_params(&[("ID", Value::U64(1)), ("ModelID", "mover".into())]);
        let err = hub.dispatch(CREATE_ENTITY, &missing);
        assert!(err.contains("ForceSideID"), "{err}");

        let mistyped = create_params(&[
            ("ID", Value::U64(1)),
            ("ForceSideID", Value::U64(1)),
            ("ModelID", "mover".into()),
        ]);
        assert!(!hub.dispatch(CREATE_ENTITY, &mistyped).is_empty());
        assert_eq!(hub.pending_len(), 0);
    }

    #[test]
    fn test_unsupported_command() {
        let hub = CallbackHub::default();
        let msg = hub.dispatch("Teleport", &Record::new());
        assert_eq!(msg, "unsupported command: Teleport");
        assert_eq!(hub.pending_len(), 0);
    }

    #[test]
    fn test_log_level_and_enable_filter() {
        let hub = CallbackHub::new(LogLevel::Warn, true);
        let sink = Capture::default();
        hub.set_writer(Some(Box::new(sink.clone())));

        hub.write_log("m[1]", "quiet", LogLevel::Info);
        hub.write_log("m[1]", "loud", LogLevel::Error);
        hub.set_enabled(false);
        hub.write_log("m[1]", "muted", LogLevel::Critical);

        let text = sink.text();
        assert!(!text.contains("quiet"));
        assert!(text.contains("[ERROR] m[1]: loud"));
        assert!(!text.contains("muted"));
    }

    #[test]
    fn test_hooks_create_entity_fills_identity() {
        let hub = Arc::new(CallbackHub::default());
        let hooks = ModelHooks::new(hub.clone(), "spawner", 3, 2);
        assert_eq!(hooks.create_entity("mover", 100, 2, Record::new()), "");
        let cmd = &hub.take_pending()[0];
        assert_eq!(cmd.model_type, "mover");
        assert_eq!(cmd.params["ForceSideID"], Value::U16(2));
        assert_eq!(hooks.id(), 3);
        assert_eq!(hooks.model_type(), "spawner");
    }
}
