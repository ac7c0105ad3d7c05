//! Frame executor
//!
//! [`Engine`] owns the models, routing tables and frame buffers of one
//! simulation and drives the frame graph on a rayon thread pool.
//!
//! Each task, when it finishes, decrements the pending counter of its
//! successors and spawns those that reach zero. A task re-arms its own
//! counter when it starts, which is safe because no predecessor of the next
//! frame can finish before the task itself has run in this frame.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use rayon::prelude::*;
use tracing::{debug, info, instrument, trace};

use crate::boundary::{ModelFault, contain};
use crate::dag::{ModelShape, TaskGraph, TaskId, TaskKind, Writer, build_frame_graph};
use crate::error::{Error, Result};
use crate::hooks::CallbackHub;
use crate::loader::ModelLibrary;
use crate::registry::{ModelEntity, ModelRegistry};
use crate::scene::SceneDecl;
use crate::storage::{FrameBuffers, ModelSlot};
use crate::topic::{TopicDirectory, TopicInfo};
use crate::types::{EngineSettings, LogLevel, ModelState, Phase};
use crate::value::{DisplayRecord, Record, Value};

/// Outcome of [`Engine::run`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunReport {
    pub frames: u64,
    pub elapsed: Duration,
    /// Frames per wall-clock second; 0 when nothing ran
    pub fps: f64,
}

/// Built frame graph and its per-node pending counters.
struct Schedule {
    graph: TaskGraph,
    entry: TaskId,
    pending: Vec<AtomicUsize>,
}

impl Schedule {
    fn new(graph: TaskGraph) -> Result<Self> {
        let entry = graph
            .entry()
            .ok_or_else(|| Error::GraphBuild("graph was not validated".into()))?;
        let pending = graph
            .nodes()
            .iter()
            .map(|n| AtomicUsize::new(n.in_degree))
            .collect();
        Ok(Self {
            graph,
            entry,
            pending,
        })
    }

    fn arm_count(&self, id: TaskId) -> usize {
        let node = self.graph.node(id);
        if id == self.entry {
            node.loop_in_degree
        } else {
            node.in_degree
        }
    }

    fn reset(&self) {
        for (i, pending) in self.pending.iter().enumerate() {
            pending.store(self.arm_count(TaskId(i)), Ordering::Relaxed);
        }
    }
}

pub struct Engine {
    settings: EngineSettings,
    pool: rayon::ThreadPool,
    hub: Arc<CallbackHub>,
    registry: ModelRegistry,
    directory: TopicDirectory,
    buffers: FrameBuffers,
    schedule: Option<Schedule>,
    /// Frames left in the current run; decremented only by the collect task
    remaining: AtomicU64,
    frames_done: AtomicU64,
}

impl Engine {
    pub fn new(settings: EngineSettings) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(settings.workers)
            .thread_name(|i| format!("framesim-worker-{i}"))
            .build()
            .map_err(|e| Error::Config(format!("thread pool: {e}")))?;
        let hub = Arc::new(CallbackHub::new(settings.log_level, settings.enable_log));
        let mut engine = Self {
            registry: ModelRegistry::new(hub.clone()),
            hub,
            pool,
            directory: TopicDirectory::new(),
            buffers: FrameBuffers::default(),
            schedule: None,
            remaining: AtomicU64::new(0),
            frames_done: AtomicU64::new(0),
            settings: EngineSettings::default(),
        };
        engine.apply_settings(settings)?;
        Ok(engine)
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Apply log and timing settings. The worker count is fixed at construction.
    pub fn apply_settings(&mut self, settings: EngineSettings) -> Result<()> {
        self.hub.set_level(settings.log_level);
        self.hub.set_enabled(settings.enable_log);
        if settings.log_file != self.settings.log_file {
            self.set_log_file(settings.log_file.clone())?;
        }
        self.settings = settings;
        Ok(())
    }

    /// Mirror model logs into `path` (appending), or stop mirroring.
    pub fn set_log_file(&mut self, path: Option<PathBuf>) -> Result<()> {
        match &path {
            Some(p) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(p)
                    .map_err(|e| Error::Config(format!("cannot open log file {}: {e}", p.display())))?;
                self.hub.set_writer(Some(Box::new(file)));
            }
            None => self.hub.set_writer(None),
        }
        self.settings.log_file = path;
        Ok(())
    }

    pub fn hub(&self) -> &Arc<CallbackHub> {
        &self.hub
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ModelRegistry {
        &mut self.registry
    }

    pub fn graph(&self) -> Option<&TaskGraph> {
        self.schedule.as_ref().map(|s| &s.graph)
    }

    /// Frames completed since the last load.
    pub fn frames_done(&self) -> u64 {
        self.frames_done.load(Ordering::Relaxed)
    }

    /// Load a whole scene, replacing whatever was loaded before.
    #[instrument(skip_all, fields(types = scene.model_types.len(), models = scene.models.len()))]
    pub fn load(&mut self, scene: &SceneDecl, library: &dyn ModelLibrary) -> Result<()> {
        self.clear();

        for decl in &scene.model_types {
            self.load_library(library, &decl.name, &decl.path, decl.output_movable)?;
        }

        for decl in &scene.models {
            let mut init = decl.init.clone();
            init.entry("ID".to_string()).or_insert(Value::U64(decl.id));
            init.entry("ForceSideID".to_string())
                .or_insert(Value::U16(decl.side_id));
            self.create_model(decl.id, decl.side_id, &decl.model_type, &init, false)?;
        }

        for decl in &scene.topics {
            if !self.registry.loader().contains(&decl.from) {
                return Err(Error::Config(format!(
                    "topic source '{}' is not a declared model type",
                    decl.from
                )));
            }
            self.add_topic(&decl.from, decl.to_topic()?);
        }

        self.build()?;
        info!(
            models = self.registry.static_count(),
            topics = self.buffers.topic_count(),
            "scene loaded"
        );
        Ok(())
    }

    pub fn load_library(
        &mut self,
        library: &dyn ModelLibrary,
        name: &str,
        path: &str,
        movable: bool,
    ) -> Result<()> {
        self.registry
            .loader_mut()
            .load_library(library, name, path, movable)
    }

    /// Create a model. Static models must be created before [`build`](Self::build).
    pub fn create_model(
        &mut self,
        id: u64,
        side_id: u16,
        model_type: &str,
        init: &Record,
        dynamic: bool,
    ) -> Result<()> {
        self.registry
            .create_model(id, side_id, model_type, init, dynamic)
            .map(|_| ())
    }

    pub fn add_topic(&mut self, source_type: &str, topic: TopicInfo) {
        self.directory.add_topic(source_type, topic);
    }

    /// Lay out buffers and build the frame graph from the current models
    /// and topics. Freezes the static model set.
    pub fn build(&mut self) -> Result<()> {
        let mut buffers = FrameBuffers::new(&self.directory);
        let mut shapes = Vec::with_capacity(self.registry.static_count());
        for entity in self.registry.statics_mut() {
            buffers.push_static_slot(&entity.model_type);
            shapes.push(ModelShape {
                label: format!("{}[{}]", entity.model_type, entity.id),
                topics: buffers.layout(&entity.model_type).to_vec(),
            });
        }
        let topics: Vec<String> = buffers.topics().map(str::to_string).collect();
        let graph = build_frame_graph(&shapes, &topics)?;
        debug!(tasks = graph.len(), depth = graph.levels().len(), "frame graph built");

        self.schedule = Some(Schedule::new(graph)?);
        self.buffers = buffers;
        self.registry.freeze();
        Ok(())
    }

    /// Run `frames` frames. Zero frames does no work.
    #[instrument(skip(self))]
    pub fn run(&mut self, frames: u64) -> Result<RunReport> {
        if frames == 0 {
            return Ok(RunReport {
                frames: 0,
                elapsed: Duration::ZERO,
                fps: 0.0,
            });
        }
        let this = &*self;
        let schedule = this
            .schedule
            .as_ref()
            .ok_or_else(|| Error::GraphBuild("no execution graph; load a scene first".into()))?;

        schedule.reset();
        this.remaining.store(frames, Ordering::Release);
        let start = Instant::now();
        let frame = FrameRun {
            engine: this,
            schedule,
        };
        this.pool.scope(|s| frame.dispatch(s, schedule.entry));
        let elapsed = start.elapsed();
        this.hub.flush();

        let secs = elapsed.as_secs_f64();
        let report = RunReport {
            frames,
            elapsed,
            fps: if secs > 0.0 { frames as f64 / secs } else { 0.0 },
        };
        info!(frames, elapsed_ms = secs * 1e3, fps = report.fps, "run finished");
        Ok(report)
    }

    /// Destroy all models, topics and buffers.
    pub fn clear(&mut self) {
        self.registry.clear();
        self.directory.clear();
        self.buffers = FrameBuffers::default();
        self.schedule = None;
        *self.remaining.get_mut() = 0;
        *self.frames_done.get_mut() = 0;
    }

    /// Records delivered in the last completed frame, per destination.
    pub fn routed(&self) -> IndexMap<String, Vec<Record>> {
        self.buffers
            .topics()
            .map(|name| (name.to_string(), self.topic_records(name)))
            .collect()
    }

    pub fn topic_records(&self, name: &str) -> Vec<Record> {
        self.buffers
            .current_by_name(name)
            .map(|cell| cell.borrow().clone())
            .unwrap_or_default()
    }

    /// `(static, dynamic)` model counts.
    pub fn model_count(&mut self) -> (usize, usize) {
        (
            self.registry.static_count(),
            self.registry.dynamics_mut().len(),
        )
    }

    fn report_fault(&self, entity: &mut ModelEntity, phase: Phase, fault: &ModelFault, input: Option<&Record>) {
        entity.state = ModelState::Error;
        let mut msg = format!(
            "Exception When Model[{}][{}] {phase}: {fault}",
            entity.model_type, entity.id
        );
        if let Some(record) = input {
            msg.push_str(&format!(" input: {}", DisplayRecord(record)));
        }
        self.hub.write_log("engine", &msg, LogLevel::Critical);
    }

    fn output_step(&self, entity: &mut ModelEntity, slot: &ModelSlot) {
        for lane in slot.lanes() {
            lane.records.borrow_mut().clear();
        }
        let model = &mut entity.model;
        let fault = match contain(move || model.output()) {
            Ok(record) => {
                self.directory
                    .route_records(&entity.model_type, record, entity.movable, |dest, routed| {
                        let lane = self
                            .buffers
                            .topic_index(dest)
                            .and_then(|topic| slot.lane(topic));
                        if let Some(lane) = lane {
                            lane.borrow_mut().push(routed);
                        }
                    });
                None
            }
            Err(fault) => Some(fault),
        };
        match fault {
            Some(fault) => self.report_fault(entity, Phase::Output, &fault, None),
            None => entity.state = ModelState::Running,
        }
    }

    fn input_step(&self, entity: &mut ModelEntity) {
        let Some(cell) = self.buffers.current_by_name(&entity.model_type) else {
            return;
        };
        let records = cell.borrow();
        for record in records.iter() {
            if let Err(fault) = contain(|| entity.model.set_input(record)) {
                self.report_fault(entity, Phase::Input, &fault, Some(record));
            }
        }
    }

    fn tick_step(&self, entity: &mut ModelEntity) {
        let dt = self.settings.dt_ms;
        if let Err(fault) = contain(|| entity.model.tick(dt)) {
            self.report_fault(entity, Phase::Tick, &fault, None);
        }
    }

    fn collect_lane(&self, topic: usize, writer: Writer) {
        let mut staging = self.buffers.staging(topic).borrow_mut();
        match writer {
            Writer::Static(m) => {
                if let Some(lane) = self.buffers.static_slot(m).and_then(|s| s.lane(topic)) {
                    staging.append(&mut lane.borrow_mut());
                }
            }
            Writer::Dynamic => {
                let slots = self.buffers.dynamic_slots().borrow();
                for lane in slots.iter().filter_map(|s| s.lane(topic)) {
                    staging.append(&mut lane.borrow_mut());
                }
            }
        }
    }

    fn run_task(&self, kind: TaskKind) {
        match kind {
            TaskKind::Spawn => {
                self.registry.spawn_pending();
            }
            TaskKind::Output(m) => {
                if let (Some(cell), Some(slot)) =
                    (self.registry.static_model(m), self.buffers.static_slot(m))
                {
                    self.output_step(&mut cell.borrow_mut(), slot);
                }
            }
            TaskKind::DynamicOutput => {
                let mut models = self.registry.dynamics().borrow_mut();
                let mut slots = self.buffers.dynamic_slots().borrow_mut();
                while slots.len() < models.len() {
                    let slot = self.buffers.new_slot(&models[slots.len()].model_type);
                    slots.push(slot);
                }
                models
                    .par_iter_mut()
                    .zip(slots.par_iter())
                    .for_each(|(entity, slot)| self.output_step(entity, slot));
            }
            TaskKind::Collector { topic, writer } => self.collect_lane(topic, writer),
            TaskKind::Collect => {
                self.buffers.flip();
                let left = self.remaining.fetch_sub(1, Ordering::AcqRel) - 1;
                let frame = self.frames_done.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(frame, left, "frame collected");
            }
            TaskKind::Input(m) => {
                if let Some(cell) = self.registry.static_model(m) {
                    self.input_step(&mut cell.borrow_mut());
                }
            }
            TaskKind::DynamicInput => {
                self.registry
                    .dynamics()
                    .borrow_mut()
                    .par_iter_mut()
                    .for_each(|entity| self.input_step(entity));
            }
            TaskKind::Tick(m) => {
                if let Some(cell) = self.registry.static_model(m) {
                    self.tick_step(&mut cell.borrow_mut());
                }
            }
            TaskKind::DynamicTick => {
                self.registry
                    .dynamics()
                    .borrow_mut()
                    .par_iter_mut()
                    .for_each(|entity| self.tick_step(entity));
            }
            TaskKind::LoopCondition(_) => {}
        }
    }
}

/// Borrowed view used by tasks during one [`Engine::run`].
#[derive(Clone, Copy)]
struct FrameRun<'a> {
    engine: &'a Engine,
    schedule: &'a Schedule,
}

impl<'a> FrameRun<'a> {
    fn dispatch(self, scope: &rayon::Scope<'a>, id: TaskId) {
        scope.spawn(move |s| self.execute(s, id));
    }

    fn release(self, scope: &rayon::Scope<'a>, id: TaskId) {
        if self.schedule.pending[id.0].fetch_sub(1, Ordering::AcqRel) == 1 {
            self.dispatch(scope, id);
        }
    }

    fn execute(self, scope: &rayon::Scope<'a>, id: TaskId) {
        let node = self.schedule.graph.node(id);
        self.schedule.pending[id.0].store(self.schedule.arm_count(id), Ordering::Release);
        trace!(task = %node.name, "dispatch");

        self.engine.run_task(node.kind);

        for &next in &node.successors {
            self.release(scope, next);
        }
        if !node.loop_targets.is_empty() && self.engine.remaining.load(Ordering::Acquire) > 0 {
            for &target in &node.loop_targets {
                self.release(scope, target);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::StaticLibrary;
    use crate::model::{Model, ModelError};
    use crate::scene::{ModelDecl, ModelTypeDecl, SubscriberDecl, TopicDecl};
    use parking_lot::Mutex;

    /// Counts calls per phase and echoes `n` as its output.
    #[derive(Default)]
    struct Counter {
        out: Record,
        ticks: u64,
        calls: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Model for Counter {
        fn init(&mut self, _: &Record) -> std::result::Result<(), ModelError> {
            Ok(())
        }
        fn tick(&mut self, _: f64) -> std::result::Result<(), ModelError> {
            self.ticks += 1;
            self.calls.lock().push("tick");
            Ok(())
        }
        fn set_input(&mut self, _: &Record) -> std::result::Result<(), ModelError> {
            self.calls.lock().push("input");
            Ok(())
        }
        fn output(&mut self) -> std::result::Result<&mut Record, ModelError> {
            self.calls.lock().push("output");
            self.out.insert("n".into(), Value::U64(self.ticks));
            Ok(&mut self.out)
        }
    }

    fn scene() -> SceneDecl {
        SceneDecl {
            model_types: vec![ModelTypeDecl {
                name: "counter".into(),
                path: "counter".into(),
                output_movable: false,
            }],
            models: vec![ModelDecl {
                model_type: "counter".into(),
                id: 1,
                side_id: 0,
                init: Record::new(),
            }],
            topics: vec![TopicDecl {
                from: "counter".into(),
                members: vec!["n".into()],
                subscribers: vec![SubscriberDecl {
                    to: "counter".into(),
                    renames: vec![("n".into(), "n".into())],
                }],
            }],
        }
    }

    fn engine_with(calls: Arc<Mutex<Vec<&'static str>>>) -> Engine {
        let library = StaticLibrary::new().with("counter", move || Counter {
            calls: calls.clone(),
            ..Counter::default()
        });
        let mut engine = Engine::new(EngineSettings {
            workers: 2,
            ..EngineSettings::default()
        })
        .unwrap();
        engine.load(&scene(), &library).unwrap();
        engine
    }

    #[test]
    fn test_zero_frames_does_nothing() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut engine = engine_with(calls.clone());
        let report = engine.run(0).unwrap();
        assert_eq!(report.frames, 0);
        assert!(calls.lock().is_empty());
        assert_eq!(engine.frames_done(), 0);
    }

    #[test]
    fn test_phase_order_per_frame() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut engine = engine_with(calls.clone());
        engine.run(3).unwrap();
        assert_eq!(engine.frames_done(), 3);
        assert_eq!(
            *calls.lock(),
            ["output", "input", "tick"].repeat(3)
        );
        assert_eq!(engine.topic_records("counter")[0]["n"], Value::U64(2));
    }

    #[test]
    fn test_run_without_scene() {
        let mut engine = Engine::new(EngineSettings::default()).unwrap();
        assert!(matches!(engine.run(1), Err(Error::GraphBuild(_))));
    }

    #[test]
    fn test_topic_from_unknown_type() {
        let mut decl = scene();
        decl.topics[0].from = "ghost".into();
        let mut engine = Engine::new(EngineSettings::default()).unwrap();
        let library = StaticLibrary::new().with("counter", Counter::default);
        let err = engine.load(&decl, &library).unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_static_model_after_build_is_refused() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut engine = engine_with(calls);
        assert!(matches!(
            engine.create_model(9, 0, "counter", &Record::new(), false),
            Err(Error::GraphFrozen { id: 9, .. })
        ));
    }

    #[test]
    fn test_scene_init_gets_identity_fields() {
        #[derive(Default)]
        struct Seen(Arc<Mutex<Option<Record>>>, Record);
        impl Model for Seen {
            fn init(&mut self, params: &Record) -> std::result::Result<(), ModelError> {
                *self.0.lock() = Some(params.clone());
                Ok(())
            }
            fn tick(&mut self, _: f64) -> std::result::Result<(), ModelError> {
                Ok(())
            }
            fn set_input(&mut self, _: &Record) -> std::result::Result<(), ModelError> {
                Ok(())
            }
            fn output(&mut self) -> std::result::Result<&mut Record, ModelError> {
                Ok(&mut self.1)
            }
        }

        let seen = Arc::new(Mutex::new(None));
        let probe = seen.clone();
        let library = StaticLibrary::new().with("seen", move || Seen(probe.clone(), Record::new()));
        let mut decl = scene();
        decl.model_types[0].path = "seen".into();
        decl.models[0].id = 42;
        decl.models[0].side_id = 3;

        let mut engine = Engine::new(EngineSettings::default()).unwrap();
        engine.load(&decl, &library).unwrap();
        let init = seen.lock().clone().unwrap();
        assert_eq!(init["ID"], Value::U64(42));
        assert_eq!(init["ForceSideID"], Value::U16(3));
    }
}
