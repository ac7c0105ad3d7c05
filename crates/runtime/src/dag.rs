//! Execution DAG
//!
//! One frame of work as a task graph. Unconditional edges order tasks
//! within a frame; conditional loop-back edges from the loop conditions to
//! the entry start the next frame. Nodes live in an arena and refer to each
//! other by [`TaskId`].

use std::collections::VecDeque;
use std::fmt;

use crate::error::{Error, Result};

/// Index of a node in its [`TaskGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub usize);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Who fills a collector's lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Writer {
    /// Static model by registry index
    Static(usize),
    Dynamic,
}

/// The work a node performs. Model indices refer to the registry's statics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// Materialize pending creation commands; frame entry
    Spawn,
    Output(usize),
    DynamicOutput,
    /// Move one writer's lane into the staging side of `topic`
    Collector { topic: usize, writer: Writer },
    /// Flip the frame buffers and count the frame
    Collect,
    Input(usize),
    DynamicInput,
    Tick(usize),
    DynamicTick,
    /// Restart the frame while iterations remain
    LoopCondition(Option<usize>),
}

#[derive(Debug, Clone)]
pub struct TaskNode {
    pub name: String,
    pub kind: TaskKind,
    pub successors: Vec<TaskId>,
    /// Conditional edges, taken only while iterations remain
    pub loop_targets: Vec<TaskId>,
    /// Unconditional predecessors
    pub in_degree: usize,
    /// Conditional predecessors
    pub loop_in_degree: usize,
}

#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    nodes: Vec<TaskNode>,
    entry: Option<TaskId>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, kind: TaskKind) -> TaskId {
        self.nodes.push(TaskNode {
            name: name.into(),
            kind,
            successors: Vec::new(),
            loop_targets: Vec::new(),
            in_degree: 0,
            loop_in_degree: 0,
        });
        TaskId(self.nodes.len() - 1)
    }

    /// `from` must finish before `to` starts.
    pub fn precede(&mut self, from: TaskId, to: TaskId) {
        self.nodes[from.0].successors.push(to);
        self.nodes[to.0].in_degree += 1;
    }

    /// `task` starts only after `after` finishes.
    pub fn succeed(&mut self, task: TaskId, after: TaskId) {
        self.precede(after, task);
    }

    /// Conditional edge; ignored by validation ordering.
    pub fn loop_back(&mut self, from: TaskId, to: TaskId) {
        self.nodes[from.0].loop_targets.push(to);
        self.nodes[to.0].loop_in_degree += 1;
    }

    pub fn node(&self, id: TaskId) -> &TaskNode {
        &self.nodes[id.0]
    }

    pub fn nodes(&self) -> &[TaskNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The single root; set by [`validate`](Self::validate).
    pub fn entry(&self) -> Option<TaskId> {
        self.entry
    }

    /// Check shape and record the entry.
    ///
    /// There must be exactly one node without unconditional predecessors,
    /// and the unconditional edges must be acyclic.
    pub fn validate(&mut self) -> Result<()> {
        let roots: Vec<TaskId> = (0..self.nodes.len())
            .map(TaskId)
            .filter(|id| self.nodes[id.0].in_degree == 0)
            .collect();
        let entry = match roots.as_slice() {
            [entry] => *entry,
            [] => return Err(Error::GraphBuild("no entry task".into())),
            [_, second, ..] => {
                return Err(Error::GraphBuild(format!(
                    "task '{}' has no predecessors but is not the entry",
                    self.nodes[second.0].name
                )));
            }
        };

        let levels = self.levels_from(entry);
        let visited: usize = levels.iter().map(Vec::len).sum();
        if visited != self.nodes.len() {
            return Err(Error::GraphBuild(format!(
                "cycle among {} tasks",
                self.nodes.len() - visited
            )));
        }
        self.entry = Some(entry);
        Ok(())
    }

    /// Kahn's algorithm, grouped by depth.
    fn levels_from(&self, entry: TaskId) -> Vec<Vec<TaskId>> {
        let mut remaining: Vec<usize> = self.nodes.iter().map(|n| n.in_degree).collect();
        let mut levels = Vec::new();
        let mut frontier: VecDeque<TaskId> = VecDeque::from([entry]);
        while !frontier.is_empty() {
            let level: Vec<TaskId> = frontier.drain(..).collect();
            for id in &level {
                for next in &self.nodes[id.0].successors {
                    remaining[next.0] -= 1;
                    if remaining[next.0] == 0 {
                        frontier.push_back(*next);
                    }
                }
            }
            levels.push(level);
        }
        levels
    }

    /// Topological levels; tasks within a level are independent.
    pub fn levels(&self) -> Vec<Vec<TaskId>> {
        match self.entry {
            Some(entry) => self.levels_from(entry),
            None => Vec::new(),
        }
    }
}

/// Shape of one static model as seen by the frame graph.
#[derive(Debug, Clone)]
pub struct ModelShape {
    /// Display label, e.g. `mover[3]`
    pub label: String,
    /// Destination topic indices, sorted
    pub topics: Vec<usize>,
}

/// Build and validate the frame graph for the given models and topics.
pub fn build_frame_graph(models: &[ModelShape], topics: &[String]) -> Result<TaskGraph> {
    let mut graph = TaskGraph::new();
    let spawn = graph.add("spawn", TaskKind::Spawn);
    let collect = graph.add("collect", TaskKind::Collect);

    // Per-topic chain tail, extended in model order.
    let mut chains: Vec<Option<TaskId>> = vec![None; topics.len()];

    for (m, model) in models.iter().enumerate() {
        let output = graph.add(format!("output {}", model.label), TaskKind::Output(m));
        graph.precede(spawn, output);
        graph.precede(output, collect);
        for &topic in &model.topics {
            let collector = graph.add(
                format!("collect {} <- {}", topics[topic], model.label),
                TaskKind::Collector {
                    topic,
                    writer: Writer::Static(m),
                },
            );
            graph.precede(output, collector);
            if let Some(tail) = chains[topic] {
                graph.succeed(collector, tail);
            }
            chains[topic] = Some(collector);
        }
    }

    let dynamic_output = graph.add("output dynamic", TaskKind::DynamicOutput);
    graph.precede(spawn, dynamic_output);
    graph.precede(dynamic_output, collect);
    for (topic, name) in topics.iter().enumerate() {
        let collector = graph.add(
            format!("collect {name} <- dynamic"),
            TaskKind::Collector {
                topic,
                writer: Writer::Dynamic,
            },
        );
        graph.precede(dynamic_output, collector);
        if let Some(tail) = chains[topic] {
            graph.succeed(collector, tail);
        }
        graph.precede(collector, collect);
    }

    for (m, model) in models.iter().enumerate() {
        let input = graph.add(format!("input {}", model.label), TaskKind::Input(m));
        let tick = graph.add(format!("tick {}", model.label), TaskKind::Tick(m));
        let cond = graph.add(format!("loop {}", model.label), TaskKind::LoopCondition(Some(m)));
        graph.precede(collect, input);
        graph.precede(input, tick);
        graph.precede(tick, cond);
        graph.loop_back(cond, spawn);
    }
    let input = graph.add("input dynamic", TaskKind::DynamicInput);
    let tick = graph.add("tick dynamic", TaskKind::DynamicTick);
    let cond = graph.add("loop dynamic", TaskKind::LoopCondition(None));
    graph.precede(collect, input);
    graph.precede(input, tick);
    graph.precede(tick, cond);
    graph.loop_back(cond, spawn);

    graph.validate()?;
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(label: &str, topics: &[usize]) -> ModelShape {
        ModelShape {
            label: label.into(),
            topics: topics.to_vec(),
        }
    }

    fn find(graph: &TaskGraph, kind: TaskKind) -> TaskId {
        TaskId(
            graph
                .nodes()
                .iter()
                .position(|n| n.kind == kind)
                .unwrap(),
        )
    }

    #[test]
    fn test_frame_graph_shape() {
        let topics = vec!["B".to_string(), "root".to_string()];
        let models = vec![shape("A[1]", &[0, 1]), shape("A[2]", &[0]), shape("B[3]", &[])];
        let graph = build_frame_graph(&models, &topics).unwrap();

        // spawn, collect, 3 outputs, 3 static collectors, dynamic output,
        // 2 dynamic collectors, 3 x (input, tick, loop), dynamic (input, tick, loop)
        assert_eq!(graph.len(), 2 + 3 + 3 + 1 + 2 + 9 + 3);
        let spawn = graph.entry().unwrap();
        assert_eq!(graph.node(spawn).kind, TaskKind::Spawn);
        assert_eq!(graph.node(spawn).loop_in_degree, 4);

        // Chain on topic B: A[1] -> A[2] -> dynamic -> collect
        let first = find(&graph, TaskKind::Collector { topic: 0, writer: Writer::Static(0) });
        let second = find(&graph, TaskKind::Collector { topic: 0, writer: Writer::Static(1) });
        let dynamic = find(&graph, TaskKind::Collector { topic: 0, writer: Writer::Dynamic });
        let collect = find(&graph, TaskKind::Collect);
        assert!(graph.node(first).successors.contains(&second));
        assert!(graph.node(second).successors.contains(&dynamic));
        assert!(graph.node(dynamic).successors.contains(&collect));
        assert!(!graph.node(first).successors.contains(&collect));
    }

    #[test]
    fn test_levels_order_phases() {
        let topics = vec!["B".to_string()];
        let graph = build_frame_graph(&[shape("A[1]", &[0])], &topics).unwrap();
        let levels = graph.levels();
        let kinds: Vec<Vec<TaskKind>> = levels
            .iter()
            .map(|l| l.iter().map(|id| graph.node(*id).kind).collect())
            .collect();
        assert_eq!(kinds[0], vec![TaskKind::Spawn]);
        let collect_level = kinds
            .iter()
            .position(|l| l.contains(&TaskKind::Collect))
            .unwrap();
        let input_level = kinds
            .iter()
            .position(|l| l.contains(&TaskKind::Input(0)))
            .unwrap();
        assert_eq!(input_level, collect_level + 1);
        assert!(kinds.last().unwrap().contains(&TaskKind::LoopCondition(Some(0))));
    }

    #[test]
    fn test_rejects_second_root() {
        let mut graph = TaskGraph::new();
        graph.add("a", TaskKind::Spawn);
        graph.add("b", TaskKind::Collect);
        let err = graph.validate().unwrap_err();
        assert!(err.to_string().contains("'b'"));
    }

    #[test]
    fn test_rejects_unconditional_cycle() {
        let mut graph = TaskGraph::new();
        let a = graph.add("a", TaskKind::Spawn);
        let b = graph.add("b", TaskKind::Collect);
        let c = graph.add("c", TaskKind::DynamicTick);
        graph.precede(a, b);
        graph.precede(b, c);
        graph.precede(c, b);
        assert!(matches!(graph.validate(), Err(Error::GraphBuild(_))));
    }

    #[test]
    fn test_loop_back_is_not_a_cycle() {
        let mut graph = TaskGraph::new();
        let a = graph.add("a", TaskKind::Spawn);
        let b = graph.add("b", TaskKind::LoopCondition(None));
        graph.precede(a, b);
        graph.loop_back(b, a);
        graph.validate().unwrap();
        assert_eq!(graph.entry(), Some(a));
    }
}
