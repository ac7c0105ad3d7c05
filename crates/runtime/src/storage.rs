//! Frame buffers
//!
//! Every model writes its routed output into its own slot: one cache-padded
//! lane per destination topic of its type. Collectors drain the lanes into
//! the *staging* side of each topic. The collect step flips which side is
//! *current*, so input steps of frame k read exactly what frame k produced.

use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;
use indexmap::{IndexMap, IndexSet};

use crate::cell::TaskCell;
use crate::topic::TopicDirectory;
use crate::value::Record;

/// Record list shared between graph-ordered tasks.
pub type RecordCell = CachePadded<TaskCell<Vec<Record>>>;

fn record_cell() -> RecordCell {
    CachePadded::new(TaskCell::new(Vec::new()))
}

/// Per-destination scratch list of one model.
#[derive(Debug)]
pub struct Lane {
    /// Index of the destination topic
    pub topic: usize,
    pub records: RecordCell,
}

/// Scratch space of one model, lanes sorted by topic index.
#[derive(Debug, Default)]
pub struct ModelSlot {
    lanes: Vec<Lane>,
}

impl ModelSlot {
    fn with_layout(layout: &[usize]) -> Self {
        Self {
            lanes: layout
                .iter()
                .map(|&topic| Lane {
                    topic,
                    records: record_cell(),
                })
                .collect(),
        }
    }

    pub fn lane(&self, topic: usize) -> Option<&TaskCell<Vec<Record>>> {
        self.lanes
            .binary_search_by_key(&topic, |l| l.topic)
            .ok()
            .map(|i| &*self.lanes[i].records)
    }

    pub fn lanes(&self) -> &[Lane] {
        &self.lanes
    }
}

/// Double-buffered per-topic accumulators plus per-model slots.
#[derive(Debug)]
pub struct FrameBuffers {
    topics: IndexSet<String>,
    /// Sorted topic indices per source model type
    layouts: IndexMap<String, Vec<usize>>,
    sides: [Vec<RecordCell>; 2],
    front: AtomicUsize,
    statics: Vec<ModelSlot>,
    dynamics: TaskCell<Vec<ModelSlot>>,
}

impl Default for FrameBuffers {
    fn default() -> Self {
        Self {
            topics: IndexSet::new(),
            layouts: IndexMap::new(),
            sides: [Vec::new(), Vec::new()],
            front: AtomicUsize::new(0),
            statics: Vec::new(),
            dynamics: TaskCell::default(),
        }
    }
}

impl FrameBuffers {
    /// Lay out one topic per destination named in `directory`.
    pub fn new(directory: &TopicDirectory) -> Self {
        let topics: IndexSet<String> = directory.destinations().into_iter().collect();
        let layouts = directory
            .source_types()
            .map(|source| {
                let mut layout: Vec<usize> = directory
                    .destinations_for(source)
                    .iter()
                    .filter_map(|d| topics.get_index_of(d.as_str()))
                    .collect();
                layout.sort_unstable();
                (source.to_string(), layout)
            })
            .collect();
        let sides = [
            (0..topics.len()).map(|_| record_cell()).collect(),
            (0..topics.len()).map(|_| record_cell()).collect(),
        ];
        Self {
            topics,
            layouts,
            sides,
            front: AtomicUsize::new(0),
            statics: Vec::new(),
            dynamics: TaskCell::default(),
        }
    }

    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    pub fn topic_index(&self, name: &str) -> Option<usize> {
        self.topics.get_index_of(name)
    }

    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.topics.iter().map(String::as_str)
    }

    /// Destination topic indices of a model type; empty if it publishes nothing.
    pub fn layout(&self, model_type: &str) -> &[usize] {
        self.layouts.get(model_type).map(Vec::as_slice).unwrap_or(&[])
    }

    /// A fresh slot shaped for `model_type`.
    pub fn new_slot(&self, model_type: &str) -> ModelSlot {
        ModelSlot::with_layout(self.layout(model_type))
    }

    /// Append the slot of the next static model and return its index.
    pub fn push_static_slot(&mut self, model_type: &str) -> usize {
        let slot = self.new_slot(model_type);
        self.statics.push(slot);
        self.statics.len() - 1
    }

    pub fn static_slot(&self, index: usize) -> Option<&ModelSlot> {
        self.statics.get(index)
    }

    /// Slots of dynamic models, index-aligned with the registry.
    pub fn dynamic_slots(&self) -> &TaskCell<Vec<ModelSlot>> {
        &self.dynamics
    }

    fn front(&self) -> usize {
        self.front.load(Ordering::Acquire)
    }

    /// Side read by input steps.
    pub fn current(&self, topic: usize) -> &TaskCell<Vec<Record>> {
        &self.sides[self.front()][topic]
    }

    /// Side written by collectors.
    pub fn staging(&self, topic: usize) -> &TaskCell<Vec<Record>> {
        &self.sides[self.front() ^ 1][topic]
    }

    pub fn current_by_name(&self, name: &str) -> Option<&TaskCell<Vec<Record>>> {
        self.topic_index(name).map(|t| self.current(t))
    }

    /// Make staging current and empty the side that becomes staging.
    pub fn flip(&self) {
        let stale = self.front.fetch_xor(1, Ordering::AcqRel);
        for cell in &self.sides[stale] {
            cell.borrow_mut().clear();
        }
    }
}
