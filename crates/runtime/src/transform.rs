//! Field routing rules
//!
//! A [`TransformTable`] maps `(source type, source field)` to an ordered list
//! of [`Action`]s, each naming a destination topic and the field name the
//! value takes there. The last action of a list is the only one that may
//! receive the value by move; every earlier action sees a borrow.

use std::borrow::Cow;

use indexmap::{IndexMap, IndexSet};

use crate::error::{Error, Result};
use crate::value::{Record, Value};

/// One destination of a routed field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Action {
    /// Destination topic (a model type name, or any other sink name)
    pub topic: String,
    /// Field name at the destination
    pub field: String,
}

impl Action {
    pub fn new(topic: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            field: field.into(),
        }
    }
}

/// Routing rules keyed by source type, then source field.
#[derive(Debug, Clone, Default)]
pub struct TransformTable {
    rules: IndexMap<String, IndexMap<String, Vec<Action>>>,
}

impl TransformTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the action list for a field, replacing any previous list.
    pub fn insert(&mut self, source_type: &str, field: &str, actions: Vec<Action>) -> Result<()> {
        if actions.is_empty() {
            return Err(Error::RoutingDefect {
                source_type: source_type.to_string(),
                field: field.to_string(),
            });
        }
        self.rules
            .entry(source_type.to_string())
            .or_default()
            .insert(field.to_string(), actions);
        Ok(())
    }

    /// Append one action to a field's list.
    pub fn push(&mut self, source_type: &str, field: &str, action: Action) {
        self.rules
            .entry(source_type.to_string())
            .or_default()
            .entry(field.to_string())
            .or_default()
            .push(action);
    }

    pub fn actions(&self, source_type: &str, field: &str) -> Option<&[Action]> {
        self.rules
            .get(source_type)
            .and_then(|fields| fields.get(field))
            .map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Route every field of `record` through the rules of `source_type`.
    ///
    /// When `movable`, routed fields are removed from the record and the
    /// last action of each list receives `Cow::Owned`; unrouted fields stay
    /// in place. Otherwise the record is untouched and every action receives
    /// `Cow::Borrowed`. Fields without a rule are skipped.
    pub fn apply<F>(&self, source_type: &str, record: &mut Record, movable: bool, emit: F)
    where
        F: FnMut(&Action, Cow<'_, Value>),
    {
        if !movable {
            self.apply_ref(source_type, record, emit);
            return;
        }
        let Some(fields) = self.rules.get(source_type) else {
            return;
        };
        let mut routed = Record::new();
        let mut kept = Record::with_capacity(record.len());
        for (name, value) in std::mem::take(record) {
            if fields.contains_key(&name) {
                routed.insert(name, value);
            } else {
                kept.insert(name, value);
            }
        }
        *record = kept;
        self.apply_owned(source_type, routed, emit);
    }

    /// Borrowed-only routing; the record is never consumed.
    pub fn apply_ref<F>(&self, source_type: &str, record: &Record, mut emit: F)
    where
        F: FnMut(&Action, Cow<'_, Value>),
    {
        let Some(fields) = self.rules.get(source_type) else {
            return;
        };
        for (name, value) in record {
            let Some(actions) = fields.get(name) else {
                continue;
            };
            for action in actions {
                emit(action, Cow::Borrowed(value));
            }
        }
    }

    /// Owned routing; each value moves to the last action of its list.
    pub fn apply_owned<F>(&self, source_type: &str, record: Record, mut emit: F)
    where
        F: FnMut(&Action, Cow<'_, Value>),
    {
        let Some(fields) = self.rules.get(source_type) else {
            return;
        };
        for (name, value) in record {
            let Some((last, rest)) = fields.get(&name).and_then(|a| a.split_last()) else {
                continue;
            };
            for action in rest {
                emit(action, Cow::Borrowed(&value));
            }
            emit(last, Cow::Owned(value));
        }
    }

    /// Two-phase form of [`apply`](Self::apply): one record per destination.
    pub fn transform(
        &self,
        source_type: &str,
        record: &mut Record,
        movable: bool,
    ) -> IndexMap<String, Record> {
        let mut out: IndexMap<String, Record> = IndexMap::new();
        self.apply(source_type, record, movable, |action, value| {
            out.entry(action.topic.clone())
                .or_default()
                .insert(action.field.clone(), value.into_owned());
        });
        out
    }

    /// Unique destination topics of a source type, in rule order.
    pub fn destinations(&self, source_type: &str) -> Vec<&str> {
        let mut seen: IndexSet<&str> = IndexSet::new();
        if let Some(fields) = self.rules.get(source_type) {
            for action in fields.values().flatten() {
                seen.insert(action.topic.as_str());
            }
        }
        seen.into_iter().collect()
    }
}
