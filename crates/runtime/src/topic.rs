//! Topic directory
//!
//! Each source model type owns zero or more topics. A topic gates records
//! on a set of required members and then routes them through its own
//! [`TransformTable`].

use std::borrow::Cow;

use indexmap::{IndexMap, IndexSet};

use crate::transform::{Action, TransformTable};
use crate::value::{Record, Value};

/// A single publish rule for one source type.
#[derive(Debug, Clone, Default)]
pub struct TopicInfo {
    /// Fields a record must carry to be eligible
    pub members: Vec<String>,
    /// Rules keyed by the source type that owns this topic
    pub transform: TransformTable,
}

impl TopicInfo {
    pub fn new(members: Vec<String>, transform: TransformTable) -> Self {
        Self { members, transform }
    }

    /// True when the record carries every member. No members matches anything.
    pub fn accepts(&self, record: &Record) -> bool {
        self.members.iter().all(|m| record.contains_key(m))
    }
}

/// All topics, grouped by source model type.
#[derive(Debug, Clone, Default)]
pub struct TopicDirectory {
    topics: IndexMap<String, Vec<TopicInfo>>,
}

impl TopicDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_topic(&mut self, source_type: &str, info: TopicInfo) {
        self.topics
            .entry(source_type.to_string())
            .or_default()
            .push(info);
    }

    pub fn has_topics(&self, source_type: &str) -> bool {
        self.topics.get(source_type).is_some_and(|t| !t.is_empty())
    }

    pub fn clear(&mut self) {
        self.topics.clear();
    }

    /// Source types that own at least one topic.
    pub fn source_types(&self) -> impl Iterator<Item = &str> {
        self.topics.keys().map(String::as_str)
    }

    /// Topics eligible for `record`, evaluated on the intact record.
    fn eligible(&self, source_type: &str, record: &Record) -> Vec<&TopicInfo> {
        self.topics
            .get(source_type)
            .map(|topics| topics.iter().filter(|t| t.accepts(record)).collect())
            .unwrap_or_default()
    }

    /// Route one output record field by field.
    ///
    /// Only the last eligible topic may consume the record; earlier topics
    /// always route by reference.
    pub fn route<F>(&self, source_type: &str, record: &mut Record, movable: bool, mut emit: F)
    where
        F: FnMut(&Action, Cow<'_, Value>),
    {
        let eligible = self.eligible(source_type, record);
        let Some((last, rest)) = eligible.split_last() else {
            return;
        };
        for topic in rest {
            topic.transform.apply_ref(source_type, record, &mut emit);
        }
        last.transform.apply(source_type, record, movable, &mut emit);
    }

    /// Route one output record into one record per destination, per topic.
    pub fn route_records<F>(&self, source_type: &str, record: &mut Record, movable: bool, mut sink: F)
    where
        F: FnMut(&str, Record),
    {
        let eligible = self.eligible(source_type, record);
        let Some((last, rest)) = eligible.split_last() else {
            return;
        };
        for topic in rest {
            for (dest, routed) in topic.transform.transform(source_type, record, false) {
                sink(&dest, routed);
            }
        }
        for (dest, routed) in last.transform.transform(source_type, record, movable) {
            sink(&dest, routed);
        }
    }

    /// Two-phase collection over a batch of `(source type, record, movable)`.
    pub fn collect<'a, I>(&self, outputs: I) -> IndexMap<String, Vec<Record>>
    where
        I: IntoIterator<Item = (&'a str, &'a mut Record, bool)>,
    {
        let mut out: IndexMap<String, Vec<Record>> = IndexMap::new();
        for (source_type, record, movable) in outputs {
            self.route_records(source_type, record, movable, |dest, routed| {
                out.entry(dest.to_string()).or_default().push(routed);
            });
        }
        out
    }

    /// Destination topics reachable from one source type, in rule order.
    pub fn destinations_for(&self, source_type: &str) -> Vec<String> {
        let mut seen: IndexSet<&str> = IndexSet::new();
        if let Some(topics) = self.topics.get(source_type) {
            for topic in topics {
                seen.extend(topic.transform.destinations(source_type));
            }
        }
        seen.into_iter().map(str::to_string).collect()
    }

    /// Every destination named by any action.
    pub fn destinations(&self) -> Vec<String> {
        let mut seen: IndexSet<String> = IndexSet::new();
        for source_type in self.topics.keys() {
            seen.extend(self.destinations_for(source_type));
        }
        seen.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic(members: &[&str], rules: &[(&str, &str, &str)]) -> TopicInfo {
        let mut t = TransformTable::new();
        for (field, dest, renamed) in rules {
            t.push("A", field, Action::new(*dest, *renamed));
        }
        TopicInfo::new(members.iter().map(|m| m.to_string()).collect(), t)
    }

    fn record(fields: &[(&str, Value)]) -> Record {
        fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_membership_gating() {
        let mut dir = TopicDirectory::new();
        dir.add_topic("A", topic(&["x", "flag"], &[("x", "B", "y")]));
        dir.add_topic("A", topic(&[], &[("x", "C", "x")]));

        let mut r = record(&[("x", Value::F64(1.0))]);
        let out = dir.collect([("A", &mut r, false)]);
        assert!(!out.contains_key("B"));
        assert_eq!(out["C"][0]["x"], Value::F64(1.0));
    }

    #[test]
    fn test_every_eligible_topic_routes() {
        let mut dir = TopicDirectory::new();
        dir.add_topic("A", topic(&["x"], &[("x", "B", "y")]));
        dir.add_topic("A", topic(&["x"], &[("x", "C", "w")]));

        let mut r = record(&[("x", Value::U64(5))]);
        let out = dir.collect([("A", &mut r, true)]);
        assert_eq!(out["B"][0]["y"], Value::U64(5));
        assert_eq!(out["C"][0]["w"], Value::U64(5));
        assert!(r.is_empty());
    }

    #[test]
    fn test_eligibility_uses_intact_record() {
        // The second topic requires "x"; the first topic's routing must not
        // consume it before the second is evaluated.
        let mut dir = TopicDirectory::new();
        dir.add_topic("A", topic(&[], &[("x", "B", "x")]));
        dir.add_topic("A", topic(&["x"], &[("x", "C", "x")]));

        let mut r = record(&[("x", Value::I8(2))]);
        let mut seen = Vec::new();
        dir.route("A", &mut r, true, |action, value| {
            seen.push((action.topic.clone(), value.into_owned()));
        });
        assert_eq!(
            seen,
            vec![
                ("B".to_string(), Value::I8(2)),
                ("C".to_string(), Value::I8(2)),
            ]
        );
    }

    #[test]
    fn test_no_topics_for_type() {
        let dir = TopicDirectory::new();
        let mut r = record(&[("x", Value::Bool(true))]);
        assert!(dir.collect([("A", &mut r, true)]).is_empty());
        assert!(!dir.has_topics("A"));
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn test_destinations() {
        let mut dir = TopicDirectory::new();
        dir.add_topic("A", topic(&[], &[("x", "B", "y"), ("z", "root", "z")]));
        dir.add_topic("A", topic(&[], &[("x", "B", "q")]));
        assert_eq!(dir.destinations_for("A"), vec!["B", "root"]);
        assert_eq!(dir.destinations(), vec!["B", "root"]);
    }
}
