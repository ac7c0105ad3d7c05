//! YAML scene files.
//!
//! ```yaml
//! model_types:
//!   - model_type_name: mover
//!     dll_path: builtin:mover
//!     output_movable: true
//! models:
//!   - model_type: mover
//!     id: 1
//!     side_id: 1
//!     init_value:
//!       longitude: 10.5
//!       speed: 2.0
//!       tag: {u16: 7}
//! topics:
//!   - from: mover
//!     members: [longitude, latitude]
//!     subscribers:
//!       - to: root
//!         name_convert:
//!           - name: longitude
//!           - src_name: latitude
//!             dst_name: latitude
//! ```
//!
//! Plain scalars become `bool`, `i64`, `f64` or `string`. A single-key map
//! whose key is a value kind (`{u16: 7}`, `{f32: 1.5}`) gives an exact
//! width. Sequences and maps nest as lists and records.

use std::path::Path;

use framesim_runtime::scene::{ModelDecl, ModelTypeDecl, SceneDecl, SubscriberDecl, TopicDecl};
use framesim_runtime::{Record, Value};
use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::SceneError;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SceneFile {
    #[serde(default)]
    model_types: Vec<ModelTypeEntry>,
    #[serde(default)]
    models: Vec<ModelEntry>,
    #[serde(default)]
    topics: Vec<TopicEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelTypeEntry {
    model_type_name: String,
    dll_path: String,
    #[serde(default)]
    output_movable: bool,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    model_type: String,
    id: u64,
    side_id: u16,
    #[serde(default)]
    init_value: IndexMap<String, SceneValue>,
}

#[derive(Debug, Deserialize)]
struct TopicEntry {
    from: String,
    #[serde(default)]
    members: Vec<String>,
    #[serde(default)]
    subscribers: Vec<SubscriberEntry>,
}

#[derive(Debug, Deserialize)]
struct SubscriberEntry {
    to: String,
    #[serde(default)]
    name_convert: Vec<NameConvert>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NameConvert {
    Same { name: String },
    Renamed { src_name: String, dst_name: String },
}

/// A value as written in YAML.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SceneValue {
    Typed(Value),
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<SceneValue>),
    Map(IndexMap<String, SceneValue>),
}

impl From<SceneValue> for Value {
    fn from(v: SceneValue) -> Self {
        match v {
            SceneValue::Typed(v) => v,
            SceneValue::Bool(b) => Value::Bool(b),
            SceneValue::Int(i) => Value::I64(i),
            SceneValue::Float(f) => Value::F64(f),
            SceneValue::Text(s) => Value::String(s),
            SceneValue::List(items) => Value::List(items.into_iter().map(Value::from).collect()),
            SceneValue::Map(map) => Value::Record(to_record(map)),
        }
    }
}

fn to_record(map: IndexMap<String, SceneValue>) -> Record {
    map.into_iter().map(|(k, v)| (k, Value::from(v))).collect()
}

impl NameConvert {
    fn into_pair(self) -> (String, String) {
        match self {
            NameConvert::Same { name } => (name.clone(), name),
            NameConvert::Renamed { src_name, dst_name } => (src_name, dst_name),
        }
    }
}

/// Parse scene text.
pub fn parse_scene(text: &str) -> Result<SceneDecl, SceneError> {
    let file: SceneFile = serde_yaml::from_str(text)?;

    let model_types = file
        .model_types
        .into_iter()
        .map(|t| ModelTypeDecl {
            name: t.model_type_name,
            path: t.dll_path,
            output_movable: t.output_movable,
        })
        .collect();

    let models = file
        .models
        .into_iter()
        .map(|m| ModelDecl {
            model_type: m.model_type,
            id: m.id,
            side_id: m.side_id,
            init: to_record(m.init_value),
        })
        .collect();

    let mut topics = Vec::with_capacity(file.topics.len());
    for topic in file.topics {
        let mut subscribers = Vec::with_capacity(topic.subscribers.len());
        for sub in topic.subscribers {
            if sub.name_convert.is_empty() {
                return Err(SceneError::Invalid(format!(
                    "subscriber '{}' of topic from '{}' converts no fields",
                    sub.to, topic.from
                )));
            }
            subscribers.push(SubscriberDecl {
                to: sub.to,
                renames: sub.name_convert.into_iter().map(NameConvert::into_pair).collect(),
            });
        }
        topics.push(TopicDecl {
            from: topic.from,
            members: topic.members,
            subscribers,
        });
    }

    Ok(SceneDecl {
        model_types,
        models,
        topics,
    })
}

/// Read and parse a scene file.
pub fn load_scene(path: &Path) -> Result<SceneDecl, SceneError> {
    let text = std::fs::read_to_string(path).map_err(|source| SceneError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_scene(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENE: &str = r#"
model_types:
  - model_type_name: mover
    dll_path: builtin:mover
    output_movable: true
  - model_type_name: observer
    dll_path: observer
models:
  - model_type: mover
    id: 1
    side_id: 2
    init_value:
      longitude: 10.5
      speed: 2
      name: alpha
      armed: true
      tag: {u16: 7}
      waypoints: [1.0, 2.0]
      extra: {depth: 3}
topics:
  - from: mover
    members: [longitude, latitude]
    subscribers:
      - to: root
        name_convert:
          - name: longitude
          - src_name: latitude
            dst_name: lat
"#;

    #[test]
    fn test_parse_full_scene() {
        let scene = parse_scene(SCENE).unwrap();

        assert_eq!(scene.model_types.len(), 2);
        assert!(scene.model_types[0].output_movable);
        assert!(!scene.model_types[1].output_movable);
        assert_eq!(scene.model_types[0].path, "builtin:mover");

        let init = &scene.models[0].init;
        assert_eq!(scene.models[0].side_id, 2);
        assert_eq!(init["longitude"], Value::F64(10.5));
        assert_eq!(init["speed"], Value::I64(2));
        assert_eq!(init["name"], Value::from("alpha"));
        assert_eq!(init["armed"], Value::Bool(true));
        assert_eq!(init["tag"], Value::U16(7));
        assert_eq!(
            init["waypoints"],
            Value::List(vec![Value::F64(1.0), Value::F64(2.0)])
        );
        let mut extra = Record::new();
        extra.insert("depth".into(), Value::I64(3));
        assert_eq!(init["extra"], Value::Record(extra));

        let topic = &scene.topics[0];
        assert_eq!(topic.members, vec!["longitude", "latitude"]);
        assert_eq!(
            topic.subscribers[0].renames,
            vec![
                ("longitude".to_string(), "longitude".to_string()),
                ("latitude".to_string(), "lat".to_string()),
            ]
        );
    }

    #[test]
    fn test_subscriber_without_conversions() {
        let text = r#"
topics:
  - from: mover
    subscribers:
      - to: root
"#;
        assert!(matches!(parse_scene(text), Err(SceneError::Invalid(_))));
    }

    #[test]
    fn test_missing_required_key() {
        let text = r#"
models:
  - model_type: mover
    side_id: 1
"#;
        assert!(matches!(parse_scene(text), Err(SceneError::Yaml(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_scene(&dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, SceneError::Io { .. }));
    }
}
