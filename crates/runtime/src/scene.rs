//! Scene declaration
//!
//! The format-neutral description of a simulation: which model types to
//! load, which static models to create, and how outputs are routed. Front
//! ends parse their own file formats into a [`SceneDecl`] and hand it to
//! [`Engine::load`](crate::executor::Engine::load).

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::topic::TopicInfo;
use crate::transform::{Action, TransformTable};
use crate::value::Record;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneDecl {
    pub model_types: Vec<ModelTypeDecl>,
    pub models: Vec<ModelDecl>,
    pub topics: Vec<TopicDecl>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelTypeDecl {
    pub name: String,
    /// Resolved through the [`ModelLibrary`](crate::loader::ModelLibrary)
    pub path: String,
    #[serde(default)]
    pub output_movable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDecl {
    pub model_type: String,
    pub id: u64,
    pub side_id: u16,
    #[serde(default)]
    pub init: Record,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicDecl {
    /// Source model type
    pub from: String,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub subscribers: Vec<SubscriberDecl>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriberDecl {
    /// Destination topic
    pub to: String,
    /// `(source field, destination field)` pairs
    #[serde(default)]
    pub renames: Vec<(String, String)>,
}

impl TopicDecl {
    /// Compile into a [`TopicInfo`] whose rules are keyed by `from`.
    pub fn to_topic(&self) -> Result<TopicInfo> {
        if self.from.is_empty() {
            return Err(Error::Config("topic without a source model type".into()));
        }
        let mut transform = TransformTable::new();
        for subscriber in &self.subscribers {
            if subscriber.to.is_empty() {
                return Err(Error::Config(format!(
                    "topic from '{}' has a subscriber without a destination",
                    self.from
                )));
            }
            for (src, dst) in &subscriber.renames {
                transform.push(&self.from, src, Action::new(&subscriber.to, dst));
            }
        }
        Ok(TopicInfo::new(self.members.clone(), transform))
    }
}
