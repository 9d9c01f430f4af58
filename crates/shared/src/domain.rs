use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Server ids arrive as integers from the REST API and as strings from form
/// selections; both collapse into the same string-backed id.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Int(i64),
    Str(String),
}

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                Ok(match RawId::deserialize(deserializer)? {
                    RawId::Int(v) => Self(v.to_string()),
                    RawId::Str(v) => Self(v),
                })
            }
        }
    };
}

id_newtype!(ProjectId);
id_newtype!(ArtifactId);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    #[serde(alias = "name")]
    pub label: String,
    #[serde(default)]
    pub description: String,
}

impl Project {
    /// Placeholder shown while no project exists.
    pub fn placeholder() -> Self {
        Self::default()
    }
}

/// Datasets, feature sets, models and predictions share one summary shape on
/// the wire; the collection they belong to gives them their meaning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSummary {
    pub id: ArtifactId,
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "project_id")]
    pub project: Option<ProjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Projects,
    Datasets,
    Featuresets,
    Models,
    Predictions,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::Projects,
        Collection::Datasets,
        Collection::Featuresets,
        Collection::Models,
        Collection::Predictions,
    ];

    /// REST route serving the full listing of this collection.
    pub fn route(self) -> &'static str {
        match self {
            Collection::Projects => "/project",
            Collection::Datasets => "/dataset",
            Collection::Featuresets => "/features",
            Collection::Models => "/models",
            Collection::Predictions => "/predictions",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Projects => "projects",
            Collection::Datasets => "datasets",
            Collection::Featuresets => "featuresets",
            Collection::Models => "models",
            Collection::Predictions => "predictions",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    #[default]
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub note: String,
    pub kind: NotificationKind,
}

impl Notification {
    pub fn new(note: impl Into<String>, kind: NotificationKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            note: note.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub stage: String,
    pub pct: u8,
}
