use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::task::Task;
use super::timestamp;

/// Schema version written into every new context's metadata.
pub const CONTEXT_VERSION: &str = "1.0.0";

/// The whole tasks document: context name to context.
///
/// Context names are map keys, so they are unique by construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct TasksDocument {
    pub contexts: BTreeMap<String, Context>,
}

/// A named partition of the task space.
///
/// Contexts are only created explicitly (see project initialization) and
/// survive the removal of their last task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Context {
    #[serde(default)]
    pub tasks: Vec<Task>,
    pub metadata: ContextMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ContextMetadata {
    #[serde(deserialize_with = "timestamp::deserialize")]
    #[schemars(with = "DateTime<Utc>")]
    pub created: DateTime<Utc>,
    /// Bumped by every mutation inside the context.
    #[serde(deserialize_with = "timestamp::deserialize")]
    #[schemars(with = "DateTime<Utc>")]
    pub updated: DateTime<Utc>,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    CONTEXT_VERSION.to_string()
}

impl Context {
    pub fn new(name: &str, description: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            tasks: Vec::new(),
            metadata: ContextMetadata {
                created: now,
                updated: now,
                description: description.unwrap_or_else(|| format!("Context for {name}")),
                version: default_version(),
            },
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.metadata.updated = now;
    }
}

/// Result of initializing a project: which contexts were new.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InitReport {
    pub created: Vec<String>,
    pub existing: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}
