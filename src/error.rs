//! Error taxonomy for store operations.

use serde::Serialize;
use thiserror::Error;

use crate::models::Status;

/// Every way a store operation can fail.
///
/// Validation, transition, not-found and duplicate errors are raised before
/// anything is mutated. Persistence errors leave the in-memory document as it
/// was before the call.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Invalid status transition '{from}' -> '{to}'. Allowed from '{from}': {}", join_statuses(.allowed))]
    Transition {
        from: Status,
        to: Status,
        allowed: Vec<Status>,
    },

    #[error(transparent)]
    NotFound(#[from] NotFound),

    #[error("{kind} '{name}' already exists")]
    Duplicate { kind: &'static str, name: String },

    #[error("Persistence failed: {0}")]
    Persistence(String),
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

/// A rejected input value, with the alternatives that would have passed.
#[derive(Debug, Clone, Error, Serialize)]
#[error("Invalid {field} '{value}': {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub value: String,
    pub reason: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allowed: Vec<String>,
}

impl ValidationError {
    pub fn new(field: &'static str, value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
            reason: reason.into(),
            allowed: Vec::new(),
        }
    }

    pub fn with_allowed<I, S>(mut self, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed = allowed.into_iter().map(Into::into).collect();
        self
    }
}

/// Which segment of a lookup path failed to resolve.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "missing", rename_all = "snake_case")]
pub enum NotFound {
    #[error("Context '{context}' not found")]
    Context { context: String },

    #[error("Task {task_id} not found in context '{context}'")]
    Task { context: String, task_id: u32 },

    #[error("Subtask {} not found under task {task_id} in context '{context}'", join_path(.path))]
    Subtask {
        context: String,
        task_id: u32,
        path: Vec<u32>,
    },

    #[error("Feature '{name}' not found")]
    Feature { name: String },

    #[error("Tech tag '{name}' not found")]
    TechTag { name: String },
}

impl StoreError {
    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Transition { .. } => "transition",
            Self::NotFound(_) => "not_found",
            Self::Duplicate { .. } => "duplicate",
            Self::Persistence(_) => "persistence",
        }
    }

    /// Structured payload for transports that can carry one.
    pub fn details(&self) -> serde_json::Value {
        let body = match self {
            Self::Validation(e) => serde_json::to_value(e).unwrap_or_default(),
            Self::Transition { from, to, allowed } => serde_json::json!({
                "from": from,
                "to": to,
                "allowed": allowed,
            }),
            Self::NotFound(e) => serde_json::to_value(e).unwrap_or_default(),
            Self::Duplicate { kind, name } => serde_json::json!({ "entity": kind, "name": name }),
            Self::Persistence(_) => serde_json::Value::Null,
        };
        serde_json::json!({ "kind": self.kind(), "details": body })
    }
}

fn join_statuses(statuses: &[Status]) -> String {
    if statuses.is_empty() {
        return "none (terminal)".to_string();
    }
    statuses
        .iter()
        .map(Status::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_path(path: &[u32]) -> String {
    path.iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_message_lists_alternatives() {
        let err = StoreError::Transition {
            from: Status::InProgress,
            to: Status::Todo,
            allowed: Status::InProgress.allowed_next().to_vec(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid status transition 'inprogress' -> 'todo'. Allowed from 'inprogress': inreview, testing, blocked, done"
        );
    }

    #[test]
    fn subtask_not_found_renders_dotted_path() {
        let err = NotFound::Subtask {
            context: "auth".to_string(),
            task_id: 1,
            path: vec![2, 3],
        };
        assert_eq!(err.to_string(), "Subtask 2.3 not found under task 1 in context 'auth'");
        assert_eq!(serde_json::to_value(&err).unwrap()["missing"], "subtask");
    }
}
