use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A reference from one work item to another.
///
/// Wire format is exact, with no surrounding whitespace:
/// - bare integer `3`: task 3 in the same context
/// - `"auth:3"`: task 3 in context `auth`
/// - `"auth:3:1"`: subtask 1 of task 3 in context `auth`
///
/// A dependency is not ownership. Deleting the target leaves the reference
/// dangling; it is only checked when created and when validating files.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "RawDependency", try_from = "RawDependency")]
pub enum DependencyRef {
    Local(u32),
    CrossTask { context: String, task_id: u32 },
    CrossSubtask {
        context: String,
        task_id: u32,
        subtask_id: u32,
    },
}

/// JSON shape of a dependency: a number or a string.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum RawDependency {
    Id(u32),
    Ref(String),
}

/// Why a dependency string failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed dependency reference '{input}': {reason}")]
pub struct DependencyParseError {
    pub input: String,
    pub reason: &'static str,
}

impl DependencyRef {
    /// Context this reference points into, resolving local references
    /// against `current`.
    pub fn context<'a>(&'a self, current: &'a str) -> &'a str {
        match self {
            Self::Local(_) => current,
            Self::CrossTask { context, .. } | Self::CrossSubtask { context, .. } => context,
        }
    }

    pub fn task_id(&self) -> u32 {
        match self {
            Self::Local(id) => *id,
            Self::CrossTask { task_id, .. } | Self::CrossSubtask { task_id, .. } => *task_id,
        }
    }

    pub fn subtask_id(&self) -> Option<u32> {
        match self {
            Self::CrossSubtask { subtask_id, .. } => Some(*subtask_id),
            _ => None,
        }
    }
}

fn parse_id(input: &str, part: &str) -> Result<u32, DependencyParseError> {
    let malformed = |reason| DependencyParseError {
        input: input.to_string(),
        reason,
    };
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed("ids must be unsigned integers"));
    }
    match part.parse::<u32>() {
        Ok(0) => Err(malformed("ids start at 1")),
        Ok(id) => Ok(id),
        Err(_) => Err(malformed("id out of range")),
    }
}

impl FromStr for DependencyRef {
    type Err = DependencyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = |reason| DependencyParseError {
            input: s.to_string(),
            reason,
        };
        let parts: Vec<&str> = s.split(':').collect();
        let (context, task, subtask) = match parts.as_slice() {
            [id] => return Ok(Self::Local(parse_id(s, id)?)),
            [context, task] => (*context, *task, None),
            [context, task, subtask] => (*context, *task, Some(*subtask)),
            _ => return Err(malformed("expected at most three ':'-separated parts")),
        };
        if !crate::validation::is_context_name(context) {
            return Err(malformed("context must match ^[a-z][a-z0-9-]*$"));
        }

        let task_id = parse_id(s, task)?;
        Ok(match subtask {
            None => Self::CrossTask {
                context: context.to_string(),
                task_id,
            },
            Some(subtask) => Self::CrossSubtask {
                context: context.to_string(),
                task_id,
                subtask_id: parse_id(s, subtask)?,
            },
        })
    }
}

impl fmt::Display for DependencyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(id) => write!(f, "{id}"),
            Self::CrossTask { context, task_id } => write!(f, "{context}:{task_id}"),
            Self::CrossSubtask {
                context,
                task_id,
                subtask_id,
            } => write!(f, "{context}:{task_id}:{subtask_id}"),
        }
    }
}

impl From<DependencyRef> for RawDependency {
    fn from(dep: DependencyRef) -> Self {
        match dep {
            DependencyRef::Local(id) => Self::Id(id),
            other => Self::Ref(other.to_string()),
        }
    }
}

impl TryFrom<RawDependency> for DependencyRef {
    type Error = DependencyParseError;

    fn try_from(raw: RawDependency) -> Result<Self, Self::Error> {
        match raw {
            RawDependency::Id(0) => Err(DependencyParseError {
                input: "0".to_string(),
                reason: "ids start at 1",
            }),
            RawDependency::Id(id) => Ok(Self::Local(id)),
            RawDependency::Ref(s) => s.parse(),
        }
    }
}
