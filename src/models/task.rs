use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::dependency::{DependencyRef, RawDependency};
use super::timestamp;

/// A unit of work inside a context.
///
/// Tasks are identified by an integer `id` that is unique among the top-level
/// tasks of their context only. Each task owns an ordered tree of
/// [`Subtask`]s; deleting the task deletes the whole tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: u32,
    /// Expected to look like `[API] Short summary`; deviations are warnings.
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub status: Status,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    #[schemars(with = "Vec<RawDependency>")]
    pub dependencies: Vec<DependencyRef>,
    #[serde(default)]
    pub blockers: Vec<String>,
    #[serde(default)]
    pub notes: String,
    /// Set once at insertion and never touched again.
    #[serde(deserialize_with = "timestamp::deserialize")]
    #[schemars(with = "DateTime<Utc>")]
    pub creation_date: DateTime<Utc>,
    /// Stamped when the task reaches `done`.
    #[serde(
        default,
        deserialize_with = "timestamp::deserialize_option",
        skip_serializing_if = "Option::is_none"
    )]
    #[schemars(with = "Option<DateTime<Utc>>")]
    pub completed_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
}

/// A child work item. Structurally a [`Task`] without priority.
///
/// Subtask ids are unique only among their immediate siblings; the same id
/// can appear under a different parent or at another depth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Subtask {
    pub id: u32,
    pub title: String,
    pub description: String,
    pub status: Status,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    #[schemars(with = "Vec<RawDependency>")]
    pub dependencies: Vec<DependencyRef>,
    #[serde(default)]
    pub blockers: Vec<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(deserialize_with = "timestamp::deserialize")]
    #[schemars(with = "DateTime<Utc>")]
    pub creation_date: DateTime<Utc>,
    #[serde(
        default,
        deserialize_with = "timestamp::deserialize_option",
        skip_serializing_if = "Option::is_none"
    )]
    #[schemars(with = "Option<DateTime<Utc>>")]
    pub completed_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
}

/// Shared view over tasks and subtasks used by the allocator and navigator.
pub trait Node {
    fn id(&self) -> u32;
    fn status(&self) -> Status;
    fn subtasks(&self) -> &[Subtask];
    fn subtasks_mut(&mut self) -> &mut Vec<Subtask>;

    /// Move to `status`, stamping or clearing the completion date.
    fn set_status(&mut self, status: Status, now: DateTime<Utc>);
}

macro_rules! impl_node {
    ($ty:ty) => {
        impl Node for $ty {
            fn id(&self) -> u32 {
                self.id
            }

            fn status(&self) -> Status {
                self.status
            }

            fn subtasks(&self) -> &[Subtask] {
                &self.subtasks
            }

            fn subtasks_mut(&mut self) -> &mut Vec<Subtask> {
                &mut self.subtasks
            }

            fn set_status(&mut self, status: Status, now: DateTime<Utc>) {
                self.status = status;
                self.completed_date = (status == Status::Done).then_some(now);
            }
        }
    };
}

impl_node!(Task);
impl_node!(Subtask);

/// Urgency of a top-level task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub const ALL: [Priority; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == s)
    }
}

/// Workflow status of a task or subtask.
///
/// Allowed moves are fixed; see [`Status::allowed_next`]. `Done` is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Todo,
    InProgress,
    InReview,
    Testing,
    Blocked,
    Done,
}

impl Status {
    pub const ALL: [Status; 6] = [
        Self::Todo,
        Self::InProgress,
        Self::InReview,
        Self::Testing,
        Self::Blocked,
        Self::Done,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "inprogress",
            Self::InReview => "inreview",
            Self::Testing => "testing",
            Self::Blocked => "blocked",
            Self::Done => "done",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|st| st.as_str() == s)
    }

    /// The transition table: statuses reachable from `self` in one move.
    pub fn allowed_next(&self) -> &'static [Status] {
        match self {
            Self::Todo => &[Self::InProgress, Self::Blocked],
            Self::InProgress => &[Self::InReview, Self::Testing, Self::Blocked, Self::Done],
            Self::InReview => &[Self::InProgress, Self::Testing, Self::Done],
            Self::Testing => &[Self::InProgress, Self::Done, Self::Blocked],
            Self::Blocked => &[Self::Todo, Self::InProgress],
            Self::Done => &[],
        }
    }

    pub fn can_transition_to(&self, next: Status) -> bool {
        self.allowed_next().contains(&next)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input for creating a task. Raw strings are validated by the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub priority: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Wire-format references: `"3"`, `"auth:3"` or `"auth:3:1"`.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// Input for creating a subtask under a task or under another subtask.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewSubtask {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// A task annotated with the context it was listed from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextTask {
    pub context: String,
    #[serde(flatten)]
    pub task: Task,
}

/// One page of [`ContextTask`]s plus the unpaginated match count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskPage {
    pub total: usize,
    pub tasks: Vec<ContextTask>,
}

/// Filters for listing tasks. Order is always insertion order.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskFilter {
    pub context: Option<String>,
    pub tag: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

impl Default for TaskFilter {
    fn default() -> Self {
        Self {
            context: None,
            tag: None,
            limit: default_limit(),
            offset: 0,
        }
    }
}

fn default_limit() -> usize {
    20
}

/// A subtask flattened out of a tree, with the id path that addresses it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtaskEntry {
    pub path: Vec<u32>,
    pub depth: usize,
    #[serde(flatten)]
    pub subtask: Subtask,
}

/// A successful result with any non-blocking warnings raised along the way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checked<T> {
    pub item: T,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl<T> Checked<T> {
    pub fn new(item: T, warnings: Vec<String>) -> Self {
        Self { item, warnings }
    }
}
