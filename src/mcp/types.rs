//! Request and response types for MCP tools.

use rmcp::schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ============================================================
// Project
// ============================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct InitProjectRequest {
    #[schemars(
        description = "Contexts to create. Names must match ^[a-z][a-z0-9-]*$ (e.g. 'auth', 'billing-api'). Existing contexts are left untouched."
    )]
    #[serde(default)]
    pub contexts: Vec<ContextSpec>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ContextSpec {
    #[schemars(description = "Context name, e.g. 'auth'")]
    pub name: String,
    #[schemars(description = "What this area of the project covers")]
    #[serde(default)]
    pub description: Option<String>,
}

// ============================================================
// Definitions
// ============================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AddFeatureRequest {
    #[schemars(description = "Feature name, same pattern as context names (e.g. 'auth')")]
    pub name: String,
    #[schemars(description = "What users can do with this capability")]
    #[serde(default)]
    pub description: String,
    #[schemars(description = "Tech tags commonly used by tasks in this feature")]
    #[serde(default)]
    pub common_tags: Vec<String>,
    #[schemars(description = "Contexts whose tasks implement this feature")]
    #[serde(default)]
    pub related_contexts: Vec<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateFeatureRequest {
    #[schemars(description = "Name of the feature to update")]
    pub name: String,
    #[schemars(description = "New description. Omit to keep the current one.")]
    #[serde(default)]
    pub description: Option<String>,
    #[schemars(description = "Replacement list of common tags. Omit to keep the current list.")]
    #[serde(default)]
    pub common_tags: Option<Vec<String>>,
    #[schemars(description = "Replacement list of related contexts. Omit to keep the current list.")]
    #[serde(default)]
    pub related_contexts: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct NameRequest {
    #[schemars(description = "Name of the definition to remove")]
    pub name: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TechTagRequest {
    #[schemars(description = "Tag name, lowercase letters, digits and '-' (e.g. 'api', 'frontend')")]
    pub name: String,
    #[schemars(description = "What kind of work this tag marks")]
    pub description: String,
}

// ============================================================
// Tasks
// ============================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AddTaskRequest {
    #[schemars(description = "Existing context to add the task to (create it with init_project)")]
    pub context: String,
    #[schemars(description = "Title, ideally '[TAG] Summary' such as '[API] Add login endpoint'")]
    pub title: String,
    #[schemars(description = "What needs to be done")]
    #[serde(default)]
    pub description: String,
    #[schemars(description = "One of: low, medium, high, critical")]
    pub priority: String,
    #[schemars(description = "Tech tags, lowercase letters, digits and '-'")]
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[schemars(
        description = "Dependencies: '3' (task in same context), 'auth:3' (task in another context) or 'auth:3:1' (subtask)"
    )]
    #[serde(default)]
    pub dependencies: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListTasksRequest {
    #[schemars(description = "Only tasks from this context")]
    #[serde(default)]
    pub context: Option<String>,
    #[schemars(description = "Only tasks carrying this tag")]
    #[serde(default)]
    pub tag: Option<String>,
    #[schemars(description = "Maximum number of tasks to return (default 20)")]
    #[serde(default)]
    pub limit: Option<usize>,
    #[schemars(description = "Number of matching tasks to skip (default 0)")]
    #[serde(default)]
    pub offset: Option<usize>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TaskRefRequest {
    #[schemars(description = "Context name")]
    pub context: String,
    #[schemars(description = "Task id within the context")]
    pub task_id: u32,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateTaskStatusRequest {
    #[schemars(description = "Context name")]
    pub context: String,
    #[schemars(description = "Task id within the context")]
    pub task_id: u32,
    #[schemars(description = "New status: todo, inprogress, inreview, testing, blocked or done")]
    pub status: String,
}

// ============================================================
// Subtasks
// ============================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AddSubtaskRequest {
    #[schemars(description = "Context name")]
    pub context: String,
    #[schemars(description = "Id of the task that owns the subtask tree")]
    pub task_id: u32,
    #[schemars(
        description = "Ids leading to the parent subtask, outermost first. Omit or [] to add directly under the task; [2] adds under subtask 2; [2, 1] under subtask 1 of subtask 2."
    )]
    #[serde(default)]
    pub parent_path: Option<Vec<u32>>,
    #[schemars(description = "Title, ideally '[TAG] Summary'")]
    pub title: String,
    #[schemars(description = "What needs to be done")]
    #[serde(default)]
    pub description: String,
    #[schemars(description = "Tech tags")]
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[schemars(description = "Dependencies in the same format as add_task")]
    #[serde(default)]
    pub dependencies: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListSubtasksRequest {
    #[schemars(description = "Context name")]
    pub context: String,
    #[schemars(description = "Task id within the context")]
    pub task_id: u32,
    #[schemars(description = "Ids leading to the subtask whose children to list. Omit for the task's own children.")]
    #[serde(default)]
    pub parent_path: Option<Vec<u32>>,
    #[schemars(description = "List every descendant depth-first instead of only immediate children")]
    #[serde(default)]
    pub recursive: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SubtaskRefRequest {
    #[schemars(description = "Context name")]
    pub context: String,
    #[schemars(description = "Task id within the context")]
    pub task_id: u32,
    #[schemars(description = "Subtask id among its siblings")]
    pub subtask_id: u32,
    #[schemars(description = "Ids leading to the subtask's parent subtask. Omit when the subtask sits directly under the task.")]
    #[serde(default)]
    pub parent_path: Option<Vec<u32>>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateSubtaskStatusRequest {
    #[schemars(description = "Context name")]
    pub context: String,
    #[schemars(description = "Task id within the context")]
    pub task_id: u32,
    #[schemars(description = "Subtask id among its siblings")]
    pub subtask_id: u32,
    #[schemars(description = "Ids leading to the subtask's parent subtask. Omit when the subtask sits directly under the task.")]
    #[serde(default)]
    pub parent_path: Option<Vec<u32>>,
    #[schemars(description = "New status: todo, inprogress, inreview, testing, blocked or done")]
    pub status: String,
}

impl SubtaskRefRequest {
    pub fn path(&self) -> Vec<u32> {
        full_path(self.parent_path.as_deref(), self.subtask_id)
    }
}

impl UpdateSubtaskStatusRequest {
    pub fn path(&self) -> Vec<u32> {
        full_path(self.parent_path.as_deref(), self.subtask_id)
    }
}

fn full_path(parent: Option<&[u32]>, id: u32) -> Vec<u32> {
    let mut path = parent.unwrap_or_default().to_vec();
    path.push(id);
    path
}

// ============================================================
// Response Types
// ============================================================

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct DeletedResponse {
    pub deleted: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FeatureListResponse {
    pub features: Vec<crate::models::Feature>,
    pub tech_tags: Vec<crate::models::TechTag>,
}
