use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::StoreError;
use crate::mcp::{guidelines, AddFeatureRequest, InitProjectRequest, TechTagRequest};
use crate::models::*;
use crate::store::{ContextInit, Workspace};
use crate::validation::ValidationReport;

type ApiResult<T> = Result<T, (StatusCode, Json<Value>)>;

// ============================================================
// Error Handling
// ============================================================

/// Map a store error to a status code and a JSON body carrying its details.
/// Persistence failures are logged and reported without internals.
fn store_error(e: StoreError) -> (StatusCode, Json<Value>) {
    let status = match &e {
        StoreError::Validation(_) => StatusCode::BAD_REQUEST,
        StoreError::Transition { .. } | StoreError::Duplicate { .. } => StatusCode::CONFLICT,
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::Persistence(_) => {
            tracing::error!("Internal error: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal server error", "kind": e.kind() })),
            );
        }
    };
    tracing::warn!("Request rejected: {}", e);
    let mut body = e.details();
    body["error"] = Value::String(e.to_string());
    (status, Json(body))
}

fn bad_request(message: String) -> (StatusCode, Json<Value>) {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

/// Parse a dotted subtask path (`2.1`) into ids.
fn parse_path(raw: &str) -> ApiResult<Vec<u32>> {
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    raw.split('.')
        .map(|segment| match segment.parse::<u32>() {
            Ok(id) if id > 0 => Ok(id),
            _ => Err(bad_request(format!("Invalid subtask path '{raw}'"))),
        })
        .collect()
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

// ============================================================
// Project
// ============================================================

pub async fn init_project(
    State(workspace): State<Workspace>,
    Json(input): Json<InitProjectRequest>,
) -> ApiResult<Json<InitReport>> {
    let contexts: Vec<ContextInit> = input
        .contexts
        .into_iter()
        .map(|c| ContextInit {
            name: c.name,
            description: c.description,
        })
        .collect();
    workspace.init_project(&contexts).map(Json).map_err(store_error)
}

pub async fn list_contexts(State(workspace): State<Workspace>) -> Json<Vec<String>> {
    Json(workspace.tasks.context_names())
}

#[derive(Debug, Deserialize)]
pub struct CreateContextBody {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

pub async fn create_context(
    State(workspace): State<Workspace>,
    Json(input): Json<CreateContextBody>,
) -> ApiResult<(StatusCode, Json<Checked<Context>>)> {
    workspace
        .tasks
        .create_context(&input.name, input.description)
        .map(|c| (StatusCode::CREATED, Json(c)))
        .map_err(store_error)
}

pub async fn validate_project(State(workspace): State<Workspace>) -> Json<ValidationReport> {
    Json(workspace.validate_project_files())
}

pub async fn get_guidelines() -> String {
    guidelines()
}

pub async fn get_tasks_schema() -> Json<Value> {
    Json(serde_json::to_value(schemars::schema_for!(TasksDocument)).unwrap_or_default())
}

pub async fn get_definitions_schema() -> Json<Value> {
    Json(serde_json::to_value(schemars::schema_for!(DefinitionsDocument)).unwrap_or_default())
}

// ============================================================
// Features
// ============================================================

pub async fn list_features(State(workspace): State<Workspace>) -> Json<Vec<Feature>> {
    Json(workspace.definitions.list_features())
}

pub async fn add_feature(
    State(workspace): State<Workspace>,
    Json(input): Json<AddFeatureRequest>,
) -> ApiResult<(StatusCode, Json<Checked<Feature>>)> {
    workspace
        .definitions
        .add_feature(CreateFeatureInput {
            name: input.name,
            description: input.description,
            common_tags: input.common_tags,
            related_contexts: input.related_contexts,
        })
        .map(|f| (StatusCode::CREATED, Json(f)))
        .map_err(store_error)
}

pub async fn update_feature(
    State(workspace): State<Workspace>,
    Path(name): Path<String>,
    Json(input): Json<UpdateFeatureInput>,
) -> ApiResult<Json<Checked<Feature>>> {
    workspace
        .definitions
        .update_feature(&name, input)
        .map(Json)
        .map_err(store_error)
}

pub async fn remove_feature(
    State(workspace): State<Workspace>,
    Path(name): Path<String>,
) -> ApiResult<StatusCode> {
    workspace
        .definitions
        .remove_feature(&name)
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(store_error)
}

// ============================================================
// Tech Tags
// ============================================================

pub async fn list_tech_tags(State(workspace): State<Workspace>) -> Json<Vec<TechTag>> {
    Json(workspace.definitions.list_tech_tags())
}

pub async fn add_tech_tag(
    State(workspace): State<Workspace>,
    Json(input): Json<TechTagRequest>,
) -> ApiResult<(StatusCode, Json<TechTag>)> {
    workspace
        .definitions
        .add_tech_tag(&input.name, &input.description)
        .map(|t| (StatusCode::CREATED, Json(t)))
        .map_err(store_error)
}

#[derive(Debug, Deserialize)]
pub struct DescriptionBody {
    pub description: String,
}

pub async fn update_tech_tag(
    State(workspace): State<Workspace>,
    Path(name): Path<String>,
    Json(input): Json<DescriptionBody>,
) -> ApiResult<Json<TechTag>> {
    workspace
        .definitions
        .update_tech_tag(&name, &input.description)
        .map(Json)
        .map_err(store_error)
}

pub async fn remove_tech_tag(
    State(workspace): State<Workspace>,
    Path(name): Path<String>,
) -> ApiResult<StatusCode> {
    workspace
        .definitions
        .remove_tech_tag(&name)
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(store_error)
}

// ============================================================
// Tasks
// ============================================================

pub async fn list_tasks(
    State(workspace): State<Workspace>,
    Query(filter): Query<TaskFilter>,
) -> Json<TaskPage> {
    Json(workspace.tasks.list_tasks(&filter))
}

pub async fn add_task(
    State(workspace): State<Workspace>,
    Path(context): Path<String>,
    Json(input): Json<NewTask>,
) -> ApiResult<(StatusCode, Json<Checked<Task>>)> {
    workspace
        .tasks
        .add_task(&context, input)
        .map(|t| (StatusCode::CREATED, Json(t)))
        .map_err(store_error)
}

pub async fn get_task(
    State(workspace): State<Workspace>,
    Path((context, id)): Path<(String, u32)>,
) -> ApiResult<Json<Task>> {
    workspace
        .tasks
        .get_task(&context, id)
        .map(Json)
        .map_err(store_error)
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: String,
}

pub async fn update_task_status(
    State(workspace): State<Workspace>,
    Path((context, id)): Path<(String, u32)>,
    Json(input): Json<StatusBody>,
) -> ApiResult<Json<Task>> {
    workspace
        .tasks
        .update_task_status(&context, id, &input.status)
        .map(Json)
        .map_err(store_error)
}

pub async fn delete_task(
    State(workspace): State<Workspace>,
    Path((context, id)): Path<(String, u32)>,
) -> ApiResult<StatusCode> {
    workspace
        .tasks
        .delete_task(&context, id)
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(store_error)
}

// ============================================================
// Subtasks
// ============================================================

#[derive(Debug, Deserialize)]
pub struct SubtaskListQuery {
    /// Dotted path of the parent subtask; absent for the task's own children.
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub recursive: bool,
}

pub async fn list_subtasks(
    State(workspace): State<Workspace>,
    Path((context, id)): Path<(String, u32)>,
    Query(query): Query<SubtaskListQuery>,
) -> ApiResult<Json<Vec<SubtaskEntry>>> {
    let parent = parse_path(query.parent.as_deref().unwrap_or_default())?;
    workspace
        .tasks
        .list_subtasks(&context, id, &parent, query.recursive)
        .map(Json)
        .map_err(store_error)
}

#[derive(Debug, Deserialize)]
pub struct NewSubtaskBody {
    #[serde(default)]
    pub parent_path: Vec<u32>,
    #[serde(flatten)]
    pub subtask: NewSubtask,
}

pub async fn add_subtask(
    State(workspace): State<Workspace>,
    Path((context, id)): Path<(String, u32)>,
    Json(input): Json<NewSubtaskBody>,
) -> ApiResult<(StatusCode, Json<Checked<SubtaskEntry>>)> {
    workspace
        .tasks
        .add_subtask(&context, id, &input.parent_path, input.subtask)
        .map(|s| (StatusCode::CREATED, Json(s)))
        .map_err(store_error)
}

pub async fn get_subtask(
    State(workspace): State<Workspace>,
    Path((context, id, path)): Path<(String, u32, String)>,
) -> ApiResult<Json<Subtask>> {
    let path = parse_path(&path)?;
    workspace
        .tasks
        .get_subtask(&context, id, &path)
        .map(Json)
        .map_err(store_error)
}

pub async fn update_subtask_status(
    State(workspace): State<Workspace>,
    Path((context, id, path)): Path<(String, u32, String)>,
    Json(input): Json<StatusBody>,
) -> ApiResult<Json<Subtask>> {
    let path = parse_path(&path)?;
    workspace
        .tasks
        .update_subtask_status(&context, id, &path, &input.status)
        .map(Json)
        .map_err(store_error)
}

pub async fn delete_subtask(
    State(workspace): State<Workspace>,
    Path((context, id, path)): Path<(String, u32, String)>,
) -> ApiResult<StatusCode> {
    let path = parse_path(&path)?;
    workspace
        .tasks
        .delete_subtask(&context, id, &path)
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(store_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NotFound;

    #[test]
    fn parses_dotted_paths() {
        assert_eq!(parse_path("2.1").unwrap(), vec![2, 1]);
        assert_eq!(parse_path("").unwrap(), Vec::<u32>::new());
        assert!(parse_path("2..1").is_err());
        assert!(parse_path("0").is_err());
    }

    #[test]
    fn maps_errors_to_status_codes() {
        let missing: StoreError = NotFound::Context {
            context: "auth".to_string(),
        }
        .into();
        assert_eq!(store_error(missing).0, StatusCode::NOT_FOUND);

        let duplicate = StoreError::Duplicate {
            kind: "Feature",
            name: "auth".to_string(),
        };
        assert_eq!(store_error(duplicate).0, StatusCode::CONFLICT);

        let failed = StoreError::Persistence("disk full".to_string());
        let (status, Json(body)) = store_error(failed);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.to_string().contains("disk full"));
    }
}
