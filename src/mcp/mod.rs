//! MCP server exposing the task and definitions stores as tools.

mod guide;
mod types;

pub use guide::guidelines;
pub use types::*;

use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerInfo},
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use serde::Serialize;

use crate::error::StoreError;
use crate::models::*;
use crate::store::{ContextInit, Workspace};
use crate::validation::ValidationReport;

#[derive(Clone)]
pub struct McpServer {
    workspace: Workspace,
    tool_router: ToolRouter<Self>,
}

/// Rejected input becomes `invalid_params` with the structured error as
/// data; a failed write is the server's fault.
fn store_err(e: StoreError) -> McpError {
    match e {
        StoreError::Persistence(_) => McpError::internal_error(e.to_string(), None),
        _ => McpError::invalid_params(e.to_string(), Some(e.details())),
    }
}

fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

impl McpServer {
    pub fn new(workspace: Workspace) -> Self {
        Self {
            workspace,
            tool_router: Self::tool_router(),
        }
    }

    // ============================================================
    // Tool logic - shared by the tools below and by tests
    // ============================================================

    pub fn handle_init_project(&self, req: InitProjectRequest) -> Result<InitReport, McpError> {
        let contexts: Vec<ContextInit> = req
            .contexts
            .into_iter()
            .map(|c| ContextInit {
                name: c.name,
                description: c.description,
            })
            .collect();
        self.workspace.init_project(&contexts).map_err(store_err)
    }

    pub fn handle_add_project_feature(&self, req: AddFeatureRequest) -> Result<Checked<Feature>, McpError> {
        self.workspace
            .definitions
            .add_feature(CreateFeatureInput {
                name: req.name,
                description: req.description,
                common_tags: req.common_tags,
                related_contexts: req.related_contexts,
            })
            .map_err(store_err)
    }

    pub fn handle_update_project_feature(
        &self,
        req: UpdateFeatureRequest,
    ) -> Result<Checked<Feature>, McpError> {
        self.workspace
            .definitions
            .update_feature(
                &req.name,
                UpdateFeatureInput {
                    description: req.description,
                    common_tags: req.common_tags,
                    related_contexts: req.related_contexts,
                },
            )
            .map_err(store_err)
    }

    pub fn handle_remove_project_feature(&self, req: NameRequest) -> Result<DeletedResponse, McpError> {
        self.workspace
            .definitions
            .remove_feature(&req.name)
            .map_err(store_err)?;
        Ok(DeletedResponse {
            deleted: format!("feature '{}'", req.name),
        })
    }

    pub fn handle_list_project_features(&self) -> FeatureListResponse {
        FeatureListResponse {
            features: self.workspace.definitions.list_features(),
            tech_tags: self.workspace.definitions.list_tech_tags(),
        }
    }

    pub fn handle_add_tech_tag(&self, req: TechTagRequest) -> Result<TechTag, McpError> {
        self.workspace
            .definitions
            .add_tech_tag(&req.name, &req.description)
            .map_err(store_err)
    }

    pub fn handle_update_tech_tag(&self, req: TechTagRequest) -> Result<TechTag, McpError> {
        self.workspace
            .definitions
            .update_tech_tag(&req.name, &req.description)
            .map_err(store_err)
    }

    pub fn handle_remove_tech_tag(&self, req: NameRequest) -> Result<DeletedResponse, McpError> {
        self.workspace
            .definitions
            .remove_tech_tag(&req.name)
            .map_err(store_err)?;
        Ok(DeletedResponse {
            deleted: format!("tech tag '{}'", req.name),
        })
    }

    pub fn handle_add_task(&self, req: AddTaskRequest) -> Result<Checked<Task>, McpError> {
        self.workspace
            .tasks
            .add_task(
                &req.context,
                NewTask {
                    title: req.title,
                    description: req.description,
                    priority: req.priority,
                    tags: req.tags.unwrap_or_default(),
                    dependencies: req.dependencies.unwrap_or_default(),
                },
            )
            .map_err(store_err)
    }

    pub fn handle_list_tasks(&self, req: ListTasksRequest) -> TaskPage {
        let defaults = TaskFilter::default();
        self.workspace.tasks.list_tasks(&TaskFilter {
            context: req.context,
            tag: req.tag,
            limit: req.limit.unwrap_or(defaults.limit),
            offset: req.offset.unwrap_or(defaults.offset),
        })
    }

    pub fn handle_get_task(&self, req: TaskRefRequest) -> Result<Task, McpError> {
        self.workspace
            .tasks
            .get_task(&req.context, req.task_id)
            .map_err(store_err)
    }

    pub fn handle_update_task_status(&self, req: UpdateTaskStatusRequest) -> Result<Task, McpError> {
        self.workspace
            .tasks
            .update_task_status(&req.context, req.task_id, &req.status)
            .map_err(store_err)
    }

    pub fn handle_delete_task(&self, req: TaskRefRequest) -> Result<DeletedResponse, McpError> {
        self.workspace
            .tasks
            .delete_task(&req.context, req.task_id)
            .map_err(store_err)?;
        Ok(DeletedResponse {
            deleted: format!("task {} in context '{}'", req.task_id, req.context),
        })
    }

    pub fn handle_add_subtask(&self, req: AddSubtaskRequest) -> Result<Checked<SubtaskEntry>, McpError> {
        let parent_path = req.parent_path.unwrap_or_default();
        self.workspace
            .tasks
            .add_subtask(
                &req.context,
                req.task_id,
                &parent_path,
                NewSubtask {
                    title: req.title,
                    description: req.description,
                    tags: req.tags.unwrap_or_default(),
                    dependencies: req.dependencies.unwrap_or_default(),
                },
            )
            .map_err(store_err)
    }

    pub fn handle_list_subtasks(&self, req: ListSubtasksRequest) -> Result<Vec<SubtaskEntry>, McpError> {
        let parent_path = req.parent_path.unwrap_or_default();
        self.workspace
            .tasks
            .list_subtasks(&req.context, req.task_id, &parent_path, req.recursive)
            .map_err(store_err)
    }

    pub fn handle_get_subtask_by_id(&self, req: SubtaskRefRequest) -> Result<Subtask, McpError> {
        self.workspace
            .tasks
            .get_subtask(&req.context, req.task_id, &req.path())
            .map_err(store_err)
    }

    pub fn handle_update_subtask_status(
        &self,
        req: UpdateSubtaskStatusRequest,
    ) -> Result<Subtask, McpError> {
        self.workspace
            .tasks
            .update_subtask_status(&req.context, req.task_id, &req.path(), &req.status)
            .map_err(store_err)
    }

    pub fn handle_delete_subtask(&self, req: SubtaskRefRequest) -> Result<DeletedResponse, McpError> {
        let path = req.path();
        self.workspace
            .tasks
            .delete_subtask(&req.context, req.task_id, &path)
            .map_err(store_err)?;
        Ok(DeletedResponse {
            deleted: format!(
                "subtask {:?} of task {} in context '{}'",
                path, req.task_id, req.context
            ),
        })
    }

    pub fn handle_validate_project_files(&self) -> ValidationReport {
        self.workspace.validate_project_files()
    }
}

#[tool_router]
impl McpServer {
    // ============================================================
    // Project setup
    // ============================================================

    #[tool(
        description = "Initialize the project: writes the tasks and definitions files if they do not exist and creates each listed context that is missing. Call this FIRST. Returns which contexts were created, which already existed, and warnings for contexts that are not declared features."
    )]
    async fn init_project(
        &self,
        params: Parameters<InitProjectRequest>,
    ) -> Result<CallToolResult, McpError> {
        json_result(&self.handle_init_project(params.0)?)
    }

    #[tool(
        description = "Declare a business feature (a capability users have). Name it like the context that holds its tasks. Fails if the feature exists."
    )]
    async fn add_project_feature(
        &self,
        params: Parameters<AddFeatureRequest>,
    ) -> Result<CallToolResult, McpError> {
        json_result(&self.handle_add_project_feature(params.0)?)
    }

    #[tool(description = "Update a feature. Only the fields you pass are changed.")]
    async fn update_project_feature(
        &self,
        params: Parameters<UpdateFeatureRequest>,
    ) -> Result<CallToolResult, McpError> {
        json_result(&self.handle_update_project_feature(params.0)?)
    }

    #[tool(
        description = "Remove a feature declaration. Tasks in the matching context are kept; validation will warn about the undeclared context."
    )]
    async fn remove_project_feature(
        &self,
        params: Parameters<NameRequest>,
    ) -> Result<CallToolResult, McpError> {
        json_result(&self.handle_remove_project_feature(params.0)?)
    }

    #[tool(description = "List declared features and tech tags, sorted by name.")]
    async fn list_project_features(&self) -> Result<CallToolResult, McpError> {
        json_result(&self.handle_list_project_features())
    }

    #[tool(description = "Declare a tech tag such as 'api' or 'frontend'. Fails if the tag exists.")]
    async fn add_tech_tag(
        &self,
        params: Parameters<TechTagRequest>,
    ) -> Result<CallToolResult, McpError> {
        json_result(&self.handle_add_tech_tag(params.0)?)
    }

    #[tool(description = "Replace the description of a declared tech tag.")]
    async fn update_tech_tag(
        &self,
        params: Parameters<TechTagRequest>,
    ) -> Result<CallToolResult, McpError> {
        json_result(&self.handle_update_tech_tag(params.0)?)
    }

    #[tool(description = "Remove a tech tag declaration. Tasks keep the tag.")]
    async fn remove_tech_tag(
        &self,
        params: Parameters<NameRequest>,
    ) -> Result<CallToolResult, McpError> {
        json_result(&self.handle_remove_tech_tag(params.0)?)
    }

    // ============================================================
    // Tasks
    // ============================================================

    #[tool(
        description = "Add a task to an existing context. New tasks start in 'todo' and get the next id in the context. Returns the task plus warnings (title format, undeclared tags, dependencies that do not resolve yet)."
    )]
    async fn add_task(&self, params: Parameters<AddTaskRequest>) -> Result<CallToolResult, McpError> {
        json_result(&self.handle_add_task(params.0)?)
    }

    #[tool(
        description = "List tasks across contexts in document order, optionally filtered by context and tag. Returns { total, tasks } where total counts all matches before limit/offset. Default limit is 20."
    )]
    async fn list_tasks(
        &self,
        params: Parameters<ListTasksRequest>,
    ) -> Result<CallToolResult, McpError> {
        json_result(&self.handle_list_tasks(params.0))
    }

    #[tool(description = "Get one task with its full subtask tree.")]
    async fn get_task(&self, params: Parameters<TaskRefRequest>) -> Result<CallToolResult, McpError> {
        json_result(&self.handle_get_task(params.0)?)
    }

    #[tool(
        description = "Move a task to a new status. Only moves in the transition table are allowed (see get_guidelines); 'done' is final. On rejection the error lists the allowed next statuses."
    )]
    async fn update_task_status(
        &self,
        params: Parameters<UpdateTaskStatusRequest>,
    ) -> Result<CallToolResult, McpError> {
        json_result(&self.handle_update_task_status(params.0)?)
    }

    #[tool(description = "Delete a task and all of its subtasks.")]
    async fn delete_task(
        &self,
        params: Parameters<TaskRefRequest>,
    ) -> Result<CallToolResult, McpError> {
        json_result(&self.handle_delete_task(params.0)?)
    }

    // ============================================================
    // Subtasks
    // ============================================================

    #[tool(
        description = "Add a subtask under a task, or under a nested subtask via parent_path. Returns the subtask with its id path."
    )]
    async fn add_subtask(
        &self,
        params: Parameters<AddSubtaskRequest>,
    ) -> Result<CallToolResult, McpError> {
        json_result(&self.handle_add_subtask(params.0)?)
    }

    #[tool(
        description = "List the subtasks of a task (or of the subtask at parent_path). With recursive=true every descendant is listed depth-first with its path and depth."
    )]
    async fn list_subtasks(
        &self,
        params: Parameters<ListSubtasksRequest>,
    ) -> Result<CallToolResult, McpError> {
        json_result(&self.handle_list_subtasks(params.0)?)
    }

    #[tool(description = "Get one subtask by id. Use parent_path for subtasks nested below other subtasks.")]
    async fn get_subtask_by_id(
        &self,
        params: Parameters<SubtaskRefRequest>,
    ) -> Result<CallToolResult, McpError> {
        json_result(&self.handle_get_subtask_by_id(params.0)?)
    }

    #[tool(description = "Move a subtask to a new status, following the same transition table as tasks.")]
    async fn update_subtask_status(
        &self,
        params: Parameters<UpdateSubtaskStatusRequest>,
    ) -> Result<CallToolResult, McpError> {
        json_result(&self.handle_update_subtask_status(params.0)?)
    }

    #[tool(description = "Delete a subtask and everything nested below it.")]
    async fn delete_subtask(
        &self,
        params: Parameters<SubtaskRefRequest>,
    ) -> Result<CallToolResult, McpError> {
        json_result(&self.handle_delete_subtask(params.0)?)
    }

    // ============================================================
    // Reference
    // ============================================================

    #[tool(description = "JSON Schema of the tasks document.")]
    async fn get_tasks_schema(&self) -> Result<CallToolResult, McpError> {
        json_result(&schemars::schema_for!(TasksDocument))
    }

    #[tool(description = "JSON Schema of the definitions document (features and tech tags).")]
    async fn get_definitions_schema(&self) -> Result<CallToolResult, McpError> {
        json_result(&schemars::schema_for!(DefinitionsDocument))
    }

    #[tool(
        description = "Naming conventions, dependency format and the status transition table. Read this before creating tasks."
    )]
    async fn get_guidelines(&self) -> Result<CallToolResult, McpError> {
        Ok(CallToolResult::success(vec![Content::text(guidelines())]))
    }

    #[tool(
        description = "Check both documents against every rule and return { valid, errors, warnings }. Changes nothing."
    )]
    async fn validate_project_files(&self) -> Result<CallToolResult, McpError> {
        json_result(&self.handle_validate_project_files())
    }
}

#[tool_handler]
impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: rmcp::model::Implementation {
                name: "taskbook".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                title: None,
                icons: None,
                website_url: None,
            },
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            instructions: Some(
                r#"Taskbook keeps a project's tasks in contexts (business feature areas) with unlimited subtask nesting.

WORKFLOW:
1. init_project with the contexts you need (e.g. 'auth', 'billing').
2. add_project_feature for each context and add_tech_tag for the tags you use.
3. add_task / add_subtask; titles like '[API] Add login endpoint'.
4. Move work along with update_task_status / update_subtask_status.
5. validate_project_files before handing off.

RULES:
- Statuses: todo, inprogress, inreview, testing, blocked, done. 'done' is final.
- Priorities: low, medium, high, critical.
- Dependencies: '3', 'auth:3' or 'auth:3:1'.
- Warnings never block a change; errors always do.

Call get_guidelines for the full conventions and transition table."#
                    .into(),
            ),
            ..Default::default()
        }
    }
}

pub async fn run_stdio_server(workspace: Workspace) -> anyhow::Result<()> {
    use tokio::io::{stdin, stdout};

    tracing::info!("Starting MCP server via stdio");

    let service = McpServer::new(workspace);
    let server = service.serve((stdin(), stdout())).await?;

    let quit_reason = server.waiting().await?;
    tracing::info!("MCP server stopped: {:?}", quit_reason);

    Ok(())
}
