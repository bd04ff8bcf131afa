mod handlers;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::store::Workspace;

pub fn create_router(workspace: Workspace) -> Router {
    let api = Router::new()
        // Project
        .route("/init", post(handlers::init_project))
        .route("/contexts", get(handlers::list_contexts).post(handlers::create_context))
        .route("/validate", get(handlers::validate_project))
        .route("/guidelines", get(handlers::get_guidelines))
        .route("/schema/tasks", get(handlers::get_tasks_schema))
        .route("/schema/definitions", get(handlers::get_definitions_schema))
        // Definitions
        .route("/features", get(handlers::list_features).post(handlers::add_feature))
        .route(
            "/features/{name}",
            put(handlers::update_feature).delete(handlers::remove_feature),
        )
        .route("/tech-tags", get(handlers::list_tech_tags).post(handlers::add_tech_tag))
        .route(
            "/tech-tags/{name}",
            put(handlers::update_tech_tag).delete(handlers::remove_tech_tag),
        )
        // Tasks
        .route("/tasks", get(handlers::list_tasks))
        .route("/contexts/{context}/tasks", post(handlers::add_task))
        .route(
            "/contexts/{context}/tasks/{id}",
            get(handlers::get_task).delete(handlers::delete_task),
        )
        .route(
            "/contexts/{context}/tasks/{id}/status",
            put(handlers::update_task_status),
        )
        // Subtasks, addressed by a dotted id path such as `2.1`
        .route(
            "/contexts/{context}/tasks/{id}/subtasks",
            get(handlers::list_subtasks).post(handlers::add_subtask),
        )
        .route(
            "/contexts/{context}/tasks/{id}/subtasks/{path}",
            get(handlers::get_subtask).delete(handlers::delete_subtask),
        )
        .route(
            "/contexts/{context}/tasks/{id}/subtasks/{path}/status",
            put(handlers::update_subtask_status),
        )
        // Health
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(workspace)
}
