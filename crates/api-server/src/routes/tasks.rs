//! Task API endpoints
//!
//! Tasks resolve their tenancy through the parent deal; the `dealId` query
//! parameter is required for listing.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crm_core::task::Task;

use crate::state::AppState;

use super::{map_error, org_context, RouteError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTaskRequest {
    deal_id: Uuid,
    title: String,
    #[serde(default)]
    description: Option<String>,
    due_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateTaskRequest {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    due_date: Option<NaiveDate>,
    #[serde(default)]
    is_done: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListTasksQuery {
    #[serde(default)]
    deal_id: Option<Uuid>,
    #[serde(default)]
    only_open: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TaskResponse {
    id: Uuid,
    deal_id: Uuid,
    title: String,
    description: Option<String>,
    due_date: NaiveDate,
    is_done: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<Task> for TaskResponse {
    fn from(task: Task) -> Self {
        Self {
            id: task.id,
            deal_id: task.deal_id,
            title: task.title,
            description: task.description,
            due_date: task.due_date,
            is_done: task.is_done,
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

async fn list_tasks(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListTasksQuery>,
) -> Result<Json<Vec<TaskResponse>>, RouteError> {
    let ctx = org_context(&state, &headers).await?;
    let tasks = state
        .crm_store()
        .list_tasks(
            ctx.organization_id,
            query.deal_id,
            query.only_open.unwrap_or(false),
        )
        .await
        .map_err(map_error)?;
    Ok(Json(tasks.into_iter().map(TaskResponse::from).collect()))
}

async fn create_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<TaskResponse>), RouteError> {
    let ctx = org_context(&state, &headers).await?;
    let task = state
        .crm_store()
        .create_task(
            req.deal_id,
            ctx.organization_id,
            ctx.user_id,
            ctx.role,
            &req.title,
            req.description,
            req.due_date,
        )
        .await
        .map_err(map_error)?;
    Ok((StatusCode::CREATED, Json(TaskResponse::from(task))))
}

async fn get_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(task_id): Path<Uuid>,
) -> Result<Json<TaskResponse>, RouteError> {
    let ctx = org_context(&state, &headers).await?;
    let task = state
        .crm_store()
        .get_task(task_id, ctx.organization_id)
        .await
        .map_err(map_error)?;
    Ok(Json(TaskResponse::from(task)))
}

async fn update_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(task_id): Path<Uuid>,
    Json(req): Json<UpdateTaskRequest>,
) -> Result<Json<TaskResponse>, RouteError> {
    let ctx = org_context(&state, &headers).await?;
    let task = state
        .crm_store()
        .update_task(
            task_id,
            ctx.organization_id,
            ctx.user_id,
            ctx.role,
            req.title,
            req.description,
            req.due_date,
            req.is_done,
        )
        .await
        .map_err(map_error)?;
    Ok(Json(TaskResponse::from(task)))
}

async fn delete_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(task_id): Path<Uuid>,
) -> Result<StatusCode, RouteError> {
    let ctx = org_context(&state, &headers).await?;
    state
        .crm_store()
        .delete_task(task_id, ctx.organization_id, ctx.user_id, ctx.role)
        .await
        .map_err(map_error)?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/tasks", get(list_tasks).post(create_task))
        .route(
            "/api/v1/tasks/{task_id}",
            get(get_task).patch(update_task).delete(delete_task),
        )
}
