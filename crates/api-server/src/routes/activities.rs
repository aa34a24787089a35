//! Deal timeline endpoints: comments and the activity feed.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crm_core::activity::{Activity, ActivityKind};

use crate::state::AppState;

use super::{map_error, org_context, RouteError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateCommentRequest {
    content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ActivityResponse {
    id: Uuid,
    deal_id: Uuid,
    author_id: Option<Uuid>,
    kind: ActivityKind,
    payload: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl From<Activity> for ActivityResponse {
    fn from(activity: Activity) -> Self {
        Self {
            id: activity.id,
            deal_id: activity.deal_id,
            author_id: activity.author_id,
            kind: activity.kind,
            payload: activity.payload,
            created_at: activity.created_at,
        }
    }
}

async fn list_activities(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(deal_id): Path<Uuid>,
) -> Result<Json<Vec<ActivityResponse>>, RouteError> {
    let ctx = org_context(&state, &headers).await?;
    let activities = state
        .crm_store()
        .list_activities(deal_id, ctx.organization_id, ctx.user_id, ctx.role)
        .await
        .map_err(map_error)?;
    Ok(Json(
        activities.into_iter().map(ActivityResponse::from).collect(),
    ))
}

async fn create_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(deal_id): Path<Uuid>,
    Json(req): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<ActivityResponse>), RouteError> {
    let ctx = org_context(&state, &headers).await?;
    let content = req.content.trim();
    if content.is_empty() {
        return Err(map_error(crm_core::Error::Validation(
            "Comment cannot be empty".to_string(),
        )));
    }

    let activity = state
        .crm_store()
        .create_comment(deal_id, ctx.organization_id, ctx.user_id, ctx.role, content)
        .await
        .map_err(map_error)?;
    Ok((StatusCode::CREATED, Json(ActivityResponse::from(activity))))
}

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/api/v1/deals/{deal_id}/activities",
        get(list_activities).post(create_comment),
    )
}
