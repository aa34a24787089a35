//! Route handlers

pub mod activities;
pub mod analytics;
pub mod auth;
pub mod contacts;
pub mod deals;
pub mod health;
pub mod organizations;
pub mod tasks;

use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crm_core::permission::Role;

use crate::auth::{verify_token, TokenType};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub(crate) type RouteError = (StatusCode, Json<ErrorResponse>);

/// Map the domain taxonomy to its fixed status codes.
pub(crate) fn map_error(err: crm_core::Error) -> RouteError {
    use crm_core::Error;

    let status = match &err {
        Error::Authentication(_) => StatusCode::UNAUTHORIZED,
        Error::Authorization(_) => StatusCode::FORBIDDEN,
        Error::Validation(_) => StatusCode::BAD_REQUEST,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::Conflict(_) => StatusCode::CONFLICT,
        Error::Io(_) | Error::Serialization(_) | Error::Storage(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

/// Verified request identity: user, organization and the role binding them.
#[derive(Debug, Clone, Copy)]
pub(crate) struct OrgContext {
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub role: Role,
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, crm_core::Error> {
    headers
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| {
            crm_core::Error::Authentication("Missing bearer credentials".to_string())
        })
}

/// Resolve the current user from the bearer token alone (no org selector).
pub(crate) async fn current_user(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Uuid, RouteError> {
    let token = bearer_token(headers).map_err(map_error)?;
    let user_id = verify_token(token, TokenType::Access).map_err(map_error)?;
    state
        .auth_store()
        .get_user(user_id)
        .await
        .map_err(map_error)?;
    Ok(user_id)
}

/// Resolve the full organization context from the bearer token and the
/// X-Organization-Id header.
pub(crate) async fn org_context(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<OrgContext, RouteError> {
    let user_id = current_user(state, headers).await?;

    let organization_id = headers
        .get("X-Organization-Id")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            map_error(crm_core::Error::Validation(
                "Missing X-Organization-Id header".to_string(),
            ))
        })?;
    let organization_id = Uuid::parse_str(organization_id).map_err(|_| {
        map_error(crm_core::Error::Validation(
            "Invalid organization ID format".to_string(),
        ))
    })?;

    let membership = state
        .auth_store()
        .membership(user_id, organization_id)
        .await
        .map_err(map_error)?;

    Ok(OrgContext {
        user_id,
        organization_id,
        role: membership.role,
    })
}

pub(crate) fn clamp_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(50).clamp(1, 100)
}
