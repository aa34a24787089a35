//! Organization membership routes.

use axum::{
    extract::State,
    http::HeaderMap,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crm_core::permission::Role;

use crate::state::AppState;

use super::{current_user, map_error, RouteError};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UserOrganization {
    organization_id: Uuid,
    organization_name: String,
    role: Role,
}

async fn my_organizations(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<UserOrganization>>, RouteError> {
    let user_id = current_user(&state, &headers).await?;
    let entries = state
        .auth_store()
        .list_organizations_for_user(user_id)
        .await
        .map_err(map_error)?;

    Ok(Json(
        entries
            .into_iter()
            .map(|(org, role)| UserOrganization {
                organization_id: org.id,
                organization_name: org.name,
                role,
            })
            .collect(),
    ))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/v1/organizations/me", get(my_organizations))
}
