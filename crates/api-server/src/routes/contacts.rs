//! Contact API endpoints

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crm_core::contact::Contact;

use crate::state::AppState;

use super::{clamp_limit, map_error, org_context, RouteError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateContactRequest {
    name: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    phone: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateContactRequest {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    phone: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListContactsQuery {
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    offset: Option<usize>,
    #[serde(default)]
    search: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ContactResponse {
    id: Uuid,
    organization_id: Uuid,
    owner_id: Uuid,
    name: String,
    email: Option<String>,
    phone: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ContactListResponse {
    items: Vec<ContactResponse>,
    total: usize,
    limit: usize,
    offset: usize,
}

impl From<Contact> for ContactResponse {
    fn from(contact: Contact) -> Self {
        Self {
            id: contact.id,
            organization_id: contact.organization_id,
            owner_id: contact.owner_id,
            name: contact.name,
            email: contact.email,
            phone: contact.phone,
            created_at: contact.created_at,
            updated_at: contact.updated_at,
        }
    }
}

async fn list_contacts(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListContactsQuery>,
) -> Result<Json<ContactListResponse>, RouteError> {
    let ctx = org_context(&state, &headers).await?;
    let limit = clamp_limit(query.limit);
    let offset = query.offset.unwrap_or(0);

    let (contacts, total) = state
        .crm_store()
        .list_contacts(ctx.organization_id, limit, offset, query.search.as_deref())
        .await
        .map_err(map_error)?;

    Ok(Json(ContactListResponse {
        items: contacts.into_iter().map(ContactResponse::from).collect(),
        total,
        limit,
        offset,
    }))
}

async fn create_contact(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateContactRequest>,
) -> Result<(StatusCode, Json<ContactResponse>), RouteError> {
    let ctx = org_context(&state, &headers).await?;
    let contact = state
        .crm_store()
        .create_contact(
            ctx.organization_id,
            ctx.user_id,
            &req.name,
            req.email,
            req.phone,
        )
        .await
        .map_err(map_error)?;
    Ok((StatusCode::CREATED, Json(ContactResponse::from(contact))))
}

async fn get_contact(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(contact_id): Path<Uuid>,
) -> Result<Json<ContactResponse>, RouteError> {
    let ctx = org_context(&state, &headers).await?;
    let contact = state
        .crm_store()
        .get_contact(contact_id, ctx.organization_id)
        .await
        .map_err(map_error)?;
    Ok(Json(ContactResponse::from(contact)))
}

async fn update_contact(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(contact_id): Path<Uuid>,
    Json(req): Json<UpdateContactRequest>,
) -> Result<Json<ContactResponse>, RouteError> {
    let ctx = org_context(&state, &headers).await?;
    let contact = state
        .crm_store()
        .update_contact(
            contact_id,
            ctx.organization_id,
            ctx.user_id,
            ctx.role,
            req.name,
            req.email,
            req.phone,
        )
        .await
        .map_err(map_error)?;
    Ok(Json(ContactResponse::from(contact)))
}

async fn delete_contact(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(contact_id): Path<Uuid>,
) -> Result<StatusCode, RouteError> {
    let ctx = org_context(&state, &headers).await?;
    state
        .crm_store()
        .delete_contact(contact_id, ctx.organization_id, ctx.user_id, ctx.role)
        .await
        .map_err(map_error)?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/contacts", get(list_contacts).post(create_contact))
        .route(
            "/api/v1/contacts/{contact_id}",
            get(get_contact).patch(update_contact).delete(delete_contact),
        )
}
