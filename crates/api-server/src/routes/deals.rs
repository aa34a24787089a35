//! Deal API endpoints
//!
//! Updates run through the lifecycle planner in crm-core: a rejected
//! transition returns its error here and nothing is persisted.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crm_core::deal::{Deal, DealPatch, DealStage, DealStatus};

use crate::state::AppState;

use super::{clamp_limit, map_error, org_context, RouteError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateDealRequest {
    contact_id: Uuid,
    title: String,
    amount: Decimal,
    #[serde(default)]
    currency: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateDealRequest {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    amount: Option<Decimal>,
    #[serde(default)]
    status: Option<DealStatus>,
    #[serde(default)]
    stage: Option<DealStage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDealsQuery {
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    offset: Option<usize>,
    #[serde(default)]
    status: Option<DealStatus>,
    #[serde(default)]
    stage: Option<DealStage>,
    #[serde(default)]
    owner_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DealResponse {
    id: Uuid,
    organization_id: Uuid,
    contact_id: Uuid,
    owner_id: Uuid,
    title: String,
    amount: Decimal,
    currency: String,
    status: DealStatus,
    stage: DealStage,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DealListResponse {
    items: Vec<DealResponse>,
    total: usize,
    limit: usize,
    offset: usize,
}

impl From<Deal> for DealResponse {
    fn from(deal: Deal) -> Self {
        Self {
            id: deal.id,
            organization_id: deal.organization_id,
            contact_id: deal.contact_id,
            owner_id: deal.owner_id,
            title: deal.title,
            amount: deal.amount,
            currency: deal.currency,
            status: deal.status,
            stage: deal.stage,
            created_at: deal.created_at,
            updated_at: deal.updated_at,
        }
    }
}

async fn list_deals(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListDealsQuery>,
) -> Result<Json<DealListResponse>, RouteError> {
    let ctx = org_context(&state, &headers).await?;
    let limit = clamp_limit(query.limit);
    let offset = query.offset.unwrap_or(0);

    let (deals, total) = state
        .crm_store()
        .list_deals(
            ctx.organization_id,
            limit,
            offset,
            query.status,
            query.stage,
            query.owner_id,
        )
        .await
        .map_err(map_error)?;

    Ok(Json(DealListResponse {
        items: deals.into_iter().map(DealResponse::from).collect(),
        total,
        limit,
        offset,
    }))
}

async fn create_deal(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateDealRequest>,
) -> Result<(StatusCode, Json<DealResponse>), RouteError> {
    let ctx = org_context(&state, &headers).await?;
    let currency = req.currency.unwrap_or_else(|| "USD".to_string());
    let deal = state
        .crm_store()
        .create_deal(
            ctx.organization_id,
            req.contact_id,
            ctx.user_id,
            &req.title,
            req.amount,
            &currency,
        )
        .await
        .map_err(map_error)?;
    Ok((StatusCode::CREATED, Json(DealResponse::from(deal))))
}

async fn get_deal(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(deal_id): Path<Uuid>,
) -> Result<Json<DealResponse>, RouteError> {
    let ctx = org_context(&state, &headers).await?;
    let deal = state
        .crm_store()
        .get_deal(deal_id, ctx.organization_id)
        .await
        .map_err(map_error)?;
    Ok(Json(DealResponse::from(deal)))
}

async fn update_deal(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(deal_id): Path<Uuid>,
    Json(req): Json<UpdateDealRequest>,
) -> Result<Json<DealResponse>, RouteError> {
    let ctx = org_context(&state, &headers).await?;
    let patch = DealPatch {
        title: req.title,
        amount: req.amount,
        status: req.status,
        stage: req.stage,
    };
    let deal = state
        .crm_store()
        .update_deal(deal_id, ctx.organization_id, ctx.user_id, ctx.role, patch)
        .await
        .map_err(map_error)?;
    Ok(Json(DealResponse::from(deal)))
}

async fn delete_deal(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(deal_id): Path<Uuid>,
) -> Result<StatusCode, RouteError> {
    let ctx = org_context(&state, &headers).await?;
    state
        .crm_store()
        .delete_deal(deal_id, ctx.organization_id, ctx.user_id, ctx.role)
        .await
        .map_err(map_error)?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/deals", get(list_deals).post(create_deal))
        .route(
            "/api/v1/deals/{deal_id}",
            get(get_deal).patch(update_deal).delete(delete_deal),
        )
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use rust_decimal_macros::dec;
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use crm_core::permission::Role;

    use crate::routes::test_support::{add_member, build_state, register_owner};
    use crate::state::AppState;

    async fn seed_deal(state: &AppState, org: Uuid, owner: Uuid) -> Uuid {
        let contact = state
            .crm_store()
            .create_contact(org, owner, "Ada", None, None)
            .await
            .unwrap();
        state
            .crm_store()
            .create_deal(org, contact.id, owner, "Pilot rollout", dec!(500), "USD")
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn create_deal_requires_an_existing_contact() {
        let (state, _tmp) = build_state().await;
        let (token, _user, org_id) = register_owner(&state, "owner@example.com").await;
        let app = super::router().with_state(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/deals")
                    .header("Authorization", format!("Bearer {}", token))
                    .header("X-Organization-Id", org_id.to_string())
                    .header("Content-Type", "application/json")
                    .body(Body::from(
                        json!({
                            "contactId": Uuid::new_v4(),
                            "title": "No contact",
                            "amount": "100"
                        })
                        .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn patch_stage_forward_succeeds_for_member_owner() {
        let (state, _tmp) = build_state().await;
        let (_owner_token, _owner_id, org_id) = register_owner(&state, "owner@example.com").await;
        let (member_token, member_id) =
            add_member(&state, "member@example.com", org_id, Role::Member).await;
        let contact = state
            .crm_store()
            .create_contact(org_id, member_id, "Ada", None, None)
            .await
            .unwrap();
        let deal = state
            .crm_store()
            .create_deal(org_id, contact.id, member_id, "Member deal", dec!(100), "USD")
            .await
            .unwrap();
        let app = super::router().with_state(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("PATCH")
                    .uri(format!("/api/v1/deals/{}", deal.id))
                    .header("Authorization", format!("Bearer {}", member_token))
                    .header("X-Organization-Id", org_id.to_string())
                    .header("Content-Type", "application/json")
                    .body(Body::from(json!({ "stage": "negotiation" }).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload["stage"], "negotiation");
    }

    #[tokio::test]
    async fn member_rollback_is_forbidden() {
        let (state, _tmp) = build_state().await;
        let (_owner_token, _owner_id, org_id) = register_owner(&state, "owner@example.com").await;
        let (member_token, member_id) =
            add_member(&state, "member@example.com", org_id, Role::Member).await;
        let contact = state
            .crm_store()
            .create_contact(org_id, member_id, "Ada", None, None)
            .await
            .unwrap();
        let deal = state
            .crm_store()
            .create_deal(org_id, contact.id, member_id, "Member deal", dec!(100), "USD")
            .await
            .unwrap();
        state
            .crm_store()
            .update_deal(
                deal.id,
                org_id,
                member_id,
                Role::Member,
                crm_core::deal::DealPatch {
                    stage: Some(crm_core::deal::DealStage::Negotiation),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let app = super::router().with_state(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("PATCH")
                    .uri(format!("/api/v1/deals/{}", deal.id))
                    .header("Authorization", format!("Bearer {}", member_token))
                    .header("X-Organization-Id", org_id.to_string())
                    .header("Content-Type", "application/json")
                    .body(Body::from(json!({ "stage": "proposal" }).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn winning_a_zero_amount_deal_is_a_bad_request() {
        let (state, _tmp) = build_state().await;
        let (token, user_id, org_id) = register_owner(&state, "owner@example.com").await;
        let contact = state
            .crm_store()
            .create_contact(org_id, user_id, "Ada", None, None)
            .await
            .unwrap();
        let deal = state
            .crm_store()
            .create_deal(org_id, contact.id, user_id, "Zero deal", dec!(0), "USD")
            .await
            .unwrap();
        let app = super::router().with_state(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("PATCH")
                    .uri(format!("/api/v1/deals/{}", deal.id))
                    .header("Authorization", format!("Bearer {}", token))
                    .header("X-Organization-Id", org_id.to_string())
                    .header("Content-Type", "application/json")
                    .body(Body::from(json!({ "status": "won" }).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn list_deals_filters_by_status() {
        let (state, _tmp) = build_state().await;
        let (token, user_id, org_id) = register_owner(&state, "owner@example.com").await;
        let deal_id = seed_deal(&state, org_id, user_id).await;
        state
            .crm_store()
            .update_deal(
                deal_id,
                org_id,
                user_id,
                Role::Owner,
                crm_core::deal::DealPatch {
                    status: Some(crm_core::deal::DealStatus::Lost),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        seed_deal(&state, org_id, user_id).await;
        let app = super::router().with_state(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/api/v1/deals?status=lost")
                    .header("Authorization", format!("Bearer {}", token))
                    .header("X-Organization-Id", org_id.to_string())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload["total"], 1);
        assert_eq!(payload["items"][0]["status"], "lost");
    }

    #[tokio::test]
    async fn delete_deal_returns_no_content() {
        let (state, _tmp) = build_state().await;
        let (token, user_id, org_id) = register_owner(&state, "owner@example.com").await;
        let deal_id = seed_deal(&state, org_id, user_id).await;
        let app = super::router().with_state(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/api/v1/deals/{}", deal_id))
                    .header("Authorization", format!("Bearer {}", token))
                    .header("X-Organization-Id", org_id.to_string())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }
}
