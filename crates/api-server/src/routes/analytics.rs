//! Deal analytics endpoints
//!
//! Responses come from the TTL-cached reporter and may lag writes by up to
//! the cache window.

use axum::{extract::State, http::HeaderMap, routing::get, Json, Router};
use rust_decimal::Decimal;
use serde::Serialize;

use crm_core::analytics::{DealsSummary, FunnelStage};
use crm_core::deal::DealStage;

use crate::state::AppState;

use super::{map_error, org_context, RouteError};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SummaryResponse {
    total_count: u64,
    new_count: u64,
    in_progress_count: u64,
    won_count: u64,
    lost_count: u64,
    total_amount: Decimal,
    won_amount: Decimal,
    average_won_amount: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FunnelRow {
    stage: DealStage,
    count: u64,
}

impl From<DealsSummary> for SummaryResponse {
    fn from(summary: DealsSummary) -> Self {
        Self {
            total_count: summary.total_count,
            new_count: summary.new_count,
            in_progress_count: summary.in_progress_count,
            won_count: summary.won_count,
            lost_count: summary.lost_count,
            total_amount: summary.total_amount,
            won_amount: summary.won_amount,
            average_won_amount: summary.average_won_amount,
        }
    }
}

impl From<FunnelStage> for FunnelRow {
    fn from(row: FunnelStage) -> Self {
        Self {
            stage: row.stage,
            count: row.count,
        }
    }
}

async fn deals_summary(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SummaryResponse>, RouteError> {
    let ctx = org_context(&state, &headers).await?;
    let summary = state
        .analytics()
        .deals_summary(ctx.organization_id)
        .await
        .map_err(map_error)?;
    Ok(Json(SummaryResponse::from(summary)))
}

async fn deals_funnel(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<FunnelRow>>, RouteError> {
    let ctx = org_context(&state, &headers).await?;
    let funnel = state
        .analytics()
        .deals_funnel(ctx.organization_id)
        .await
        .map_err(map_error)?;
    Ok(Json(funnel.into_iter().map(FunnelRow::from).collect()))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/analytics/deals/summary", get(deals_summary))
        .route("/api/v1/analytics/deals/funnel", get(deals_funnel))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use rust_decimal_macros::dec;
    use serde_json::Value;
    use tower::ServiceExt;

    use crm_core::deal::{DealPatch, DealStatus};
    use crm_core::permission::Role;

    use crate::routes::test_support::{build_state, register_owner};

    #[tokio::test]
    async fn summary_scenario_over_three_deals() {
        let (state, _tmp) = build_state().await;
        let (token, user_id, org_id) = register_owner(&state, "owner@example.com").await;
        let contact = state
            .crm_store()
            .create_contact(org_id, user_id, "Ada", None, None)
            .await
            .unwrap();

        let mut deals = Vec::new();
        for amount in [dec!(1000), dec!(2000), dec!(3000)] {
            deals.push(
                state
                    .crm_store()
                    .create_deal(org_id, contact.id, user_id, "Deal", amount, "USD")
                    .await
                    .unwrap(),
            );
        }
        for (deal, status) in [(&deals[1], DealStatus::Won), (&deals[2], DealStatus::Lost)] {
            state
                .crm_store()
                .update_deal(
                    deal.id,
                    org_id,
                    user_id,
                    Role::Owner,
                    DealPatch {
                        status: Some(status),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }
        let app = super::router().with_state(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/api/v1/analytics/deals/summary")
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
        assert_eq!(payload["totalCount"], 3);
        assert_eq!(payload["wonCount"], 1);
        assert_eq!(payload["lostCount"], 1);
        assert_eq!(payload["wonAmount"], "2000");
        assert_eq!(payload["averageWonAmount"], "2000");
    }

    #[tokio::test]
    async fn funnel_reports_all_stages_in_order() {
        let (state, _tmp) = build_state().await;
        let (token, user_id, org_id) = register_owner(&state, "owner@example.com").await;
        let contact = state
            .crm_store()
            .create_contact(org_id, user_id, "Ada", None, None)
            .await
            .unwrap();
        state
            .crm_store()
            .create_deal(org_id, contact.id, user_id, "Open", dec!(100), "USD")
            .await
            .unwrap();
        let app = super::router().with_state(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/api/v1/analytics/deals/funnel")
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
        let rows = payload.as_array().unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0]["stage"], "qualification");
        assert_eq!(rows[0]["count"], 1);
        assert_eq!(rows[3]["stage"], "closed");
        assert_eq!(rows[3]["count"], 0);
    }

    #[tokio::test]
    async fn analytics_requires_an_org_context() {
        let (state, _tmp) = build_state().await;
        let app = super::router().with_state(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/api/v1/analytics/deals/summary")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
