//! Authentication routes: register, login, refresh, me.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{issue_token, verify_token, TokenType};
use crate::state::AppState;

use super::{current_user, map_error, RouteError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    email: String,
    password: String,
    name: String,
    org_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest {
    refresh_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterResponse {
    user_id: Uuid,
    email: String,
    name: String,
    organization_id: Uuid,
    organization_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenPairResponse {
    access_token: String,
    refresh_token: String,
    access_expires_at: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AccessTokenResponse {
    access_token: String,
    access_expires_at: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MeResponse {
    user_id: Uuid,
    email: String,
    name: String,
}

fn format_expiry(exp: usize) -> String {
    DateTime::<Utc>::from_timestamp(exp as i64, 0)
        .map(|value| value.to_rfc3339())
        .unwrap_or_else(|| Utc::now().to_rfc3339())
}

async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), RouteError> {
    let (user, org) = state
        .auth_store()
        .register(&req.email, &req.password, &req.name, &req.org_name)
        .await
        .map_err(map_error)?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id: user.id,
            email: user.email,
            name: user.name,
            organization_id: org.id,
            organization_name: org.name,
        }),
    ))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<TokenPairResponse>, RouteError> {
    let user = state
        .auth_store()
        .authenticate(&req.email, &req.password)
        .await
        .map_err(map_error)?;

    let (access_token, access_exp) = issue_token(user.id, TokenType::Access).map_err(map_error)?;
    let (refresh_token, _) = issue_token(user.id, TokenType::Refresh).map_err(map_error)?;

    Ok(Json(TokenPairResponse {
        access_token,
        refresh_token,
        access_expires_at: format_expiry(access_exp),
    }))
}

async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<AccessTokenResponse>, RouteError> {
    let user_id = verify_token(&req.refresh_token, TokenType::Refresh).map_err(map_error)?;
    let user = state.auth_store().get_user(user_id).await.map_err(map_error)?;

    let (access_token, access_exp) = issue_token(user.id, TokenType::Access).map_err(map_error)?;
    Ok(Json(AccessTokenResponse {
        access_token,
        access_expires_at: format_expiry(access_exp),
    }))
}

async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<MeResponse>, RouteError> {
    let user_id = current_user(&state, &headers).await?;
    let user = state.auth_store().get_user(user_id).await.map_err(map_error)?;

    Ok(Json(MeResponse {
        user_id: user.id,
        email: user.email,
        name: user.name,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/auth/register", post(register))
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/auth/refresh", post(refresh))
        .route("/api/v1/me", get(me))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::routes::test_support::build_state;

    #[tokio::test]
    async fn register_login_refresh_roundtrip() {
        let (state, _tmp) = build_state().await;
        let app = super::router().with_state(state);

        let register_response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/auth/register")
                    .header("Content-Type", "application/json")
                    .body(Body::from(
                        json!({
                            "email": "dev@example.com",
                            "password": "verysecurepw",
                            "name": "Dev User",
                            "orgName": "Dev Org"
                        })
                        .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(register_response.status(), StatusCode::CREATED);

        let login_response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/auth/login")
                    .header("Content-Type", "application/json")
                    .body(Body::from(
                        json!({
                            "email": "dev@example.com",
                            "password": "verysecurepw"
                        })
                        .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(login_response.status(), StatusCode::OK);
        let body = to_bytes(login_response.into_body(), usize::MAX).await.unwrap();
        let payload: Value = serde_json::from_slice(&body).unwrap();
        let refresh_token = payload["refreshToken"].as_str().unwrap().to_string();
        assert!(payload["accessToken"].is_string());

        let refresh_response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/auth/refresh")
                    .header("Content-Type", "application/json")
                    .body(Body::from(
                        json!({ "refreshToken": refresh_token }).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(refresh_response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn refresh_rejects_an_access_token() {
        let (state, _tmp) = build_state().await;
        let (token, _user, _org) =
            crate::routes::test_support::register_owner(&state, "dev@example.com").await;
        let app = super::router().with_state(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/auth/refresh")
                    .header("Content-Type", "application/json")
                    .body(Body::from(json!({ "refreshToken": token }).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn login_with_bad_password_is_unauthorized() {
        let (state, _tmp) = build_state().await;
        crate::routes::test_support::register_owner(&state, "dev@example.com").await;
        let app = super::router().with_state(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/auth/login")
                    .header("Content-Type", "application/json")
                    .body(Body::from(
                        json!({
                            "email": "dev@example.com",
                            "password": "wrongpassword"
                        })
                        .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn me_returns_the_current_user() {
        let (state, _tmp) = build_state().await;
        let (token, user_id, _org) =
            crate::routes::test_support::register_owner(&state, "dev@example.com").await;
        let app = super::router().with_state(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/api/v1/me")
                    .header("Authorization", format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload["userId"], user_id.to_string());
    }
}
