use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::auth::Principal;
use crate::errors::AppError;
use crate::models::account::AccountSummary;
use crate::models::interval::WorkInterval;
use crate::AppState;

// ── Request / Response DTOs ──────────────────────────────────

/// Body of both register and login. Deliberately not `Debug`.
#[derive(Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: AccountSummary,
    pub exp: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    pub id: i64,
    pub start_time: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopResponse {
    pub id: i64,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: i32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalResponse {
    pub total_minutes: i64,
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| AppError::InvalidInput(format!("bad json: {}", e.body_text())))
}

// ── Auth ─────────────────────────────────────────────────────

/// POST /auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let req = json_body(payload)?;
    state.auth.register(&req.email, &req.password).await?;
    Ok((StatusCode::CREATED, Json(json!({ "message": "registered" }))))
}

/// POST /auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AppError> {
    let req = json_body(payload)?;
    let grant = state.auth.login(&req.email, &req.password).await?;
    Ok(Json(LoginResponse {
        token: grant.token,
        user: grant.account,
        exp: grant.expires_at,
    }))
}

/// POST /auth/logout: revokes the token this request was authenticated with.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<Json<Value>, AppError> {
    state.auth.logout(&principal.token_id).await?;
    Ok(Json(json!({ "message": "logged out" })))
}

// ── Time tracking ────────────────────────────────────────────

/// POST /api/time/start
pub async fn start_session(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<(StatusCode, Json<StartResponse>), AppError> {
    let interval = state.tracker.start(principal.account_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(StartResponse {
            id: interval.id,
            start_time: interval.start_time,
        }),
    ))
}

/// POST /api/time/stop
pub async fn stop_session(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<Json<StopResponse>, AppError> {
    let interval = state.tracker.stop(principal.account_id).await?;
    let (end_time, duration_minutes) = interval
        .end_time
        .zip(interval.duration_minutes)
        .ok_or_else(|| anyhow::anyhow!("closed interval {} missing end time", interval.id))?;
    Ok(Json(StopResponse {
        id: interval.id,
        end_time,
        duration_minutes,
    }))
}

/// GET /api/time/sessions: today's sessions, oldest first
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<Json<Vec<WorkInterval>>, AppError> {
    let sessions = state.tracker.list_today(principal.account_id).await?;
    Ok(Json(sessions))
}

/// GET /api/time/total-today
pub async fn total_today(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<Json<TotalResponse>, AppError> {
    let total_minutes = state.tracker.total_today(principal.account_id).await?;
    Ok(Json(TotalResponse { total_minutes }))
}

// ── Probes ───────────────────────────────────────────────────

/// GET /healthz
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// GET /readyz, 503 while storage is unreachable
pub async fn readiness(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    match state.credentials.ping().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok" }))),
        Err(e) => {
            tracing::error!("readiness check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable" })),
            )
        }
    }
}
