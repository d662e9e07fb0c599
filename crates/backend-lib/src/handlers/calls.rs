// ============================
// chatware-backend-lib/src/handlers/calls.rs
// ============================
//! Session-control endpoints: create/end/list calls and read the audit trail.
//!
//! These mutate the same registries as the signaling relay, under the same
//! consistency rules; the only addition here is bearer authentication.
use crate::auth::bearer_identity;
use crate::calls::ActiveCall;
use crate::error::AppError;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use chatware_common::{CallId, CallRecord, CallType, UserId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Create the session-control router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/calls/create", post(create_call))
        .route("/api/calls/{call_id}/end", post(end_call))
        .route("/api/calls/active-calls", get(active_calls))
        .route("/api/calls/call-history", get(call_history))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Deserialize)]
pub struct CreateCallRequest {
    /// Kept as a string so an unknown value is a 400, not a body rejection
    pub call_type: String,
    pub participants: Vec<UserId>,
}

#[derive(Serialize)]
pub struct CreateCallResponse {
    pub call_id: CallId,
    pub participants: Vec<UserId>,
    pub call_type: CallType,
}

async fn create_call(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateCallRequest>,
) -> Result<Json<CreateCallResponse>, AppError> {
    let user_id = bearer_identity(state.auth.as_ref(), &headers).await?;
    let call_type: CallType = body.call_type.parse()?;

    let session = state.calls.create(call_type, body.participants, user_id)?;
    Ok(Json(CreateCallResponse {
        call_id: session.call_id,
        participants: session.participants,
        call_type: session.call_type,
    }))
}

#[derive(Serialize)]
pub struct EndCallResponse {
    pub call_id: CallId,
    pub duration: f64,
}

async fn end_call(
    State(state): State<Arc<AppState>>,
    Path(call_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<EndCallResponse>, AppError> {
    let user_id = bearer_identity(state.auth.as_ref(), &headers).await?;
    let duration = state.calls.end(&call_id, &user_id)?;
    Ok(Json(EndCallResponse { call_id, duration }))
}

#[derive(Serialize)]
pub struct ActiveCallsResponse {
    pub active_calls: Vec<ActiveCall>,
}

async fn active_calls(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ActiveCallsResponse>, AppError> {
    let user_id = bearer_identity(state.auth.as_ref(), &headers).await?;
    Ok(Json(ActiveCallsResponse {
        active_calls: state.calls.list_for_user(&user_id),
    }))
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub call_history: Vec<CallRecord>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

async fn call_history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
    headers: HeaderMap,
) -> Result<Json<HistoryResponse>, AppError> {
    let user_id = bearer_identity(state.auth.as_ref(), &headers).await?;
    let limit = query.limit.unwrap_or(state.settings.default_history_limit);

    let (call_history, total) = state
        .storage
        .call_history(&user_id, limit, query.offset)
        .await?;
    Ok(Json(HistoryResponse {
        call_history,
        total,
        limit,
        offset: query.offset,
    }))
}
