use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use uuid::Uuid;

use vector_shared::errors::AppResult;
use vector_shared::types::api::ApiResponse;
use vector_shared::types::auth::AuthUser;

use crate::matching::engine::{self, ConfirmOutcome, MatchOutcome, StartMatchingPayload};
use crate::models::MatchingRequest;
use crate::AppState;

// ---------------------------------------------------------------------------
// POST /matching/start
// ---------------------------------------------------------------------------

pub async fn start_matching(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<StartMatchingPayload>,
) -> AppResult<Json<ApiResponse<MatchOutcome>>> {
    let outcome = engine::start_matching(&state, auth_user.id, payload).await?;
    Ok(Json(ApiResponse::ok(outcome)))
}

// ---------------------------------------------------------------------------
// GET /matching/:id
// ---------------------------------------------------------------------------

pub async fn get_request(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<MatchingRequest>>> {
    let request = engine::get_request(&state, request_id, auth_user.id)?;
    Ok(Json(ApiResponse::ok(request)))
}

// ---------------------------------------------------------------------------
// POST /matching/:id/confirm
// ---------------------------------------------------------------------------

pub async fn confirm_match(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ConfirmOutcome>>> {
    let outcome = engine::confirm_match(&state, request_id, auth_user.id).await?;
    Ok(Json(ApiResponse::ok(outcome)))
}

// ---------------------------------------------------------------------------
// DELETE /matching/:id
// ---------------------------------------------------------------------------

pub async fn cancel_request(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<MatchingRequest>>> {
    let request = engine::cancel_request(&state, request_id, auth_user.id).await?;
    Ok(Json(ApiResponse::ok_with_message(
        request,
        "matching request cancelled",
    )))
}
