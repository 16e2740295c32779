use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use vector_shared::errors::AppResult;
use vector_shared::types::api::ApiResponse;
use vector_shared::types::auth::AuthUser;

use crate::session::ops::{self, SessionView};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ChangeQuestionPayload {
    pub question_id: Option<Uuid>,
}

// ---------------------------------------------------------------------------
// GET /sessions/:id
// ---------------------------------------------------------------------------

pub async fn get_session(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<SessionView>>> {
    let view = ops::get_session(&state, session_id, auth_user.id)?;
    Ok(Json(ApiResponse::ok(view)))
}

// ---------------------------------------------------------------------------
// POST /sessions/:id/question
// ---------------------------------------------------------------------------

pub async fn change_question(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<ChangeQuestionPayload>,
) -> AppResult<Json<ApiResponse<SessionView>>> {
    let view =
        ops::change_active_question(&state, session_id, auth_user.id, payload.question_id).await?;
    Ok(Json(ApiResponse::ok(view)))
}

// ---------------------------------------------------------------------------
// POST /sessions/:id/switch-roles
// ---------------------------------------------------------------------------

pub async fn switch_roles(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<SessionView>>> {
    let view = ops::switch_roles(&state, session_id, auth_user.id).await?;
    Ok(Json(ApiResponse::ok(view)))
}

// ---------------------------------------------------------------------------
// POST /sessions/:id/end
// ---------------------------------------------------------------------------

pub async fn end_session(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<SessionView>>> {
    let view = ops::end_session(&state, session_id, auth_user.id).await?;
    Ok(Json(ApiResponse::ok(view)))
}
