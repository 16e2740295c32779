use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use vector_shared::errors::{AppError, AppResult, ErrorCode};
use vector_shared::types::api::ApiResponse;
use vector_shared::types::auth::AuthUser;

use crate::events::publisher;
use crate::models::{InterviewFeedback, NewInterviewFeedback, SessionStatus};
use crate::schema::interview_feedback;
use crate::session::ops;
use crate::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitFeedbackPayload {
    #[validate(range(min = 1, max = 5))]
    pub problem_solving_rating: Option<i32>,
    #[validate(range(min = 1, max = 5))]
    pub coding_rating: Option<i32>,
    #[validate(range(min = 1, max = 5))]
    pub communication_rating: Option<i32>,
    #[validate(range(min = 1, max = 5))]
    pub interviewer_rating: Option<i32>,
    #[validate(length(max = 4000))]
    pub strengths: Option<String>,
    #[validate(length(max = 4000))]
    pub improvements: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FeedbackStatus {
    pub submitted: bool,
    pub opponent_submitted: bool,
    /// Feedback the opponent wrote about the caller, once it exists.
    pub received: Option<InterviewFeedback>,
}

// ---------------------------------------------------------------------------
// PUT /sessions/:id/feedback
// ---------------------------------------------------------------------------

/// Resubmitting updates the existing record in place.
pub async fn submit_feedback(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<SubmitFeedbackPayload>,
) -> AppResult<Json<ApiResponse<InterviewFeedback>>> {
    payload
        .validate()
        .map_err(|e| AppError::new(ErrorCode::InvalidRating, e.to_string()))?;

    let mut conn = state.conn()?;
    let view = ops::load_view(&mut conn, session_id)?;

    let reviewer = view
        .participants
        .iter()
        .find(|p| p.user_id == auth_user.id)
        .ok_or_else(|| {
            AppError::new(
                ErrorCode::NotAParticipant,
                "caller is not a participant of this session",
            )
        })?;
    let reviewee = view
        .participants
        .iter()
        .find(|p| p.user_id != auth_user.id)
        .ok_or_else(|| AppError::internal("session has no counterpart participant"))?;

    if view.session.status() != SessionStatus::Completed {
        return Err(AppError::new(
            ErrorCode::SessionNotCompleted,
            "feedback opens once the session is completed",
        ));
    }

    let new_feedback = NewInterviewFeedback {
        live_session_id: session_id,
        reviewer_id: reviewer.user_id,
        reviewee_id: reviewee.user_id,
        problem_solving_rating: payload.problem_solving_rating,
        coding_rating: payload.coding_rating,
        communication_rating: payload.communication_rating,
        interviewer_rating: payload.interviewer_rating,
        strengths: payload.strengths,
        improvements: payload.improvements,
    };

    let feedback = diesel::insert_into(interview_feedback::table)
        .values(&new_feedback)
        .on_conflict((
            interview_feedback::live_session_id,
            interview_feedback::reviewer_id,
            interview_feedback::reviewee_id,
        ))
        .do_update()
        .set((
            interview_feedback::problem_solving_rating.eq(&new_feedback.problem_solving_rating),
            interview_feedback::coding_rating.eq(&new_feedback.coding_rating),
            interview_feedback::communication_rating.eq(&new_feedback.communication_rating),
            interview_feedback::interviewer_rating.eq(&new_feedback.interviewer_rating),
            interview_feedback::strengths.eq(&new_feedback.strengths),
            interview_feedback::improvements.eq(&new_feedback.improvements),
            interview_feedback::updated_at.eq(chrono::Utc::now()),
        ))
        .get_result::<InterviewFeedback>(&mut conn)
        .map_err(AppError::Database)?;

    publisher::publish_feedback_submitted(&state.rabbitmq, &feedback).await;
    tracing::info!(
        session_id = %session_id,
        reviewer_id = %feedback.reviewer_id,
        "interview feedback submitted"
    );

    Ok(Json(ApiResponse::ok(feedback)))
}

// ---------------------------------------------------------------------------
// GET /sessions/:id/feedback/status
// ---------------------------------------------------------------------------

pub async fn feedback_status(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<FeedbackStatus>>> {
    let mut conn = state.conn()?;
    let view = ops::load_view(&mut conn, session_id)?;

    if !view.participants.iter().any(|p| p.user_id == auth_user.id) {
        return Err(AppError::new(
            ErrorCode::NotAParticipant,
            "caller is not a participant of this session",
        ));
    }

    let mine = interview_feedback::table
        .filter(interview_feedback::live_session_id.eq(session_id))
        .filter(interview_feedback::reviewer_id.eq(auth_user.id))
        .first::<InterviewFeedback>(&mut conn)
        .optional()
        .map_err(AppError::Database)?;

    let received = interview_feedback::table
        .filter(interview_feedback::live_session_id.eq(session_id))
        .filter(interview_feedback::reviewee_id.eq(auth_user.id))
        .first::<InterviewFeedback>(&mut conn)
        .optional()
        .map_err(AppError::Database)?;

    Ok(Json(ApiResponse::ok(FeedbackStatus {
        submitted: mine.is_some(),
        opponent_submitted: received.is_some(),
        received,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(rating: Option<i32>) -> SubmitFeedbackPayload {
        SubmitFeedbackPayload {
            problem_solving_rating: rating,
            coding_rating: None,
            communication_rating: None,
            interviewer_rating: None,
            strengths: None,
            improvements: None,
        }
    }

    #[test]
    fn ratings_must_be_one_to_five() {
        assert!(payload(Some(1)).validate().is_ok());
        assert!(payload(Some(5)).validate().is_ok());
        assert!(payload(None).validate().is_ok());
        assert!(payload(Some(0)).validate().is_err());
        assert!(payload(Some(6)).validate().is_err());
    }

    #[test]
    fn free_text_is_capped() {
        let mut p = payload(Some(3));
        p.strengths = Some("x".repeat(4000));
        assert!(p.validate().is_ok());
        p.strengths = Some("x".repeat(4001));
        assert!(p.validate().is_err());
    }
}
