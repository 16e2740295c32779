use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use vector_shared::errors::{AppError, AppResult, ErrorCode};

use crate::events::publisher;
use crate::models::{
    InterviewRole, LiveSession, MatchingRequest, NewLiveSession, NewSessionParticipant,
    SessionParticipant, SessionStatus,
};
use crate::schema::{live_sessions, session_participants};
use crate::socket::collab::CollabEvent;
use crate::AppState;

/// Session plus its two participants, the shape every session endpoint and
/// socket broadcast carries.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session: LiveSession,
    pub participants: Vec<SessionParticipant>,
}

// ---------------------------------------------------------------------------
// Question rotation
// ---------------------------------------------------------------------------

/// With no explicit request, flip to the question that is not active.
pub fn next_active_question(first: Uuid, second: Uuid, active: Option<Uuid>) -> Uuid {
    match active {
        Some(current) if current == first => second,
        _ => first,
    }
}

/// An explicit question id must be one of the two assigned to the session.
pub fn ensure_assigned_question(first: Uuid, second: Uuid, requested: Uuid) -> AppResult<Uuid> {
    if requested == first || requested == second {
        Ok(requested)
    } else {
        Err(AppError::new(
            ErrorCode::UnknownQuestion,
            "question is not assigned to this session",
        ))
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

pub fn load_view(conn: &mut PgConnection, session_id: Uuid) -> AppResult<SessionView> {
    let session = live_sessions::table
        .find(session_id)
        .first::<LiveSession>(conn)
        .optional()
        .map_err(AppError::Database)?
        .ok_or_else(|| AppError::new(ErrorCode::SessionNotFound, "live session not found"))?;

    let participants = session_participants::table
        .filter(session_participants::session_id.eq(session_id))
        .order(session_participants::joined_at.asc())
        .load::<SessionParticipant>(conn)
        .map_err(AppError::Database)?;

    Ok(SessionView { session, participants })
}

fn load_view_for_participant(
    conn: &mut PgConnection,
    session_id: Uuid,
    user_id: Uuid,
) -> AppResult<SessionView> {
    let view = load_view(conn, session_id)?;
    if !view.participants.iter().any(|p| p.user_id == user_id) {
        return Err(AppError::new(
            ErrorCode::NotAParticipant,
            "caller is not a participant of this session",
        ));
    }
    Ok(view)
}

pub fn get_session(state: &AppState, session_id: Uuid, user_id: Uuid) -> AppResult<SessionView> {
    let mut conn = state.conn()?;
    load_view_for_participant(&mut conn, session_id, user_id)
}

/// The caller's in-progress session, if any. Used on socket disconnect.
pub fn find_active_session_for_user(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> AppResult<Option<Uuid>> {
    session_participants::table
        .inner_join(live_sessions::table)
        .filter(session_participants::user_id.eq(user_id))
        .filter(session_participants::is_active.eq(true))
        .filter(live_sessions::status.eq(SessionStatus::InProgress.as_str()))
        .select(live_sessions::id)
        .first::<Uuid>(conn)
        .optional()
        .map_err(AppError::Database)
}

// ---------------------------------------------------------------------------
// Creation (from a confirmed pair)
// ---------------------------------------------------------------------------

/// Create the one live session for a mutually confirmed pair. Both request
/// rows are flipped matched -> confirmed and stamped with the session id in
/// the same transaction; the `live_session_id IS NULL` guard makes the
/// creation idempotent under a simultaneous-confirm race. Returns `None` when
/// this caller lost that race.
pub fn create_for_pair(
    conn: &mut PgConnection,
    own: &MatchingRequest,
    partner: &MatchingRequest,
    first_question_id: Uuid,
    second_question_id: Uuid,
) -> AppResult<Option<SessionView>> {
    use crate::models::RequestStatus;
    use crate::schema::matching_requests;

    let session_id = Uuid::now_v7();
    let now = Utc::now();

    // The earlier request's owner starts as interviewer.
    let (interviewer, interviewee) = if own.created_at <= partner.created_at {
        (own.user_id, partner.user_id)
    } else {
        (partner.user_id, own.user_id)
    };
    let earlier_scheduled = if own.created_at <= partner.created_at {
        own.scheduled_session_id
    } else {
        partner.scheduled_session_id
    };

    let result = conn.transaction::<_, diesel::result::Error, _>(|conn| {
        let flipped = diesel::update(
            matching_requests::table
                .filter(matching_requests::id.eq_any(vec![own.id, partner.id]))
                .filter(matching_requests::status.eq(RequestStatus::Matched.as_str()))
                .filter(matching_requests::live_session_id.is_null()),
        )
        .set((
            matching_requests::status.eq(RequestStatus::Confirmed.as_str()),
            matching_requests::live_session_id.eq(Some(session_id)),
            matching_requests::updated_at.eq(now),
        ))
        .execute(conn)?;
        if flipped != 2 {
            return Err(diesel::result::Error::RollbackTransaction);
        }

        diesel::insert_into(live_sessions::table)
            .values(&NewLiveSession {
                id: session_id,
                scheduled_session_id: Some(earlier_scheduled),
                first_question_id,
                second_question_id,
                active_question_id: Some(first_question_id),
                status: SessionStatus::InProgress.as_str().to_string(),
                started_at: now,
            })
            .execute(conn)?;

        diesel::insert_into(session_participants::table)
            .values(&vec![
                NewSessionParticipant {
                    session_id,
                    user_id: interviewer,
                    role: InterviewRole::Interviewer.as_str().to_string(),
                    is_active: true,
                },
                NewSessionParticipant {
                    session_id,
                    user_id: interviewee,
                    role: InterviewRole::Interviewee.as_str().to_string(),
                    is_active: true,
                },
            ])
            .execute(conn)?;

        Ok(())
    });

    match result {
        Ok(()) => Ok(Some(load_view(conn, session_id)?)),
        Err(diesel::result::Error::RollbackTransaction) => Ok(None),
        Err(e) => Err(AppError::Database(e)),
    }
}

// ---------------------------------------------------------------------------
// In-session operations
// ---------------------------------------------------------------------------

pub async fn change_active_question(
    state: &AppState,
    session_id: Uuid,
    user_id: Uuid,
    requested: Option<Uuid>,
) -> AppResult<SessionView> {
    let mut conn = state.conn()?;
    let view = load_view_for_participant(&mut conn, session_id, user_id)?;

    if view.session.status() != SessionStatus::InProgress {
        return Err(AppError::new(
            ErrorCode::SessionNotActive,
            "session is not in progress",
        ));
    }

    let next = match requested {
        Some(q) => ensure_assigned_question(
            view.session.first_question_id,
            view.session.second_question_id,
            q,
        )?,
        None => next_active_question(
            view.session.first_question_id,
            view.session.second_question_id,
            view.session.active_question_id,
        ),
    };

    let updated = diesel::update(
        live_sessions::table
            .find(session_id)
            .filter(live_sessions::status.eq(SessionStatus::InProgress.as_str())),
    )
    .set((
        live_sessions::active_question_id.eq(Some(next)),
        live_sessions::updated_at.eq(Utc::now()),
    ))
    .execute(&mut conn)
    .map_err(AppError::Database)?;
    if updated != 1 {
        return Err(AppError::new(
            ErrorCode::SessionNotActive,
            "session ended concurrently",
        ));
    }

    let view = load_view(&mut conn, session_id)?;
    state.notify_session(
        session_id,
        "collab",
        &CollabEvent::QuestionChanged {
            session_id,
            active_question_id: next,
            changed_by: user_id,
        },
    );
    Ok(view)
}

pub async fn switch_roles(
    state: &AppState,
    session_id: Uuid,
    user_id: Uuid,
) -> AppResult<SessionView> {
    let mut conn = state.conn()?;
    let view = load_view_for_participant(&mut conn, session_id, user_id)?;

    if view.session.status() != SessionStatus::InProgress {
        return Err(AppError::new(
            ErrorCode::SessionNotActive,
            "session is not in progress",
        ));
    }
    if !view
        .participants
        .iter()
        .any(|p| p.user_id == user_id && p.is_active)
    {
        return Err(AppError::new(
            ErrorCode::NotAParticipant,
            "caller is not an active participant",
        ));
    }

    let active: Vec<&SessionParticipant> =
        view.participants.iter().filter(|p| p.is_active).collect();
    if active.len() != 2 {
        return Err(AppError::invalid_state(
            "both participants must be active to switch roles",
        ));
    }

    conn.transaction::<_, diesel::result::Error, _>(|conn| {
        for participant in &active {
            diesel::update(session_participants::table.find(participant.id))
                .set(session_participants::role.eq(participant.role().opposite().as_str()))
                .execute(conn)?;
        }
        diesel::update(live_sessions::table.find(session_id))
            .set(live_sessions::updated_at.eq(Utc::now()))
            .execute(conn)?;
        Ok(())
    })
    .map_err(AppError::Database)?;

    let view = load_view(&mut conn, session_id)?;
    let interviewer = view
        .participants
        .iter()
        .find(|p| p.is_active && p.role() == InterviewRole::Interviewer);
    let interviewee = view
        .participants
        .iter()
        .find(|p| p.is_active && p.role() == InterviewRole::Interviewee);
    if let (Some(interviewer), Some(interviewee)) = (interviewer, interviewee) {
        state.notify_session(
            session_id,
            "collab",
            &CollabEvent::RolesSwitched {
                session_id,
                interviewer_id: interviewer.user_id,
                interviewee_id: interviewee.user_id,
            },
        );
    }
    Ok(view)
}

pub async fn end_session(
    state: &AppState,
    session_id: Uuid,
    user_id: Uuid,
) -> AppResult<SessionView> {
    let mut conn = state.conn()?;
    let view = load_view_for_participant(&mut conn, session_id, user_id)?;

    if view.session.status().is_terminal() {
        // Idempotent on repeat calls once terminal.
        return Ok(view);
    }

    let now = Utc::now();
    let updated = diesel::update(
        live_sessions::table
            .find(session_id)
            .filter(live_sessions::status.eq(SessionStatus::InProgress.as_str())),
    )
    .set((
        live_sessions::status.eq(SessionStatus::Completed.as_str()),
        live_sessions::ended_at.eq(Some(now)),
        live_sessions::updated_at.eq(now),
    ))
    .execute(&mut conn)
    .map_err(AppError::Database)?;

    let view = load_view(&mut conn, session_id)?;
    if updated == 1 {
        state.notify_session(
            session_id,
            "session-ended",
            &serde_json::json!({ "session_id": session_id, "status": view.session.status }),
        );
        publisher::publish_session_ended(&state.rabbitmq, &view.session, Some(user_id)).await;
        tracing::info!(session_id = %session_id, ended_by = %user_id, "live session completed");
    }
    Ok(view)
}

/// Socket-disconnect path: mark the leaving participant inactive; when both
/// have gone, an in-progress session is abandoned.
pub async fn abandon_if_deserted(
    state: &AppState,
    session_id: Uuid,
    leaving_user_id: Uuid,
) -> AppResult<()> {
    let mut conn = state.conn()?;

    diesel::update(
        session_participants::table
            .filter(session_participants::session_id.eq(session_id))
            .filter(session_participants::user_id.eq(leaving_user_id)),
    )
    .set(session_participants::is_active.eq(false))
    .execute(&mut conn)
    .map_err(AppError::Database)?;

    let still_active: i64 = session_participants::table
        .filter(session_participants::session_id.eq(session_id))
        .filter(session_participants::is_active.eq(true))
        .count()
        .get_result(&mut conn)
        .map_err(AppError::Database)?;
    if still_active > 0 {
        return Ok(());
    }

    let now = Utc::now();
    let updated = diesel::update(
        live_sessions::table
            .find(session_id)
            .filter(live_sessions::status.eq(SessionStatus::InProgress.as_str())),
    )
    .set((
        live_sessions::status.eq(SessionStatus::Abandoned.as_str()),
        live_sessions::ended_at.eq(Some(now)),
        live_sessions::updated_at.eq(now),
    ))
    .execute(&mut conn)
    .map_err(AppError::Database)?;

    if updated == 1 {
        let session = live_sessions::table
            .find(session_id)
            .first::<LiveSession>(&mut conn)
            .map_err(AppError::Database)?;
        publisher::publish_session_ended(&state.rabbitmq, &session, None).await;
        tracing::info!(session_id = %session_id, "live session abandoned");
    }
    Ok(())
}

/// Reconnect path: a participant rejoining the session room is active again.
pub fn mark_participant_active(
    conn: &mut PgConnection,
    session_id: Uuid,
    user_id: Uuid,
) -> AppResult<()> {
    diesel::update(
        session_participants::table
            .filter(session_participants::session_id.eq(session_id))
            .filter(session_participants::user_id.eq(user_id)),
    )
    .set(session_participants::is_active.eq(true))
    .execute(conn)
    .map_err(AppError::Database)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_flips_between_the_two_questions() {
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());

        assert_eq!(next_active_question(a, b, Some(a)), b);
        assert_eq!(next_active_question(a, b, Some(b)), a);
        assert_eq!(next_active_question(a, b, None), a);
    }

    #[test]
    fn rotation_round_trips() {
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
        let once = next_active_question(a, b, Some(a));
        let twice = next_active_question(a, b, Some(once));
        assert_eq!(twice, a);
    }

    #[test]
    fn explicit_question_must_be_assigned() {
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());

        assert_eq!(ensure_assigned_question(a, b, a).unwrap(), a);
        assert_eq!(ensure_assigned_question(a, b, b).unwrap(), b);

        let err = ensure_assigned_question(a, b, Uuid::now_v7()).unwrap_err();
        match err {
            AppError::Known { code, .. } => assert_eq!(code, ErrorCode::UnknownQuestion),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
