use chrono::{DateTime, Duration, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use uuid::Uuid;

use vector_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::{MatchingRequest, NewMatchingRequest, RequestStatus};
use crate::schema::matching_requests;

pub fn get(conn: &mut PgConnection, request_id: Uuid) -> AppResult<MatchingRequest> {
    matching_requests::table
        .find(request_id)
        .first::<MatchingRequest>(conn)
        .optional()
        .map_err(AppError::Database)?
        .ok_or_else(|| AppError::new(ErrorCode::RequestNotFound, "matching request not found"))
}

/// The caller's non-terminal request for this scheduled session, if any.
pub fn find_active_for(
    conn: &mut PgConnection,
    user_id: Uuid,
    scheduled_session_id: Uuid,
) -> AppResult<Option<MatchingRequest>> {
    matching_requests::table
        .filter(matching_requests::user_id.eq(user_id))
        .filter(matching_requests::scheduled_session_id.eq(scheduled_session_id))
        .filter(matching_requests::status.eq_any(vec![
            RequestStatus::Pending.as_str(),
            RequestStatus::Matched.as_str(),
            RequestStatus::Confirmed.as_str(),
        ]))
        .order(matching_requests::created_at.desc())
        .first::<MatchingRequest>(conn)
        .optional()
        .map_err(AppError::Database)
}

pub fn create_pending(
    conn: &mut PgConnection,
    user_id: Uuid,
    scheduled_session_id: Uuid,
    interview_type: &str,
    practice_type: &str,
    interview_level: &str,
    scheduled_start_at: DateTime<Utc>,
    ttl_secs: i64,
) -> AppResult<MatchingRequest> {
    if find_active_for(conn, user_id, scheduled_session_id)?.is_some() {
        return Err(AppError::new(
            ErrorCode::ActiveRequestExists,
            "an active matching request already exists for this scheduled session",
        ));
    }

    let new_request = NewMatchingRequest {
        user_id,
        scheduled_session_id,
        interview_type: interview_type.to_string(),
        practice_type: practice_type.to_string(),
        interview_level: interview_level.to_string(),
        scheduled_start_at,
        status: RequestStatus::Pending.as_str().to_string(),
        expires_at: Utc::now() + Duration::seconds(ttl_secs),
    };

    diesel::insert_into(matching_requests::table)
        .values(&new_request)
        .get_result::<MatchingRequest>(conn)
        .map_err(AppError::Database)
}

/// True when two scheduled starts fall inside the pairing tolerance.
pub fn within_start_window(
    a: DateTime<Utc>,
    b: DateTime<Utc>,
    window_secs: i64,
) -> bool {
    (a - b).num_seconds().abs() <= window_secs
}

/// Pending, unexpired requests compatible with `request`, oldest first.
/// Expired-but-unswept rows are excluded by the `expires_at` filter even
/// before the sweeper flips them.
pub fn find_compatible_pending(
    conn: &mut PgConnection,
    request: &MatchingRequest,
    window_secs: i64,
) -> AppResult<Vec<MatchingRequest>> {
    let now = Utc::now();

    let mut candidates = matching_requests::table
        .filter(matching_requests::status.eq(RequestStatus::Pending.as_str()))
        .filter(matching_requests::user_id.ne(request.user_id))
        .filter(matching_requests::interview_type.eq(&request.interview_type))
        .filter(matching_requests::practice_type.eq(&request.practice_type))
        .filter(matching_requests::interview_level.eq(&request.interview_level))
        .filter(matching_requests::expires_at.gt(now))
        .order(matching_requests::created_at.asc())
        .load::<MatchingRequest>(conn)
        .map_err(AppError::Database)?;

    candidates.retain(|c| {
        within_start_window(c.scheduled_start_at, request.scheduled_start_at, window_secs)
    });
    Ok(candidates)
}

/// Sweep pending requests past their expiry. Returns the number flipped.
pub fn expire_stale(conn: &mut PgConnection) -> AppResult<usize> {
    let now = Utc::now();
    diesel::update(
        matching_requests::table
            .filter(matching_requests::status.eq(RequestStatus::Pending.as_str()))
            .filter(matching_requests::expires_at.le(now)),
    )
    .set((
        matching_requests::status.eq(RequestStatus::Expired.as_str()),
        matching_requests::updated_at.eq(now),
    ))
    .execute(conn)
    .map_err(AppError::Database)
}

/// Matched pairs that sat unconfirmed past the deadline go back to pending
/// (or straight to expired when their own expiry has also passed), so the
/// counterpart can be rematched. Returns the number of rows touched.
pub fn revert_stale_matches(conn: &mut PgConnection, confirm_timeout_secs: i64) -> AppResult<usize> {
    let now = Utc::now();
    let deadline = now - Duration::seconds(confirm_timeout_secs);

    let expired = diesel::update(
        matching_requests::table
            .filter(matching_requests::status.eq(RequestStatus::Matched.as_str()))
            .filter(matching_requests::updated_at.lt(deadline))
            .filter(matching_requests::expires_at.le(now)),
    )
    .set((
        matching_requests::status.eq(RequestStatus::Expired.as_str()),
        matching_requests::matched_user_id.eq(None::<Uuid>),
        matching_requests::user_confirmed.eq(false),
        matching_requests::matched_user_confirmed.eq(false),
        matching_requests::updated_at.eq(now),
    ))
    .execute(conn)
    .map_err(AppError::Database)?;

    let reverted = diesel::update(
        matching_requests::table
            .filter(matching_requests::status.eq(RequestStatus::Matched.as_str()))
            .filter(matching_requests::updated_at.lt(deadline)),
    )
    .set((
        matching_requests::status.eq(RequestStatus::Pending.as_str()),
        matching_requests::matched_user_id.eq(None::<Uuid>),
        matching_requests::user_confirmed.eq(false),
        matching_requests::matched_user_confirmed.eq(false),
        matching_requests::updated_at.eq(now),
    ))
    .execute(conn)
    .map_err(AppError::Database)?;

    Ok(expired + reverted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_window_is_symmetric() {
        let t = Utc::now();
        let later = t + Duration::seconds(600);

        assert!(within_start_window(t, t, 0));
        assert!(within_start_window(t, later, 900));
        assert!(within_start_window(later, t, 900));
        assert!(!within_start_window(t, later, 599));
    }

    #[test]
    fn start_window_boundary_is_inclusive() {
        let t = Utc::now();
        assert!(within_start_window(t, t + Duration::seconds(900), 900));
        assert!(!within_start_window(t, t + Duration::seconds(901), 900));
    }
}
