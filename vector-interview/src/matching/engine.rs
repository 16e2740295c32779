use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use vector_shared::errors::{AppError, AppResult, ErrorCode};

use crate::events::publisher;
use crate::matching::store;
use crate::models::{MatchingRequest, RequestStatus};
use crate::schema::matching_requests;
use crate::session;
use crate::session::ops::SessionView;
use crate::AppState;

// ---------------------------------------------------------------------------
// Payload / outcome types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct StartMatchingPayload {
    pub scheduled_session_id: Uuid,
    pub interview_type: String,
    pub practice_type: String,
    pub interview_level: String,
    pub scheduled_start_at: DateTime<Utc>,
}

/// Result of a `start_matching` call, serialized as-is into the API envelope.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MatchOutcome {
    Waiting { request: MatchingRequest },
    Matched {
        request: MatchingRequest,
        partner_user_id: Uuid,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConfirmOutcome {
    WaitingForPartner { request: MatchingRequest },
    SessionReady { session: SessionView },
}

#[derive(Debug, Serialize)]
pub struct MatchFoundPayload {
    pub request_id: Uuid,
    pub partner_user_id: Uuid,
}

// ---------------------------------------------------------------------------
// Candidate selection
// ---------------------------------------------------------------------------

/// FIFO tie-break: among compatible candidates the oldest request wins.
pub fn pick_candidate(candidates: &[MatchingRequest]) -> Option<&MatchingRequest> {
    candidates.iter().min_by_key(|c| c.created_at)
}

// ---------------------------------------------------------------------------
// start_matching
// ---------------------------------------------------------------------------

pub async fn start_matching(
    state: &AppState,
    user_id: Uuid,
    payload: StartMatchingPayload,
) -> AppResult<MatchOutcome> {
    let mut conn = state.conn()?;

    // Idempotent re-entry: reuse a live pending request, report an existing
    // match, refuse once the pair is confirmed.
    let request = match store::find_active_for(&mut conn, user_id, payload.scheduled_session_id)? {
        Some(existing) => match existing.status() {
            RequestStatus::Pending if !existing.is_expired_at(Utc::now()) => existing,
            RequestStatus::Pending => {
                expire_request(&mut conn, existing.id)?;
                create_from_payload(&mut conn, state, user_id, &payload)?
            }
            RequestStatus::Matched => {
                let partner = existing.matched_user_id.ok_or_else(|| {
                    AppError::internal("matched request without matched_user_id")
                })?;
                return Ok(MatchOutcome::Matched {
                    request: existing,
                    partner_user_id: partner,
                });
            }
            _ => {
                return Err(AppError::new(
                    ErrorCode::ActiveRequestExists,
                    "matching already confirmed for this scheduled session",
                ))
            }
        },
        None => create_from_payload(&mut conn, state, user_id, &payload)?,
    };

    // One pairing critical section per compatibility bucket. Losing the lock
    // is not an error: the holder will pick this request up, or the caller
    // polls again.
    let lock_key = format!(
        "interview:pairing:{}:{}:{}",
        request.interview_type, request.practice_type, request.interview_level
    );
    if !state.redis.set_nx(&lock_key, "1", 5).await.unwrap_or(false) {
        return Ok(MatchOutcome::Waiting { request });
    }

    let outcome = pair_locked(state, &mut conn, &request);
    let _ = state.redis.del(&lock_key).await;

    let outcome = outcome?;
    if let MatchOutcome::Matched { request, partner_user_id } = &outcome {
        publisher::publish_match_created(&state.rabbitmq, request, *partner_user_id).await;
        state.notify_user(
            *partner_user_id,
            "match-found",
            &MatchFoundPayload {
                request_id: request.id,
                partner_user_id: request.user_id,
            },
        );
        tracing::info!(
            request_id = %request.id,
            user_id = %request.user_id,
            partner_id = %partner_user_id,
            "matching pair created"
        );
    }
    Ok(outcome)
}

fn create_from_payload(
    conn: &mut PgConnection,
    state: &AppState,
    user_id: Uuid,
    payload: &StartMatchingPayload,
) -> AppResult<MatchingRequest> {
    store::create_pending(
        conn,
        user_id,
        payload.scheduled_session_id,
        &payload.interview_type,
        &payload.practice_type,
        &payload.interview_level,
        payload.scheduled_start_at,
        state.config.request_ttl_secs,
    )
}

fn expire_request(conn: &mut PgConnection, request_id: Uuid) -> AppResult<()> {
    diesel::update(matching_requests::table.find(request_id))
        .set((
            matching_requests::status.eq(RequestStatus::Expired.as_str()),
            matching_requests::updated_at.eq(Utc::now()),
        ))
        .execute(conn)
        .map_err(AppError::Database)?;
    Ok(())
}

/// Search + pair under the bucket lock. A lost row-level race is retried once
/// with a fresh search before giving up.
fn pair_locked(
    state: &AppState,
    conn: &mut PgConnection,
    request: &MatchingRequest,
) -> AppResult<MatchOutcome> {
    for attempt in 0..2 {
        let candidates =
            store::find_compatible_pending(conn, request, state.config.start_window_secs)?;
        let candidate = match pick_candidate(&candidates) {
            Some(c) => c.clone(),
            None => {
                return Ok(MatchOutcome::Waiting {
                    request: store::get(conn, request.id)?,
                })
            }
        };

        if try_pair(conn, request, &candidate)? {
            return Ok(MatchOutcome::Matched {
                request: store::get(conn, request.id)?,
                partner_user_id: candidate.user_id,
            });
        }

        // Someone may have claimed *us* while we were searching.
        let fresh = store::get(conn, request.id)?;
        if fresh.status() == RequestStatus::Matched {
            let partner = fresh
                .matched_user_id
                .ok_or_else(|| AppError::internal("matched request without matched_user_id"))?;
            return Ok(MatchOutcome::Matched {
                request: fresh,
                partner_user_id: partner,
            });
        }
        tracing::debug!(attempt, request_id = %request.id, "pairing race lost, retrying");
    }

    Err(AppError::new(
        ErrorCode::MatchLost,
        "candidate was claimed concurrently, retry matching",
    ))
}

/// Flip both rows pending -> matched in one transaction. Status-guarded
/// updates with affected-row checks decide the winner of any race.
fn try_pair(
    conn: &mut PgConnection,
    mine: &MatchingRequest,
    theirs: &MatchingRequest,
) -> AppResult<bool> {
    let now = Utc::now();
    let result = conn.transaction::<_, diesel::result::Error, _>(|conn| {
        let updated_mine = diesel::update(
            matching_requests::table
                .find(mine.id)
                .filter(matching_requests::status.eq(RequestStatus::Pending.as_str())),
        )
        .set((
            matching_requests::status.eq(RequestStatus::Matched.as_str()),
            matching_requests::matched_user_id.eq(Some(theirs.user_id)),
            matching_requests::user_confirmed.eq(false),
            matching_requests::matched_user_confirmed.eq(false),
            matching_requests::updated_at.eq(now),
        ))
        .execute(conn)?;

        let updated_theirs = diesel::update(
            matching_requests::table
                .find(theirs.id)
                .filter(matching_requests::status.eq(RequestStatus::Pending.as_str())),
        )
        .set((
            matching_requests::status.eq(RequestStatus::Matched.as_str()),
            matching_requests::matched_user_id.eq(Some(mine.user_id)),
            matching_requests::user_confirmed.eq(false),
            matching_requests::matched_user_confirmed.eq(false),
            matching_requests::updated_at.eq(now),
        ))
        .execute(conn)?;

        if updated_mine == 1 && updated_theirs == 1 {
            Ok(())
        } else {
            Err(diesel::result::Error::RollbackTransaction)
        }
    });

    match result {
        Ok(()) => Ok(true),
        Err(diesel::result::Error::RollbackTransaction) => Ok(false),
        Err(e) => Err(AppError::Database(e)),
    }
}

// ---------------------------------------------------------------------------
// confirm_match
// ---------------------------------------------------------------------------

pub async fn confirm_match(
    state: &AppState,
    request_id: Uuid,
    user_id: Uuid,
) -> AppResult<ConfirmOutcome> {
    let mut conn = state.conn()?;
    let request = store::get(&mut conn, request_id)?;

    // The caller may pass either side's request id; resolve to their own row.
    let own = resolve_own_row(&mut conn, &request, user_id)?;

    match own.status() {
        RequestStatus::Matched => {}
        RequestStatus::Confirmed => {
            let session_id = own
                .live_session_id
                .ok_or_else(|| AppError::internal("confirmed request without live_session_id"))?;
            let view = session::ops::load_view(&mut conn, session_id)?;
            return Ok(ConfirmOutcome::SessionReady { session: view });
        }
        RequestStatus::Pending => {
            return Err(AppError::invalid_state("request has not been matched yet"))
        }
        _ => return Err(AppError::invalid_state("request is no longer active")),
    }

    let partner_user_id = own
        .matched_user_id
        .ok_or_else(|| AppError::internal("matched request without matched_user_id"))?;

    mark_confirmed(&mut conn, &own, partner_user_id)?;
    let own = store::get(&mut conn, own.id)?;

    if !(own.user_confirmed && own.matched_user_confirmed) {
        state.notify_user(
            partner_user_id,
            "partner-confirmed",
            &serde_json::json!({ "request_id": own.id }),
        );
        return Ok(ConfirmOutcome::WaitingForPartner { request: own });
    }

    // Both sides are in; assign questions, then create exactly one session.
    let q1 = state
        .questions
        .get_random_question(&own.interview_type, &own.interview_level, None)
        .await?;
    let q2 = state
        .questions
        .get_random_question(&own.interview_type, &own.interview_level, Some(q1.id))
        .await?;

    let partner_row = partner_row_of(&mut conn, &own)?;
    let view = match session::ops::create_for_pair(&mut conn, &own, &partner_row, q1.id, q2.id)? {
        Some(view) => view,
        None => {
            // Lost the creation race to the other confirmer; their session wins.
            let fresh = store::get(&mut conn, own.id)?;
            match fresh.live_session_id {
                Some(session_id) => session::ops::load_view(&mut conn, session_id)?,
                None => {
                    return Err(AppError::invalid_state(
                        "match was released before confirmation completed",
                    ))
                }
            }
        }
    };

    for participant in &view.participants {
        state.notify_user(participant.user_id, "session-ready", &view);
    }
    publisher::publish_session_started(&state.rabbitmq, &view).await;
    tracing::info!(session_id = %view.session.id, "live session created");

    Ok(ConfirmOutcome::SessionReady { session: view })
}

/// Resolve the row owned by `user_id`, whichever side's id was passed in.
fn resolve_own_row(
    conn: &mut PgConnection,
    request: &MatchingRequest,
    user_id: Uuid,
) -> AppResult<MatchingRequest> {
    if request.user_id == user_id {
        return Ok(request.clone());
    }
    if request.matched_user_id == Some(user_id) {
        return partner_row_of(conn, request);
    }
    Err(AppError::new(
        ErrorCode::NotYourRequest,
        "request does not belong to the caller",
    ))
}

/// The counterpart row of a matched request.
fn partner_row_of(conn: &mut PgConnection, request: &MatchingRequest) -> AppResult<MatchingRequest> {
    let partner_user = request
        .matched_user_id
        .ok_or_else(|| AppError::internal("matched request without matched_user_id"))?;
    matching_requests::table
        .filter(matching_requests::user_id.eq(partner_user))
        .filter(matching_requests::matched_user_id.eq(request.user_id))
        .filter(matching_requests::status.eq_any(vec![
            RequestStatus::Matched.as_str(),
            RequestStatus::Confirmed.as_str(),
        ]))
        .order(matching_requests::updated_at.desc())
        .first::<MatchingRequest>(conn)
        .optional()
        .map_err(AppError::Database)?
        .ok_or_else(|| AppError::new(ErrorCode::MatchLost, "counterpart request no longer matched"))
}

/// Record the caller's confirmation on both rows. The flags mirror each
/// other: own.user_confirmed == partner.matched_user_confirmed.
fn mark_confirmed(
    conn: &mut PgConnection,
    own: &MatchingRequest,
    partner_user_id: Uuid,
) -> AppResult<()> {
    let now = Utc::now();
    let result = conn.transaction::<_, diesel::result::Error, _>(|conn| {
        let updated = diesel::update(
            matching_requests::table
                .find(own.id)
                .filter(matching_requests::status.eq(RequestStatus::Matched.as_str())),
        )
        .set((
            matching_requests::user_confirmed.eq(true),
            matching_requests::updated_at.eq(now),
        ))
        .execute(conn)?;
        if updated != 1 {
            return Err(diesel::result::Error::RollbackTransaction);
        }

        diesel::update(
            matching_requests::table
                .filter(matching_requests::user_id.eq(partner_user_id))
                .filter(matching_requests::matched_user_id.eq(own.user_id))
                .filter(matching_requests::status.eq(RequestStatus::Matched.as_str())),
        )
        .set((
            matching_requests::matched_user_confirmed.eq(true),
            matching_requests::updated_at.eq(now),
        ))
        .execute(conn)?;

        Ok(())
    });

    match result {
        Ok(()) => Ok(()),
        Err(diesel::result::Error::RollbackTransaction) => Err(AppError::new(
            ErrorCode::MatchLost,
            "match was released before it could be confirmed",
        )),
        Err(e) => Err(AppError::Database(e)),
    }
}

// ---------------------------------------------------------------------------
// cancel / read
// ---------------------------------------------------------------------------

pub async fn cancel_request(
    state: &AppState,
    request_id: Uuid,
    user_id: Uuid,
) -> AppResult<MatchingRequest> {
    let mut conn = state.conn()?;
    let request = store::get(&mut conn, request_id)?;

    if request.user_id != user_id {
        return Err(AppError::new(
            ErrorCode::NotYourRequest,
            "only the owner can cancel a matching request",
        ));
    }

    let now = Utc::now();
    match request.status() {
        RequestStatus::Pending => {
            let updated = diesel::update(
                matching_requests::table
                    .find(request.id)
                    .filter(matching_requests::status.eq(RequestStatus::Pending.as_str())),
            )
            .set((
                matching_requests::status.eq(RequestStatus::Cancelled.as_str()),
                matching_requests::updated_at.eq(now),
            ))
            .execute(&mut conn)
            .map_err(AppError::Database)?;
            if updated != 1 {
                return Err(AppError::invalid_state("request state changed, retry"));
            }
        }
        RequestStatus::Matched => {
            let partner_user_id = request
                .matched_user_id
                .ok_or_else(|| AppError::internal("matched request without matched_user_id"))?;

            conn.transaction::<_, diesel::result::Error, _>(|conn| {
                diesel::update(
                    matching_requests::table
                        .find(request.id)
                        .filter(matching_requests::status.eq(RequestStatus::Matched.as_str())),
                )
                .set((
                    matching_requests::status.eq(RequestStatus::Cancelled.as_str()),
                    matching_requests::matched_user_id.eq(None::<Uuid>),
                    matching_requests::user_confirmed.eq(false),
                    matching_requests::matched_user_confirmed.eq(false),
                    matching_requests::updated_at.eq(now),
                ))
                .execute(conn)?;

                // Release the counterpart so it can be rematched.
                diesel::update(
                    matching_requests::table
                        .filter(matching_requests::user_id.eq(partner_user_id))
                        .filter(matching_requests::matched_user_id.eq(request.user_id))
                        .filter(matching_requests::status.eq(RequestStatus::Matched.as_str())),
                )
                .set((
                    matching_requests::status.eq(RequestStatus::Pending.as_str()),
                    matching_requests::matched_user_id.eq(None::<Uuid>),
                    matching_requests::user_confirmed.eq(false),
                    matching_requests::matched_user_confirmed.eq(false),
                    matching_requests::updated_at.eq(now),
                ))
                .execute(conn)?;
                Ok(())
            })
            .map_err(AppError::Database)?;

            state.notify_user(
                partner_user_id,
                "match-cancelled",
                &serde_json::json!({ "request_id": request.id }),
            );
            publisher::publish_match_cancelled(&state.rabbitmq, &request, Some(partner_user_id))
                .await;
        }
        _ => {
            return Err(AppError::invalid_state(
                "only pending or matched requests can be cancelled",
            ))
        }
    }

    let updated = store::get(&mut conn, request.id)?;
    tracing::info!(request_id = %updated.id, user_id = %user_id, "matching request cancelled");
    Ok(updated)
}

/// Poll endpoint: owner or counterpart may read the request.
pub fn get_request(state: &AppState, request_id: Uuid, user_id: Uuid) -> AppResult<MatchingRequest> {
    let mut conn = state.conn()?;
    let request = store::get(&mut conn, request_id)?;
    if request.user_id != user_id && request.matched_user_id != Some(user_id) {
        return Err(AppError::new(
            ErrorCode::NotYourRequest,
            "request does not belong to the caller",
        ));
    }
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn request_created_at(offset_secs: i64) -> MatchingRequest {
        let now = Utc::now();
        MatchingRequest {
            id: Uuid::now_v7(),
            user_id: Uuid::now_v7(),
            scheduled_session_id: Uuid::now_v7(),
            interview_type: "dsa".into(),
            practice_type: "peer".into(),
            interview_level: "beginner".into(),
            scheduled_start_at: now,
            status: RequestStatus::Pending.as_str().into(),
            matched_user_id: None,
            live_session_id: None,
            user_confirmed: false,
            matched_user_confirmed: false,
            expires_at: now + Duration::seconds(900),
            created_at: now + Duration::seconds(offset_secs),
            updated_at: now,
        }
    }

    #[test]
    fn pick_candidate_prefers_oldest() {
        let newest = request_created_at(30);
        let oldest = request_created_at(-60);
        let middle = request_created_at(0);

        let candidates = vec![newest.clone(), oldest.clone(), middle];
        let picked = pick_candidate(&candidates).unwrap();
        assert_eq!(picked.id, oldest.id);
    }

    #[test]
    fn pick_candidate_empty_is_none() {
        assert!(pick_candidate(&[]).is_none());
    }

    #[test]
    fn match_outcome_serializes_with_status_tag() {
        let request = request_created_at(0);
        let json = serde_json::to_value(MatchOutcome::Waiting { request }).unwrap();
        assert_eq!(json["status"], "waiting");
        assert!(json["request"]["id"].is_string());
    }
}
