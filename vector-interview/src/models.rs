use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::{interview_feedback, live_sessions, matching_requests, session_participants};

// --- Status enums (stored as varchar) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Matched,
    Confirmed,
    Expired,
    Cancelled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Matched => "matched",
            Self::Confirmed => "confirmed",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Expired | Self::Cancelled)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "matched" => Ok(Self::Matched),
            "confirmed" => Ok(Self::Confirmed),
            "expired" => Ok(Self::Expired),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("unknown request status: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
    Abandoned,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Abandoned)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "abandoned" => Ok(Self::Abandoned),
            _ => Err(format!("unknown session status: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterviewRole {
    Interviewer,
    Interviewee,
}

impl InterviewRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Interviewer => "interviewer",
            Self::Interviewee => "interviewee",
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Self::Interviewer => Self::Interviewee,
            Self::Interviewee => Self::Interviewer,
        }
    }
}

impl std::fmt::Display for InterviewRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for InterviewRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "interviewer" => Ok(Self::Interviewer),
            "interviewee" => Ok(Self::Interviewee),
            _ => Err(format!("unknown interview role: {s}")),
        }
    }
}

// --- MatchingRequest ---

#[derive(Debug, Queryable, Identifiable, Serialize, Clone)]
#[diesel(table_name = matching_requests)]
pub struct MatchingRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub scheduled_session_id: Uuid,
    pub interview_type: String,
    pub practice_type: String,
    pub interview_level: String,
    pub scheduled_start_at: DateTime<Utc>,
    pub status: String,
    pub matched_user_id: Option<Uuid>,
    pub live_session_id: Option<Uuid>,
    pub user_confirmed: bool,
    pub matched_user_confirmed: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MatchingRequest {
    pub fn status(&self) -> RequestStatus {
        self.status.parse().unwrap_or(RequestStatus::Expired)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.status() == RequestStatus::Pending && self.expires_at <= now
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = matching_requests)]
pub struct NewMatchingRequest {
    pub user_id: Uuid,
    pub scheduled_session_id: Uuid,
    pub interview_type: String,
    pub practice_type: String,
    pub interview_level: String,
    pub scheduled_start_at: DateTime<Utc>,
    pub status: String,
    pub expires_at: DateTime<Utc>,
}

// --- LiveSession ---

#[derive(Debug, Queryable, Identifiable, Serialize, Clone)]
#[diesel(table_name = live_sessions)]
pub struct LiveSession {
    pub id: Uuid,
    pub scheduled_session_id: Option<Uuid>,
    pub first_question_id: Uuid,
    pub second_question_id: Uuid,
    pub active_question_id: Option<Uuid>,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LiveSession {
    pub fn status(&self) -> SessionStatus {
        self.status.parse().unwrap_or(SessionStatus::Abandoned)
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = live_sessions)]
pub struct NewLiveSession {
    pub id: Uuid,
    pub scheduled_session_id: Option<Uuid>,
    pub first_question_id: Uuid,
    pub second_question_id: Uuid,
    pub active_question_id: Option<Uuid>,
    pub status: String,
    pub started_at: DateTime<Utc>,
}

// --- SessionParticipant ---

#[derive(Debug, Queryable, Identifiable, Serialize, Clone)]
#[diesel(table_name = session_participants)]
pub struct SessionParticipant {
    pub id: Uuid,
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub role: String,
    pub is_active: bool,
    pub joined_at: DateTime<Utc>,
}

impl SessionParticipant {
    pub fn role(&self) -> InterviewRole {
        self.role.parse().unwrap_or(InterviewRole::Interviewee)
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = session_participants)]
pub struct NewSessionParticipant {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub role: String,
    pub is_active: bool,
}

// --- InterviewFeedback ---

#[derive(Debug, Queryable, Identifiable, Serialize, Clone)]
#[diesel(table_name = interview_feedback)]
pub struct InterviewFeedback {
    pub id: Uuid,
    pub live_session_id: Uuid,
    pub reviewer_id: Uuid,
    pub reviewee_id: Uuid,
    pub problem_solving_rating: Option<i32>,
    pub coding_rating: Option<i32>,
    pub communication_rating: Option<i32>,
    pub interviewer_rating: Option<i32>,
    pub strengths: Option<String>,
    pub improvements: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = interview_feedback)]
pub struct NewInterviewFeedback {
    pub live_session_id: Uuid,
    pub reviewer_id: Uuid,
    pub reviewee_id: Uuid,
    pub problem_solving_rating: Option<i32>,
    pub coding_rating: Option<i32>,
    pub communication_rating: Option<i32>,
    pub interviewer_rating: Option<i32>,
    pub strengths: Option<String>,
    pub improvements: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn request_status_round_trip() {
        for s in [
            RequestStatus::Pending,
            RequestStatus::Matched,
            RequestStatus::Confirmed,
            RequestStatus::Expired,
            RequestStatus::Cancelled,
        ] {
            assert_eq!(s.as_str().parse::<RequestStatus>().unwrap(), s);
        }
        assert!("nope".parse::<RequestStatus>().is_err());
    }

    #[test]
    fn terminal_statuses() {
        assert!(!RequestStatus::Pending.is_terminal());
        assert!(!RequestStatus::Matched.is_terminal());
        assert!(RequestStatus::Confirmed.is_terminal());
        assert!(RequestStatus::Expired.is_terminal());
        assert!(RequestStatus::Cancelled.is_terminal());

        assert!(!SessionStatus::InProgress.is_terminal());
        assert!(SessionStatus::Completed.is_terminal());
        assert!(SessionStatus::Abandoned.is_terminal());
    }

    #[test]
    fn role_opposite_round_trips() {
        assert_eq!(InterviewRole::Interviewer.opposite(), InterviewRole::Interviewee);
        assert_eq!(InterviewRole::Interviewer.opposite().opposite(), InterviewRole::Interviewer);
    }

    #[test]
    fn pending_past_expiry_counts_as_expired() {
        let now = Utc::now();
        let req = MatchingRequest {
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
            expires_at: now - Duration::seconds(1),
            created_at: now - Duration::seconds(600),
            updated_at: now - Duration::seconds(600),
        };
        assert!(req.is_expired_at(now));

        let mut matched = req.clone();
        matched.status = RequestStatus::Matched.as_str().into();
        assert!(!matched.is_expired_at(now));
    }
}
