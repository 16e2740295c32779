use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// RabbitMQ Event envelope wrapping all domain events.
///
/// Routing key format: `vector.{domain}.{entity}.{action}`
/// Example: `vector.interview.session.started`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event<T: Serialize> {
    pub id: Uuid,
    pub source: String,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub correlation_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub data: T,
}

impl<T: Serialize> Event<T> {
    pub fn new(source: impl Into<String>, event_type: impl Into<String>, data: T) -> Self {
        Self {
            id: Uuid::now_v7(),
            source: source.into(),
            event_type: event_type.into(),
            timestamp: Utc::now(),
            correlation_id: None,
            user_id: None,
            data,
        }
    }

    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_correlation(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }
}

/// RabbitMQ routing keys
pub mod routing_keys {
    // Interview matching events
    pub const INTERVIEW_MATCH_CREATED: &str = "vector.interview.match.created";
    pub const INTERVIEW_MATCH_CANCELLED: &str = "vector.interview.match.cancelled";

    // Live session events
    pub const INTERVIEW_SESSION_STARTED: &str = "vector.interview.session.started";
    pub const INTERVIEW_SESSION_ENDED: &str = "vector.interview.session.ended";

    // Feedback events
    pub const INTERVIEW_FEEDBACK_SUBMITTED: &str = "vector.interview.feedback.submitted";
}

/// Common event data payloads
pub mod payloads {
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct MatchCreated {
        pub request_id: Uuid,
        pub matched_request_id: Uuid,
        pub user_id: Uuid,
        pub matched_user_id: Uuid,
        pub interview_type: String,
        pub interview_level: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct MatchCancelled {
        pub request_id: Uuid,
        pub user_id: Uuid,
        pub released_user_id: Option<Uuid>,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct SessionStarted {
        pub session_id: Uuid,
        pub interviewer_id: Uuid,
        pub interviewee_id: Uuid,
        pub first_question_id: Uuid,
        pub second_question_id: Uuid,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct SessionEnded {
        pub session_id: Uuid,
        pub ended_by: Option<Uuid>,
        pub status: String,
        pub duration_secs: i64,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct FeedbackSubmitted {
        pub feedback_id: Uuid,
        pub session_id: Uuid,
        pub reviewer_id: Uuid,
        pub reviewee_id: Uuid,
    }
}
