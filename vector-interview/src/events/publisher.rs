use uuid::Uuid;

use vector_shared::clients::rabbitmq::RabbitMQClient;
use vector_shared::types::event::{payloads, routing_keys, Event};

use crate::models::{InterviewFeedback, InterviewRole, LiveSession, MatchingRequest};
use crate::session::ops::SessionView;

pub async fn publish_match_created(
    rabbitmq: &RabbitMQClient,
    request: &MatchingRequest,
    matched_user_id: Uuid,
) {
    let event = Event::new(
        "vector-interview",
        routing_keys::INTERVIEW_MATCH_CREATED,
        payloads::MatchCreated {
            request_id: request.id,
            matched_request_id: request.id,
            user_id: request.user_id,
            matched_user_id,
            interview_type: request.interview_type.clone(),
            interview_level: request.interview_level.clone(),
        },
    )
    .with_user(request.user_id);

    if let Err(e) = rabbitmq
        .publish(routing_keys::INTERVIEW_MATCH_CREATED, &event)
        .await
    {
        tracing::error!(error = %e, "failed to publish match.created event");
    }
}

pub async fn publish_match_cancelled(
    rabbitmq: &RabbitMQClient,
    request: &MatchingRequest,
    released_user_id: Option<Uuid>,
) {
    let event = Event::new(
        "vector-interview",
        routing_keys::INTERVIEW_MATCH_CANCELLED,
        payloads::MatchCancelled {
            request_id: request.id,
            user_id: request.user_id,
            released_user_id,
        },
    )
    .with_user(request.user_id);

    if let Err(e) = rabbitmq
        .publish(routing_keys::INTERVIEW_MATCH_CANCELLED, &event)
        .await
    {
        tracing::error!(error = %e, "failed to publish match.cancelled event");
    }
}

pub async fn publish_session_started(rabbitmq: &RabbitMQClient, view: &SessionView) {
    let interviewer = view
        .participants
        .iter()
        .find(|p| p.role() == InterviewRole::Interviewer);
    let interviewee = view
        .participants
        .iter()
        .find(|p| p.role() == InterviewRole::Interviewee);
    let (interviewer, interviewee) = match (interviewer, interviewee) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            tracing::error!(session_id = %view.session.id, "session missing a role, event skipped");
            return;
        }
    };

    let event = Event::new(
        "vector-interview",
        routing_keys::INTERVIEW_SESSION_STARTED,
        payloads::SessionStarted {
            session_id: view.session.id,
            interviewer_id: interviewer.user_id,
            interviewee_id: interviewee.user_id,
            first_question_id: view.session.first_question_id,
            second_question_id: view.session.second_question_id,
        },
    )
    .with_user(interviewer.user_id);

    if let Err(e) = rabbitmq
        .publish(routing_keys::INTERVIEW_SESSION_STARTED, &event)
        .await
    {
        tracing::error!(error = %e, "failed to publish session.started event");
    }
}

pub async fn publish_session_ended(
    rabbitmq: &RabbitMQClient,
    session: &LiveSession,
    ended_by: Option<Uuid>,
) {
    let duration_secs = session
        .ended_at
        .map(|ended| (ended - session.started_at).num_seconds())
        .unwrap_or(0);

    let mut event = Event::new(
        "vector-interview",
        routing_keys::INTERVIEW_SESSION_ENDED,
        payloads::SessionEnded {
            session_id: session.id,
            ended_by,
            status: session.status.clone(),
            duration_secs,
        },
    );
    if let Some(user) = ended_by {
        event = event.with_user(user);
    }

    if let Err(e) = rabbitmq
        .publish(routing_keys::INTERVIEW_SESSION_ENDED, &event)
        .await
    {
        tracing::error!(error = %e, "failed to publish session.ended event");
    }
}

pub async fn publish_feedback_submitted(rabbitmq: &RabbitMQClient, feedback: &InterviewFeedback) {
    let event = Event::new(
        "vector-interview",
        routing_keys::INTERVIEW_FEEDBACK_SUBMITTED,
        payloads::FeedbackSubmitted {
            feedback_id: feedback.id,
            session_id: feedback.live_session_id,
            reviewer_id: feedback.reviewer_id,
            reviewee_id: feedback.reviewee_id,
        },
    )
    .with_user(feedback.reviewer_id);

    if let Err(e) = rabbitmq
        .publish(routing_keys::INTERVIEW_FEEDBACK_SUBMITTED, &event)
        .await
    {
        tracing::error!(error = %e, "failed to publish feedback.submitted event");
    }
}
