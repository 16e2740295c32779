use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Typed union of every real-time event that moves through a session room.
/// Payloads that do not parse into one of these shapes are rejected at the
/// socket boundary instead of being relayed opaquely.
///
/// The first four shapes are client-originated cosmetic sync; the last two
/// are emitted by the server when the session state machine changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CollabEvent {
    #[serde(rename = "code.updated")]
    CodeUpdated { content: String, language: String },

    #[serde(rename = "cursor.moved")]
    CursorMoved { line: u32, column: u32 },

    #[serde(rename = "selection.changed")]
    SelectionChanged {
        start_line: u32,
        start_column: u32,
        end_line: u32,
        end_column: u32,
    },

    #[serde(rename = "test_results.updated")]
    TestResultsUpdated {
        passed: u32,
        failed: u32,
        output: Option<String>,
    },

    #[serde(rename = "question.changed")]
    QuestionChanged {
        session_id: Uuid,
        active_question_id: Uuid,
        changed_by: Uuid,
    },

    #[serde(rename = "roles.switched")]
    RolesSwitched {
        session_id: Uuid,
        interviewer_id: Uuid,
        interviewee_id: Uuid,
    },
}

impl CollabEvent {
    /// Whether clients may send this shape for relay. State-machine events
    /// only ever originate from the server.
    pub fn client_sendable(&self) -> bool {
        !matches!(
            self,
            Self::QuestionChanged { .. } | Self::RolesSwitched { .. }
        )
    }
}

/// A relayed event as seen by the other participant.
#[derive(Debug, Clone, Serialize)]
pub struct CollabBroadcast {
    pub sender_id: Uuid,
    #[serde(flatten)]
    pub event: CollabEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_shapes_parse() {
        let event: CollabEvent = serde_json::from_value(serde_json::json!({
            "type": "code.updated",
            "content": "fn main() {}",
            "language": "rust",
        }))
        .unwrap();
        assert!(matches!(event, CollabEvent::CodeUpdated { .. }));
        assert!(event.client_sendable());

        let event: CollabEvent = serde_json::from_value(serde_json::json!({
            "type": "cursor.moved",
            "line": 10,
            "column": 4,
        }))
        .unwrap();
        assert!(matches!(event, CollabEvent::CursorMoved { line: 10, column: 4 }));
    }

    #[test]
    fn unrecognized_shapes_are_rejected() {
        let result = serde_json::from_value::<CollabEvent>(serde_json::json!({
            "type": "screen.shared",
            "stream_id": "abc",
        }));
        assert!(result.is_err());

        // Known tag with missing fields is rejected too.
        let result = serde_json::from_value::<CollabEvent>(serde_json::json!({
            "type": "code.updated",
        }));
        assert!(result.is_err());
    }

    #[test]
    fn state_machine_events_are_not_client_sendable() {
        let event = CollabEvent::QuestionChanged {
            session_id: Uuid::now_v7(),
            active_question_id: Uuid::now_v7(),
            changed_by: Uuid::now_v7(),
        };
        assert!(!event.client_sendable());

        let event = CollabEvent::RolesSwitched {
            session_id: Uuid::now_v7(),
            interviewer_id: Uuid::now_v7(),
            interviewee_id: Uuid::now_v7(),
        };
        assert!(!event.client_sendable());
    }

    #[test]
    fn broadcast_flattens_event_fields() {
        let broadcast = CollabBroadcast {
            sender_id: Uuid::now_v7(),
            event: CollabEvent::CursorMoved { line: 3, column: 7 },
        };
        let json = serde_json::to_value(&broadcast).unwrap();
        assert_eq!(json["type"], "cursor.moved");
        assert_eq!(json["line"], 3);
        assert!(json["sender_id"].is_string());
    }
}
