use std::sync::Arc;

use serde::{Deserialize, Serialize};
use socketioxide::extract::{Data, SocketRef, State};
use uuid::Uuid;

use vector_shared::middleware::decode_token;

use crate::session::ops;
use crate::socket::collab::{CollabBroadcast, CollabEvent};
use crate::AppState;

// ---------------------------------------------------------------------------
// Payload types for Socket.IO events
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct MatchingPresencePayload {
    pub scheduled_session_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct JoinSessionPayload {
    pub session_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct PresenceStatusPayload {
    pub scheduled_session_id: Uuid,
    pub others_waiting: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Connection handler
// ---------------------------------------------------------------------------

pub async fn on_connect(socket: SocketRef, state: State<Arc<AppState>>) {
    // Authenticate via query param ?token=xxx
    let user_id = match authenticate_socket(&socket, &state) {
        Ok(id) => id,
        Err(msg) => {
            tracing::warn!(error = %msg, "socket auth failed");
            let _ = socket.emit(
                "error",
                &ErrorPayload {
                    code: "AUTH_FAILED".into(),
                    message: msg,
                },
            );
            socket.disconnect().ok();
            return;
        }
    };

    socket.extensions.insert(user_id);

    // Register event handlers before anything async so early client emits
    // are not dropped.
    socket.on("matching-open", on_matching_open);
    socket.on("matching-close", on_matching_close);
    socket.on("session-join", on_session_join);
    socket.on("collab", on_collab);
    socket.on_disconnect(on_disconnect);

    // Join user-specific room for targeted messages
    let user_room = format!("user:{user_id}");
    socket.join(user_room).ok();

    tracing::info!(user_id = %user_id, sid = %socket.id, "socket connected");

    let _ = socket.emit("connected", &serde_json::json!({ "user_id": user_id }));
}

// ---------------------------------------------------------------------------
// Event: matching-open (matching modal opened)
// ---------------------------------------------------------------------------

async fn on_matching_open(
    socket: SocketRef,
    state: State<Arc<AppState>>,
    Data(payload): Data<MatchingPresencePayload>,
) {
    let user_id = match get_user_id(&socket) {
        Some(id) => id,
        None => return,
    };

    let session_id = payload.scheduled_session_id;
    state.presence.set_active(user_id, session_id);

    let room = matching_room(session_id);
    socket.join(room.clone()).ok();

    let status = PresenceStatusPayload {
        scheduled_session_id: session_id,
        others_waiting: state.presence.others_active(session_id, user_id),
    };
    let _ = socket.emit("matching-presence", &status);
    let _ = socket.to(room).emit(
        "matching-presence",
        &serde_json::json!({
            "scheduled_session_id": session_id,
            "joined": user_id,
        }),
    );

    tracing::debug!(user_id = %user_id, scheduled_session_id = %session_id, "matching modal opened");
}

// ---------------------------------------------------------------------------
// Event: matching-close (matching modal closed)
// ---------------------------------------------------------------------------

async fn on_matching_close(
    socket: SocketRef,
    state: State<Arc<AppState>>,
    Data(payload): Data<MatchingPresencePayload>,
) {
    let user_id = match get_user_id(&socket) {
        Some(id) => id,
        None => return,
    };

    let session_id = payload.scheduled_session_id;
    state.presence.set_inactive(user_id, session_id);

    let room = matching_room(session_id);
    let _ = socket.to(room.clone()).emit(
        "matching-presence",
        &serde_json::json!({
            "scheduled_session_id": session_id,
            "left": user_id,
        }),
    );
    socket.leave(room).ok();
}

// ---------------------------------------------------------------------------
// Event: session-join
// ---------------------------------------------------------------------------

async fn on_session_join(
    socket: SocketRef,
    state: State<Arc<AppState>>,
    Data(payload): Data<JoinSessionPayload>,
) {
    let user_id = match get_user_id(&socket) {
        Some(id) => id,
        None => return,
    };

    // Participancy is checked against the store once, at join time; collab
    // relay afterwards only requires room membership.
    let view = match ops::get_session(&state, payload.session_id, user_id) {
        Ok(view) => view,
        Err(e) => {
            let _ = socket.emit(
                "error",
                &ErrorPayload {
                    code: "NOT_IN_SESSION".into(),
                    message: e.to_string(),
                },
            );
            return;
        }
    };

    if let Ok(mut conn) = state.db.get() {
        if let Err(e) = ops::mark_participant_active(&mut conn, payload.session_id, user_id) {
            tracing::warn!(error = %e, "failed to re-activate participant");
        }
    }

    socket.join(session_room(payload.session_id)).ok();
    let _ = socket.emit("session-joined", &view);

    tracing::info!(user_id = %user_id, session_id = %payload.session_id, "joined session room");
}

// ---------------------------------------------------------------------------
// Event: collab (cosmetic real-time sync, relayed at most once)
// ---------------------------------------------------------------------------

async fn on_collab(socket: SocketRef, Data(raw): Data<serde_json::Value>) {
    let user_id = match get_user_id(&socket) {
        Some(id) => id,
        None => return,
    };

    let event: CollabEvent = match serde_json::from_value(raw) {
        Ok(event) => event,
        Err(e) => {
            let _ = socket.emit(
                "error",
                &ErrorPayload {
                    code: "INVALID_PAYLOAD".into(),
                    message: format!("unrecognized collab event: {e}"),
                },
            );
            return;
        }
    };

    if !event.client_sendable() {
        let _ = socket.emit(
            "error",
            &ErrorPayload {
                code: "INVALID_PAYLOAD".into(),
                message: "event shape is server-initiated".into(),
            },
        );
        return;
    }

    // Relay to the session room the socket joined via session-join.
    let session_rooms: Vec<_> = socket
        .rooms()
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.starts_with("session:"))
        .collect();
    if session_rooms.is_empty() {
        let _ = socket.emit(
            "error",
            &ErrorPayload {
                code: "NOT_IN_SESSION".into(),
                message: "join a session before sending collab events".into(),
            },
        );
        return;
    }

    let broadcast = CollabBroadcast {
        sender_id: user_id,
        event,
    };
    for room in session_rooms {
        let _ = socket.to(room).emit("collab", &broadcast);
    }
}

// ---------------------------------------------------------------------------
// Disconnect handler
// ---------------------------------------------------------------------------

async fn on_disconnect(socket: SocketRef, state: State<Arc<AppState>>) {
    let user_id = match get_user_id(&socket) {
        Some(id) => id,
        None => return,
    };

    tracing::info!(user_id = %user_id, sid = %socket.id, "socket disconnected");

    state.presence.clear_user(user_id);

    // When both participants are gone an in-progress session is abandoned.
    let active_session = {
        let mut conn = match state.db.get() {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "failed to get db connection on disconnect");
                return;
            }
        };
        match ops::find_active_session_for_user(&mut conn, user_id) {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(error = %e, "failed to look up active session on disconnect");
                return;
            }
        }
    };

    if let Some(session_id) = active_session {
        if let Err(e) = ops::abandon_if_deserted(&state, session_id, user_id).await {
            tracing::error!(error = %e, session_id = %session_id, "failed to process session desertion");
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn matching_room(scheduled_session_id: Uuid) -> String {
    format!("matching:{scheduled_session_id}")
}

fn session_room(session_id: Uuid) -> String {
    format!("session:{session_id}")
}

fn authenticate_socket(socket: &SocketRef, state: &Arc<AppState>) -> Result<Uuid, String> {
    let connect_info = socket.req_parts();

    // Extract token from query string
    let query = connect_info.uri.query().unwrap_or_default();
    let token = query
        .split('&')
        .find_map(|pair| {
            let mut split = pair.splitn(2, '=');
            let key = split.next()?;
            let value = split.next()?;
            if key == "token" {
                Some(value.to_string())
            } else {
                None
            }
        })
        .ok_or_else(|| "missing token query parameter".to_string())?;

    let claims = decode_token(&token, &state.config.jwt_secret)
        .map_err(|e| format!("invalid token: {e}"))?;

    if claims.is_expired() {
        return Err("token has expired".into());
    }

    Ok(claims.sub)
}

fn get_user_id(socket: &SocketRef) -> Option<Uuid> {
    socket.extensions.get::<Uuid>()
}
