use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::types::ApiErrorResponse;

/// Application error codes following the pattern E{service}{sequence}
///
/// Ranges:
/// - E0xxx: Shared/infrastructure errors
/// - E3xxx: Matching errors
/// - E4xxx: Live-session errors
/// - E5xxx: Feedback errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Shared (E0xxx)
    InternalError,
    ValidationError,
    NotFound,
    Unauthorized,
    Forbidden,
    ServiceUnavailable,
    BadRequest,
    Conflict,
    InvalidState,
    TokenExpired,
    TokenInvalid,

    // Matching (E3xxx)
    ActiveRequestExists,
    RequestNotFound,
    RequestExpired,
    NotYourRequest,
    MatchLost,
    PairingBusy,

    // Live session (E4xxx)
    SessionNotFound,
    NotAParticipant,
    SessionNotActive,
    UnknownQuestion,

    // Feedback (E5xxx)
    FeedbackNotFound,
    SessionNotCompleted,
    InvalidRating,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            // Shared
            Self::InternalError => "E0001",
            Self::ValidationError => "E0002",
            Self::NotFound => "E0003",
            Self::Unauthorized => "E0004",
            Self::Forbidden => "E0005",
            Self::ServiceUnavailable => "E0006",
            Self::BadRequest => "E0007",
            Self::Conflict => "E0008",
            Self::InvalidState => "E0009",
            Self::TokenExpired => "E0010",
            Self::TokenInvalid => "E0011",

            // Matching
            Self::ActiveRequestExists => "E3001",
            Self::RequestNotFound => "E3002",
            Self::RequestExpired => "E3003",
            Self::NotYourRequest => "E3004",
            Self::MatchLost => "E3005",
            Self::PairingBusy => "E3006",

            // Live session
            Self::SessionNotFound => "E4001",
            Self::NotAParticipant => "E4002",
            Self::SessionNotActive => "E4003",
            Self::UnknownQuestion => "E4004",

            // Feedback
            Self::FeedbackNotFound => "E5001",
            Self::SessionNotCompleted => "E5002",
            Self::InvalidRating => "E5003",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InternalError | Self::ServiceUnavailable => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ValidationError | Self::BadRequest | Self::UnknownQuestion
            | Self::InvalidRating => StatusCode::BAD_REQUEST,
            Self::NotFound | Self::RequestNotFound | Self::SessionNotFound
            | Self::FeedbackNotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized | Self::TokenExpired | Self::TokenInvalid => {
                StatusCode::UNAUTHORIZED
            }
            Self::Forbidden | Self::NotYourRequest | Self::NotAParticipant => {
                StatusCode::FORBIDDEN
            }
            Self::Conflict | Self::InvalidState | Self::ActiveRequestExists
            | Self::MatchLost | Self::PairingBusy | Self::SessionNotActive
            | Self::SessionNotCompleted => StatusCode::CONFLICT,
            Self::RequestExpired => StatusCode::GONE,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Known {
        code: ErrorCode,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(code: ErrorCode, message: impl Into<String>, details: serde_json::Value) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidState, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            AppError::Known { code, message, details } => {
                let status = code.status_code();
                let mut resp = ApiErrorResponse::new(code.code(), message);
                if let Some(d) = details {
                    resp = resp.with_details(d.clone());
                }
                (status, resp)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorResponse::new("E0001", "internal server error"),
                )
            }
            AppError::Database(err) => {
                tracing::error!(error = %err, "database error");
                match err {
                    diesel::result::Error::NotFound => (
                        StatusCode::NOT_FOUND,
                        ApiErrorResponse::new("E0003", "resource not found"),
                    ),
                    _ => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        ApiErrorResponse::new("E0001", "database error"),
                    ),
                }
            }
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ApiErrorResponse::new("E0002", msg),
            ),
        };

        (status, Json(error_response)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_like_codes_map_to_409() {
        for code in [
            ErrorCode::Conflict,
            ErrorCode::InvalidState,
            ErrorCode::ActiveRequestExists,
            ErrorCode::MatchLost,
            ErrorCode::SessionNotActive,
            ErrorCode::SessionNotCompleted,
        ] {
            assert_eq!(code.status_code(), StatusCode::CONFLICT, "{:?}", code);
        }
    }

    #[test]
    fn participant_checks_are_forbidden() {
        assert_eq!(ErrorCode::NotAParticipant.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorCode::NotYourRequest.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn codes_are_unique() {
        let all = [
            ErrorCode::InternalError,
            ErrorCode::ValidationError,
            ErrorCode::NotFound,
            ErrorCode::Unauthorized,
            ErrorCode::Forbidden,
            ErrorCode::ServiceUnavailable,
            ErrorCode::BadRequest,
            ErrorCode::Conflict,
            ErrorCode::InvalidState,
            ErrorCode::TokenExpired,
            ErrorCode::TokenInvalid,
            ErrorCode::ActiveRequestExists,
            ErrorCode::RequestNotFound,
            ErrorCode::RequestExpired,
            ErrorCode::NotYourRequest,
            ErrorCode::MatchLost,
            ErrorCode::PairingBusy,
            ErrorCode::SessionNotFound,
            ErrorCode::NotAParticipant,
            ErrorCode::SessionNotActive,
            ErrorCode::UnknownQuestion,
            ErrorCode::FeedbackNotFound,
            ErrorCode::SessionNotCompleted,
            ErrorCode::InvalidRating,
        ];
        let mut codes: Vec<&str> = all.iter().map(|c| c.code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), all.len());
    }
}
