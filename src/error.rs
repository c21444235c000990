use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    DuplicateDailyPost(String),
    AlreadyFriends(String),
    RequestAlreadyPending(String),
    SelfReference(String),
    NoSuchRequest(String),
    DanglingReference(String),
    InvalidEvent(String),
    Unauthorized(String),
    Database(String),
    Serialization(String),
    Configuration(String),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::DuplicateDailyPost(msg) => write!(f, "Already posted today: {}", msg),
            AppError::AlreadyFriends(msg) => write!(f, "Already friends: {}", msg),
            AppError::RequestAlreadyPending(msg) => {
                write!(f, "Friend request already pending: {}", msg)
            }
            AppError::SelfReference(msg) => write!(f, "Self reference: {}", msg),
            AppError::NoSuchRequest(msg) => write!(f, "No such friend request: {}", msg),
            AppError::DanglingReference(msg) => write!(f, "Dangling reference: {}", msg),
            AppError::InvalidEvent(msg) => write!(f, "Invalid event: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::Database(msg) => write!(f, "Database error: {}", msg),
            AppError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            AppError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::DuplicateDailyPost(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::AlreadyFriends(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::RequestAlreadyPending(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::SelfReference(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::NoSuchRequest(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::DanglingReference(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::InvalidEvent(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::Database(msg) => {
                tracing::error!("Database error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Serialization(msg) => {
                tracing::error!("Serialization error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Configuration(msg) => {
                tracing::error!("Configuration error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
