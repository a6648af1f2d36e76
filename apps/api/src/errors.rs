use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::llm_client::LlmError;
use crate::retry::{is_network_error, user_facing_message, NETWORK_ERROR_MESSAGE};

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unprocessable entity: {0}")]
    UnprocessableEntity(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Machine-readable code carried by the error, used by the network classifier.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            AppError::Database(sqlx::Error::Io(_))
            | AppError::Database(sqlx::Error::PoolTimedOut) => Some("NETWORK_ERROR"),
            AppError::Llm(LlmError::Http(e)) if e.is_connect() => Some("ECONNREFUSED"),
            _ => None,
        }
    }

    /// Connectivity failures get a distinct user-facing message.
    pub fn is_network(&self) -> bool {
        matches!(self, AppError::Database(_) | AppError::Llm(_))
            && is_network_error(&self.to_string(), self.code(), true)
    }

    /// Message safe to show a user, e.g. in a bulk save report or import log.
    pub fn user_message(&self) -> String {
        match self {
            AppError::NotFound(msg)
            | AppError::Validation(msg)
            | AppError::Conflict(msg)
            | AppError::UnprocessableEntity(msg) => msg.clone(),
            other => user_facing_message(&other.to_string(), other.code(), true),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_network() {
            tracing::error!("Network error: {self}");
            let body = Json(json!({
                "error": {
                    "code": "NETWORK_ERROR",
                    "message": NETWORK_ERROR_MESSAGE
                }
            }));
            return (StatusCode::SERVICE_UNAVAILABLE, body).into_response();
        }

        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::UnprocessableEntity(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "UNPROCESSABLE_ENTITY",
                msg.clone(),
            ),
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Llm(e) => {
                tracing::error!("LLM error: {e}");
                (
                    StatusCode::BAD_GATEWAY,
                    "LLM_ERROR",
                    "An AI processing error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_is_bad_request() {
        let response = AppError::Validation("name is required".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_pool_timeout_is_network() {
        let err = AppError::Database(sqlx::Error::PoolTimedOut);
        assert!(err.is_network());
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_validation_mentioning_timeout_is_not_network() {
        // Only infrastructure errors are classified.
        assert!(!AppError::Validation("timeout must be positive".into()).is_network());
    }

    #[test]
    fn test_llm_timeout_is_network() {
        let err = AppError::Llm(LlmError::Timeout {
            provider: "gemini".into(),
            seconds: 60,
        });
        assert!(err.is_network());
    }

    #[test]
    fn test_user_message() {
        assert_eq!(
            AppError::Validation("Card name is required".into()).user_message(),
            "Card name is required"
        );
        assert_eq!(
            AppError::Database(sqlx::Error::PoolTimedOut).user_message(),
            NETWORK_ERROR_MESSAGE
        );
        let err = AppError::Database(sqlx::Error::Protocol("duplicate card name".into()));
        assert!(err.user_message().contains("duplicate card name"));
    }
}
