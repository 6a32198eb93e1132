//! API error handling
//!
//! Author: hephaex@gmail.com

use crate::auth::models::FieldError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use warden_core::WardenError;

/// API error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Per-field validation messages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FieldError>>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            fields: None,
        }
    }

    pub fn with_fields(mut self, fields: Vec<FieldError>) -> Self {
        self.fields = Some(fields);
        self
    }

    pub fn bad_request() -> Self {
        Self::new("BAD_REQUEST", "Bad Request")
    }

    pub fn unauthorized() -> Self {
        Self::new("UNAUTHORIZED", "Unauthorized")
    }

    pub fn internal_error() -> Self {
        Self::new("INTERNAL_ERROR", "Internal server error")
    }
}

/// Authentication and authorization errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("User already exists!")]
    UserAlreadyExists,

    #[error("User with this email or password does not exists.")]
    InvalidCredentials,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Bad Request")]
    BadRequest,

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Token creation failed: {0}")]
    Token(String),

    #[error(transparent)]
    Repository(#[from] WardenError),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Validation(_) | AuthError::BadRequest => StatusCode::BAD_REQUEST,
            AuthError::UserAlreadyExists => StatusCode::CONFLICT,
            AuthError::InvalidCredentials | AuthError::Unauthorized => StatusCode::UNAUTHORIZED,
            AuthError::Hashing(_) | AuthError::Token(_) | AuthError::Repository(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = match self {
            AuthError::Validation(fields) => {
                ApiError::new("VALIDATION_ERROR", "Validation failed").with_fields(fields)
            }
            AuthError::UserAlreadyExists => {
                ApiError::new("USER_ALREADY_EXISTS", AuthError::UserAlreadyExists.to_string())
            }
            AuthError::InvalidCredentials => ApiError::new(
                "INVALID_CREDENTIALS",
                AuthError::InvalidCredentials.to_string(),
            ),
            AuthError::Unauthorized => ApiError::unauthorized(),
            AuthError::BadRequest => ApiError::bad_request(),
            AuthError::Hashing(msg) => {
                tracing::error!(error = %msg, "Password hashing failed");
                ApiError::internal_error()
            }
            AuthError::Token(msg) => {
                tracing::error!(error = %msg, "Token creation failed");
                ApiError::internal_error()
            }
            AuthError::Repository(err) => {
                tracing::error!(error = %err, "Repository operation failed");
                ApiError::new("DATABASE_ERROR", "Database operation failed")
            }
        };

        (status, Json(error)).into_response()
    }
}
