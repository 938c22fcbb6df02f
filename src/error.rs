//! Application error kinds and their HTTP rendering.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Failure kinds surfaced by the services.
///
/// Callers must be able to tell these apart: each one maps to a different
/// client remediation (re-authenticate, present a valid token, fix the input,
/// or accept that the resource does not exist).
#[derive(Error, Debug)]
pub enum AppError {
    /// Requested entity does not exist.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// No credential was presented at all.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// A credential was presented but is malformed, unverifiable or expired.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// A value failed a business validity predicate.
    #[error("invalid user input: {0}")]
    InvalidUserInput(String),

    /// Infrastructure failure (database, mail transport, hashing).
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::InvalidToken(message.into())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidUserInput(message.into())
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::InvalidToken(_) => (StatusCode::UNAUTHORIZED, "INVALID_TOKEN"),
            Self::InvalidUserInput(_) => (StatusCode::BAD_REQUEST, "INVALID_USER_INPUT"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

/// JSON body returned for every failed request.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = match &self {
            Self::NotFound(m)
            | Self::Unauthorized(m)
            | Self::InvalidToken(m)
            | Self::InvalidUserInput(m) => m.clone(),
            Self::Internal(e) => {
                error!(error = %e, "internal error");
                "An internal server error occurred".to_string()
            }
        };
        (status, Json(ErrorResponse { error: code, message })).into_response()
    }
}
