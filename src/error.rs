//! Unified application error model for the admin HTTP surface.
//! Every handler failure is mapped to one of these variants at the handler
//! boundary, and each variant knows its HTTP status and JSON body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    #[error("{message}")]
    MethodNotAllowed { message: String },
    #[error("{message}")]
    Unauthorized { message: String },
    #[error("{message}")]
    ConfigurationMissing { message: String },
    #[error("{message}")]
    UpstreamRejected { message: String },
    #[error("{message}")]
    UnexpectedFailure { message: String },
}

impl AppError {
    pub fn method_not_allowed() -> Self {
        AppError::MethodNotAllowed { message: "Method not allowed".into() }
    }
    pub fn unauthorized() -> Self {
        AppError::Unauthorized { message: "Unauthorized".into() }
    }
    pub fn config_missing<S: Into<String>>(msg: S) -> Self {
        AppError::ConfigurationMissing { message: msg.into() }
    }
    pub fn upstream_rejected<S: Into<String>>(msg: S) -> Self {
        AppError::UpstreamRejected { message: msg.into() }
    }
    pub fn unexpected<S: Into<String>>(msg: S) -> Self {
        AppError::UnexpectedFailure { message: msg.into() }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::MethodNotAllowed { message }
            | AppError::Unauthorized { message }
            | AppError::ConfigurationMissing { message }
            | AppError::UpstreamRejected { message }
            | AppError::UnexpectedFailure { message } => message.as_str(),
        }
    }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> StatusCode {
        match self {
            AppError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            AppError::ConfigurationMissing { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::UpstreamRejected { .. } => StatusCode::BAD_REQUEST,
            AppError::UnexpectedFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.http_status(), Json(json!({ "error": self.message() }))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
