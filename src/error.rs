//! Error types for the cts-drive application.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Application-wide error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Missing resource, or one the caller does not own
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resource exists but belongs to another user
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// No drive credentials linked, or the provider revoked them
    #[error("Google Drive authorization required: {0}")]
    AuthRequired(String),

    /// Missing or invalid bearer token
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Non-2xx response or transport failure from the storage API
    #[error("Google Drive API error: {message}")]
    ExternalService { status: Option<u16>, message: String },

    /// Invalid request payload
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::Forbidden(_) => "forbidden",
            AppError::AuthRequired(_) => "auth_required",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::ExternalService { .. } => "external_service_error",
            AppError::Validation(_) => "validation_error",
            AppError::Database(_) => "database_error",
            AppError::Io(_) => "io_error",
            AppError::Json(_) => "json_error",
            AppError::Internal(_) => "internal_error",
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        AppError::ExternalService {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}

// Extractor rejections carry a caller mistake, so they surface as validation errors.
macro_rules! rejection_into_validation {
    ($($rejection:ty),* $(,)?) => {
        $(
            impl From<$rejection> for AppError {
                fn from(rejection: $rejection) -> Self {
                    AppError::Validation(rejection.body_text())
                }
            }
        )*
    };
}

rejection_into_validation!(JsonRejection, PathRejection, QueryRejection);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let (status, message) = match &self {
            AppError::NotFound(msg) => {
                tracing::debug!("Not found: {}", msg);
                (StatusCode::NOT_FOUND, msg.clone())
            }
            AppError::Forbidden(msg) => {
                tracing::warn!("Forbidden: {}", msg);
                (StatusCode::FORBIDDEN, msg.clone())
            }
            AppError::AuthRequired(msg) => {
                tracing::warn!("Drive authorization required: {}", msg);
                (StatusCode::UNAUTHORIZED, msg.clone())
            }
            AppError::Unauthorized(msg) => {
                tracing::warn!("Unauthorized: {}", msg);
                (StatusCode::UNAUTHORIZED, msg.clone())
            }
            AppError::ExternalService { status, message } => {
                tracing::error!(
                    "Google Drive API error: status={:?}, message={}",
                    status,
                    message
                );
                (StatusCode::BAD_GATEWAY, message.clone())
            }
            AppError::Validation(msg) => {
                tracing::warn!("Validation failed: {}", msg);
                (StatusCode::BAD_REQUEST, msg.clone())
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            AppError::Io(e) => {
                tracing::error!("IO error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            AppError::Json(e) => {
                tracing::error!("JSON error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
        };

        let body = match &self {
            AppError::ExternalService {
                status: Some(upstream),
                ..
            } => json!({
                "error": message,
                "kind": kind,
                "status": upstream,
            }),
            _ => json!({
                "error": message,
                "kind": kind,
            }),
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
