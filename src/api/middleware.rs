use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unsupported database type: {0}")]
    UnsupportedEngine(String),

    #[error("Failed to connect to database: {0}")]
    Connection(ErrorDetail),

    #[error("Failed to read database schema: {0}")]
    Schema(ErrorDetail),

    /// Language-model provider failure; `status` is the upstream HTTP status when one was received
    #[error("{message}")]
    Provider { status: Option<u16>, message: String },

    #[error("Query failed: {0}")]
    Query(ErrorDetail),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::UnsupportedEngine(_) => "UNSUPPORTED_ENGINE",
            AppError::Connection(_) => "CONNECTION_ERROR",
            AppError::Schema(_) => "SCHEMA_ERROR",
            AppError::Provider { .. } => "PROVIDER_ERROR",
            AppError::Query(_) => "QUERY_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::UnsupportedEngine(_) | AppError::Query(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Provider { status, .. } => status
                .and_then(|code| StatusCode::from_u16(code).ok())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            AppError::Connection(_) | AppError::Schema(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Structured detail for the response body. Errors that carry engine detail
    /// hand it over as-is; the rest only have a message.
    pub fn detail(&self) -> ErrorDetail {
        match self {
            AppError::Connection(detail) | AppError::Schema(detail) | AppError::Query(detail) => {
                detail.clone()
            }
            other => ErrorDetail::new(other.to_string()),
        }
    }
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub kind: String,
    pub message: String,
    pub error: ErrorDetail,
}

/// Whatever the originating engine reported about a failure. Fields the
/// engine did not populate are left out of the serialized form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errno: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
}

impl ErrorDetail {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_errno(mut self, errno: i64) -> Self {
        self.errno = Some(errno);
        self
    }

    pub fn with_sql_state(mut self, sql_state: impl Into<String>) -> Self {
        self.sql_state = Some(sql_state.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_position(mut self, position: u32) -> Self {
        self.position = Some(position);
        self
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.code, self.errno) {
            (Some(code), _) => write!(f, "{} ({})", self.message, code),
            (None, Some(errno)) => write!(f, "{} (errno {})", self.message, errno),
            (None, None) => f.write_str(&self.message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match status {
            s if s.is_server_error() => tracing::error!("{}", self),
            _ => tracing::warn!("{}", self),
        }

        let body = Json(ErrorResponse {
            success: false,
            kind: self.kind().to_string(),
            message: self.to_string(),
            error: self.detail(),
        });

        (status, body).into_response()
    }
}

/// Convert anyhow::Error to AppError
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(format!("{:#}", err))
    }
}

/// Malformed or mistyped request bodies are client errors
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}
