use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use tracing::error;
use validator::ValidationErrors;

use crate::db::RepoError;

/// Error returned by every handler. The body is always `{"errors": ...}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("validation failed")]
    Validation(Value),
    #[error("{0}")]
    BadRequest(String),
    /// Token failures share a fixed catalog of messages.
    #[error("{0}")]
    Token(&'static str),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BadRequest(_) | Self::Token(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Field-level validation error for a single field.
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut details = serde_json::Map::new();
        details.insert(field.to_string(), json!([message.into()]));
        Self::Validation(Value::Object(details))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let errors = match self {
            Self::Validation(details) => details,
            Self::Internal(e) => {
                error!(error = %e, "internal error");
                Value::String("Internal server error".into())
            }
            other => Value::String(other.to_string()),
        };
        (status, Json(json!({ "errors": errors }))).into_response()
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let details: serde_json::Map<String, Value> = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let messages: Vec<Value> = errs
                    .iter()
                    .map(|e| {
                        let msg = e
                            .message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| format!("invalid {}", e.code));
                        Value::String(msg)
                    })
                    .collect();
                (field.to_string(), Value::Array(messages))
            })
            .collect();
        Self::Validation(Value::Object(details))
    }
}

impl From<RepoError> for ApiError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::Conflict(field) => Self::Conflict(format!("{} is already taken", field)),
            RepoError::NotFound => Self::NotFound("Record not found".into()),
            RepoError::Database(e) => Self::Internal(e.into()),
        }
    }
}
