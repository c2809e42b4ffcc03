use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Failure taxonomy for the question-answering pipeline.
///
/// Every stage classifies its own failures into one of these kinds at its
/// boundary; nothing downstream re-wraps or downgrades them, so the HTTP
/// layer can pick the right status code from the kind alone.
#[derive(Error, Debug)]
pub enum AppError {
    /// Caller input or generated SQL failed a static check.
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        details: Vec<String>,
    },

    /// A required upstream credential is missing.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// A third-party call failed after being attempted.
    #[error("{service} error: {message}")]
    ExternalService { service: String, message: String },

    /// Query execution or another database operation failed.
    #[error("Database error during {operation}: {message}")]
    Database { operation: String, message: String },

    /// Anything not classified above.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            details: Vec::new(),
        }
    }

    pub fn validation_with_details(message: impl Into<String>, details: Vec<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            details,
        }
    }

    pub fn external(service: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::ExternalService {
            service: service.into(),
            message: message.into(),
        }
    }

    pub fn database(operation: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Database {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AppError::ExternalService { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => "VALIDATION_ERROR",
            AppError::Authentication(msg) if msg.contains("OpenAI") => "OPENAI_AUTH_REQUIRED",
            AppError::Authentication(_) => "AUTH_ERROR",
            AppError::ExternalService { .. } => "SERVICE_ERROR",
            AppError::Database { .. } => "DATABASE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        // Internal detail stays server-side; the caller gets a generic message.
        let message = match &self {
            AppError::Internal(detail) => {
                error!("Internal error: {}", detail);
                "An unexpected error occurred".to_string()
            }
            other => other.to_string(),
        };

        let mut body = json!({
            "success": false,
            "error": message,
            "code": code,
        });

        if let AppError::Validation { details, .. } = &self {
            if !details.is_empty() {
                body["details"] = json!({ "errors": details });
            }
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_400() {
        let err = AppError::validation("question is required");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn missing_openai_key_uses_dedicated_code() {
        let err = AppError::Authentication("OpenAI API key is not configured".to_string());
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.code(), "OPENAI_AUTH_REQUIRED");

        let err = AppError::Authentication("missing user identity".to_string());
        assert_eq!(err.code(), "AUTH_ERROR");
    }

    #[test]
    fn service_and_database_codes() {
        assert_eq!(AppError::external("OpenAI", "timeout").code(), "SERVICE_ERROR");
        assert_eq!(
            AppError::external("OpenAI", "timeout").status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::database("execute_query", "boom").code(),
            "DATABASE_ERROR"
        );
    }
}
