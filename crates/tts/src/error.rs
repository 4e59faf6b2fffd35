use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TtsError>;

/// Orchestration errors with their HTTP mapping
///
/// Cleanup failures are deliberately absent: they are logged by the cleanup
/// worker and never reach a caller.
#[derive(Debug, Error)]
pub enum TtsError {
    /// Malformed or out-of-range request field
    #[error("Invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    /// A required default asset is missing
    #[error("{0}")]
    Configuration(String),

    /// The engine did not finish initializing
    #[error("TTS model not initialized")]
    EngineNotReady,

    /// No artifact exists for the identifier
    #[error("Audio file not found")]
    NotFound,

    /// The engine failed while generating audio
    #[error("TTS synthesis failed: {0}")]
    SynthesisFailure(String),

    /// Local filesystem failure; details stay in the logs
    #[error("Storage error: {0}")]
    Storage(String),

    /// The multipart body could not be parsed
    #[error("Invalid multipart form: {0}")]
    InvalidForm(String),

    /// Request body exceeds the configured limit
    #[error("Request body is too large, limit is {0} bytes")]
    PayloadTooLarge(usize),

    /// Request body is not `multipart/form-data`
    #[error("Unsupported Content-Type, expected: 'Content-Type: multipart/form-data'")]
    UnsupportedMediaType,
}

impl TtsError {
    /// Shorthand for a field validation failure
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Get the appropriate HTTP status code for this error
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } | Self::Configuration(_) | Self::InvalidForm(_) => StatusCode::BAD_REQUEST,
            Self::EngineNotReady => StatusCode::SERVICE_UNAVAILABLE,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::SynthesisFailure(_) | Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error type string for the response
    pub const fn error_type(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::Configuration(_) => "configuration_error",
            Self::EngineNotReady => "engine_not_ready",
            Self::NotFound => "not_found_error",
            Self::SynthesisFailure(_) => "synthesis_error",
            Self::Storage(_) => "internal_error",
            Self::InvalidForm(_) | Self::PayloadTooLarge(_) | Self::UnsupportedMediaType => "invalid_request_error",
        }
    }

    /// Message that is safe to expose to API consumers
    pub fn client_message(&self) -> String {
        match self {
            Self::Storage(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }

    /// The offending request field, for validation errors
    pub const fn field(&self) -> Option<&'static str> {
        match self {
            Self::Validation { field, .. } => Some(*field),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    success: bool,
    /// Same text as `error.message`, kept for clients of the original API
    detail: String,
    error: ErrorDetails,
}

#[derive(Debug, Serialize)]
struct ErrorDetails {
    message: String,
    r#type: &'static str,
    code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'static str>,
}

impl IntoResponse for TtsError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }

        let message = self.client_message();

        let body = ErrorResponse {
            success: false,
            detail: message.clone(),
            error: ErrorDetails {
                message,
                r#type: self.error_type(),
                code: status.as_u16(),
                field: self.field(),
            },
        };

        (status, Json(body)).into_response()
    }
}
