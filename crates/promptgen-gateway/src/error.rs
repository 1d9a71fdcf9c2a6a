//! Error types for the Gateway
//!
//! Every handler returns [`Result`]; the [`IntoResponse`] impl turns errors
//! into the JSON body `{error, message, status, type?}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use promptgen_core::StoreError;
use thiserror::Error;

use crate::ollama::OllamaError;

/// Gateway error type
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Malformed or incomplete request: `error` is the short title
    #[error("{error}: {message}")]
    BadRequest { error: String, message: String },

    #[error("{error}: {message}")]
    NotFound { error: String, message: String },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error(transparent)]
    Ollama(#[from] OllamaError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Persona configuration error: {0}")]
    PersonaConfig(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn bad_request(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BadRequest {
            error: error.into(),
            message: message.into(),
        }
    }

    pub fn not_found(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NotFound {
            error: error.into(),
            message: message.into(),
        }
    }

    /// Request body was absent, not JSON, or an empty object
    pub fn invalid_request() -> Self {
        Self::bad_request("Invalid request", "Request must contain JSON data")
    }

    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            GatewayError::NotFound { .. } => StatusCode::NOT_FOUND,
            GatewayError::Forbidden(_) => StatusCode::FORBIDDEN,
            GatewayError::Ollama(e) => e.status(),
            GatewayError::Store(_)
            | GatewayError::PersonaConfig(_)
            | GatewayError::InvalidConfig(_)
            | GatewayError::Io(_)
            | GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            GatewayError::BadRequest { error, message } | GatewayError::NotFound { error, message } => {
                tracing::warn!("{}: {}", error, message);
                serde_json::json!({
                    "error": error,
                    "message": message,
                    "status": status.as_u16(),
                })
            }
            GatewayError::Forbidden(reason) => {
                tracing::warn!("Forbidden: {}", reason);
                serde_json::json!({
                    "success": false,
                    "error": "forbidden",
                    "message": "Unauthorized access to admin endpoint",
                })
            }
            GatewayError::Ollama(e) => {
                tracing::error!("Ollama {}: {}", e.kind(), e);
                serde_json::json!({
                    "error": e.title(),
                    "message": e.to_string(),
                    "status": status.as_u16(),
                    "type": e.kind(),
                })
            }
            GatewayError::PersonaConfig(message) => {
                tracing::error!("Persona configuration error: {}", message);
                serde_json::json!({
                    "error": "Persona configuration error",
                    "message": message,
                    "status": status.as_u16(),
                })
            }
            other => {
                // storage and internal failures never leak details to the client
                tracing::error!("Internal server error: {}", other);
                serde_json::json!({
                    "error": "Internal server error",
                    "message": "An internal server error occurred. Please try again later.",
                    "status": status.as_u16(),
                })
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for Gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;
