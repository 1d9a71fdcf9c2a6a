//! HTTP route handlers
//!
//! One module per surface. Handlers parse the body themselves so absent,
//! malformed and empty JSON all produce the same 400.

pub mod admin;
pub mod chat;
pub mod generate;
pub mod history;
pub mod models;
pub mod persona;
pub mod presets;

use axum::body::Bytes;
use axum::http::{header, HeaderValue};
use axum::response::Response;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::catalog::DEFAULT_MODEL_TYPE;
use crate::{GatewayError, Result};

/// Parse a request body that must be a non-empty JSON object
pub(crate) fn parse_json_body<T: DeserializeOwned>(body: &Bytes) -> Result<T> {
    let value: Value = serde_json::from_slice(body).map_err(|_| GatewayError::invalid_request())?;

    match &value {
        Value::Object(map) if !map.is_empty() => {}
        _ => return Err(GatewayError::invalid_request()),
    }

    serde_json::from_value(value)
        .map_err(|e| GatewayError::bad_request("Invalid request", e.to_string()))
}

/// Attach a `Set-Cookie` header when `cookie` is set
pub(crate) fn with_cookie(mut response: Response, cookie: Option<String>) -> Response {
    if let Some(cookie) = cookie {
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::error!("Cannot encode session cookie: {}", e),
        }
    }
    response
}

pub(crate) fn default_model_type() -> String {
    DEFAULT_MODEL_TYPE.to_string()
}

/// Log-safe preview of user text
pub(crate) fn preview(text: &str) -> String {
    text.chars().take(50).collect()
}
