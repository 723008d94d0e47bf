use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Client-facing body for relay failures.
pub const RELAY_FAILURE_MESSAGE: &str = "Failed to get response from AI model.";
/// Client-facing body for persistence failures.
pub const PERSISTENCE_FAILURE_MESSAGE: &str = "Failed to save lead data.";
/// Client-facing body for configuration failures discovered at request time.
pub const CONFIGURATION_FAILURE_MESSAGE: &str = "Server configuration error.";
/// Client-facing body for requests over the body size limit.
pub const PAYLOAD_TOO_LARGE_MESSAGE: &str = "Request body too large.";
/// Client-facing body for requests over the per-client rate limit.
pub const RATE_LIMITED_MESSAGE: &str = "Too many requests, please try again later.";

/// Application-specific error types.
///
/// Every handler returns this type, and `into_response` is the only place
/// where an error becomes an HTTP status and body. Upstream detail carried by
/// `Configuration`, `Relay` and `Persistence` is logged, never sent back.
#[derive(Debug, Clone)]
pub enum AppError {
    /// A required configuration value is missing or malformed.
    Configuration(String),
    /// The caller's request body failed a shape or type check.
    Validation(String),
    /// The model call failed.
    Relay(String),
    /// The spreadsheet append failed.
    Persistence(String),
    /// The request body exceeded the configured size limit.
    PayloadTooLarge(String),
    /// The client exhausted its request quota.
    RateLimited(String),
}

impl AppError {
    /// HTTP status the error maps to.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Configuration(_) | AppError::Relay(_) | AppError::Persistence(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to return to the caller.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Validation(msg) => msg.clone(),
            AppError::Configuration(_) => CONFIGURATION_FAILURE_MESSAGE.to_string(),
            AppError::Relay(_) => RELAY_FAILURE_MESSAGE.to_string(),
            AppError::Persistence(_) => PERSISTENCE_FAILURE_MESSAGE.to_string(),
            AppError::PayloadTooLarge(_) => PAYLOAD_TOO_LARGE_MESSAGE.to_string(),
            AppError::RateLimited(_) => RATE_LIMITED_MESSAGE.to_string(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Validation(msg) => write!(f, "Validation error: {}", msg),
            AppError::Relay(msg) => write!(f, "Relay error: {}", msg),
            AppError::Persistence(msg) => write!(f, "Persistence error: {}", msg),
            AppError::PayloadTooLarge(msg) => write!(f, "Payload too large: {}", msg),
            AppError::RateLimited(msg) => write!(f, "Rate limited: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    /// Converts the error into an HTTP response.
    ///
    /// Logs errors appropriately based on their severity.
    fn into_response(self) -> Response {
        match &self {
            AppError::Configuration(msg) => tracing::error!("Configuration error: {}", msg),
            AppError::Validation(msg) => tracing::warn!("Rejected request: {}", msg),
            AppError::Relay(msg) => tracing::error!("Error calling model API: {}", msg),
            AppError::Persistence(msg) => {
                tracing::error!("Error saving lead to Google Sheets: {}", msg)
            }
            AppError::PayloadTooLarge(msg) => tracing::warn!("Oversized request: {}", msg),
            AppError::RateLimited(msg) => tracing::warn!("Rate limit exceeded: {}", msg),
        }

        let body = Json(json!({
            "error": self.public_message(),
        }));

        (self.status_code(), body).into_response()
    }
}
