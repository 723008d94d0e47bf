use crate::errors::AppError;
use crate::gemini::ChatRelay;
use crate::models::*;
use crate::sheets::LeadSink;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

/// Shared application state injected into handlers.
///
/// Read-only after startup; every request borrows it through an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Forwards chat turns to the model.
    pub relay: Arc<dyn ChatRelay>,
    /// Records captured leads.
    pub sink: Arc<dyn LeadSink>,
}

/// Health check endpoint.
///
/// Returns the service status, version, and health information.
pub async fn health() -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// Unwraps a JSON body, turning extractor rejections into a validation error
/// carrying the endpoint's own message. Bodies cut off by the size limit keep
/// their 413.
fn json_body(payload: Result<Json<Value>, JsonRejection>, message: &str) -> Result<Value, AppError> {
    match payload {
        Ok(Json(body)) => Ok(body),
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            Err(AppError::PayloadTooLarge(rejection.body_text()))
        }
        Err(rejection) => {
            tracing::debug!("JSON body rejected: {}", rejection.body_text());
            Err(AppError::Validation(message.to_string()))
        }
    }
}

/// POST /api/chat
///
/// Relays a message plus caller-held history to the model and returns the
/// reply. The body is validated before the model is contacted.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `payload` - JSON body with `message` (string) and `history` (array).
///
/// # Returns
///
/// * `Result<Json<ChatResponse>, AppError>` - The model reply or an error.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let body = json_body(payload, CHAT_VALIDATION_MESSAGE)?;
    let request = ChatRequest::from_value(body)?;

    tracing::info!(
        "POST /api/chat - {} history turns, message of {} chars",
        request.history.len(),
        request.message.chars().count()
    );

    let response = state
        .relay
        .relay(&request.history, &request.message)
        .await?;

    Ok(Json(ChatResponse { response }))
}

/// POST /api/lead
///
/// Appends a captured lead to the spreadsheet.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `payload` - JSON lead record; `email` must be a string.
///
/// # Returns
///
/// * `Result<Json<LeadResponse>, AppError>` - Confirmation or an error.
pub async fn lead(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<LeadResponse>, AppError> {
    let body = json_body(payload, LEAD_VALIDATION_MESSAGE)?;
    let record = LeadRecord::from_value(body)?;

    tracing::info!("POST /api/lead - lead {}", record.fingerprint());

    state.sink.append_lead(&record).await?;

    Ok(Json(LeadResponse {
        success: true,
        message: LEAD_SAVED_MESSAGE.to_string(),
    }))
}
