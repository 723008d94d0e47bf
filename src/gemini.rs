use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::Config;
use crate::errors::AppError;

/// Forwards a conversation to a hosted chat model.
#[async_trait]
pub trait ChatRelay: Send + Sync {
    /// Sends `message` after the caller-supplied `history` and returns the
    /// model's reply text.
    async fn relay(&self, history: &[Value], message: &str) -> Result<String, AppError>;
}

/// Vertex AI `generateContent` client for Gemini models.
///
/// Every call builds a fresh request from the fixed system instruction and the
/// caller's history. Nothing is kept between calls.
pub struct GeminiRelay {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    system_instruction: Arc<str>,
}

impl GeminiRelay {
    /// Creates a new `GeminiRelay`.
    ///
    /// # Arguments
    ///
    /// * `config` - Supplies the base URL, model name and API key.
    /// * `system_instruction` - Persona applied to every conversation.
    pub fn new(config: &Config, system_instruction: Arc<str>) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to create model client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.vertex_base_url.trim_end_matches('/').to_string(),
            model: config.gemini_model.clone(),
            api_key: config.vertex_api_key.clone(),
            system_instruction,
        })
    }

    fn endpoint(&self) -> Result<reqwest::Url, AppError> {
        reqwest::Url::parse_with_params(
            &format!(
                "{}/v1/publishers/google/models/{}:generateContent",
                self.base_url, self.model
            ),
            &[("key", self.api_key.as_str())],
        )
        .map_err(|e| AppError::Configuration(format!("Failed to build model URL: {}", e)))
    }

    /// Request body for one turn.
    pub fn build_request(&self, history: &[Value], message: &str) -> GenerateContentRequest {
        let mut contents: Vec<Value> = history.iter().map(normalize_turn).collect();
        contents.push(json!({
            "role": "user",
            "parts": [{ "text": message }],
        }));

        GenerateContentRequest {
            contents,
            system_instruction: SystemInstruction {
                parts: vec![TextPart {
                    text: self.system_instruction.to_string(),
                }],
            },
        }
    }
}

#[async_trait]
impl ChatRelay for GeminiRelay {
    async fn relay(&self, history: &[Value], message: &str) -> Result<String, AppError> {
        let request = self.build_request(history, message);
        let url = self.endpoint()?;

        tracing::info!(
            "Sending chat turn to {} ({} prior turns)",
            self.model,
            history.len()
        );
        // Redact key from logs to prevent credential exposure
        tracing::debug!(
            "Model URL: {}/v1/publishers/google/models/{}:generateContent?key=[REDACTED]",
            self.base_url,
            self.model
        );

        let response = self
            .client
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Relay(format!("Model request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Relay(format!(
                "Model API returned status {}: {}",
                status, error_text
            )));
        }

        let payload: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| AppError::Relay(format!("Failed to parse model response: {}", e)))?;

        let text = payload.text().ok_or_else(|| {
            AppError::Relay("Model response contained no text candidate".to_string())
        })?;

        tracing::info!("✓ Model replied ({} chars)", text.chars().count());
        Ok(text)
    }
}

/// Maps a caller turn onto the model's content shape.
///
/// `{role, content: "..."}` becomes `{role, parts: [{text}]}` and the
/// `assistant` role becomes `model`. Turns already carrying `parts`, and
/// anything unrecognized, pass through untouched.
pub fn normalize_turn(turn: &Value) -> Value {
    let Some(obj) = turn.as_object() else {
        return turn.clone();
    };
    if obj.contains_key("parts") {
        return turn.clone();
    }
    let (Some(role), Some(content)) = (
        obj.get("role").and_then(Value::as_str),
        obj.get("content").and_then(Value::as_str),
    ) else {
        return turn.clone();
    };

    let role = match role {
        "assistant" => "model",
        other => other,
    };
    json!({
        "role": role,
        "parts": [{ "text": content }],
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Value>,
    pub system_instruction: SystemInstruction,
}

#[derive(Debug, Serialize)]
pub struct SystemInstruction {
    pub parts: Vec<TextPart>,
}

#[derive(Debug, Serialize)]
pub struct TextPart {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct CandidatePart {
    text: Option<String>,
    thought: Option<bool>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate, skipping thought parts.
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter(|part| part.thought != Some(true))
            .filter_map(|part| part.text.as_deref())
            .collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}
