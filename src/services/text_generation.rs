use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use thiserror::Error;

use crate::core::config::Settings;

const HARM_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

#[derive(Debug, Error)]
pub(crate) enum TextGenerationError {
    #[error("failed to reach the text generation service")]
    Transport(#[from] reqwest::Error),
    #[error("text generation service returned {status}: {body}")]
    Status { status: StatusCode, body: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlockThreshold {
    BlockNone,
}

impl BlockThreshold {
    fn as_str(self) -> &'static str {
        match self {
            Self::BlockNone => "BLOCK_NONE",
        }
    }
}

/// One threshold for every harm category the service filters on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SafetySettings {
    pub(crate) threshold: BlockThreshold,
}

impl SafetySettings {
    /// Quiz content routinely mentions wars, diseases and chemistry, which the
    /// default filters block; generation runs with filtering disabled.
    pub(crate) fn most_permissive() -> Self {
        Self { threshold: BlockThreshold::BlockNone }
    }

    fn to_json(self) -> Value {
        Value::Array(
            HARM_CATEGORIES
                .iter()
                .map(|category| json!({"category": category, "threshold": self.threshold.as_str()}))
                .collect(),
        )
    }
}

#[derive(Debug, Clone)]
pub(crate) struct GenerationRequest {
    pub(crate) model: String,
    pub(crate) prompt: String,
    pub(crate) safety: SafetySettings,
}

/// A hosted text model. `Ok(None)` means the service answered but produced no
/// usable text, for example when every candidate was filtered.
#[async_trait]
pub(crate) trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<Option<String>, TextGenerationError>;
}

#[derive(Debug, Clone)]
pub(crate) struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub(crate) fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(settings.ai().request_timeout())
            .build()
            .map_err(|err| anyhow::anyhow!(err).context("Failed to build HTTP client"))?;

        Ok(Self {
            client,
            api_key: settings.ai().gemini_api_key.clone(),
            base_url: settings.ai().gemini_base_url.clone(),
        })
    }

    fn endpoint(&self, model: &str) -> String {
        let model = model.trim();
        if model.starts_with("models/") {
            format!("{}/{model}:generateContent", self.base_url)
        } else {
            format!("{}/models/{model}:generateContent", self.base_url)
        }
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<Option<String>, TextGenerationError> {
        let payload = json!({
            "contents": [{"role": "user", "parts": [{"text": request.prompt}]}],
            "safetySettings": request.safety.to_json(),
        });

        let timer = Instant::now();
        let response = self
            .client
            .post(self.endpoint(&request.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TextGenerationError::Status { status, body });
        }

        let body: Value = response.json().await?;
        let text = completion_text(&body);
        let finish_reason = finish_reason(&body);

        tracing::info!(
            model = %request.model,
            duration_seconds = timer.elapsed().as_secs_f64(),
            has_text = text.is_some(),
            finish_reason,
            "Text generation completed"
        );

        Ok(text)
    }
}

fn finish_reason(body: &Value) -> &str {
    body.pointer("/candidates/0/finishReason").and_then(Value::as_str).unwrap_or("unknown")
}

/// Concatenated text parts of the first candidate, if any.
fn completion_text(body: &Value) -> Option<String> {
    let parts = body.pointer("/candidates/0/content/parts")?.as_array()?;
    let text: String = parts.iter().filter_map(|part| part.get("text")?.as_str()).collect();
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_text_joins_parts() {
        let body = json!({
            "candidates": [{"content": {"parts": [{"text": "[{\"a\":"}, {"text": " 1}]"}]}}]
        });
        assert_eq!(completion_text(&body).as_deref(), Some("[{\"a\": 1}]"));
    }

    #[test]
    fn blocked_response_has_no_text() {
        assert_eq!(completion_text(&json!({"promptFeedback": {"blockReason": "SAFETY"}})), None);
        assert_eq!(
            completion_text(&json!({"candidates": [{"finishReason": "SAFETY"}]})),
            None
        );
    }

    #[test]
    fn finish_reason_defaults_to_unknown() {
        let body = json!({"candidates": [{"finishReason": "MAX_TOKENS"}]});
        assert_eq!(finish_reason(&body), "MAX_TOKENS");
        assert_eq!(finish_reason(&json!({"candidates": []})), "unknown");
    }

    #[test]
    fn permissive_safety_covers_every_category() {
        let settings = SafetySettings::most_permissive().to_json();
        let entries = settings.as_array().unwrap();
        assert_eq!(entries.len(), 4);
        assert!(entries.iter().all(|entry| entry["threshold"] == "BLOCK_NONE"));
    }
}
