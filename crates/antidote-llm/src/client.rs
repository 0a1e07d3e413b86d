//! Chat completions client implementing both collaborator ports.

use std::time::{Duration, Instant};

use antidote_core::{
    CollaboratorError, Confirmations, GenerationRequest, HypothesisGenerator, Proposal,
    ValidationJudge, ValidationRequest,
};
use async_trait::async_trait;
use reqwest::{header, Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::LlmConfig;
use crate::{parse, prompts};

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("an API key is required (set ANTIDOTE_API_KEY or OPENAI_API_KEY)")]
    MissingApiKey,

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Value,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

/// OpenAI-compatible client. Cheap to clone.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: Client,
    config: LlmConfig,
    endpoint: String,
}

impl OpenAiClient {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        if config.api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey);
        }
        let http = Client::builder().timeout(config.timeout()).build()?;
        let endpoint = config.chat_endpoint();
        Ok(Self {
            http,
            config,
            endpoint,
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// One chat round trip; returns the assistant text.
    pub async fn complete(&self, system: &str, user: &str) -> Result<String, CollaboratorError> {
        let payload = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        });

        let started = Instant::now();
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(response).await?;

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| CollaboratorError::MalformedResponse(format!("invalid response: {e}")))?;
        let choice = body.choices.first().ok_or_else(|| {
            CollaboratorError::MalformedResponse("response did not include choices".into())
        })?;
        debug!(
            model = %self.config.model,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "chat completion received"
        );
        Ok(extract_text(&choice.message.content))
    }
}

#[async_trait]
impl HypothesisGenerator for OpenAiClient {
    async fn propose(&self, request: &GenerationRequest) -> Result<Proposal, CollaboratorError> {
        let text = self
            .complete(prompts::GENERATION_SYSTEM, &prompts::generation_user(request))
            .await?;
        parse::proposal(&text)
    }
}

#[async_trait]
impl ValidationJudge for OpenAiClient {
    async fn confirm(
        &self,
        request: &ValidationRequest,
    ) -> Result<Confirmations, CollaboratorError> {
        let text = self
            .complete(prompts::VALIDATION_SYSTEM, &prompts::validation_user(request))
            .await?;
        let asked: Vec<String> = request.files.iter().map(|f| f.name.clone()).collect();
        parse::verdicts(&text, &asked)
    }
}

fn transport_error(e: reqwest::Error) -> CollaboratorError {
    if e.is_timeout() {
        CollaboratorError::Timeout
    } else {
        CollaboratorError::Transport(e.to_string())
    }
}

async fn check_status(response: Response) -> Result<Response, CollaboratorError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        return Err(CollaboratorError::RateLimited { retry_after });
    }
    if matches!(
        status,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT
    ) {
        return Err(CollaboratorError::Timeout);
    }
    let body = response.text().await.unwrap_or_default();
    Err(CollaboratorError::Transport(format!(
        "status {}: {}",
        status,
        truncate(&body, 320)
    )))
}

fn extract_text(content: &Value) -> String {
    match content {
        Value::String(text) => text.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

fn truncate(value: &str, max_chars: usize) -> String {
    let mut chars = value.chars();
    let truncated: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", truncated)
    } else {
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_api_key() {
        assert!(matches!(
            OpenAiClient::new(LlmConfig::default()),
            Err(LlmError::MissingApiKey)
        ));
    }

    #[test]
    fn extracts_text_parts() {
        assert_eq!(extract_text(&json!("hi")), "hi");
        assert_eq!(
            extract_text(&json!([{ "type": "text", "text": "a" }, { "text": "b" }])),
            "a\nb"
        );
        assert_eq!(extract_text(&json!(null)), "");
    }

    #[test]
    fn truncates_long_bodies() {
        assert_eq!(truncate("abcdef", 3), "abc...");
        assert_eq!(truncate("abc", 3), "abc");
    }
}
