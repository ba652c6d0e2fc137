use crate::config::BiConfig;
use crate::error::{BiError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

pub const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const DEFAULT_TEMPERATURE: f64 = 0.2;

/// Text in, text out. Callers treat the returned string as untrusted even
/// when they asked for JSON.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, system: &str, user: &str, max_tokens: u32) -> Result<String>;
}

#[derive(Debug, Clone, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    temperature: f64,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Anthropic Messages API client.
#[derive(Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f64,
}

impl AnthropicClient {
    pub fn new(api_key: String, model: String, base_url: String, timeout: Duration) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(BiError::Configuration("ANTHROPIC_API_KEY not set".to_string()));
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BiError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            temperature: DEFAULT_TEMPERATURE,
        })
    }

    pub fn from_config(config: &BiConfig) -> Result<Self> {
        let api_key = config.require_api_key()?.to_string();
        Self::new(
            api_key,
            config.model.clone(),
            config.base_url.clone(),
            config.request_timeout,
        )
    }

    fn request_body<'a>(&'a self, system: &'a str, user: &'a str, max_tokens: u32) -> MessagesRequest<'a> {
        MessagesRequest {
            model: &self.model,
            max_tokens,
            system,
            temperature: self.temperature,
            messages: vec![ChatMessage {
                role: "user",
                content: user,
            }],
        }
    }
}

#[async_trait]
impl CompletionClient for AnthropicClient {
    async fn complete(&self, system: &str, user: &str, max_tokens: u32) -> Result<String> {
        let body = self.request_body(system, user, max_tokens);

        debug!("Calling {} (max_tokens={})", self.model, max_tokens);

        let response = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| BiError::Completion(format!("LLM API call failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!("LLM API returned {}", status);
            return Err(BiError::Completion(format!(
                "LLM API returned {}: {}",
                status, detail
            )));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| BiError::Completion(format!("Failed to parse LLM response: {}", e)))?;

        join_text_blocks(&parsed)
            .ok_or_else(|| BiError::Completion("No text content in LLM response".to_string()))
    }
}

fn join_text_blocks(response: &MessagesResponse) -> Option<String> {
    let text: Vec<&str> = response
        .content
        .iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text.as_deref())
        .collect();

    if text.is_empty() {
        None
    } else {
        Some(text.concat())
    }
}

/// Strip whitespace and markdown code fences around a model reply.
pub fn clean_json_response(raw: &str) -> &str {
    raw.trim()
        .trim_start_matches("```json")
        .trim_start_matches("```JSON")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// Tolerant parse of a reply that should be a JSON object.
pub fn parse_json_object(raw: &str) -> Option<serde_json::Map<String, Value>> {
    match serde_json::from_str::<Value>(clean_json_response(raw)) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}
