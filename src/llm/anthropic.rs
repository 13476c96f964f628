//! Anthropic messages-API backend

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{check_status, http_client, GenerationSettings, ModelBackend, ModelBackendError, ModelKind, ModelPrompt};
use crate::config::AiConfig;

const API_VERSION: &str = "2023-06-01";

pub struct AnthropicBackend {
    http: reqwest::Client,
    settings: GenerationSettings,
}

impl AnthropicBackend {
    pub(crate) fn new(settings: GenerationSettings, ai: &AiConfig) -> Result<Self, ModelBackendError> {
        Ok(Self { http: http_client(ai)?, settings })
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    system: &'a str,
    messages: [UserMessage<'a>; 1],
}

#[derive(Serialize)]
struct UserMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesReply {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

/// Only text blocks carry the answer; anything else is skipped.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

fn reply_text(reply: MessagesReply) -> Result<String, ModelBackendError> {
    let text: String = reply
        .content
        .into_iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(text),
            ContentBlock::Other => None,
        })
        .collect::<Vec<_>>()
        .join("\n");
    if text.trim().is_empty() {
        Err(ModelBackendError::EmptyReply)
    } else {
        Ok(text)
    }
}

#[async_trait]
impl ModelBackend for AnthropicBackend {
    fn kind(&self) -> ModelKind {
        ModelKind::Anthropic
    }

    async fn generate(&self, prompt: &ModelPrompt) -> Result<String, ModelBackendError> {
        let body = MessagesRequest {
            model: &self.settings.model,
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            system: &prompt.system,
            messages: [UserMessage { role: "user", content: &prompt.user }],
        };

        let resp = self
            .http
            .post(format!("{}/v1/messages", self.settings.base_url))
            .header("x-api-key", &self.settings.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?;
        let reply: MessagesReply = check_status(resp).await?.json().await?;
        debug!(model = %self.settings.model, blocks = reply.content.len(), "Anthropic reply received");
        reply_text(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_blocks_joined() {
        let reply: MessagesReply = serde_json::from_str(
            r#"{"id":"m","content":[{"type":"text","text":"{\"a\":"},{"type":"tool_use","id":"t"},{"type":"text","text":"1}"}]}"#,
        )
        .unwrap();
        assert_eq!(reply_text(reply).unwrap(), "{\"a\":\n1}");
    }

    #[test]
    fn test_no_text_is_empty() {
        let reply: MessagesReply = serde_json::from_str(r#"{"content":[]}"#).unwrap();
        assert!(matches!(reply_text(reply), Err(ModelBackendError::EmptyReply)));
    }
}
