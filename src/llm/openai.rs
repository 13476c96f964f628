//! OpenAI chat-completions backend

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{check_status, http_client, GenerationSettings, ModelBackend, ModelBackendError, ModelKind, ModelPrompt};
use crate::config::AiConfig;

pub struct OpenAiBackend {
    http: reqwest::Client,
    settings: GenerationSettings,
}

impl OpenAiBackend {
    pub(crate) fn new(settings: GenerationSettings, ai: &AiConfig) -> Result<Self, ModelBackendError> {
        Ok(Self { http: http_client(ai)?, settings })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f64,
    max_tokens: u32,
    response_format: ResponseFormat,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ChatReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

/// First choice's content, if any.
fn reply_text(reply: ChatReply) -> Result<String, ModelBackendError> {
    reply
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|s| !s.trim().is_empty())
        .ok_or(ModelBackendError::EmptyReply)
}

#[async_trait]
impl ModelBackend for OpenAiBackend {
    fn kind(&self) -> ModelKind {
        ModelKind::OpenAi
    }

    async fn generate(&self, prompt: &ModelPrompt) -> Result<String, ModelBackendError> {
        let body = ChatRequest {
            model: &self.settings.model,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            response_format: ResponseFormat { kind: "json_object" },
            messages: [
                ChatMessage { role: "system", content: &prompt.system },
                ChatMessage { role: "user", content: &prompt.user },
            ],
        };

        let resp = self
            .http
            .post(format!("{}/v1/chat/completions", self.settings.base_url))
            .bearer_auth(&self.settings.api_key)
            .json(&body)
            .send()
            .await?;
        let reply: ChatReply = check_status(resp).await?.json().await?;
        debug!(model = %self.settings.model, choices = reply.choices.len(), "OpenAI reply received");
        reply_text(reply)
    }
}
