//! AI reasoning backends
//!
//! Two independent hosted providers behind one async trait. Each backend
//! turns a `ModelPrompt` into raw reply text; `parsing` coerces that text into
//! a validated `ModelAnalysis`.
//!
//! ## Architecture
//!
//! - `ModelBackend`: async trait implemented by `OpenAiBackend` and `AnthropicBackend`
//! - `prompt`: structured `DiagnosticPayload` and the fixed system prompt
//! - `parsing`: think-tag/code-fence stripping, outermost-object recovery, schema validation
//!
//! Backends without an API key are never constructed, so a request naming
//! them reports them as not configured instead of failing at call time.

pub mod anthropic;
pub mod openai;
pub mod parsing;
pub mod prompt;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{AiConfig, BackendEndpoint};

pub use anthropic::AnthropicBackend;
pub use openai::OpenAiBackend;
pub use parsing::{parse_model_reply, FailureProbability, ModelAnalysis};
pub use prompt::{build_prompt, DiagnosticPayload, ModelPrompt};

// ============================================================================
// Model identity
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    OpenAi,
    Anthropic,
}

impl ModelKind {
    pub const ALL: [ModelKind; 2] = [ModelKind::OpenAi, ModelKind::Anthropic];
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::OpenAi => write!(f, "openai"),
            ModelKind::Anthropic => write!(f, "anthropic"),
        }
    }
}

impl FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" | "gpt" => Ok(ModelKind::OpenAi),
            "anthropic" | "claude" => Ok(ModelKind::Anthropic),
            other => Err(format!("unknown model '{other}'")),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Failure of a single backend call. Recorded per model; never aborts a
/// request on its own.
#[derive(Debug, Error)]
pub enum ModelBackendError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("no reply within {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("empty reply")]
    EmptyReply,

    #[error("reply is not valid JSON: {0}")]
    MalformedJson(String),

    #[error("reply violates the response schema: {0}")]
    Schema(String),

    #[error("backend task failed: {0}")]
    TaskFailed(String),

    #[error("model '{0}' is not configured")]
    NotConfigured(ModelKind),
}

// ============================================================================
// Backend trait
// ============================================================================

/// A hosted reasoning model.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    fn kind(&self) -> ModelKind;

    /// Send the prompt and return the raw reply text.
    async fn generate(&self, prompt: &ModelPrompt) -> Result<String, ModelBackendError>;
}

/// Shared HTTP settings for both providers.
#[derive(Debug, Clone)]
pub(crate) struct GenerationSettings {
    pub model: String,
    pub base_url: String,
    pub api_key: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl GenerationSettings {
    fn new(endpoint: &BackendEndpoint, api_key: String, ai: &AiConfig) -> Self {
        Self {
            model: endpoint.model.clone(),
            base_url: endpoint.base_url.trim_end_matches('/').to_string(),
            api_key,
            temperature: ai.temperature,
            max_tokens: ai.max_tokens,
        }
    }
}

pub(crate) fn http_client(ai: &AiConfig) -> Result<reqwest::Client, ModelBackendError> {
    // One second of slack so the orchestrator's own timeout fires first
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(ai.timeout_secs.saturating_add(1)))
        .build()?)
}

/// Turn a non-success response into `ModelBackendError::Status`.
pub(crate) async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ModelBackendError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ModelBackendError::Status {
        status: status.as_u16(),
        body: body.chars().take(300).collect(),
    })
}

/// Backends keyed by kind.
pub type BackendSet = BTreeMap<ModelKind, Arc<dyn ModelBackend>>;

/// Construct every enabled backend whose API key is present in the environment.
pub fn backends_from_config(ai: &AiConfig) -> BackendSet {
    let mut set = BackendSet::new();

    for kind in ModelKind::ALL {
        let endpoint = match kind {
            ModelKind::OpenAi => &ai.openai,
            ModelKind::Anthropic => &ai.anthropic,
        };
        if !endpoint.enabled {
            info!(model = %kind, "Backend disabled in config");
            continue;
        }
        let api_key = match std::env::var(&endpoint.api_key_env) {
            Ok(k) if !k.trim().is_empty() => k,
            _ => {
                warn!(model = %kind, env = %endpoint.api_key_env, "API key not set, backend unavailable");
                continue;
            }
        };

        let settings = GenerationSettings::new(endpoint, api_key, ai);
        let built: Result<Arc<dyn ModelBackend>, ModelBackendError> = match kind {
            ModelKind::OpenAi => OpenAiBackend::new(settings, ai).map(|b| Arc::new(b) as Arc<dyn ModelBackend>),
            ModelKind::Anthropic => {
                AnthropicBackend::new(settings, ai).map(|b| Arc::new(b) as Arc<dyn ModelBackend>)
            }
        };
        match built {
            Ok(backend) => {
                info!(model = %kind, name = %endpoint.model, "Backend ready");
                set.insert(kind, backend);
            }
            Err(e) => warn!(model = %kind, error = %e, "Failed to build backend"),
        }
    }

    set
}
