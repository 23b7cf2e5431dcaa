use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{AiSettings, ProviderConfig};

pub const TEMPERATURE: f32 = 0.7;
pub const MAX_TOKENS: u32 = 1000;

const OPENROUTER_REFERER: &str = "http://localhost:5173";
const OPENROUTER_TITLE: &str = "NoteAI Pro";
const CONTEXT_LENGTH_MARKER: &str = "maximum context length";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }
}

/// JSON body posted to `{base_url}/chat/completions`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionBody {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// A fully resolved outbound request: where, with which key, what.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub url: String,
    pub api_key: String,
    /// Extra provider-specific headers.
    pub headers: Vec<(String, String)>,
    pub body: ChatCompletionBody,
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("request failed: {0}")]
    Request(String),
    #[error("malformed response: {0}")]
    Malformed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("AI provider API key not configured")]
    NotConfigured,
    #[error("Text is too long for AI processing. Please try with a shorter section.")]
    TextTooLong,
    #[error("AI generation failed: {0}")]
    Generation(String),
}

impl From<TransportError> for AiError {
    fn from(e: TransportError) -> Self {
        let msg = e.to_string();
        if msg.contains(CONTEXT_LENGTH_MARKER) {
            AiError::TextTooLong
        } else {
            AiError::Generation(msg)
        }
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// The single outbound call to a chat-completion endpoint.
#[async_trait::async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send the request and return the first completion's raw text.
    async fn send(&self, request: &ChatRequest) -> Result<String, TransportError>;
}

/// Production transport backed by `reqwest`.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[async_trait::async_trait]
impl ChatTransport for HttpTransport {
    async fn send(&self, request: &ChatRequest) -> Result<String, TransportError> {
        let mut builder = self
            .client
            .post(&request.url)
            .bearer_auth(&request.api_key)
            .json(&request.body);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status { status, body });
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Malformed(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| TransportError::Malformed("no content in response".to_string()))
    }
}

// ---------------------------------------------------------------------------
// Provider selection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    OpenRouter,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::OpenRouter => "openrouter",
        }
    }
}

/// The provider chosen at startup, with its resolved key.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub provider: Provider,
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl ProviderSettings {
    /// OpenAI wins when both keys are present; `None` when neither is.
    pub fn select(ai: &AiSettings) -> Option<Self> {
        let resolve = |provider: Provider, config: &ProviderConfig| {
            config.api_key.as_ref().map(|key| Self {
                provider,
                api_key: key.clone(),
                base_url: config.base_url.trim_end_matches('/').to_string(),
                model: config.model.clone(),
            })
        };
        resolve(Provider::OpenAi, &ai.openai).or_else(|| resolve(Provider::OpenRouter, &ai.openrouter))
    }

    fn request(&self, messages: Vec<ChatMessage>) -> ChatRequest {
        let headers = match self.provider {
            Provider::OpenAi => Vec::new(),
            Provider::OpenRouter => vec![
                ("HTTP-Referer".to_string(), OPENROUTER_REFERER.to_string()),
                ("X-Title".to_string(), OPENROUTER_TITLE.to_string()),
            ],
        };
        ChatRequest {
            url: format!("{}/chat/completions", self.base_url),
            api_key: self.api_key.clone(),
            headers,
            body: ChatCompletionBody {
                model: self.model.clone(),
                messages,
                temperature: TEMPERATURE,
                max_tokens: MAX_TOKENS,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Configured model client: one provider (or none) plus a transport.
#[derive(Clone)]
pub struct ModelClient {
    provider: Option<ProviderSettings>,
    transport: Arc<dyn ChatTransport>,
}

impl ModelClient {
    pub fn new(provider: Option<ProviderSettings>, transport: Arc<dyn ChatTransport>) -> Self {
        match &provider {
            Some(p) => tracing::debug!(provider = p.provider.as_str(), model = %p.model, "AI provider selected"),
            None => tracing::debug!("No AI provider key configured"),
        }
        Self {
            provider,
            transport,
        }
    }

    pub fn from_settings(ai: &AiSettings, transport: Arc<dyn ChatTransport>) -> Self {
        Self::new(ProviderSettings::select(ai), transport)
    }

    pub fn provider(&self) -> Option<Provider> {
        self.provider.as_ref().map(|p| p.provider)
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    /// Send a full message list and return the trimmed completion text.
    pub async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String, AiError> {
        let provider = self.provider.as_ref().ok_or(AiError::NotConfigured)?;
        let request = provider.request(messages);
        let text = self.transport.send(&request).await?;
        Ok(text.trim().to_string())
    }

    /// Single-turn completion: system prompt then user prompt.
    pub async fn complete(&self, system: &str, user: &str) -> Result<String, AiError> {
        self.chat(vec![ChatMessage::system(system), ChatMessage::user(user)])
            .await
    }
}
