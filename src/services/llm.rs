//! Chat-completion client for OpenAI and Azure OpenAI.
//!
//! Each generation is a single user message; the first choice's message
//! content is returned as the completion.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{LlmProviderKind, LlmSettings};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors from the completion service.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("{0}")]
    NotConfigured(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Completion service returned HTTP {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Failed to parse completion: {0}")]
    Parse(String),

    #[error("Completion contained no message")]
    EmptyCompletion,
}

/// Map a non-success HTTP status to an error.
pub fn parse_http_error(status: u16, body: &str) -> LlmError {
    match status {
        401 => LlmError::AuthenticationFailed("invalid API key".to_string()),
        403 => LlmError::AuthenticationFailed("access denied".to_string()),
        429 => LlmError::RateLimited(body.to_string()),
        _ => LlmError::Upstream {
            status,
            body: body.to_string(),
        },
    }
}

/// Text completion service.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Complete `prompt` with `model`, or the default model when `None`.
    async fn complete(&self, prompt: &str, model: Option<&str>) -> Result<String, LlmError>;

    /// Model used when a request names none.
    fn default_model(&self) -> &str;

    fn is_configured(&self) -> bool;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat-completions client.
pub struct OpenAiClient {
    provider: LlmProviderKind,
    api_key: SecretString,
    base_url: String,
    default_model: String,
    azure_endpoint: Option<String>,
    azure_deployment: Option<String>,
    azure_api_version: String,
    configured: bool,
    http_client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(settings: &LlmSettings) -> Result<Self, LlmError> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        info!(
            "LLM client initialized (provider={}, default_model={}, configured={})",
            settings.provider,
            settings.default_model,
            settings.is_configured()
        );

        Ok(Self {
            provider: settings.provider,
            api_key: settings.api_key.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            default_model: settings.default_model.clone(),
            azure_endpoint: settings
                .azure_endpoint
                .as_ref()
                .map(|e| e.trim_end_matches('/').to_string()),
            azure_deployment: settings.azure_deployment.clone(),
            azure_api_version: settings.azure_api_version.clone(),
            configured: settings.is_configured(),
            http_client,
        })
    }

    /// Completion URL for `model`. Azure routes by deployment and ignores the
    /// model field in the body.
    fn completions_url(&self, model: &str) -> Result<Url, LlmError> {
        let raw = match (self.provider, self.azure_endpoint.as_deref()) {
            (LlmProviderKind::Azure, Some(endpoint)) => {
                let deployment = self.azure_deployment.as_deref().unwrap_or(model);
                format!(
                    "{}/openai/deployments/{}/chat/completions",
                    endpoint, deployment
                )
            }
            (LlmProviderKind::Azure, None) => {
                return Err(LlmError::NotConfigured(
                    "AZURE_OPENAI_ENDPOINT is not set".to_string(),
                ));
            }
            (LlmProviderKind::OpenAi, _) => format!("{}/chat/completions", self.base_url),
        };

        let mut url = Url::parse(&raw).map_err(|e| LlmError::Parse(format!("{}: {}", raw, e)))?;
        if self.provider == LlmProviderKind::Azure {
            url.query_pairs_mut()
                .append_pair("api-version", &self.azure_api_version);
        }
        Ok(url)
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, prompt: &str, model: Option<&str>) -> Result<String, LlmError> {
        if !self.configured {
            return Err(LlmError::NotConfigured(format!(
                "{} API key is not set",
                self.provider
            )));
        }

        let model = model
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(&self.default_model);
        let url = self.completions_url(model)?;

        let body = ChatRequest {
            model: (self.provider == LlmProviderKind::OpenAi).then_some(model),
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let request = match self.provider {
            LlmProviderKind::OpenAi => self
                .http_client
                .post(url)
                .bearer_auth(self.api_key.expose_secret()),
            LlmProviderKind::Azure => self
                .http_client
                .post(url)
                .header("api-key", self.api_key.expose_secret()),
        };

        debug!("Requesting completion (model={}, prompt_chars={})", model, prompt.len());
        let response = request.json(&body).send().await?;
        let status = response.status().as_u16();
        let body_text = response.text().await?;

        if !(200..300).contains(&status) {
            return Err(parse_http_error(status, &body_text));
        }

        let parsed: ChatResponse =
            serde_json::from_str(&body_text).map_err(|e| LlmError::Parse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .ok_or(LlmError::EmptyCompletion)
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn is_configured(&self) -> bool {
        self.configured
    }
}
